use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;

use cairndb::common::types::{PageId, Permission, TransactionId};
use cairndb::transaction::concurrency::{LockError, LockManager};

// Import test utilities
#[path = "../common/mod.rs"]
mod common;
use common::{create_table, create_test_db, populate_pages};

fn tid(n: u64) -> TransactionId {
    TransactionId::new(n)
}

fn pid(n: u32) -> PageId {
    PageId::new(1, n)
}

#[test]
fn exclusive_holder_blocks_all_other_requests() {
    let lm = Arc::new(LockManager::new());
    lm.acquire_write(tid(1), pid(0)).unwrap();

    let (granted_tx, granted_rx) = mpsc::channel();
    let waiter = {
        let lm = Arc::clone(&lm);
        thread::spawn(move || {
            lm.acquire_read(tid(2), pid(0)).unwrap();
            granted_tx.send(()).unwrap();
        })
    };

    // The reader stays blocked while the writer holds the page.
    assert!(granted_rx.recv_timeout(Duration::from_millis(100)).is_err());

    lm.release_all(tid(1));
    granted_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    waiter.join().unwrap();
    assert!(lm.holds_lock(tid(2), pid(0)));
}

#[test]
fn sole_shared_holder_upgrades_without_release() {
    let lm = LockManager::new();
    lm.acquire_read(tid(1), pid(0)).unwrap();
    lm.acquire_write(tid(1), pid(0)).unwrap();
    assert!(lm.holds_lock(tid(1), pid(0)));
}

#[test]
fn deadlock_is_detected_before_blocking() {
    // T1 holds A, T2 holds B; T2 blocks on A; T1's request for B closes the
    // cycle and must fail immediately instead of waiting.
    let lm = Arc::new(LockManager::new());
    lm.acquire_write(tid(1), pid(0)).unwrap();
    lm.acquire_write(tid(2), pid(1)).unwrap();

    let (granted_tx, granted_rx) = mpsc::channel();
    let blocked = {
        let lm = Arc::clone(&lm);
        thread::spawn(move || {
            let outcome = lm.acquire_write(tid(2), pid(0));
            granted_tx.send(outcome).unwrap();
        })
    };

    // Give T2's request time to record its wait-for edge and block.
    thread::sleep(Duration::from_millis(200));
    assert!(granted_rx.try_recv().is_err());

    let err = lm.acquire_write(tid(1), pid(1)).unwrap_err();
    assert!(matches!(err, LockError::Deadlock(t) if t == tid(1)));

    // Rolling T1 back unblocks T2.
    lm.release_all(tid(1));
    granted_rx
        .recv_timeout(Duration::from_secs(5))
        .unwrap()
        .unwrap();
    blocked.join().unwrap();
    assert!(lm.holds_lock(tid(2), pid(0)));
}

#[test]
fn concurrent_upgraders_resolve_by_aborting_one() {
    // Both transactions hold the page shared; both request exclusive. The
    // first blocks waiting to be the sole holder, the second closes the
    // cycle and is aborted.
    let lm = Arc::new(LockManager::new());
    lm.acquire_read(tid(1), pid(0)).unwrap();
    lm.acquire_read(tid(2), pid(0)).unwrap();

    let (granted_tx, granted_rx) = mpsc::channel();
    let upgrader = {
        let lm = Arc::clone(&lm);
        thread::spawn(move || {
            let outcome = lm.acquire_write(tid(1), pid(0));
            granted_tx.send(outcome).unwrap();
        })
    };

    thread::sleep(Duration::from_millis(200));
    assert!(granted_rx.try_recv().is_err());

    let err = lm.acquire_write(tid(2), pid(0)).unwrap_err();
    assert!(matches!(err, LockError::Deadlock(t) if t == tid(2)));

    lm.release_all(tid(2));
    granted_rx
        .recv_timeout(Duration::from_secs(5))
        .unwrap()
        .unwrap();
    upgrader.join().unwrap();
    assert!(lm.holds_lock(tid(1), pid(0)));
}

#[test]
fn blocked_reader_is_granted_after_commit() -> Result<()> {
    // Through the pool: T1 fetches a page exclusively, T2's shared fetch
    // blocks until T1 commits.
    let db = create_test_db(4)?;
    let file = create_table(&db, 1)?;
    populate_pages(&file, 1)?;

    let t1 = tid(1);
    let t2 = tid(2);
    db.pool.get_page(t1, pid(0), Permission::ReadWrite)?;

    let (granted_tx, granted_rx) = mpsc::channel();
    let reader = {
        let pool = Arc::clone(&db.pool);
        thread::spawn(move || {
            let outcome = pool.get_page(t2, pid(0), Permission::ReadOnly);
            granted_tx.send(outcome.map(|_| ())).unwrap();
        })
    };

    assert!(granted_rx.recv_timeout(Duration::from_millis(100)).is_err());

    db.pool.transaction_complete(t1, true);
    granted_rx
        .recv_timeout(Duration::from_secs(5))
        .unwrap()
        .unwrap();
    reader.join().unwrap();
    assert!(!db.pool.holds_lock(t1, pid(0)));
    assert!(db.pool.holds_lock(t2, pid(0)));
    Ok(())
}

#[test]
fn deadlock_abort_propagates_through_the_pool() -> Result<()> {
    let db = create_test_db(4)?;
    let file = create_table(&db, 1)?;
    populate_pages(&file, 2)?;

    let t1 = tid(1);
    let t2 = tid(2);
    db.pool.get_page(t1, pid(0), Permission::ReadWrite)?;
    db.pool.get_page(t2, pid(1), Permission::ReadWrite)?;

    let (granted_tx, granted_rx) = mpsc::channel();
    let blocked = {
        let pool = Arc::clone(&db.pool);
        thread::spawn(move || {
            let outcome = pool.get_page(t2, pid(0), Permission::ReadWrite);
            granted_tx.send(outcome.map(|_| ())).unwrap();
        })
    };

    thread::sleep(Duration::from_millis(200));

    let err = db
        .pool
        .get_page(t1, pid(1), Permission::ReadWrite)
        .unwrap_err();
    assert!(err.is_deadlock());

    // The aborted transaction rolls back entirely, unblocking the other.
    db.pool.transaction_complete(t1, false);
    granted_rx
        .recv_timeout(Duration::from_secs(5))
        .unwrap()
        .unwrap();
    blocked.join().unwrap();
    db.pool.transaction_complete(t2, true);
    Ok(())
}
