use anyhow::Result;

use cairndb::storage::table::{TableFile, Tuple};
use cairndb::transaction::concurrency::TransactionManager;
use cairndb::transaction::wal::LogPayload;

// Import test utilities
#[path = "../common/mod.rs"]
mod common;
use common::{create_table, create_test_db, record_bytes};

#[test]
fn committed_write_leaves_ordered_wal_records() -> Result<()> {
    let db = create_test_db(4)?;
    create_table(&db, 1)?;
    let tm = TransactionManager::new(db.wal.clone());

    let tid = tm.begin()?;
    let mut tuple = Tuple::new(record_bytes(5));
    db.pool.insert_tuple(tid, 1, &mut tuple)?;
    tm.commit(&db.pool, tid)?;

    let records: Vec<_> = db
        .wal
        .read_records()?
        .into_iter()
        .filter(|r| r.tid == tid)
        .collect();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].payload, LogPayload::Begin);
    let LogPayload::Update {
        ref before,
        ref after,
        ..
    } = records[1].payload
    else {
        panic!("expected an update record, got {:?}", records[1].payload);
    };
    // The before-image is the page as loaded, the after-image carries the
    // inserted record.
    assert!(before.iter().all(|&b| b == 0));
    assert_ne!(before, after);
    assert_eq!(records[2].payload, LogPayload::Commit);
    Ok(())
}

#[test]
fn abort_writes_no_update_records() -> Result<()> {
    let db = create_test_db(4)?;
    let file = create_table(&db, 1)?;
    let tm = TransactionManager::new(db.wal.clone());

    let tid = tm.begin()?;
    let mut tuple = Tuple::new(record_bytes(5));
    db.pool.insert_tuple(tid, 1, &mut tuple)?;
    let rid = tuple.record_id().unwrap();
    tm.abort(&db.pool, tid)?;

    let payloads: Vec<_> = db
        .wal
        .read_records()?
        .into_iter()
        .filter(|r| r.tid == tid)
        .map(|r| r.payload)
        .collect();
    assert_eq!(payloads, vec![LogPayload::Begin, LogPayload::Abort]);

    // Nothing reached the table file.
    assert_eq!(file.read_page(rid.page_id)?.records().count(), 0);
    assert!(!tm.is_active(tid));
    Ok(())
}

#[test]
fn transactions_are_isolated_by_page_locks() -> Result<()> {
    let db = create_test_db(4)?;
    let file = create_table(&db, 1)?;
    let tm = TransactionManager::new(db.wal.clone());

    let t1 = tm.begin()?;
    let mut first = Tuple::new(record_bytes(1));
    db.pool.insert_tuple(t1, 1, &mut first)?;
    tm.commit(&db.pool, t1)?;

    let t2 = tm.begin()?;
    let mut second = Tuple::new(record_bytes(2));
    db.pool.insert_tuple(t2, 1, &mut second)?;
    tm.commit(&db.pool, t2)?;

    let rid = second.record_id().unwrap();
    let page = file.read_page(rid.page_id)?;
    assert_eq!(page.records().count(), 2);
    assert!(t2 > t1);
    Ok(())
}

#[test]
fn commit_then_reuse_of_id_is_rejected() -> Result<()> {
    let db = create_test_db(4)?;
    create_table(&db, 1)?;
    let tm = TransactionManager::new(db.wal.clone());

    let tid = tm.begin()?;
    tm.commit(&db.pool, tid)?;
    assert!(tm.commit(&db.pool, tid).is_err());
    assert!(tm.abort(&db.pool, tid).is_err());
    Ok(())
}
