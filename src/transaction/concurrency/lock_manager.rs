use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{PageId, TransactionId};
use crate::transaction::concurrency::page_lock::PageLock;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("{0} aborted: granting the lock request would deadlock")]
    Deadlock(TransactionId),
}

#[derive(Default)]
struct LockTables {
    /// One lock per page ever touched; created lazily, never removed.
    page_locks: HashMap<PageId, Arc<PageLock>>,
    /// Pages currently locked by each transaction.
    held_pages: HashMap<TransactionId, HashSet<PageId>>,
    /// Wait-for edges of transactions with a pending request. Populated
    /// only while the request is pending, cleared on grant or abort.
    wait_for: HashMap<TransactionId, HashSet<TransactionId>>,
}

/// Grants page locks under two-phase locking with proactive deadlock
/// detection.
///
/// Structural state (the lock table, held-page sets, and the wait-for
/// graph) lives behind one mutex. A request that would conflict with the
/// page's current holders first records its wait-for edges and searches the
/// graph; a request that would wait on itself is refused with a deadlock
/// abort before it ever blocks. The blocking acquire itself runs on the
/// per-page lock outside the mutex, so waiting on one page never serializes
/// requests for unrelated pages.
pub struct LockManager {
    tables: Mutex<LockTables>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(LockTables::default()),
        }
    }

    /// Acquire a shared lock on `pid` for `tid`. Blocks while another
    /// transaction holds the page exclusively; fails without blocking when
    /// waiting would close a cycle.
    pub fn acquire_read(&self, tid: TransactionId, pid: PageId) -> Result<(), LockError> {
        let lock = {
            let mut tables = self.tables.lock();
            let lock = Arc::clone(tables.page_locks.entry(pid).or_default());

            // A holder in any mode re-requesting shared access is granted
            // immediately.
            if lock.held_by(tid) {
                tables.held_pages.entry(tid).or_default().insert(pid);
                return Ok(());
            }

            if lock.is_exclusive() {
                self.check_for_deadlock(&mut tables, tid, pid, lock.holders())?;
            }
            lock
        };

        lock.acquire_shared(tid);
        self.record_grant(tid, pid);
        Ok(())
    }

    /// Acquire an exclusive lock on `pid` for `tid`, upgrading in place if
    /// `tid` is the page's sole shared holder. Blocks while any other
    /// transaction holds the page; fails without blocking when waiting would
    /// close a cycle.
    pub fn acquire_write(&self, tid: TransactionId, pid: PageId) -> Result<(), LockError> {
        let lock = {
            let mut tables = self.tables.lock();
            let lock = Arc::clone(tables.page_locks.entry(pid).or_default());

            if lock.is_exclusive() && lock.held_by(tid) {
                tables.held_pages.entry(tid).or_default().insert(pid);
                return Ok(());
            }

            self.check_for_deadlock(&mut tables, tid, pid, lock.holders())?;
            lock
        };

        lock.acquire_exclusive(tid);
        self.record_grant(tid, pid);
        Ok(())
    }

    /// Record tentative wait-for edges from `tid` to every conflicting
    /// holder and refuse the request if `tid` would end up waiting on
    /// itself. Leaves the edges in place on success; they are cleared once
    /// the acquire is granted.
    fn check_for_deadlock(
        &self,
        tables: &mut LockTables,
        tid: TransactionId,
        pid: PageId,
        holders: HashSet<TransactionId>,
    ) -> Result<(), LockError> {
        let conflicting: HashSet<TransactionId> =
            holders.into_iter().filter(|holder| *holder != tid).collect();
        if conflicting.is_empty() {
            return Ok(());
        }

        tables.wait_for.insert(tid, conflicting);
        if Self::waits_on_itself(&tables.wait_for, tid) {
            tables.wait_for.remove(&tid);
            debug!("deadlock: aborting {tid} requesting page {pid}");
            return Err(LockError::Deadlock(tid));
        }
        Ok(())
    }

    /// Breadth-first reachability over the wait-for graph: does any path
    /// from `tid` lead back to `tid`?
    fn waits_on_itself(
        wait_for: &HashMap<TransactionId, HashSet<TransactionId>>,
        tid: TransactionId,
    ) -> bool {
        let mut visited = HashSet::from([tid]);
        let mut queue = VecDeque::from([tid]);

        while let Some(head) = queue.pop_front() {
            let Some(adjacent) = wait_for.get(&head) else {
                continue;
            };
            for &next in adjacent {
                if next == head {
                    continue;
                }
                if next == tid {
                    return true;
                }
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }

    fn record_grant(&self, tid: TransactionId, pid: PageId) {
        let mut tables = self.tables.lock();
        tables.wait_for.remove(&tid);
        tables.held_pages.entry(tid).or_default().insert(pid);
    }

    /// Release `tid`'s lock on one page. Never blocks; releasing a page the
    /// transaction does not hold is a no-op.
    pub fn release_lock(&self, tid: TransactionId, pid: PageId) {
        let mut tables = self.tables.lock();
        if let Some(lock) = tables.page_locks.get(&pid) {
            lock.release(tid);
        }
        if let Some(held) = tables.held_pages.get_mut(&tid) {
            held.remove(&pid);
            if held.is_empty() {
                tables.held_pages.remove(&tid);
            }
        }
    }

    /// Release every lock `tid` holds. Never blocks; a transaction holding
    /// nothing is a no-op.
    pub fn release_all(&self, tid: TransactionId) {
        let mut tables = self.tables.lock();
        let Some(held) = tables.held_pages.remove(&tid) else {
            return;
        };
        for pid in held {
            if let Some(lock) = tables.page_locks.get(&pid) {
                lock.release(tid);
            }
        }
    }

    /// True if `tid` currently holds a lock on `pid` in either mode.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.tables
            .lock()
            .held_pages
            .get(&tid)
            .is_some_and(|held| held.contains(&pid))
    }

    /// Snapshot of the pages `tid` currently holds.
    pub fn pages_held_by(&self, tid: TransactionId) -> Vec<PageId> {
        self.tables
            .lock()
            .held_pages
            .get(&tid)
            .map(|held| held.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}
