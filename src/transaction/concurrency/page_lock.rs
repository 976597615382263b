use std::collections::HashSet;

use parking_lot::{Condvar, Mutex};

use crate::common::types::TransactionId;

#[derive(Default)]
struct LockState {
    /// Transactions currently holding the lock.
    holders: HashSet<TransactionId>,
    /// Whether the lock is held exclusively. Implies `holders.len() <= 1`.
    exclusive: bool,
    /// Active shared holders.
    readers: usize,
    /// Active exclusive holders (0 or 1).
    writers: usize,
    /// Transactions with an acquire in flight.
    acquiring: HashSet<TransactionId>,
}

/// Per-page shared/exclusive lock with in-place upgrade.
///
/// Blocking follows the monitor pattern: acquirers wait on a condition
/// variable in a loop that re-checks its predicate after every wake, and
/// every release wakes all waiters.
///
/// A sole shared holder requesting exclusive access upgrades without an
/// intervening release: it waits until it is the only holder, drops its
/// shared hold without waking anyone, and then takes the lock exclusively.
/// Two transactions upgrading the same page concurrently are not ordered
/// here; the lock manager's cycle detection aborts one of them.
pub struct PageLock {
    state: Mutex<LockState>,
    granted: Condvar,
}

impl PageLock {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            granted: Condvar::new(),
        }
    }

    /// Take the lock in shared mode, blocking while an exclusive holder
    /// exists. Idempotent for a transaction that already holds the lock in
    /// either mode.
    pub fn acquire_shared(&self, tid: TransactionId) {
        let mut state = self.state.lock();
        if state.holders.contains(&tid) {
            return;
        }

        state.acquiring.insert(tid);
        while state.writers != 0 {
            self.granted.wait(&mut state);
        }
        state.readers += 1;
        state.holders.insert(tid);
        state.exclusive = false;
        state.acquiring.remove(&tid);
    }

    /// Take the lock exclusively, blocking until no other holder remains.
    /// Idempotent for a transaction that already holds it exclusively; a
    /// sole shared holder upgrades in place.
    pub fn acquire_exclusive(&self, tid: TransactionId) {
        let mut state = self.state.lock();
        if state.exclusive && state.holders.contains(&tid) {
            return;
        }

        state.acquiring.insert(tid);
        if state.holders.contains(&tid) {
            // Upgrade: wait until we are the sole holder, then convert
            // without releasing in between.
            while state.holders.len() > 1 {
                self.granted.wait(&mut state);
            }
            state.readers -= 1;
            state.holders.remove(&tid);
        }

        while state.readers != 0 || state.writers != 0 {
            self.granted.wait(&mut state);
        }
        state.writers += 1;
        state.holders.insert(tid);
        state.exclusive = true;
        state.acquiring.remove(&tid);
    }

    /// Drop `tid`'s hold, shared or exclusive, and wake all waiters.
    /// A no-op for a transaction that holds nothing. Never blocks.
    pub fn release(&self, tid: TransactionId) {
        let mut state = self.state.lock();
        if !state.holders.remove(&tid) {
            return;
        }
        if state.exclusive {
            state.writers -= 1;
        } else {
            state.readers -= 1;
        }
        if state.holders.is_empty() {
            state.exclusive = false;
        }
        self.granted.notify_all();
    }

    pub fn held_by(&self, tid: TransactionId) -> bool {
        self.state.lock().holders.contains(&tid)
    }

    pub fn is_exclusive(&self) -> bool {
        self.state.lock().exclusive
    }

    /// Snapshot of the current holder set.
    pub fn holders(&self) -> HashSet<TransactionId> {
        self.state.lock().holders.clone()
    }

    /// Snapshot of transactions with an acquire in flight.
    pub fn acquirers(&self) -> HashSet<TransactionId> {
        self.state.lock().acquiring.clone()
    }
}

impl Default for PageLock {
    fn default() -> Self {
        Self::new()
    }
}
