use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::TransactionId;
use crate::storage::buffer::BufferPool;
use crate::transaction::wal::{LogManager, WalError};

/// Errors that can occur during transaction processing
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("{0} is not an active transaction")]
    UnknownTransaction(TransactionId),
    #[error("write-ahead log error: {0}")]
    Wal(#[from] WalError),
}

/// Result type for transaction operations
pub type Result<T> = std::result::Result<T, TransactionError>;

/// Mints transaction ids and drives the transaction lifecycle.
///
/// `begin` assigns a process-unique id and writes a BEGIN record;
/// `commit`/`abort` write the matching record and hand the flush-or-discard
/// work (and lock release) to the buffer pool.
pub struct TransactionManager {
    /// Next transaction ID to assign
    next_tid: AtomicU64,
    wal: Arc<LogManager>,
    /// Transactions begun and not yet finished
    active: Mutex<HashSet<TransactionId>>,
}

impl TransactionManager {
    pub fn new(wal: Arc<LogManager>) -> Self {
        Self {
            next_tid: AtomicU64::new(1),
            wal,
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Begin a new transaction
    pub fn begin(&self) -> Result<TransactionId> {
        let tid = TransactionId::new(self.next_tid.fetch_add(1, Ordering::SeqCst));
        self.wal.log_begin(tid)?;
        self.active.lock().insert(tid);
        Ok(tid)
    }

    /// Commit `tid`: flush its pages through the pool, then durably record
    /// the commit.
    pub fn commit(&self, pool: &BufferPool, tid: TransactionId) -> Result<()> {
        self.finish(pool, tid, true)
    }

    /// Abort `tid`: record the abort, then discard its pages.
    pub fn abort(&self, pool: &BufferPool, tid: TransactionId) -> Result<()> {
        self.finish(pool, tid, false)
    }

    fn finish(&self, pool: &BufferPool, tid: TransactionId, commit: bool) -> Result<()> {
        if !self.active.lock().remove(&tid) {
            return Err(TransactionError::UnknownTransaction(tid));
        }

        if commit {
            // Update records hit the log before each page write; the commit
            // record seals the transaction once every page is down.
            pool.transaction_complete(tid, true);
            self.wal.log_commit(tid)?;
            self.wal.force()?;
        } else {
            self.wal.log_abort(tid)?;
            pool.transaction_complete(tid, false);
        }
        Ok(())
    }

    pub fn is_active(&self, tid: TransactionId) -> bool {
        self.active.lock().contains(&tid)
    }

    /// Ids of every transaction begun and not yet finished.
    pub fn active_transactions(&self) -> Vec<TransactionId> {
        self.active.lock().iter().copied().collect()
    }
}
