use thiserror::Error;

use crate::common::types::TableId;
use crate::storage::table::TableError;
use crate::transaction::concurrency::LockError;
use crate::transaction::wal::WalError;

#[derive(Error, Debug)]
pub enum BufferPoolError {
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("no table registered with id {0}")]
    UnknownTable(TableId),
    #[error("all {0} buffered pages are dirty; nothing can be evicted")]
    NoEvictablePage(usize),
    #[error("table file error: {0}")]
    Table(#[from] TableError),
    #[error("write-ahead log error: {0}")]
    Wal(#[from] WalError),
}

impl BufferPoolError {
    /// True when the error is a deadlock abort: the requesting transaction
    /// must be rolled back in full rather than retrying the single request.
    pub fn is_deadlock(&self) -> bool {
        matches!(self, BufferPoolError::Lock(LockError::Deadlock(_)))
    }
}
