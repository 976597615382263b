use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Table ID type
pub type TableId = u32;

/// Page number within a table file
pub type PageNo = u32;

/// LSN (Log Sequence Number) type
pub type Lsn = u64;

/// Identifies one fixed-size block within one table's storage.
///
/// Compared and hashed by value; a PageId is never reused for different
/// on-disk content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId {
    pub table_id: TableId,
    pub page_no: PageNo,
}

impl PageId {
    pub fn new(table_id: TableId, page_no: PageNo) -> Self {
        Self { table_id, page_no }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table_id, self.page_no)
    }
}

/// Identifies one unit-of-work across its lifetime.
///
/// Normally minted by `TransactionManager::begin`, which guarantees
/// process-uniqueness; tests may construct ids directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn-{}", self.0)
    }
}

/// Requested access level for a page fetch.
///
/// `ReadOnly` maps to a shared lock, `ReadWrite` to an exclusive lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

/// Smart pointer to a cached page image
pub type PagePtr = Arc<RwLock<crate::storage::page::HeapPage>>;
