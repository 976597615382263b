pub mod heap_file;

use std::io;

use thiserror::Error;

use crate::common::types::{PageId, PageNo, PagePtr, TableId, TransactionId};
use crate::storage::buffer::{BufferPool, BufferPoolError};
use crate::storage::page::{HeapPage, PageError};

pub use heap_file::HeapFile;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Page(#[from] PageError),
    #[error("page {0} is beyond the extent of its table file")]
    PageOutOfRange(PageId),
    #[error("page {0} does not belong to table {1}")]
    ForeignPage(PageId, TableId),
    #[error("tuple has no record id; it was never stored in a table")]
    MissingRecordId,
    #[error("tuple at page {page_id} slot {slot} not found in table {table_id}")]
    TupleNotFound {
        table_id: TableId,
        page_id: PageId,
        slot: usize,
    },
}

/// Location of a stored tuple: the page holding it and the slot within.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: usize,
}

/// A fixed-size record, optionally located in a table.
///
/// The record id is assigned when the tuple is inserted and is required to
/// delete it again.
#[derive(Debug, Clone)]
pub struct Tuple {
    record_id: Option<RecordId>,
    data: Vec<u8>,
}

impl Tuple {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            record_id: None,
            data,
        }
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: RecordId) {
        self.record_id = Some(rid);
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// One table's on-disk storage.
///
/// All page access from `insert_tuple`/`delete_tuple` goes through the
/// buffer pool passed in, never around it, so that locking and caching stay
/// coherent. `read_page`/`write_page` are the raw block transfers the pool
/// itself uses on miss and flush.
pub trait TableFile: Send + Sync {
    fn id(&self) -> TableId;

    /// Fixed record size for this table, in bytes.
    fn record_len(&self) -> usize;

    /// Number of whole pages currently in the file.
    fn num_pages(&self) -> Result<PageNo, TableError>;

    /// Read one page image, or allocate it zero-filled when `pid` addresses
    /// the page exactly one past the current extent.
    fn read_page(&self, pid: PageId) -> Result<HeapPage, TableError>;

    /// Write one page image back to its block.
    fn write_page(&self, page: &HeapPage) -> Result<(), TableError>;

    /// Store a tuple on behalf of `tid`, assigning its record id, and return
    /// every page the operation modified.
    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PagePtr>, BufferPoolError>;

    /// Remove a previously stored tuple on behalf of `tid` and return every
    /// page the operation modified.
    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PagePtr>, BufferPoolError>;
}
