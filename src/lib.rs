// Cairn Database Storage Engine

pub mod catalog;
pub mod common;
pub mod storage;
pub mod transaction;

// Re-export key items for convenient access
pub use catalog::Catalog;
pub use common::types::{PageId, Permission, TransactionId, PAGE_SIZE};
pub use storage::buffer::BufferPool;
pub use storage::buffer::BufferPoolError;
pub use storage::table::{HeapFile, TableFile, Tuple};
pub use transaction::concurrency::LockManager;
pub use transaction::concurrency::TransactionManager;
pub use transaction::wal::LogManager;
