// Transaction management: page-level two-phase locking and write-ahead logging

pub mod concurrency;
pub mod wal;

// Public exports
pub use concurrency::{LockError, LockManager, PageLock, TransactionManager};
pub use wal::{LogManager, LogRecord};
