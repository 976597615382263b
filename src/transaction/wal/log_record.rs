use serde::{Deserialize, Serialize};

use crate::common::types::{Lsn, PageId, TransactionId};

/// Payload of a write-ahead log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogPayload {
    /// Marks the beginning of a transaction
    Begin,
    /// Marks the successful completion of a transaction
    Commit,
    /// Marks the rollback of a transaction
    Abort,
    /// A page write: full before- and after-images of the page
    Update {
        page_id: PageId,
        before: Vec<u8>,
        after: Vec<u8>,
    },
}

/// One write-ahead log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Log Sequence Number, unique and monotonically increasing
    pub lsn: Lsn,
    /// Transaction that produced this record
    pub tid: TransactionId,
    pub payload: LogPayload,
}
