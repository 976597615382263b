use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{Lsn, PageId, TransactionId};
use crate::transaction::wal::log_record::{LogPayload, LogRecord};

#[derive(Error, Debug)]
pub enum WalError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode or decode log record: {0}")]
    Codec(#[from] bincode::Error),
}

/// Result type for log manager operations
pub type Result<T> = std::result::Result<T, WalError>;

/// Append-only write-ahead log over a single file.
///
/// Records are bincode-encoded and length-framed. Appends land in the OS
/// file cache; `force` makes everything appended so far durable. The
/// write-ahead discipline is the caller's: a page's update record must be
/// appended and forced before the page itself is written to its table file.
pub struct LogManager {
    file: Mutex<File>,
    next_lsn: AtomicU64,
}

impl LogManager {
    /// Open (or create) the log file, positioning appends after any
    /// existing records and continuing their LSN sequence.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let manager = Self {
            file: Mutex::new(file),
            next_lsn: AtomicU64::new(1),
        };
        let last_lsn = manager.read_records()?.last().map(|r| r.lsn).unwrap_or(0);
        manager.next_lsn.store(last_lsn + 1, Ordering::SeqCst);
        Ok(manager)
    }

    fn append(&self, tid: TransactionId, payload: LogPayload) -> Result<Lsn> {
        let lsn = self.next_lsn.fetch_add(1, Ordering::SeqCst);
        let record = LogRecord { lsn, tid, payload };
        let bytes = bincode::serialize(&record)?;

        let mut file = self.file.lock();
        file.write_u32::<LittleEndian>(bytes.len() as u32)?;
        file.write_all(&bytes)?;
        Ok(lsn)
    }

    /// Append an update record carrying the page's before- and after-image.
    pub fn log_write(
        &self,
        tid: TransactionId,
        page_id: PageId,
        before: &[u8],
        after: &[u8],
    ) -> Result<Lsn> {
        self.append(
            tid,
            LogPayload::Update {
                page_id,
                before: before.to_vec(),
                after: after.to_vec(),
            },
        )
    }

    pub fn log_begin(&self, tid: TransactionId) -> Result<Lsn> {
        self.append(tid, LogPayload::Begin)
    }

    pub fn log_commit(&self, tid: TransactionId) -> Result<Lsn> {
        self.append(tid, LogPayload::Commit)
    }

    pub fn log_abort(&self, tid: TransactionId) -> Result<Lsn> {
        self.append(tid, LogPayload::Abort)
    }

    /// Durably persist every record appended so far.
    pub fn force(&self) -> Result<()> {
        self.file.lock().sync_data()?;
        Ok(())
    }

    /// The LSN the next record will receive.
    pub fn current_lsn(&self) -> Lsn {
        self.next_lsn.load(Ordering::SeqCst)
    }

    /// Scan the log from the start and return every record in order.
    pub fn read_records(&self) -> Result<Vec<LogRecord>> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(0))?;

        let mut records = Vec::new();
        loop {
            let len = match file.read_u32::<LittleEndian>() {
                Ok(len) => len as usize,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            };
            let mut buf = vec![0u8; len];
            file.read_exact(&mut buf)?;
            records.push(bincode::deserialize(&buf)?);
        }

        file.seek(SeekFrom::End(0))?;
        Ok(records)
    }
}
