use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;
use parking_lot::Mutex;

use crate::common::types::{PageId, PageNo, PagePtr, Permission, TableId, TransactionId, PAGE_SIZE};
use crate::storage::buffer::{BufferPool, BufferPoolError};
use crate::storage::page::{HeapPage, PageError};
use crate::storage::table::{RecordId, TableError, TableFile, Tuple};

/// Heap-organized table file: an unordered sequence of slotted pages.
///
/// Inserts probe existing pages for a free slot before extending the file;
/// the probe takes a shared lock per page and releases it again when the
/// page turns out to be full, since a page that was only inspected need not
/// stay locked until transaction end.
pub struct HeapFile {
    id: TableId,
    record_len: usize,
    file: Mutex<File>,
}

impl HeapFile {
    /// Open (or create) the heap file backing table `id`.
    pub fn open(id: TableId, record_len: usize, path: impl AsRef<Path>) -> Result<Self, TableError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self {
            id,
            record_len,
            file: Mutex::new(file),
        })
    }

    fn page_offset(&self, page_no: PageNo) -> u64 {
        page_no as u64 * PAGE_SIZE as u64
    }
}

impl TableFile for HeapFile {
    fn id(&self) -> TableId {
        self.id
    }

    fn record_len(&self) -> usize {
        self.record_len
    }

    fn num_pages(&self) -> Result<PageNo, TableError> {
        let file = self.file.lock();
        let len = file.metadata()?.len();
        Ok((len / PAGE_SIZE as u64) as PageNo)
    }

    fn read_page(&self, pid: PageId) -> Result<HeapPage, TableError> {
        if pid.table_id != self.id {
            return Err(TableError::ForeignPage(pid, self.id));
        }

        let mut file = self.file.lock();
        let extent = (file.metadata()?.len() / PAGE_SIZE as u64) as PageNo;

        if pid.page_no < extent {
            let mut buf = vec![0u8; PAGE_SIZE];
            file.seek(SeekFrom::Start(self.page_offset(pid.page_no)))?;
            file.read_exact(&mut buf)?;
            return Ok(HeapPage::from_bytes(pid, buf, self.record_len)?);
        }

        if pid.page_no == extent {
            // Allocate: extend the file with one zero-filled page.
            debug!("extending table {} with page {}", self.id, pid);
            file.seek(SeekFrom::End(0))?;
            file.write_all(&[0u8; PAGE_SIZE])?;
            file.flush()?;
            return Ok(HeapPage::empty(pid, self.record_len));
        }

        Err(TableError::PageOutOfRange(pid))
    }

    fn write_page(&self, page: &HeapPage) -> Result<(), TableError> {
        let pid = page.id();
        if pid.table_id != self.id {
            return Err(TableError::ForeignPage(pid, self.id));
        }
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.page_offset(pid.page_no)))?;
        file.write_all(page.page_data())?;
        file.flush()?;
        Ok(())
    }

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PagePtr>, BufferPoolError> {
        // Probe existing pages for a free slot under a shared lock first and
        // only upgrade on the page that will actually be written.
        let extent = self.num_pages().map_err(BufferPoolError::Table)?;
        for page_no in 0..extent {
            let pid = PageId::new(self.id, page_no);
            let page = pool.get_page(tid, pid, Permission::ReadOnly)?;
            let has_space = page.read().has_free_slot();
            if !has_space {
                pool.release_page(tid, pid);
                continue;
            }

            let page = pool.get_page(tid, pid, Permission::ReadWrite)?;
            let slot = page
                .write()
                .insert_record(tuple.data())
                .map_err(TableError::Page)
                .map_err(BufferPoolError::Table)?;
            tuple.set_record_id(RecordId { page_id: pid, slot });
            return Ok(vec![page]);
        }

        // Every existing page is full; allocate one past the extent.
        let pid = PageId::new(self.id, extent);
        let page = pool.get_page(tid, pid, Permission::ReadWrite)?;
        let slot = page
            .write()
            .insert_record(tuple.data())
            .map_err(TableError::Page)
            .map_err(BufferPoolError::Table)?;
        tuple.set_record_id(RecordId { page_id: pid, slot });
        Ok(vec![page])
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PagePtr>, BufferPoolError> {
        let rid = tuple
            .record_id()
            .ok_or(TableError::MissingRecordId)
            .map_err(BufferPoolError::Table)?;
        if rid.page_id.table_id != self.id {
            return Err(BufferPoolError::Table(TableError::TupleNotFound {
                table_id: self.id,
                page_id: rid.page_id,
                slot: rid.slot,
            }));
        }

        let page = pool.get_page(tid, rid.page_id, Permission::ReadWrite)?;
        let deleted = page.write().delete_record(rid.slot);
        match deleted {
            Ok(()) => Ok(vec![page]),
            Err(PageError::EmptySlot { .. }) | Err(PageError::SlotOutOfRange { .. }) => {
                Err(BufferPoolError::Table(TableError::TupleNotFound {
                    table_id: self.id,
                    page_id: rid.page_id,
                    slot: rid.slot,
                }))
            }
            Err(e) => Err(BufferPoolError::Table(TableError::Page(e))),
        }
    }
}
