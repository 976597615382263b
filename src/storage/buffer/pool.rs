use std::sync::Arc;

use linked_hash_map::LinkedHashMap;
use log::{debug, error};
use parking_lot::{Mutex, RwLock};

use crate::catalog::Catalog;
use crate::common::types::{PageId, PagePtr, Permission, TableId, TransactionId};
use crate::storage::buffer::error::BufferPoolError;
use crate::storage::table::{TableError, Tuple};
use crate::transaction::concurrency::LockManager;
use crate::transaction::wal::LogManager;

/// Default page capacity used when callers have no better number.
pub const DEFAULT_CAPACITY: usize = 50;

/// Bounded in-memory page cache gated by page-level two-phase locking.
///
/// Every page access goes through `get_page`, which first obtains the
/// matching lock from the lock manager (blocking, or failing with a deadlock
/// abort) and only then touches the cache. Recency is tracked by moving a
/// page to the back of the ordered map on every hit and insertion; eviction
/// scans from the front and never evicts a dirty page.
///
/// At transaction end the pool either flushes (commit) or discards (abort)
/// every page the transaction locked, then releases all of its locks.
pub struct BufferPool {
    capacity: usize,
    pages: Mutex<LinkedHashMap<PageId, PagePtr>>,
    lock_manager: LockManager,
    catalog: Arc<Catalog>,
    wal: Arc<LogManager>,
}

impl BufferPool {
    /// Create a pool caching up to `capacity` pages.
    pub fn new(capacity: usize, catalog: Arc<Catalog>, wal: Arc<LogManager>) -> Self {
        Self {
            capacity,
            pages: Mutex::new(LinkedHashMap::with_capacity(capacity)),
            lock_manager: LockManager::new(),
            catalog,
            wal,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pages currently resident.
    pub fn cached_pages(&self) -> usize {
        self.pages.lock().len()
    }

    pub fn is_cached(&self, pid: PageId) -> bool {
        self.pages.lock().contains_key(&pid)
    }

    /// True if `tid` holds a lock (either mode) on `pid`.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds_lock(tid, pid)
    }

    /// Retrieve the page with the access level `perm`, locking it for `tid`.
    ///
    /// Blocks while a conflicting transaction holds the page; fails with a
    /// deadlock abort when waiting would close a cycle. On a miss the page is
    /// loaded from its owning file (allocating it when `pid` addresses the
    /// block one past the file's extent), evicting a clean victim first if
    /// the cache is full. A page fetched with `ReadWrite` is marked dirty for
    /// `tid` at load time, before any mutation happens.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permission,
    ) -> Result<PagePtr, BufferPoolError> {
        match perm {
            Permission::ReadOnly => self.lock_manager.acquire_read(tid, pid)?,
            Permission::ReadWrite => self.lock_manager.acquire_write(tid, pid)?,
        }

        let mut pages = self.pages.lock();
        if let Some(page) = pages.get_refresh(&pid) {
            return Ok(page.clone());
        }

        let file = self
            .catalog
            .table(pid.table_id)
            .ok_or(BufferPoolError::UnknownTable(pid.table_id))?;
        let image = file.read_page(pid)?;

        if pages.len() >= self.capacity {
            self.evict_page(&mut pages)?;
        }

        let page: PagePtr = Arc::new(RwLock::new(image));
        if perm == Permission::ReadWrite {
            page.write().mark_dirty(tid);
        }
        pages.insert(pid, page.clone());
        Ok(page)
    }

    /// Add a tuple to `table_id` on behalf of `tid`.
    ///
    /// The owning file picks (and write-locks) the pages it touches; every
    /// page it reports modified is marked dirty for `tid` and reinstalled at
    /// the most-recently-used position.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<(), BufferPoolError> {
        let file = self
            .catalog
            .table(table_id)
            .ok_or(BufferPoolError::UnknownTable(table_id))?;
        let dirtied = file.insert_tuple(self, tid, tuple)?;
        self.install_dirty(tid, dirtied)
    }

    /// Remove a previously inserted tuple on behalf of `tid`.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<(), BufferPoolError> {
        let rid = tuple
            .record_id()
            .ok_or(TableError::MissingRecordId)
            .map_err(BufferPoolError::Table)?;
        let table_id = rid.page_id.table_id;
        let file = self
            .catalog
            .table(table_id)
            .ok_or(BufferPoolError::UnknownTable(table_id))?;
        let dirtied = file.delete_tuple(self, tid, tuple)?;
        self.install_dirty(tid, dirtied)
    }

    fn install_dirty(&self, tid: TransactionId, dirtied: Vec<PagePtr>) -> Result<(), BufferPoolError> {
        for page in dirtied {
            let pid = {
                let mut guard = page.write();
                guard.mark_dirty(tid);
                guard.id()
            };
            let mut pages = self.pages.lock();
            if !pages.contains_key(&pid) && pages.len() >= self.capacity {
                self.evict_page(&mut pages)?;
            }
            // Reinstall at the most-recently-used position
            pages.remove(&pid);
            pages.insert(pid, page);
        }
        Ok(())
    }

    /// Commit or abort `tid`: flush or discard every page it holds, then
    /// release all of its locks.
    ///
    /// A flush failure during commit is logged and swallowed so that lock
    /// release still runs; the page's durability is forfeited.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) {
        let held = self.lock_manager.pages_held_by(tid);
        for pid in &held {
            if commit {
                if let Err(e) = self.flush_page(*pid) {
                    error!("failed to flush page {pid} while committing {tid}: {e}");
                }
            } else {
                self.discard_page(*pid);
            }
        }
        self.lock_manager.release_all(tid);
    }

    /// Write one page back to disk if it is dirty: log its before/after
    /// images, force the log, write the page, clear the dirty tag. A clean
    /// or non-resident page is a no-op.
    pub fn flush_page(&self, pid: PageId) -> Result<(), BufferPoolError> {
        let page = self.pages.lock().get(&pid).cloned();
        match page {
            Some(page) => self.flush_entry(&page),
            None => Ok(()),
        }
    }

    /// Flush every dirty resident page.
    pub fn flush_all_pages(&self) -> Result<(), BufferPoolError> {
        let resident: Vec<PagePtr> = self.pages.lock().values().cloned().collect();
        for page in resident {
            self.flush_entry(&page)?;
        }
        Ok(())
    }

    /// Flush only the pages held by `tid`.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<(), BufferPoolError> {
        for pid in self.lock_manager.pages_held_by(tid) {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Drop a page from the cache without writing it back. Used on abort and
    /// by any operation that must guarantee a stale page is never reused.
    pub fn discard_page(&self, pid: PageId) {
        self.pages.lock().remove(&pid);
    }

    /// Release `tid`'s lock on a single page before transaction end.
    ///
    /// This breaks two-phase locking for that page and is only sound for
    /// pages that were inspected but not read from or written to, such as
    /// full pages probed during a free-slot scan.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        self.lock_manager.release_lock(tid, pid);
    }

    fn flush_entry(&self, page: &PagePtr) -> Result<(), BufferPoolError> {
        let mut guard = page.write();
        let Some(tid) = guard.is_dirty() else {
            return Ok(());
        };
        let pid = guard.id();

        // Write-ahead: the update record must be durable before the page is.
        self.wal
            .log_write(tid, pid, guard.before_image(), guard.page_data())?;
        self.wal.force()?;

        let file = self
            .catalog
            .table(pid.table_id)
            .ok_or(BufferPoolError::UnknownTable(pid.table_id))?;
        file.write_page(&guard)?;
        guard.mark_clean();
        Ok(())
    }

    /// Evict one page to make room, scanning from the least recently used
    /// end and skipping dirty pages. The victim is flushed (a no-op for a
    /// clean page) and dropped. Fails when every resident page is dirty;
    /// this pool never steals an uncommitted page.
    fn evict_page(&self, pages: &mut LinkedHashMap<PageId, PagePtr>) -> Result<(), BufferPoolError> {
        let victim = pages
            .iter()
            .find(|(_, page)| page.read().is_dirty().is_none())
            .map(|(pid, page)| (*pid, page.clone()));

        let Some((pid, page)) = victim else {
            return Err(BufferPoolError::NoEvictablePage(pages.len()));
        };

        self.flush_entry(&page)?;
        debug!("evicting page {pid}");
        pages.remove(&pid);
        Ok(())
    }
}
