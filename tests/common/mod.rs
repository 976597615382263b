use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use cairndb::catalog::Catalog;
use cairndb::common::types::{PageId, TableId};
use cairndb::storage::buffer::BufferPool;
use cairndb::storage::table::{HeapFile, TableFile};
use cairndb::transaction::wal::LogManager;

/// Record size used by every test table.
pub const RECORD_LEN: usize = 64;

/// A storage core rooted in one scratch directory.
pub struct TestDb {
    pub dir: TempDir,
    pub catalog: Arc<Catalog>,
    pub wal: Arc<LogManager>,
    pub pool: Arc<BufferPool>,
}

/// Create a catalog, write-ahead log, and buffer pool over a temp directory.
pub fn create_test_db(capacity: usize) -> Result<TestDb> {
    let dir = TempDir::new()?;
    let catalog = Arc::new(Catalog::new());
    let wal = Arc::new(LogManager::open(dir.path().join("wal"))?);
    let pool = Arc::new(BufferPool::new(capacity, catalog.clone(), wal.clone()));
    Ok(TestDb {
        dir,
        catalog,
        wal,
        pool,
    })
}

/// Create and register a heap file for `table_id`.
pub fn create_table(db: &TestDb, table_id: TableId) -> Result<Arc<HeapFile>> {
    let path = db.dir.path().join(format!("table_{table_id}"));
    let file = Arc::new(HeapFile::open(table_id, RECORD_LEN, path)?);
    db.catalog.register_table(file.clone());
    Ok(file)
}

/// Extend a table file to `n` zero-filled pages, bypassing the pool.
pub fn populate_pages(file: &HeapFile, n: u32) -> Result<()> {
    for page_no in 0..n {
        file.read_page(PageId::new(file.id(), page_no))?;
    }
    Ok(())
}

/// Deterministic record content derived from a seed byte.
pub fn record_bytes(seed: u8) -> Vec<u8> {
    (0..RECORD_LEN).map(|i| seed.wrapping_add(i as u8)).collect()
}
