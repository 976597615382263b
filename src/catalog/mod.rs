use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::types::TableId;
use crate::storage::table::TableFile;

/// Registry of table files, keyed by table id.
///
/// The buffer pool resolves a page's owning file through this registry.
/// Constructed explicitly and shared via `Arc`; there is no process-wide
/// instance.
pub struct Catalog {
    tables: RwLock<HashMap<TableId, Arc<dyn TableFile>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Register a table file. Replaces any previous file with the same id.
    pub fn register_table(&self, file: Arc<dyn TableFile>) {
        self.tables.write().insert(file.id(), file);
    }

    /// Look up the file owning the given table id.
    pub fn table(&self, table_id: TableId) -> Option<Arc<dyn TableFile>> {
        self.tables.read().get(&table_id).cloned()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
