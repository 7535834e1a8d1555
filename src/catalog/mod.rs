//! Table registry the buffer pool resolves files through.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{Result, StorageError, TableId};
use crate::storage::DbFile;
use crate::tuple::Schema;

struct TableEntry {
    file: Arc<dyn DbFile>,
    name: String,
}

#[derive(Default)]
struct CatalogInner {
    tables: HashMap<TableId, TableEntry>,
    names: HashMap<String, TableId>,
}

/// Maps table IDs and names to their files.
#[derive(Default)]
pub struct Catalog {
    inner: RwLock<CatalogInner>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `file` under `name`. A table already registered under the
    /// same ID or name is replaced.
    pub fn add_table(&self, file: Arc<dyn DbFile>, name: impl Into<String>) -> TableId {
        let name = name.into();
        let id = file.id();
        let mut inner = self.inner.write();

        if let Some(old_id) = inner.names.remove(&name) {
            inner.tables.remove(&old_id);
        }
        if let Some(old) = inner.tables.remove(&id) {
            inner.names.remove(&old.name);
        }
        inner.names.insert(name.clone(), id);
        inner.tables.insert(id, TableEntry { file, name });
        id
    }

    /// Returns the file backing table `id`.
    pub fn database_file(&self, id: TableId) -> Result<Arc<dyn DbFile>> {
        self.inner
            .read()
            .tables
            .get(&id)
            .map(|entry| Arc::clone(&entry.file))
            .ok_or(StorageError::TableNotFound(id))
    }

    pub fn table_id(&self, name: &str) -> Option<TableId> {
        self.inner.read().names.get(name).copied()
    }

    pub fn table_name(&self, id: TableId) -> Option<String> {
        self.inner.read().tables.get(&id).map(|entry| entry.name.clone())
    }

    pub fn schema(&self, id: TableId) -> Result<Arc<Schema>> {
        Ok(Arc::clone(self.database_file(id)?.schema()))
    }

    /// Returns the IDs of all registered tables, in ascending order.
    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<TableId> = self.inner.read().tables.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Removes every table.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.tables.clear();
        inner.names.clear();
    }
}
