//! Table registry.
//!
//! The [`Catalog`] maps table ids to their heap files and remembers each
//! table's name and primary-key field. The buffer pool consults it to find
//! the file behind a [`PageId`](crate::common::PageId).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::common::{Error, Result, TableId};
use crate::storage::tuple::Schema;
use crate::storage::HeapFile;

#[derive(Debug, Clone)]
struct TableEntry {
    file: Arc<HeapFile>,
    name: String,
    primary_key: String,
}

/// Registry of the tables known to a database.
///
/// Lookups take a read lock; only registration and [`clear`](Self::clear)
/// write.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: RwLock<HashMap<TableId, TableEntry>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `file` under `name`. A table already registered under the
    /// same name is replaced.
    ///
    /// `primary_key` may be empty when the table has none.
    pub fn add_table(
        &self,
        file: Arc<HeapFile>,
        name: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> TableId {
        let name = name.into();
        let id = file.id();

        let mut tables = self.tables.write();
        tables.retain(|_, entry| entry.name != name);
        debug!(table_id = %id, %name, path = %file.path().display(), "registered table");
        tables.insert(
            id,
            TableEntry {
                file,
                name,
                primary_key: primary_key.into(),
            },
        );
        id
    }

    /// The heap file backing table `id`.
    ///
    /// # Errors
    /// `Error::TableNotFound` if no such table is registered.
    pub fn file(&self, id: TableId) -> Result<Arc<HeapFile>> {
        self.with_entry(id, |entry| Arc::clone(&entry.file))
    }

    pub fn schema(&self, id: TableId) -> Result<Arc<Schema>> {
        self.with_entry(id, |entry| Arc::clone(entry.file.schema()))
    }

    pub fn primary_key(&self, id: TableId) -> Result<String> {
        self.with_entry(id, |entry| entry.primary_key.clone())
    }

    pub fn table_name(&self, id: TableId) -> Result<String> {
        self.with_entry(id, |entry| entry.name.clone())
    }

    /// Look a table up by name.
    ///
    /// # Errors
    /// `Error::TableNameNotFound` if no table has this name.
    pub fn table_id(&self, name: &str) -> Result<TableId> {
        self.tables
            .read()
            .iter()
            .find(|(_, entry)| entry.name == name)
            .map(|(id, _)| *id)
            .ok_or_else(|| Error::TableNameNotFound(name.to_string()))
    }

    /// Ids of every registered table, in no particular order.
    pub fn table_ids(&self) -> Vec<TableId> {
        self.tables.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }

    /// Forget every table.
    pub fn clear(&self) {
        self.tables.write().clear();
    }

    fn with_entry<T>(&self, id: TableId, f: impl FnOnce(&TableEntry) -> T) -> Result<T> {
        self.tables
            .read()
            .get(&id)
            .map(f)
            .ok_or(Error::TableNotFound(id))
    }
}
