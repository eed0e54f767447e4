//! Database context.
//!
//! A [`Database`] owns one [`Catalog`] and one [`BufferPool`] built from a
//! [`Config`]. There is no process-wide instance; tests and embedders
//! create as many isolated databases as they need.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::buffer::BufferPool;
use crate::catalog::Catalog;
use crate::common::config::Config;
use crate::common::{Result, TableId, TransactionId};
use crate::storage::tuple::Schema;
use crate::storage::{HeapFile, HeapFileIterator};

/// Catalog plus buffer pool, sized by a [`Config`].
///
/// # Example
/// ```no_run
/// use heapstore::{Config, Database, Field, FieldType, Schema, Tuple, TupleIterator};
///
/// let db = Database::new(Config::default()).unwrap();
/// let schema = Schema::new(vec![(FieldType::Int, "id"), (FieldType::Str, "name")]);
/// let users = db.create_table("users.dat", "users", schema, "id").unwrap();
///
/// let tid = db.begin();
/// let mut row = Tuple::new(vec![Field::Int(1), Field::from("ada")]);
/// db.buffer_pool().insert_tuple(tid, users, &mut row).unwrap();
/// db.commit(tid).unwrap();
///
/// let tid = db.begin();
/// let mut scan = db.scan(tid, users).unwrap();
/// scan.open().unwrap();
/// while let Some(row) = scan.next_tuple().unwrap() {
///     println!("{row}");
/// }
/// scan.close();
/// db.commit(tid).unwrap();
/// ```
#[derive(Debug)]
pub struct Database {
    config: Config,
    catalog: Arc<Catalog>,
    buffer_pool: BufferPool,
}

impl Database {
    /// # Errors
    /// `Error::InvalidConfig` if `config` fails validation.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let catalog = Arc::new(Catalog::new());
        let buffer_pool = BufferPool::new(config.pool_pages, Arc::clone(&catalog));
        info!(
            page_size = config.page_size,
            pool_pages = config.pool_pages,
            "database initialized"
        );

        Ok(Self {
            config,
            catalog,
            buffer_pool,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    /// Open the heap file at `path` (creating it if needed) with the
    /// configured page size and register it as `name`.
    pub fn create_table<P: AsRef<Path>>(
        &self,
        path: P,
        name: &str,
        schema: Schema,
        primary_key: &str,
    ) -> Result<TableId> {
        let file = HeapFile::open_or_create(path, schema, self.config.page_size)?;
        Ok(self.catalog.add_table(Arc::new(file), name, primary_key))
    }

    /// Register an existing heap file as `name`.
    ///
    /// # Errors
    /// I/O errors if the file does not exist.
    pub fn open_table<P: AsRef<Path>>(
        &self,
        path: P,
        name: &str,
        schema: Schema,
        primary_key: &str,
    ) -> Result<TableId> {
        let file = HeapFile::open(path, schema, self.config.page_size)?;
        Ok(self.catalog.add_table(Arc::new(file), name, primary_key))
    }

    /// Start a new transaction.
    pub fn begin(&self) -> TransactionId {
        TransactionId::new()
    }

    pub fn commit(&self, tid: TransactionId) -> Result<()> {
        self.buffer_pool.transaction_complete(tid, true)
    }

    pub fn abort(&self, tid: TransactionId) -> Result<()> {
        self.buffer_pool.transaction_complete(tid, false)
    }

    /// A closed iterator over every tuple of `table_id`, as seen by `tid`.
    pub fn scan(&self, tid: TransactionId, table_id: TableId) -> Result<HeapFileIterator<'_>> {
        let file = self.catalog.file(table_id)?;
        Ok(file.iter(&self.buffer_pool, tid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;
    use crate::storage::tuple::{Field, FieldType, Tuple};
    use crate::storage::TupleIterator;
    use tempfile::tempdir;

    fn schema() -> Schema {
        Schema::new(vec![(FieldType::Int, "id"), (FieldType::Str, "name")])
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = Database::new(Config::default().with_pool_pages(0));
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_create_insert_scan() {
        let dir = tempdir().unwrap();
        let db = Database::new(Config::default()).unwrap();
        let table = db
            .create_table(dir.path().join("users.dat"), "users", schema(), "id")
            .unwrap();
        assert_eq!(db.catalog().table_id("users").unwrap(), table);

        let tid = db.begin();
        for (id, name) in [(1, "ada"), (2, "grace")] {
            let mut row = Tuple::new(vec![Field::Int(id), Field::from(name)]);
            db.buffer_pool().insert_tuple(tid, table, &mut row).unwrap();
        }
        db.commit(tid).unwrap();

        let tid = db.begin();
        let mut scan = db.scan(tid, table).unwrap();
        scan.open().unwrap();
        let mut names = Vec::new();
        while let Some(row) = scan.next_tuple().unwrap() {
            names.push(row.field(1).cloned());
        }
        scan.close();
        db.commit(tid).unwrap();

        assert_eq!(
            names,
            vec![Some(Field::from("ada")), Some(Field::from("grace"))]
        );
    }

    #[test]
    fn test_reopen_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");

        {
            let db = Database::new(Config::default()).unwrap();
            let table = db.create_table(&path, "t", schema(), "id").unwrap();
            let tid = db.begin();
            let mut row = Tuple::new(vec![Field::Int(7), Field::from("x")]);
            db.buffer_pool().insert_tuple(tid, table, &mut row).unwrap();
            db.commit(tid).unwrap();
        }

        let db = Database::new(Config::default()).unwrap();
        let table = db.open_table(&path, "t", schema(), "id").unwrap();
        let tid = db.begin();
        let mut scan = db.scan(tid, table).unwrap();
        scan.open().unwrap();
        let row = scan.next_tuple().unwrap().unwrap();
        assert_eq!(row.field(0), Some(&Field::Int(7)));
        assert!(scan.next_tuple().unwrap().is_none());
    }

    #[test]
    fn test_abort_discards_insert() {
        let dir = tempdir().unwrap();
        let db = Database::new(Config::default()).unwrap();
        let table = db
            .create_table(dir.path().join("t.dat"), "t", schema(), "id")
            .unwrap();

        let tid = db.begin();
        let mut row = Tuple::new(vec![Field::Int(1), Field::from("gone")]);
        db.buffer_pool().insert_tuple(tid, table, &mut row).unwrap();
        db.abort(tid).unwrap();

        let tid = db.begin();
        let mut scan = db.scan(tid, table).unwrap();
        scan.open().unwrap();
        assert!(!scan.has_next().unwrap());
    }
}
