//! heapstore - a transactional page cache over heap files.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            Database                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │      Relational operators (callers of this crate)        │   │
//! │  │       scan via TupleIterator, insert/delete tuples       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Buffer Pool (buffer/)                       │   │
//! │  │   fetch · mutate_pages · transaction_complete · evict    │   │
//! │  │   ┌──────────────────────┐   ┌──────────────────────┐   │   │
//! │  │   │ LockManager (S / X)  │   │   LRU, clean only    │   │   │
//! │  │   └──────────────────────┘   └──────────────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Storage Layer (storage/)                       │   │
//! │  │     HeapFile + HeapPage (bitmap + slots) + Tuple codec   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (ids, Permissions, Error, config)
//! - [`storage`] - Heap files, page format, tuples and scans
//! - [`concurrency`] - Page-level two-phase locking
//! - [`buffer`] - The transactional page cache
//! - [`catalog`] - Table registry
//! - [`database`] - Catalog and buffer pool bundled per [`Config`]
//!
//! # Quick Start
//! ```no_run
//! use heapstore::{Config, Database, Field, FieldType, Schema, Tuple};
//!
//! let db = Database::new(Config::default()).unwrap();
//! let schema = Schema::from_types(&[FieldType::Int, FieldType::Int]);
//! let table = db.create_table("pairs.dat", "pairs", schema, "").unwrap();
//!
//! let tid = db.begin();
//! let mut row = Tuple::new(vec![Field::Int(1), Field::Int(2)]);
//! db.buffer_pool().insert_tuple(tid, table, &mut row).unwrap();
//! db.commit(tid).unwrap();
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod concurrency;
pub mod database;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{Config, DEFAULT_PAGE_SIZE, DEFAULT_POOL_PAGES};
pub use common::{Error, PageId, Permissions, RecordId, Result, TableId, TransactionId};

pub use buffer::{BufferPool, BufferPoolStats, PageRef, StatsSnapshot};
pub use catalog::Catalog;
pub use concurrency::{LockManager, LockMode};
pub use database::Database;
pub use storage::page::HeapPage;
pub use storage::{
    Field, FieldType, HeapFile, HeapFileIterator, Schema, Tuple, TupleIterator, TupleVecIterator,
};
