//! Error types for heapstore.

use std::time::Duration;

use thiserror::Error;

use super::{PageId, TableId, TransactionId};

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in heapstore.
///
/// Three families matter to callers:
/// - aborts ([`Error::TransactionAborted`], [`Error::LockTimeout`]): the
///   whole transaction must be rolled back with
///   `BufferPool::transaction_complete(tid, false)`;
/// - I/O ([`Error::Io`]): a page could not be read or written;
/// - everything else: a database-level condition such as a full buffer
///   pool or a schema mismatch.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    ///
    /// Short page reads surface here as `UnexpectedEof`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock could not be granted in time; the transaction must abort.
    #[error("transaction {0} aborted")]
    TransactionAborted(TransactionId),

    /// A lock request waited past its deadline (suspected deadlock).
    #[error("{tid} timed out after {waited:?} waiting for a lock on {pid}")]
    LockTimeout {
        tid: TransactionId,
        pid: PageId,
        waited: Duration,
    },

    /// Every resident page is dirty, so nothing can be evicted.
    #[error("buffer pool is full: all {capacity} resident pages are dirty")]
    BufferPoolFull { capacity: usize },

    /// Requested page does not exist in the table's file.
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// Requested page is not cached in the buffer pool.
    #[error("{0} is not resident in the buffer pool")]
    PageNotResident(PageId),

    /// No table with this id is registered in the catalog.
    #[error("table {0} not found")]
    TableNotFound(TableId),

    /// No table with this name is registered in the catalog.
    #[error("table '{0}' not found")]
    TableNameNotFound(String),

    /// The tuple does not match the table's schema.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The page has no free slot.
    #[error("{0} has no free slot")]
    PageFull(PageId),

    /// The slot is out of range or holds no record.
    #[error("invalid slot {slot} on {pid}")]
    InvalidSlot { pid: PageId, slot: usize },

    /// Delete was asked for a tuple that was never stored.
    #[error("tuple has no record id")]
    MissingRecordId,

    /// The page or tuple belongs to another table.
    #[error("expected table {expected}, got table {actual}")]
    WrongTable { expected: TableId, actual: TableId },

    /// `next_tuple` was called on an iterator that is not open.
    #[error("iterator is not open")]
    IteratorClosed,

    /// A page buffer has the wrong length.
    #[error("invalid page size: expected {expected}, got {actual}")]
    InvalidPageSize { expected: usize, actual: usize },

    /// Rejected engine configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// On-disk bytes could not be decoded.
    #[error("corrupted data: {0}")]
    Corrupted(String),
}

impl Error {
    /// Whether the caller must abort the whole transaction.
    pub fn is_abort(&self) -> bool {
        matches!(
            self,
            Error::TransactionAborted(_) | Error::LockTimeout { .. }
        )
    }
}
