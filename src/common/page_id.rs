//! Page and table identifier types.

use std::fmt;

/// Identifies a table, and therefore its heap file.
///
/// Derived from the CRC-32 of the file's absolute path, so the same file
/// gets the same id in every process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies a page on disk: the owning table plus a zero-based page
/// number within that table's file.
///
/// Used as the key of both the buffer pool and the lock table.
///
/// # Example
/// ```
/// use heapstore::{PageId, TableId};
///
/// let pid = PageId::new(TableId(9), 2);
/// assert_eq!(pid.table_id(), TableId(9));
/// assert_eq!(pid.page_no(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    table_id: TableId,
    page_no: u32,
}

impl PageId {
    #[inline]
    pub fn new(table_id: TableId, page_no: u32) -> Self {
        Self { table_id, page_no }
    }

    #[inline]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    #[inline]
    pub fn page_no(&self) -> u32 {
        self.page_no
    }

    /// Byte offset of this page in its table's file.
    #[inline]
    pub fn offset(&self, page_size: usize) -> u64 {
        (self.page_no as u64) * (page_size as u64)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({}:{})", self.table_id, self.page_no)
    }
}

/// Location of a stored tuple: a page plus a slot number on that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub pid: PageId,
    pub slot: usize,
}

impl RecordId {
    #[inline]
    pub fn new(pid: PageId, slot: usize) -> Self {
        Self { pid, slot }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.pid, self.slot)
    }
}
