//! Heap File - the on-disk pages of one table.
//!
//! The [`HeapFile`] handles all direct file operations for a table:
//! - Reading and writing pages by page number
//! - Appending new empty pages
//! - Placing and removing tuples (through the buffer pool)

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::buffer::{BufferPool, PageRef};
use crate::common::{Error, PageId, Permissions, Result, TableId, TransactionId};
use crate::storage::iterator::HeapFileIterator;
use crate::storage::page::{slots_per_page, HeapPage};
use crate::storage::tuple::{Schema, Tuple};

/// An unordered collection of tuples stored in fixed-size pages.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0     P       2P       ...      N×P
/// ```
///
/// # Thread Safety
/// The file handle and page count sit behind one `Mutex`, so a seek and
/// the read or write that follows it are never interleaved, and an append
/// advances the page count in the same critical section that extends the
/// file.
pub struct HeapFile {
    path: PathBuf,
    table_id: TableId,
    schema: Arc<Schema>,
    page_size: usize,
    disk: Mutex<DiskState>,
}

struct DiskState {
    file: File,
    page_count: u32,
}

impl HeapFile {
    /// Create a new, empty heap file.
    ///
    /// # Errors
    /// - I/O errors, including when the file already exists
    /// - `Error::SchemaMismatch` if a record does not fit in a page
    pub fn create<P: AsRef<Path>>(path: P, schema: Schema, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;

        Self::from_file(path.as_ref(), file, schema, page_size)
    }

    /// Open an existing heap file.
    ///
    /// The page count is the file length divided by `page_size`, rounded
    /// down; a trailing partial page is ignored.
    pub fn open<P: AsRef<Path>>(path: P, schema: Schema, page_size: usize) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        Self::from_file(path.as_ref(), file, schema, page_size)
    }

    /// Open an existing heap file, or create it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(
        path: P,
        schema: Schema,
        page_size: usize,
    ) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, schema, page_size)
        } else {
            Self::create(path, schema, page_size)
        }
    }

    fn from_file(path: &Path, file: File, schema: Schema, page_size: usize) -> Result<Self> {
        if slots_per_page(page_size, schema.record_width()) == 0 {
            return Err(Error::SchemaMismatch(format!(
                "record width {} does not fit in a {}-byte page",
                schema.record_width(),
                page_size
            )));
        }

        let page_count = (file.metadata()?.len() / page_size as u64) as u32;
        let path = path.canonicalize()?;
        let table_id = Self::table_id_for(&path);

        Ok(Self {
            path,
            table_id,
            schema: Arc::new(schema),
            page_size,
            disk: Mutex::new(DiskState { file, page_count }),
        })
    }

    /// Stable table id for an absolute path.
    fn table_id_for(path: &Path) -> TableId {
        TableId(crc32fast::hash(path.to_string_lossy().as_bytes()))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn id(&self) -> TableId {
        self.table_id
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages in the file, including ones appended by this process.
    pub fn num_pages(&self) -> u32 {
        self.disk.lock().page_count
    }

    fn check_table(&self, pid: PageId) -> Result<()> {
        if pid.table_id() != self.table_id {
            return Err(Error::WrongTable {
                expected: self.table_id,
                actual: pid.table_id(),
            });
        }
        Ok(())
    }

    // ========================================================================
    // Page I/O
    // ========================================================================

    /// Read a page from disk.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page is past the end of the file
    /// - `Error::Io` if the read comes up short
    pub fn read_page(&self, pid: PageId) -> Result<HeapPage> {
        self.check_table(pid)?;

        let mut buf = vec![0u8; self.page_size];
        {
            let mut disk = self.disk.lock();
            if pid.page_no() >= disk.page_count {
                return Err(Error::PageNotFound(pid));
            }
            disk.file.seek(SeekFrom::Start(pid.offset(self.page_size)))?;
            disk.file.read_exact(&mut buf)?;
        }

        HeapPage::new(pid, buf, Arc::clone(&self.schema))
    }

    /// Write a page's current bytes to disk.
    ///
    /// The page must already exist in the file; growth goes through
    /// [`append_empty_page`](Self::append_empty_page).
    pub fn write_page(&self, page: &HeapPage) -> Result<()> {
        let pid = page.id();
        self.check_table(pid)?;
        if page.page_size() != self.page_size {
            return Err(Error::InvalidPageSize {
                expected: self.page_size,
                actual: page.page_size(),
            });
        }

        let mut disk = self.disk.lock();
        if pid.page_no() >= disk.page_count {
            return Err(Error::PageNotFound(pid));
        }
        disk.file.seek(SeekFrom::Start(pid.offset(self.page_size)))?;
        disk.file.write_all(page.page_data())?;
        disk.file.sync_data()?;

        Ok(())
    }

    /// Append a page with every slot free, bypassing the buffer pool.
    ///
    /// Returns the id of the new page.
    pub fn append_empty_page(&self) -> Result<PageId> {
        let mut disk = self.disk.lock();
        let pid = PageId::new(self.table_id, disk.page_count);

        disk.file.seek(SeekFrom::Start(pid.offset(self.page_size)))?;
        disk.file
            .write_all(&HeapPage::empty_page_data(self.page_size))?;
        disk.file.sync_data()?;
        disk.page_count += 1;

        debug!(%pid, path = %self.path.display(), "appended empty page");
        Ok(pid)
    }

    // ========================================================================
    // Tuple placement
    // ========================================================================

    /// Place `tuple` in the first page with a free slot, appending a page
    /// when none has room, and stamp its record id.
    ///
    /// Pages are fetched through `pool` under `ReadWrite`. A full page whose
    /// lock was taken only for this scan is released again.
    ///
    /// Returns the pages modified (exactly one).
    pub fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<PageRef>> {
        self.schema.check(tuple)?;

        let mut page_no = 0;
        loop {
            if page_no >= self.num_pages() {
                self.append_empty_page()?;
            }

            let pid = PageId::new(self.table_id, page_no);
            let already_locked = pool.holds_lock(tid, pid);
            let page = pool.fetch(tid, pid, Permissions::ReadWrite)?;

            let inserted = {
                let mut guard = page.write();
                if guard.num_empty_slots() > 0 {
                    guard.insert_tuple(tuple)?;
                    true
                } else {
                    false
                }
            };
            if inserted {
                return Ok(vec![page]);
            }

            if !already_locked {
                pool.release_page(tid, pid);
            }
            page_no += 1;
        }
    }

    /// Free the slot holding `tuple`.
    ///
    /// Returns the pages modified (exactly one).
    ///
    /// # Errors
    /// - `Error::MissingRecordId` if the tuple was never stored
    /// - `Error::WrongTable` if it belongs to another table
    pub fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<PageRef>> {
        let rid = tuple.record_id().ok_or(Error::MissingRecordId)?;
        self.check_table(rid.pid)?;

        let page = pool.fetch(tid, rid.pid, Permissions::ReadWrite)?;
        page.write().delete_tuple(tuple)?;
        Ok(vec![page])
    }

    /// Scan every tuple of the file on behalf of `tid`.
    pub fn iter<'a>(self: &Arc<Self>, pool: &'a BufferPool, tid: TransactionId) -> HeapFileIterator<'a> {
        HeapFileIterator::new(pool, Arc::clone(self), tid)
    }
}

impl std::fmt::Debug for HeapFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapFile")
            .field("path", &self.path)
            .field("table_id", &self.table_id)
            .field("page_size", &self.page_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tuple::{Field, FieldType};
    use tempfile::tempdir;

    fn schema() -> Schema {
        Schema::from_types(&[FieldType::Int, FieldType::Int])
    }

    #[test]
    fn test_create_new_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");

        let hf = HeapFile::create(&path, schema(), 4096).unwrap();
        assert_eq!(hf.num_pages(), 0);
        assert_eq!(hf.page_size(), 4096);
    }

    #[test]
    fn test_create_existing_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");

        HeapFile::create(&path, schema(), 4096).unwrap();
        assert!(HeapFile::create(&path, schema(), 4096).is_err());
    }

    #[test]
    fn test_open_nonexistent_fails() {
        let dir = tempdir().unwrap();
        assert!(HeapFile::open(dir.path().join("missing.dat"), schema(), 4096).is_err());
    }

    #[test]
    fn test_record_must_fit_page() {
        let dir = tempdir().unwrap();
        let wide = Schema::from_types(&[FieldType::Str]);
        let result = HeapFile::create(dir.path().join("t.dat"), wide, 64);
        assert!(matches!(result, Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn test_table_id_is_stable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");

        let id = HeapFile::create(&path, schema(), 4096).unwrap().id();
        let reopened = HeapFile::open(&path, schema(), 4096).unwrap().id();
        assert_eq!(id, reopened);

        let other = HeapFile::create(dir.path().join("u.dat"), schema(), 4096)
            .unwrap()
            .id();
        assert_ne!(id, other);
    }

    #[test]
    fn test_append_and_read_page() {
        let dir = tempdir().unwrap();
        let hf = HeapFile::create(dir.path().join("t.dat"), schema(), 4096).unwrap();

        let pid = hf.append_empty_page().unwrap();
        assert_eq!(pid, PageId::new(hf.id(), 0));
        assert_eq!(hf.num_pages(), 1);

        let page = hf.read_page(pid).unwrap();
        assert_eq!(page.num_empty_slots(), page.num_slots());
        assert!(page.page_data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_write_and_read_page() {
        let dir = tempdir().unwrap();
        let hf = HeapFile::create(dir.path().join("t.dat"), schema(), 4096).unwrap();
        let pid = hf.append_empty_page().unwrap();

        let mut page = hf.read_page(pid).unwrap();
        page.insert_tuple(&mut Tuple::new(vec![Field::Int(1), Field::Int(2)]))
            .unwrap();
        hf.write_page(&page).unwrap();

        let reread = hf.read_page(pid).unwrap();
        assert_eq!(reread.page_data(), page.page_data());
    }

    #[test]
    fn test_write_read_round_trip_preserves_bytes() {
        let dir = tempdir().unwrap();
        let hf = HeapFile::create(dir.path().join("t.dat"), schema(), 64).unwrap();
        let pid = hf.append_empty_page().unwrap();

        let mut page = hf.read_page(pid).unwrap();
        for i in 0..5 {
            page.insert_tuple(&mut Tuple::new(vec![Field::Int(i), Field::Int(-i)]))
                .unwrap();
        }
        hf.write_page(&page).unwrap();
        let original = hf.read_page(pid).unwrap().page_data().to_vec();

        hf.write_page(&hf.read_page(pid).unwrap()).unwrap();
        assert_eq!(hf.read_page(pid).unwrap().page_data(), &original[..]);
    }

    #[test]
    fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");

        {
            let hf = HeapFile::create(&path, schema(), 64).unwrap();
            let pid = hf.append_empty_page().unwrap();
            let mut page = hf.read_page(pid).unwrap();
            page.insert_tuple(&mut Tuple::new(vec![Field::Int(42), Field::Int(0)]))
                .unwrap();
            hf.write_page(&page).unwrap();
        }

        {
            let hf = HeapFile::open(&path, schema(), 64).unwrap();
            assert_eq!(hf.num_pages(), 1);
            let tuples = hf.read_page(PageId::new(hf.id(), 0)).unwrap().tuples().unwrap();
            assert_eq!(tuples.len(), 1);
            assert_eq!(tuples[0].field(0), Some(&Field::Int(42)));
        }
    }

    #[test]
    fn test_partial_trailing_page_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.dat");
        std::fs::write(&path, vec![0u8; 64 * 2 + 10]).unwrap();

        let hf = HeapFile::open(&path, schema(), 64).unwrap();
        assert_eq!(hf.num_pages(), 2);
    }

    #[test]
    fn test_read_invalid_page() {
        let dir = tempdir().unwrap();
        let hf = HeapFile::create(dir.path().join("t.dat"), schema(), 4096).unwrap();
        hf.append_empty_page().unwrap();

        let result = hf.read_page(PageId::new(hf.id(), 1));
        assert!(matches!(result, Err(Error::PageNotFound(_))));
    }

    #[test]
    fn test_read_other_table_page() {
        let dir = tempdir().unwrap();
        let hf = HeapFile::create(dir.path().join("t.dat"), schema(), 4096).unwrap();
        hf.append_empty_page().unwrap();

        let foreign = PageId::new(TableId(hf.id().0.wrapping_add(1)), 0);
        assert!(matches!(
            hf.read_page(foreign),
            Err(Error::WrongTable { .. })
        ));
    }

    #[test]
    fn test_write_unallocated_page() {
        let dir = tempdir().unwrap();
        let hf = HeapFile::create(dir.path().join("t.dat"), schema(), 4096).unwrap();

        let page = HeapPage::empty(PageId::new(hf.id(), 0), 4096, Arc::clone(hf.schema())).unwrap();
        assert!(matches!(hf.write_page(&page), Err(Error::PageNotFound(_))));
    }

    #[test]
    fn test_write_wrong_page_size() {
        let dir = tempdir().unwrap();
        let hf = HeapFile::create(dir.path().join("t.dat"), schema(), 4096).unwrap();
        let pid = hf.append_empty_page().unwrap();

        let page = HeapPage::empty(pid, 64, Arc::clone(hf.schema())).unwrap();
        assert!(matches!(
            hf.write_page(&page),
            Err(Error::InvalidPageSize { expected: 4096, actual: 64 })
        ));
    }
}
