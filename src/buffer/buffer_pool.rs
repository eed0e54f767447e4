//! Buffer Pool - the transactional page cache.
//!
//! The [`BufferPool`] provides:
//! - Page caching between heap files and memory
//! - Page locking on every fetch through the [`LockManager`]
//! - LRU eviction of clean pages
//! - Commit (write-through) and abort (restore before-image)

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::buffer::replacer::LruReplacer;
use crate::buffer::BufferPoolStats;
use crate::catalog::Catalog;
use crate::common::{Error, PageId, Permissions, RecordId, Result, TableId, TransactionId};
use crate::concurrency::LockManager;
use crate::storage::page::HeapPage;
use crate::storage::tuple::Tuple;

/// Shared handle to a cached page.
///
/// The `RwLock` is a short-term latch for reading or editing the bytes;
/// the transactional lock is held separately in the [`LockManager`].
pub type PageRef = Arc<RwLock<HeapPage>>;

struct PoolState {
    pages: HashMap<PageId, PageRef>,
    replacer: LruReplacer,
}

/// A fixed-capacity cache of heap pages shared by all transactions.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                          BufferPool                          │
/// │  ┌─────────────────────── Mutex ─────────────────────────┐   │
/// │  │  pages: PageId → Arc<RwLock<HeapPage>>                │   │
/// │  │  replacer: LruReplacer (oldest ... newest)            │   │
/// │  └───────────────────────────────────────────────────────┘   │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐        │
/// │  │ LockManager  │  │ Arc<Catalog> │  │    stats     │        │
/// │  └──────────────┘  └──────────────┘  └──────────────┘        │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Policy
/// Eviction is NO-STEAL: only clean pages are evicted, so a page dirtied
/// by an uncommitted transaction never reaches disk through cache
/// pressure. When every resident page is dirty, loading another page
/// fails with [`Error::BufferPoolFull`].
///
/// # Lock Ordering
/// Page locks are acquired before the pool mutex is taken, and released
/// after it is dropped. The pool mutex may be held while taking a page
/// latch, never the other way round.
pub struct BufferPool {
    state: Mutex<PoolState>,
    lock_manager: LockManager,
    catalog: Arc<Catalog>,
    stats: BufferPoolStats,
    capacity: usize,
}

impl BufferPool {
    /// Create a pool caching at most `capacity` pages.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize, catalog: Arc<Catalog>) -> Self {
        Self::with_lock_manager(capacity, catalog, LockManager::new())
    }

    /// Create a pool that locks pages through `lock_manager`.
    pub fn with_lock_manager(
        capacity: usize,
        catalog: Arc<Catalog>,
        lock_manager: LockManager,
    ) -> Self {
        assert!(capacity > 0, "capacity must be > 0");

        Self {
            state: Mutex::new(PoolState {
                pages: HashMap::with_capacity(capacity),
                replacer: LruReplacer::new(),
            }),
            lock_manager,
            catalog,
            stats: BufferPoolStats::new(),
            capacity,
        }
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Lock `pid` for `tid` and return the cached page, loading it from its
    /// heap file on a miss.
    ///
    /// Repeated fetches of a resident page return the same handle, so
    /// changes made through one handle are visible through the next.
    ///
    /// # Errors
    /// - `Error::TransactionAborted` if the lock could not be granted in time
    /// - `Error::BufferPoolFull` if a page must be evicted but all are dirty
    /// - `Error::TableNotFound` / `Error::PageNotFound` for unknown pages
    pub fn fetch(&self, tid: TransactionId, pid: PageId, perm: Permissions) -> Result<PageRef> {
        self.lock_manager
            .acquire(tid, pid, perm)
            .map_err(|err| match err {
                Error::LockTimeout { .. } => Error::TransactionAborted(tid),
                other => other,
            })?;

        let mut state = self.state.lock();

        if let Some(page) = state.pages.get(&pid).cloned() {
            state.replacer.record_access(pid);
            BufferPoolStats::incr(&self.stats.cache_hits);
            trace!(%tid, %pid, %perm, "cache hit");
            return Ok(page);
        }

        BufferPoolStats::incr(&self.stats.cache_misses);
        if state.pages.len() >= self.capacity {
            self.evict_page(&mut state)?;
        }

        let file = self.catalog.file(pid.table_id())?;
        let page = Arc::new(RwLock::new(file.read_page(pid)?));
        BufferPoolStats::incr(&self.stats.pages_read);
        debug!(%tid, %pid, %perm, "loaded page");

        state.pages.insert(pid, Arc::clone(&page));
        state.replacer.record_access(pid);
        Ok(page)
    }

    // ========================================================================
    // Public API: Tuple mutation
    // ========================================================================

    /// Add `tuple` to table `table_id` on behalf of `tid`.
    ///
    /// On success the tuple carries its new record id, which is also
    /// returned.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<RecordId> {
        let file = self.catalog.file(table_id)?;
        let pages = file.insert_tuple(self, tid, tuple)?;
        self.mutate_pages(tid, pages)?;
        tuple.record_id().ok_or(Error::MissingRecordId)
    }

    /// Remove `tuple` from the table its record id points into.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<()> {
        let rid = tuple.record_id().ok_or(Error::MissingRecordId)?;
        let file = self.catalog.file(rid.pid.table_id())?;
        let pages = file.delete_tuple(self, tid, tuple)?;
        self.mutate_pages(tid, pages)
    }

    /// Record that `tid` changed `pages`: mark each one dirty, make it
    /// most recently used and (re)install it as the cached copy.
    pub fn mutate_pages(&self, tid: TransactionId, pages: Vec<PageRef>) -> Result<()> {
        let mut state = self.state.lock();

        for page in pages {
            let pid = {
                let mut guard = page.write();
                guard.mark_dirty(true, tid);
                guard.id()
            };

            let cached = state
                .pages
                .get(&pid)
                .is_some_and(|resident| Arc::ptr_eq(resident, &page));
            if !cached {
                if !state.pages.contains_key(&pid) && state.pages.len() >= self.capacity {
                    self.evict_page(&mut state)?;
                }
                state.pages.insert(pid, page);
            }
            state.replacer.record_access(pid);
            trace!(%tid, %pid, "page dirtied");
        }

        Ok(())
    }

    // ========================================================================
    // Public API: Locks
    // ========================================================================

    /// Release `tid`'s lock on `pid` before the transaction ends.
    ///
    /// Only safe for pages the transaction did not modify.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.release(tid, pid)
    }

    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds(tid, pid)
    }

    // ========================================================================
    // Public API: Transaction completion
    // ========================================================================

    /// Commit or abort `tid`, then release all of its locks.
    ///
    /// On commit every page dirtied by `tid` is written to its heap file,
    /// marked clean and takes its current bytes as the new before-image.
    /// On abort every such page is restored in place from its before-image.
    ///
    /// # Errors
    /// I/O errors while flushing a committed page. The transaction's locks
    /// are kept; the caller must treat the transaction as failed.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        {
            let mut state = self.state.lock();
            let owned: Vec<(PageId, PageRef)> = state
                .pages
                .iter()
                .filter(|(_, page)| page.read().dirtier() == Some(tid))
                .map(|(pid, page)| (*pid, Arc::clone(page)))
                .collect();

            for (pid, page) in owned {
                if commit {
                    self.write_back(&page)?;
                } else {
                    let mut guard = page.write();
                    *guard = guard.before_image();
                    drop(guard);
                    state.replacer.record_access(pid);
                    trace!(%tid, %pid, "restored before-image");
                }
            }
        }

        let released = self.lock_manager.release_all(tid);
        if commit {
            BufferPoolStats::incr(&self.stats.commits);
            debug!(%tid, released, "transaction committed");
        } else {
            BufferPoolStats::incr(&self.stats.aborts);
            debug!(%tid, released, "transaction aborted");
        }
        Ok(())
    }

    // ========================================================================
    // Public API: Flush and discard
    // ========================================================================

    /// Write every dirty resident page to disk.
    ///
    /// Flushed bytes become each page's before-image, so this breaks the
    /// undo guarantee for transactions still running. Intended for
    /// shutdown and tests.
    pub fn flush_all(&self) -> Result<()> {
        let state = self.state.lock();
        for page in state.pages.values() {
            self.write_back(page)?;
        }
        Ok(())
    }

    /// Write one resident page to disk if it is dirty.
    ///
    /// # Errors
    /// `Error::PageNotResident` if the page is not cached.
    pub fn flush_page(&self, pid: PageId) -> Result<()> {
        let state = self.state.lock();
        let page = state.pages.get(&pid).ok_or(Error::PageNotResident(pid))?;
        self.write_back(page)?;
        Ok(())
    }

    /// Write every page dirtied by `tid` without ending the transaction.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        let state = self.state.lock();
        for page in state.pages.values() {
            if page.read().dirtier() == Some(tid) {
                self.write_back(page)?;
            }
        }
        Ok(())
    }

    /// Drop a page from the cache without writing it. Returns whether it
    /// was resident.
    pub fn discard_page(&self, pid: PageId) -> bool {
        let mut state = self.state.lock();
        state.replacer.remove(pid);
        let removed = state.pages.remove(&pid).is_some();
        if removed {
            debug!(%pid, "discarded page");
        }
        removed
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of resident pages.
    pub fn len(&self) -> usize {
        self.state.lock().pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_resident(&self, pid: PageId) -> bool {
        self.state.lock().pages.contains_key(&pid)
    }

    /// Resident dirty pages, in no particular order.
    pub fn dirty_pages(&self) -> Vec<PageId> {
        self.state
            .lock()
            .pages
            .iter()
            .filter(|(_, page)| page.read().is_dirty())
            .map(|(pid, _)| *pid)
            .collect()
    }

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// Remove the least recently used clean page.
    ///
    /// Pages whose latch is held by another thread are treated as in use.
    fn evict_page(&self, state: &mut PoolState) -> Result<()> {
        let PoolState { pages, replacer } = state;

        loop {
            let victim = replacer.victim(|pid| match pages.get(&pid) {
                Some(page) => page.try_read().is_some_and(|guard| !guard.is_dirty()),
                None => true,
            });

            let Some(pid) = victim else {
                warn!(capacity = self.capacity, "buffer pool full of dirty pages");
                return Err(Error::BufferPoolFull {
                    capacity: self.capacity,
                });
            };

            if pages.remove(&pid).is_some() {
                BufferPoolStats::incr(&self.stats.evictions);
                debug!(%pid, "evicted page");
                return Ok(());
            }
        }
    }

    /// Write a dirty page to its heap file, mark it clean and take its
    /// bytes as the new before-image. No-op for clean pages.
    fn write_back(&self, page: &PageRef) -> Result<()> {
        let mut guard = page.write();
        let Some(tid) = guard.dirtier() else {
            return Ok(());
        };

        let pid = guard.id();
        let file = self.catalog.file(pid.table_id())?;
        file.write_page(&guard)?;
        guard.mark_dirty(false, tid);
        guard.set_before_image();

        BufferPoolStats::incr(&self.stats.pages_written);
        debug!(%tid, %pid, "flushed page");
        Ok(())
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("capacity", &self.capacity)
            .field("resident", &self.len())
            .finish()
    }
}
