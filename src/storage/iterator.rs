//! Tuple iterators with an explicit open/close lifecycle.
//!
//! ```text
//!            open()                 source drained
//! Closed ────────────▶ Active ─────────────────────▶ Exhausted
//!   ▲                    ▲         source grew          │
//!   │                    └──────────────────────────────┘
//!   └──────────────── close() from any state ───────────┘
//! ```
//! `rewind` is `close` followed by `open`.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::buffer::BufferPool;
use crate::common::{Error, PageId, Permissions, Result, TransactionId};
use crate::storage::heap_file::HeapFile;
use crate::storage::tuple::Tuple;

/// Lifecycle state of a [`TupleIterator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    Closed,
    Active,
    Exhausted,
}

/// Uniform "produce next tuple" contract shared by scans and operators.
pub trait TupleIterator {
    /// Move from `Closed` to `Active` and position before the first tuple.
    fn open(&mut self) -> Result<()>;

    /// Whether another tuple is available. Always `false` when closed.
    fn has_next(&mut self) -> Result<bool>;

    /// The next tuple, or `None` once exhausted.
    ///
    /// # Errors
    /// `Error::IteratorClosed` if the iterator was never opened or has
    /// been closed.
    fn next_tuple(&mut self) -> Result<Option<Tuple>>;

    /// Release buffered state and return to `Closed`.
    fn close(&mut self);

    fn state(&self) -> IteratorState;

    /// Restart from the first tuple.
    fn rewind(&mut self) -> Result<()> {
        self.close();
        self.open()
    }
}

// ============================================================================
// HeapFileIterator
// ============================================================================

/// Scans a [`HeapFile`] in page order, fetching every page through the
/// buffer pool under `ReadOnly` so that page locks are respected.
///
/// Empty pages are skipped. Pages appended while the scan is running are
/// picked up if the scan has not yet passed the end of the file.
pub struct HeapFileIterator<'a> {
    pool: &'a BufferPool,
    file: Arc<HeapFile>,
    tid: TransactionId,
    next_page: u32,
    buffered: VecDeque<Tuple>,
    state: IteratorState,
}

impl<'a> HeapFileIterator<'a> {
    pub fn new(pool: &'a BufferPool, file: Arc<HeapFile>, tid: TransactionId) -> Self {
        Self {
            pool,
            file,
            tid,
            next_page: 0,
            buffered: VecDeque::new(),
            state: IteratorState::Closed,
        }
    }

    /// Load pages until a tuple is buffered or the file runs out.
    fn fill(&mut self) -> Result<bool> {
        while self.buffered.is_empty() {
            if self.next_page >= self.file.num_pages() {
                self.state = IteratorState::Exhausted;
                return Ok(false);
            }

            let pid = PageId::new(self.file.id(), self.next_page);
            let page = self.pool.fetch(self.tid, pid, Permissions::ReadOnly)?;
            self.buffered = page.read().tuples()?.into();
            self.next_page += 1;
        }
        self.state = IteratorState::Active;
        Ok(true)
    }
}

impl TupleIterator for HeapFileIterator<'_> {
    fn open(&mut self) -> Result<()> {
        self.next_page = 0;
        self.buffered.clear();
        self.state = IteratorState::Active;
        self.fill()?;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool> {
        if self.state == IteratorState::Closed {
            return Ok(false);
        }
        self.fill()
    }

    fn next_tuple(&mut self) -> Result<Option<Tuple>> {
        if self.state == IteratorState::Closed {
            return Err(Error::IteratorClosed);
        }
        if !self.fill()? {
            return Ok(None);
        }
        Ok(self.buffered.pop_front())
    }

    fn close(&mut self) {
        self.next_page = 0;
        self.buffered.clear();
        self.state = IteratorState::Closed;
    }

    fn state(&self) -> IteratorState {
        self.state
    }
}

// ============================================================================
// TupleVecIterator
// ============================================================================

/// Iterates over tuples already materialized in memory.
pub struct TupleVecIterator {
    tuples: Vec<Tuple>,
    pos: usize,
    state: IteratorState,
}

impl TupleVecIterator {
    pub fn new(tuples: Vec<Tuple>) -> Self {
        Self {
            tuples,
            pos: 0,
            state: IteratorState::Closed,
        }
    }

    fn refresh_state(&mut self) {
        self.state = if self.pos < self.tuples.len() {
            IteratorState::Active
        } else {
            IteratorState::Exhausted
        };
    }
}

impl TupleIterator for TupleVecIterator {
    fn open(&mut self) -> Result<()> {
        self.pos = 0;
        self.refresh_state();
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool> {
        Ok(self.state != IteratorState::Closed && self.pos < self.tuples.len())
    }

    fn next_tuple(&mut self) -> Result<Option<Tuple>> {
        if self.state == IteratorState::Closed {
            return Err(Error::IteratorClosed);
        }
        let tuple = self.tuples.get(self.pos).cloned();
        if tuple.is_some() {
            self.pos += 1;
        }
        self.refresh_state();
        Ok(tuple)
    }

    fn close(&mut self) {
        self.pos = 0;
        self.state = IteratorState::Closed;
    }

    fn state(&self) -> IteratorState {
        self.state
    }
}
