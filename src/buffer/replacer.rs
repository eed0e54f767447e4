//! LRU (Least Recently Used) replacement order.
//!
//! Tracks every resident page from least to most recently used. The
//! buffer pool decides which pages may leave; the replacer only answers
//! "who is oldest among the evictable ones".

use std::collections::VecDeque;

use crate::common::PageId;

/// Recency order over resident pages.
///
/// Front of the queue is the least recently used page.
#[derive(Debug, Default)]
pub struct LruReplacer {
    queue: VecDeque<PageId>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a page was accessed, making it most recently used.
    pub fn record_access(&mut self, pid: PageId) {
        self.remove(pid);
        self.queue.push_back(pid);
    }

    /// Forget a page entirely.
    pub fn remove(&mut self, pid: PageId) {
        if let Some(pos) = self.queue.iter().position(|p| *p == pid) {
            self.queue.remove(pos);
        }
    }

    /// Pick and remove the least recently used page accepted by
    /// `evictable`. Rejected pages keep their position.
    pub fn victim<F>(&mut self, mut evictable: F) -> Option<PageId>
    where
        F: FnMut(PageId) -> bool,
    {
        let pos = self.queue.iter().position(|pid| evictable(*pid))?;
        self.queue.remove(pos)
    }

    /// Pages in LRU order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &PageId> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;

    fn pid(n: u32) -> PageId {
        PageId::new(TableId(1), n)
    }

    #[test]
    fn test_lru_basic() {
        let mut replacer = LruReplacer::new();
        replacer.record_access(pid(0));
        replacer.record_access(pid(1));
        replacer.record_access(pid(2));
        assert_eq!(replacer.len(), 3);

        assert_eq!(replacer.victim(|_| true), Some(pid(0)));
        assert_eq!(replacer.victim(|_| true), Some(pid(1)));
        assert_eq!(replacer.victim(|_| true), Some(pid(2)));
        assert_eq!(replacer.victim(|_| true), None);
    }

    #[test]
    fn test_lru_reaccess_reorders() {
        let mut replacer = LruReplacer::new();
        replacer.record_access(pid(0));
        replacer.record_access(pid(1));
        replacer.record_access(pid(0));

        assert_eq!(replacer.len(), 2);
        assert_eq!(replacer.victim(|_| true), Some(pid(1)));
        assert_eq!(replacer.victim(|_| true), Some(pid(0)));
    }

    #[test]
    fn test_lru_skips_rejected() {
        let mut replacer = LruReplacer::new();
        replacer.record_access(pid(0));
        replacer.record_access(pid(1));
        replacer.record_access(pid(2));

        assert_eq!(replacer.victim(|p| p != pid(0)), Some(pid(1)));
        assert_eq!(replacer.victim(|p| p == pid(5)), None);
        // Rejected pages stay in place.
        let order: Vec<_> = replacer.iter().copied().collect();
        assert_eq!(order, vec![pid(0), pid(2)]);
    }

    #[test]
    fn test_lru_remove() {
        let mut replacer = LruReplacer::new();
        replacer.record_access(pid(0));
        replacer.record_access(pid(1));
        replacer.remove(pid(0));
        replacer.remove(pid(9));

        assert_eq!(replacer.victim(|_| true), Some(pid(1)));
        assert!(replacer.is_empty());
    }
}
