//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache between heap files and the
//! operators that read and modify tuples. Every page access goes through
//! it so that page locks are taken and dirty pages are tracked per
//! transaction.
//!
//! # Components
//! - [`BufferPool`] - The transactional page cache
//! - [`PageRef`] - Shared, latched handle to a cached page
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - LRU recency tracking

mod buffer_pool;
pub mod replacer;
mod stats;

pub use buffer_pool::{BufferPool, PageRef};
pub use stats::{BufferPoolStats, StatsSnapshot};
