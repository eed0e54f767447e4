//! Concurrency control - page-granularity two-phase locking.
//!
//! - [`LockManager`] - Shared/exclusive page locks with timeout-based
//!   deadlock resolution
//! - [`LockStats`] - Lock acquisition counters

mod lock_manager;

pub use lock_manager::{LockManager, LockMode, LockStats, LockStatsSnapshot};
