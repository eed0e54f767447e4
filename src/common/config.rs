//! Configuration for heapstore.
//!
//! Only two knobs are externally tunable: the page size and the number of
//! pages the buffer pool may cache. Everything else is a constant.

use std::time::Duration;

use crate::common::{Error, Result};

/// Default size of a page in bytes (4KB).
///
/// # File Layout
/// Page N of a table lives at file offset `N × page_size`.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default number of pages the buffer pool caches.
pub const DEFAULT_POOL_PAGES: usize = 50;

/// How long a lock request may wait before the requesting transaction
/// is told to abort.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(200);

/// Fixed payload length of a string field, in bytes.
///
/// A string field is stored as a 4-byte length followed by exactly this
/// many bytes (zero padded).
pub const STRING_LEN: usize = 128;

/// Smallest page size accepted by [`Config::validate`].
pub const MIN_PAGE_SIZE: usize = 64;

/// Tunable engine parameters.
///
/// # Example
/// ```
/// use heapstore::common::config::Config;
///
/// let config = Config::default().with_pool_pages(8);
/// assert_eq!(config.pool_pages, 8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Bytes per page, including the slot bitmap.
    pub page_size: usize,
    /// Maximum number of pages resident in the buffer pool.
    pub pool_pages: usize,
}

impl Config {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_pool_pages(mut self, pool_pages: usize) -> Self {
        self.pool_pages = pool_pages;
        self
    }

    /// Check that the configuration describes a usable engine.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if the page size is below [`MIN_PAGE_SIZE`]
    /// or the pool cannot hold a single page.
    pub fn validate(&self) -> Result<()> {
        if self.page_size < MIN_PAGE_SIZE {
            return Err(Error::InvalidConfig(format!(
                "page size {} is below the minimum of {}",
                self.page_size, MIN_PAGE_SIZE
            )));
        }
        if self.pool_pages == 0 {
            return Err(Error::InvalidConfig(
                "buffer pool must hold at least one page".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pool_pages: DEFAULT_POOL_PAGES,
        }
    }
}
