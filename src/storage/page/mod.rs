//! Page types and layout.
//!
//! This module contains:
//! - [`HeapPage`] - A slotted page of fixed-width records with a before-image
//! - [`slots_per_page`] / [`header_size`] - Layout arithmetic

mod heap_page;

pub use heap_page::{header_size, slots_per_page, HeapPage};
