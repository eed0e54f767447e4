//! Storage layer - heap files, pages, tuples and scans.
//!
//! This module handles persistent storage:
//! - [`HeapFile`] - One table's pages in a single file on disk
//! - [`page`] - The slotted [`HeapPage`](page::HeapPage) format
//! - [`tuple`] - Schemas, fields and the fixed-width record codec
//! - [`iterator`] - The open/next/rewind/close scan contract

pub mod heap_file;
pub mod iterator;
pub mod page;
pub mod tuple;

pub use heap_file::HeapFile;
pub use iterator::{HeapFileIterator, IteratorState, TupleIterator, TupleVecIterator};
pub use tuple::{Column, Field, FieldType, Schema, Tuple};
