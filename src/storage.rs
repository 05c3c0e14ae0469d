//! Numeric buffer storage: an append-only arena, typed zero-copy buffer views and
//! the multi-series packer.
//!
//! When a [`StorageArena`] is provided, values are copied into it. When storage is `None`
//! the buffers alias the caller's [`SharedArray`] in place.
use std::io;

use thiserror::Error;

mod arena;
mod buffer;
mod packing;

pub use arena::{StorageArena, DEFAULT_CHUNK_SIZE, SEGMENT_ALIGNMENT};
pub use buffer::{
    store_slice, store_values, store_vec, BufferView, DoubleBuffer, IntBuffer, SharedArray,
    ValueBuffer,
};
pub use packing::{generate_offsets, pack_many};

/// The errors that storing, slicing or packing numeric buffers may produce
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StorageError {
    #[error("Slice {start}..{end} is out of bounds for a buffer of {len} values")]
    SliceOutOfBounds { start: usize, end: usize, len: usize },
    #[error("Expected {expected} values but found {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Storage offset {0} does not fit in a 32-bit offset")]
    OffsetOverflow(usize),
}

impl From<StorageError> for io::Error {
    fn from(value: StorageError) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, value)
    }
}
