use std::fmt::{self, Formatter};
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytemuck::Pod;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

/// The byte alignment every stored segment starts on, enough for any numeric
/// type the buffers are viewed as.
pub const SEGMENT_ALIGNMENT: usize = mem::align_of::<f64>();

/// The default size of a single arena chunk, 16 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1 << 24;

/// An append-only byte arena that numeric buffers are copied into.
///
/// Data is written into large chunks and handed out as immutable, reference counted
/// [`Bytes`] segments that share the chunk allocation, so millions of small arrays do
/// not each become their own heap allocation. A segment keeps its chunk alive for as
/// long as any buffer refers to it, independent of the arena itself.
///
/// Segments are never modified or reclaimed once written. The arena may be shared between
/// threads, but callers are responsible for deciding who appends when; the arena only
/// guarantees that each individual write is atomic.
pub struct StorageArena {
    current: Mutex<BytesMut>,
    chunk_size: usize,
    bytes_stored: AtomicUsize,
    chunks_allocated: AtomicUsize,
}

impl fmt::Debug for StorageArena {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageArena")
            .field("chunk_size", &self.chunk_size)
            .field("bytes_stored", &self.bytes_stored())
            .field("chunks_allocated", &self.chunks_allocated())
            .finish()
    }
}

impl Default for StorageArena {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageArena {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            current: Mutex::new(BytesMut::new()),
            chunk_size: chunk_size.max(SEGMENT_ALIGNMENT),
            bytes_stored: AtomicUsize::new(0),
            chunks_allocated: AtomicUsize::new(0),
        }
    }

    /// The number of payload bytes written to this arena so far, excluding alignment padding
    pub fn bytes_stored(&self) -> usize {
        self.bytes_stored.load(Ordering::Relaxed)
    }

    /// The number of chunks this arena has allocated
    pub fn chunks_allocated(&self) -> usize {
        self.chunks_allocated.load(Ordering::Relaxed)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Copy `data` into the arena and return the segment holding the copy.
    ///
    /// The returned segment starts on a [`SEGMENT_ALIGNMENT`] boundary whenever the
    /// allocator hands out suitably aligned chunks, which lets typed views borrow it
    /// without copying.
    pub fn store_bytes(&self, data: &[u8]) -> Bytes {
        if data.is_empty() {
            return Bytes::new();
        }
        let mut current = self.current.lock();

        let padding = padding_for(current.as_ptr() as usize);
        if current.capacity() - current.len() < data.len() + padding {
            let size = self.chunk_size.max(data.len() + SEGMENT_ALIGNMENT);
            log::debug!(
                "Allocating arena chunk of {size} bytes for a {} byte segment",
                data.len()
            );
            *current = BytesMut::with_capacity(size);
            self.chunks_allocated.fetch_add(1, Ordering::Relaxed);
        }

        let padding = padding_for(current.as_ptr() as usize);
        if padding > 0 {
            current.resize(padding, 0);
            drop(current.split());
        }

        current.extend_from_slice(data);
        self.bytes_stored.fetch_add(data.len(), Ordering::Relaxed);
        current.split().freeze()
    }

    /// Copy a slice of plain numeric values into the arena
    pub fn store_pod<T: Pod>(&self, values: &[T]) -> Bytes {
        self.store_bytes(bytemuck::cast_slice(values))
    }
}

#[inline]
fn padding_for(address: usize) -> usize {
    let misalignment = address % SEGMENT_ALIGNMENT;
    if misalignment == 0 {
        0
    } else {
        SEGMENT_ALIGNMENT - misalignment
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test_log::test]
    fn test_store_copies() {
        let arena = StorageArena::with_chunk_size(64);
        let mut values = vec![1.0f64, 2.0, 3.0];
        let segment = arena.store_pod(&values);
        values[0] = 10.0;

        let view: &[f64] = bytemuck::cast_slice(&segment);
        assert_eq!(view, &[1.0, 2.0, 3.0]);
        assert_eq!(arena.bytes_stored(), 24);
    }

    #[test_log::test]
    fn test_segments_are_aligned_and_chunked() {
        let arena = StorageArena::with_chunk_size(32);
        let a = arena.store_bytes(&[1u8, 2, 3]);
        let b = arena.store_pod(&[4.0f64, 5.0]);
        let c = arena.store_pod(&[6i32; 20]);

        assert_eq!(a.as_ref(), &[1, 2, 3]);
        assert_eq!(b.as_ptr() as usize % SEGMENT_ALIGNMENT, 0);
        assert_eq!(c.len(), 80);
        assert!(arena.chunks_allocated() >= 2);
    }

    #[test_log::test]
    fn test_empty_store() {
        let arena = StorageArena::new();
        assert!(arena.store_bytes(&[]).is_empty());
        assert_eq!(arena.chunks_allocated(), 0);
    }
}
