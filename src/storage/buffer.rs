use std::borrow::Cow;
use std::fmt::{self, Formatter};
use std::mem;
use std::ops::Deref;
use std::sync::Arc;

use bytemuck::Pod;
use bytes::Bytes;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::arena::StorageArena;
use super::StorageError;

/// A caller-owned array that buffers may alias instead of copying.
///
/// Cloning a [`SharedArray`] clones the handle, not the values. Edits made through
/// [`SharedArray::write`] are visible through every [`ValueBuffer`] that was stored from
/// this array without an arena.
///
/// # Note
/// A [`BufferView`] over an aliasing buffer holds a recursive read lock on the array. Do
/// not call [`SharedArray::write`] while such a view is alive on the same thread.
#[derive(Debug, Default)]
pub struct SharedArray<T> {
    values: Arc<RwLock<Vec<T>>>,
}

impl<T> Clone for SharedArray<T> {
    fn clone(&self) -> Self {
        Self {
            values: Arc::clone(&self.values),
        }
    }
}

impl<T> From<Vec<T>> for SharedArray<T> {
    fn from(value: Vec<T>) -> Self {
        Self::new(value)
    }
}

impl<T> SharedArray<T> {
    pub fn new(values: Vec<T>) -> Self {
        Self {
            values: Arc::new(RwLock::new(values)),
        }
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.values.read()
    }

    /// Mutably access the values. Changing the length of the array invalidates any
    /// buffer aliasing it; views over such buffers are clamped to the new length.
    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.values.write()
    }

    /// Check whether two handles refer to the same array
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}

#[derive(Clone)]
enum Backing<T> {
    Empty,
    Heap(SharedArray<T>),
    Arena(Bytes),
}

/// A read-only, cheaply cloneable window over a run of numeric values of type `T`.
///
/// The values live either in a [`StorageArena`] segment, or in a [`SharedArray`] that the
/// buffer aliases when no arena was provided. Slicing never copies; positions and lengths
/// are always expressed in elements, never bytes.
///
/// See [`store_vec`], [`store_values`] and [`store_slice`] for construction.
#[derive(Clone)]
pub struct ValueBuffer<T> {
    backing: Backing<T>,
    start: usize,
    len: usize,
}

/// A buffer of `f64` values, the type of every m/z, intensity and mobility buffer
pub type DoubleBuffer = ValueBuffer<f64>;

/// A buffer of `i32` values, used for offsets and scan indices
pub type IntBuffer = ValueBuffer<i32>;

impl<T> fmt::Debug for ValueBuffer<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let backing = match &self.backing {
            Backing::Empty => "empty",
            Backing::Heap(_) => "heap",
            Backing::Arena(_) => "arena",
        };
        f.debug_struct("ValueBuffer")
            .field("backing", &backing)
            .field("start", &self.start)
            .field("len", &self.len)
            .finish()
    }
}

impl<T> Default for ValueBuffer<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> ValueBuffer<T> {
    /// The canonical empty buffer. It owns no allocation.
    pub const fn empty() -> Self {
        Self {
            backing: Backing::Empty,
            start: 0,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the values were copied into a [`StorageArena`]
    pub fn is_arena_backed(&self) -> bool {
        matches!(self.backing, Backing::Arena(_))
    }

    /// Whether this buffer aliases `array`
    pub fn aliases(&self, array: &SharedArray<T>) -> bool {
        match &self.backing {
            Backing::Heap(values) => values.ptr_eq(array),
            _ => false,
        }
    }

    /// Whether both buffers are windows over the same underlying storage
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        match (&self.backing, &other.backing) {
            (Backing::Heap(a), Backing::Heap(b)) => a.ptr_eq(b),
            (Backing::Arena(a), Backing::Arena(b)) => a.as_ptr() == b.as_ptr(),
            _ => false,
        }
    }

    /// Create a zero-copy view of the elements `start..end` of this buffer
    pub fn slice(&self, start: usize, end: usize) -> Result<Self, StorageError> {
        if start > end || end > self.len {
            return Err(StorageError::SliceOutOfBounds {
                start,
                end,
                len: self.len,
            });
        }
        if start == end {
            return Ok(Self::empty());
        }
        let backing = match &self.backing {
            Backing::Empty => Backing::Empty,
            Backing::Heap(values) => Backing::Heap(values.clone()),
            Backing::Arena(bytes) => Backing::Arena(bytes.clone()),
        };
        Ok(Self {
            backing,
            start: self.start + start,
            len: end - start,
        })
    }
}

impl<T: Pod> ValueBuffer<T> {
    fn from_shared(values: SharedArray<T>) -> Self {
        let len = values.len();
        if len == 0 {
            return Self::empty();
        }
        Self {
            backing: Backing::Heap(values),
            start: 0,
            len,
        }
    }

    fn from_segment(segment: Bytes) -> Self {
        let len = segment.len() / mem::size_of::<T>();
        if len == 0 {
            return Self::empty();
        }
        Self {
            backing: Backing::Arena(segment),
            start: 0,
            len,
        }
    }

    /// Borrow the values of this buffer.
    ///
    /// Arena segments are borrowed directly when they are suitably aligned and copied
    /// otherwise. Aliasing buffers hold a read lock on their [`SharedArray`] for the
    /// lifetime of the view.
    pub fn view(&self) -> BufferView<'_, T> {
        match &self.backing {
            Backing::Empty => BufferView::Borrowed(&[]),
            Backing::Heap(values) => {
                let guard = values.values.read_recursive();
                let end = (self.start + self.len).min(guard.len());
                let start = self.start.min(end);
                BufferView::Locked(RwLockReadGuard::map(guard, |v| &v[start..end]))
            }
            Backing::Arena(bytes) => {
                let size = mem::size_of::<T>();
                let raw = &bytes[self.start * size..(self.start + self.len) * size];
                match bytemuck::try_cast_slice(raw) {
                    Ok(values) => BufferView::Borrowed(values),
                    Err(_) => BufferView::Owned(bytemuck::pod_collect_to_vec(raw)),
                }
            }
        }
    }

    /// Get the value at `index`, if it is in bounds
    pub fn get(&self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }
        self.view().get(index).copied()
    }

    /// Copy the values into the front of `dst`, returning the number of values copied.
    ///
    /// # Panics
    /// If `dst` is shorter than this buffer.
    pub fn copy_into(&self, dst: &mut [T]) -> usize {
        let view = self.view();
        dst[..view.len()].copy_from_slice(&view);
        view.len()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.view().to_vec()
    }

    /// Byte-exact comparison of the contents of two buffers.
    ///
    /// This is deliberately not a numeric comparison: `NaN` equals an identical `NaN`
    /// and `0.0` does not equal `-0.0`.
    pub fn content_equals(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }
        let a = self.view();
        let b = other.view();
        bytemuck::cast_slice::<T, u8>(&a) == bytemuck::cast_slice::<T, u8>(&b)
    }
}

/// A borrowed view of the values of a [`ValueBuffer`]
pub enum BufferView<'a, T> {
    Borrowed(&'a [T]),
    Locked(MappedRwLockReadGuard<'a, [T]>),
    Owned(Vec<T>),
}

impl<T> Deref for BufferView<'_, T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        match self {
            BufferView::Borrowed(values) => values,
            BufferView::Locked(values) => values,
            BufferView::Owned(values) => values,
        }
    }
}

impl<T> AsRef<[T]> for BufferView<'_, T> {
    fn as_ref(&self) -> &[T] {
        self
    }
}

impl<'a, T: Clone> From<BufferView<'a, T>> for Cow<'a, [T]> {
    fn from(value: BufferView<'a, T>) -> Self {
        match value {
            BufferView::Borrowed(values) => Cow::Borrowed(values),
            BufferView::Locked(values) => Cow::Owned(values.to_vec()),
            BufferView::Owned(values) => Cow::Owned(values),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for BufferView<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Store a caller-owned array.
///
/// With an arena, the values are copied into it. Without one, the returned buffer aliases
/// `values`, so edits made through the array afterwards are visible through the buffer.
pub fn store_values<T: Pod>(storage: Option<&StorageArena>, values: &SharedArray<T>) -> ValueBuffer<T> {
    match storage {
        Some(arena) => {
            let values = values.read();
            if values.is_empty() {
                return ValueBuffer::empty();
            }
            ValueBuffer::from_segment(arena.store_pod(&values))
        }
        None => ValueBuffer::from_shared(values.clone()),
    }
}

/// Store a freshly built vector. Without an arena the vector is moved into the buffer
/// without copying.
pub fn store_vec<T: Pod>(storage: Option<&StorageArena>, values: Vec<T>) -> ValueBuffer<T> {
    if values.is_empty() {
        return ValueBuffer::empty();
    }
    match storage {
        Some(arena) => ValueBuffer::from_segment(arena.store_pod(&values)),
        None => ValueBuffer::from_shared(SharedArray::new(values)),
    }
}

/// Store a borrowed slice, which always requires a copy
pub fn store_slice<T: Pod>(storage: Option<&StorageArena>, values: &[T]) -> ValueBuffer<T> {
    if values.is_empty() {
        return ValueBuffer::empty();
    }
    match storage {
        Some(arena) => ValueBuffer::from_segment(arena.store_pod(values)),
        None => ValueBuffer::from_shared(SharedArray::new(values.to_vec())),
    }
}
