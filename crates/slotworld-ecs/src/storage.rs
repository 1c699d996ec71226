//! Per-type dense component storage.
//!
//! A [`Column`] is one zero-initialised, aligned allocation of
//! `capacity × stride` bytes. Element `i` belongs to entity slot `i`; the
//! column never grows, shrinks, or compacts, so slot indices stay stable for
//! the lifetime of the world.
//!
//! # Safety
//!
//! This module contains `unsafe` code because the backing buffer is
//! allocated with a caller-chosen alignment through `std::alloc`. All
//! access outside this module goes through the safe byte-slice views.
// Note: unsafe_code is allowed on this module via #[allow(unsafe_code)] in lib.rs

use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// A fixed-size, aligned byte array holding one element per entity slot.
pub struct Column {
    /// Start of the allocation (dangling but aligned when `layout.size() == 0`).
    data: NonNull<u8>,
    /// Layout of the whole allocation.
    layout: Layout,
    /// Size of one element, already rounded up to the alignment.
    stride: usize,
    /// Number of elements.
    capacity: usize,
}

// Column only stores plain bytes and owns its allocation exclusively.
unsafe impl Send for Column {}
unsafe impl Sync for Column {}

impl Column {
    /// Allocate a zeroed column of `capacity` elements of `stride` bytes.
    ///
    /// Returns `None` if `align` is not a power of two, `stride` is not a
    /// multiple of `align`, or the total size overflows.
    pub fn zeroed(stride: usize, align: usize, capacity: usize) -> Option<Self> {
        if align == 0 || !align.is_power_of_two() || stride % align != 0 {
            return None;
        }
        let size = stride.checked_mul(capacity)?;
        let layout = Layout::from_size_align(size, align).ok()?;

        let data = if size == 0 {
            // Zero-sized: never dereferenced, only needs to be aligned.
            NonNull::new(align as *mut u8)?
        } else {
            let ptr = unsafe { alloc::alloc_zeroed(layout) };
            match NonNull::new(ptr) {
                Some(ptr) => ptr,
                None => alloc::handle_alloc_error(layout),
            }
        };

        Some(Self {
            data,
            layout,
            stride,
            capacity,
        })
    }

    /// Size in bytes of one element.
    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Alignment of the allocation (and therefore of every element).
    #[inline]
    pub fn align(&self) -> usize {
        self.layout.align()
    }

    /// Number of elements.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total size in bytes.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.layout.size()
    }

    /// The whole column as bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        // Safety: `data` points to `layout.size()` initialised bytes (zeroed
        // at allocation) owned by `self`, or is a dangling aligned pointer
        // with length 0.
        unsafe { std::slice::from_raw_parts(self.data.as_ptr(), self.layout.size()) }
    }

    /// The whole column as mutable bytes.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // Safety: as for `as_bytes`; `&mut self` guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.data.as_ptr(), self.layout.size()) }
    }

    fn element_range(&self, index: usize) -> Option<std::ops::Range<usize>> {
        if index >= self.capacity {
            return None;
        }
        let start = index * self.stride;
        Some(start..start + self.stride)
    }

    /// Bytes of element `index`, or `None` if out of range.
    #[inline]
    pub fn element(&self, index: usize) -> Option<&[u8]> {
        let range = self.element_range(index)?;
        self.as_bytes().get(range)
    }

    /// Mutable bytes of element `index`, or `None` if out of range.
    #[inline]
    pub fn element_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        let range = self.element_range(index)?;
        self.as_bytes_mut().get_mut(range)
    }

    /// Overwrite element `index` with zeroes.
    pub fn zero_element(&mut self, index: usize) {
        if let Some(bytes) = self.element_mut(index) {
            bytes.fill(0);
        }
    }

    /// Overwrite the whole column. Returns `false` (and copies nothing) if
    /// `bytes` is not exactly [`byte_len`](Self::byte_len) long.
    pub fn copy_from(&mut self, bytes: &[u8]) -> bool {
        if bytes.len() != self.byte_len() {
            return false;
        }
        self.as_bytes_mut().copy_from_slice(bytes);
        true
    }
}

impl Drop for Column {
    fn drop(&mut self) {
        if self.layout.size() > 0 {
            // Safety: allocated in `zeroed` with exactly this layout.
            unsafe { alloc::dealloc(self.data.as_ptr(), self.layout) };
        }
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("stride", &self.stride)
            .field("align", &self.layout.align())
            .field("capacity", &self.capacity)
            .finish()
    }
}
