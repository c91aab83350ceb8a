//! Object Header - Size Word at the Start of Every Object
//!
//! Object Layout (64-bit):
//! ┌─────────────────────────────────────────┐
//! │         Size Word (8 bytes)             │  <- AtomicUsize, bytes incl. header
//! ├─────────────────────────────────────────┤
//! │         Payload (size - 8 bytes)        │
//! │         ...                             │
//! └─────────────────────────────────────────┘
//!
//! The size word is all the old generation needs: it makes the space
//! parsable, so walking from any object start reaches the next one.

use crate::util::constants::HEAP_WORD_SIZE;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Size of object header in bytes
pub const HEADER_SIZE: usize = HEAP_WORD_SIZE;

/// Minimum object alignment (bytes)
pub const OBJECT_ALIGNMENT: usize = HEAP_WORD_SIZE;

/// Minimum object size in heap words (header plus one payload word)
pub const MIN_OBJECT_WORDS: usize = 2;

/// Minimum object size in bytes
pub const MIN_OBJECT_SIZE: usize = MIN_OBJECT_WORDS * HEAP_WORD_SIZE;

/// Object Header
///
/// Every object in the old generation starts with this header.
#[repr(C)]
pub struct ObjectHeader {
    /// Object size in bytes (including header)
    size: AtomicUsize,
}

impl ObjectHeader {
    /// Object size in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Object size in heap words
    #[inline]
    pub fn word_size(&self) -> usize {
        self.size() / HEAP_WORD_SIZE
    }

    #[inline]
    pub fn set_size(&self, size: usize) {
        debug_assert!(size >= MIN_OBJECT_SIZE, "object of {} bytes too small", size);
        debug_assert!(size.is_multiple_of(OBJECT_ALIGNMENT));
        self.size.store(size, Ordering::Release);
    }
}

/// Get header from object address
///
/// # Safety
/// `addr` must be the start of an object in committed memory.
#[inline]
pub unsafe fn get_header<'a>(addr: usize) -> &'a ObjectHeader {
    &*(addr as *const ObjectHeader)
}

/// Write a header for an object of `size` bytes at `addr`
///
/// # Safety
/// `[addr, addr + size)` must be committed memory owned by the caller.
#[inline]
pub unsafe fn write_header(addr: usize, size: usize) {
    get_header(addr).set_size(size);
}

/// ObjectRef - address of an object start in the generation
///
/// Handed to iteration closures; reading the size follows the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectRef(usize);

impl ObjectRef {
    /// Wrap an object start address
    ///
    /// # Safety
    /// `addr` must be the start of an object with a written header, and
    /// must stay committed while the reference is used.
    #[inline]
    pub unsafe fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    #[inline]
    pub fn addr(&self) -> usize {
        self.0
    }

    /// Object size in bytes (including header)
    #[inline]
    pub fn size(&self) -> usize {
        // SAFETY: construction requires a live object start.
        unsafe { get_header(self.0).size() }
    }

    /// Object size in heap words
    #[inline]
    pub fn word_size(&self) -> usize {
        self.size() / HEAP_WORD_SIZE
    }

    /// Address one past the last byte of the object
    #[inline]
    pub fn end(&self) -> usize {
        self.0 + self.size()
    }

    /// Start of the payload (after the header)
    #[inline]
    pub fn data_start(&self) -> usize {
        self.0 + HEADER_SIZE
    }
}
