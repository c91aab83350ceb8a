//! Object Start Array - Block Index of Object Starts
//!
//! ============================================================================
//! STRUCTURE
//! ============================================================================
//!
//! The reserved range is cut into 512-byte blocks; each block owns one
//! byte. A byte is either `CLEAN` (no object start recorded in the block)
//! or the word offset of the lowest object start in the block.
//!
//! ```text
//!   block:    │  0      │  1      │  2      │  3      │
//!   objects:  [A   ][B          ][C ][D                     ]
//!   entry:    │ 0 (A)   │ 9 (C)   │ CLEAN   │ CLEAN   │
//! ```
//!
//! `object_start(addr)` scrolls back from the block of `addr` to the
//! nearest block with a recorded start at or below `addr`, then walks
//! forward object by object using the size word in each header.
//!
//! Entries only ever decrease between resets (`fetch_min`), so concurrent
//! allocators recording starts in the same block never lose the lowest one.

use crate::error::{OldGenError, Result};
use crate::heap::mem_region::MemRegion;
use crate::object::header::get_header;
use crate::util::constants::HEAP_WORD_SIZE;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU8, Ordering};

/// Block size in bytes
pub const BLOCK_SIZE: usize = 512;

/// log2(BLOCK_SIZE)
pub const BLOCK_SHIFT: usize = 9;

/// Heap words per block
pub const BLOCK_WORDS: usize = BLOCK_SIZE / HEAP_WORD_SIZE;

/// Entry value for a block with no recorded object start
const CLEAN: u8 = u8::MAX;

/// Object-start index contract
///
/// The generation tells the index its covered range on every resize and
/// records every object start through `allocate_block`.
pub trait ObjectStartIndex: Send + Sync {
    /// Size the index for the whole reserved range
    fn initialize(&mut self, reserved: MemRegion) -> Result<()>;

    /// Make `region` the covered range
    fn set_covered_region(&self, region: MemRegion);

    fn covered_region(&self) -> MemRegion;

    /// Record an object starting at `addr`
    fn allocate_block(&self, addr: usize);

    /// Whether any object starts in a block touching `[begin, end)`
    fn object_starts_in_range(&self, begin: usize, end: usize) -> bool;

    /// Start of the object covering `addr`
    fn object_start(&self, addr: usize) -> usize;

    /// Whether the block containing `addr` has a recorded start
    fn is_block_allocated(&self, addr: usize) -> bool;

    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }

    /// Forget every recorded start in the covered range
    fn reset(&self);
}

/// ObjectStartArray - byte-per-block ObjectStartIndex
pub struct ObjectStartArray {
    /// Reserved range the table spans
    reserved: MemRegion,

    /// Currently covered sub-range of `reserved`
    covered: RwLock<MemRegion>,

    /// One entry per block of `reserved`
    entries: Vec<AtomicU8>,
}

impl ObjectStartArray {
    /// Create an unsized array; `initialize` must run before use
    pub fn new() -> Self {
        Self {
            reserved: MemRegion::empty(),
            covered: RwLock::new(MemRegion::empty()),
            entries: Vec::new(),
        }
    }

    /// Create an array spanning `reserved`
    pub fn with_reserved(reserved: MemRegion) -> Result<Self> {
        let mut array = Self::new();
        array.initialize(reserved)?;
        Ok(array)
    }

    #[inline]
    fn index_for(&self, addr: usize) -> usize {
        debug_assert!(
            addr >= self.reserved.start() && addr < self.reserved.end(),
            "address {:#x} outside {}",
            addr,
            self.reserved
        );
        (addr - self.reserved.start()) >> BLOCK_SHIFT
    }

    #[inline]
    fn addr_for_block(&self, index: usize) -> usize {
        self.reserved.start() + (index << BLOCK_SHIFT)
    }

    fn clear_range(&self, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let first = self.index_for(start);
        let last = self.index_for(end - 1);
        for entry in &self.entries[first..=last] {
            entry.store(CLEAN, Ordering::Relaxed);
        }
    }

    /// Number of blocks with a recorded start in the covered range
    pub fn allocated_block_count(&self) -> usize {
        let covered = self.covered_region();
        if covered.is_empty() {
            return 0;
        }
        let first = self.index_for(covered.start());
        let last = self.index_for(covered.end() - 1);
        self.entries[first..=last]
            .iter()
            .filter(|e| e.load(Ordering::Relaxed) != CLEAN)
            .count()
    }
}

impl Default for ObjectStartArray {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStartIndex for ObjectStartArray {
    fn initialize(&mut self, reserved: MemRegion) -> Result<()> {
        if reserved.is_empty() || !reserved.byte_size().is_multiple_of(BLOCK_SIZE) {
            return Err(OldGenError::InvalidArgument(format!(
                "object start array needs a non-empty, block-multiple range, got {}",
                reserved
            )));
        }

        let blocks = reserved.byte_size() >> BLOCK_SHIFT;
        self.entries = (0..blocks).map(|_| AtomicU8::new(CLEAN)).collect();
        self.reserved = reserved;
        *self.covered.get_mut() = MemRegion::new(reserved.start(), reserved.start());
        Ok(())
    }

    fn set_covered_region(&self, region: MemRegion) {
        crate::guarantee!(
            self.reserved.contains_region(&region),
            "covered {} outside reserved {}",
            region,
            self.reserved
        );
        crate::guarantee!(
            (region.start() - self.reserved.start()).is_multiple_of(BLOCK_SIZE)
                && (region.end() - self.reserved.start()).is_multiple_of(BLOCK_SIZE),
            "covered {} is not block aligned",
            region
        );

        let mut covered = self.covered.write();
        let old = *covered;

        if old.start() == region.start() {
            // Growing clears blocks entering coverage; shrinking clears the
            // blocks it drops so a later regrowth starts clean.
            if region.end() > old.end() {
                self.clear_range(old.end(), region.end());
            } else {
                self.clear_range(region.end(), old.end());
            }
        } else {
            self.clear_range(old.start(), old.end());
            self.clear_range(region.start(), region.end());
        }

        *covered = region;
    }

    fn covered_region(&self) -> MemRegion {
        *self.covered.read()
    }

    fn allocate_block(&self, addr: usize) {
        debug_assert!(
            self.covered_region().contains(addr),
            "object start {:#x} outside covered {}",
            addr,
            self.covered_region()
        );
        debug_assert!(addr.is_multiple_of(HEAP_WORD_SIZE));

        let index = self.index_for(addr);
        let offset = ((addr - self.addr_for_block(index)) / HEAP_WORD_SIZE) as u8;
        self.entries[index].fetch_min(offset, Ordering::Release);
    }

    fn object_starts_in_range(&self, begin: usize, end: usize) -> bool {
        if begin >= end {
            return false;
        }
        let first = self.index_for(begin);
        let last = self.index_for(end - 1);
        self.entries[first..=last]
            .iter()
            .any(|e| e.load(Ordering::Acquire) != CLEAN)
    }

    fn object_start(&self, addr: usize) -> usize {
        let covered = self.covered_region();
        crate::guarantee!(
            covered.contains(addr),
            "object_start({:#x}) outside covered {}",
            addr,
            covered
        );

        let first = self.index_for(covered.start());
        let mut index = self.index_for(addr);
        let mut start = loop {
            let entry = self.entries[index].load(Ordering::Acquire);
            if entry != CLEAN {
                let candidate = self.addr_for_block(index) + entry as usize * HEAP_WORD_SIZE;
                if candidate <= addr {
                    break candidate;
                }
            }
            crate::guarantee!(index > first, "no object start at or below {:#x}", addr);
            index -= 1;
        };

        loop {
            // SAFETY: `start` is a recorded start or reached by walking sizes.
            let size = unsafe { get_header(start).size() };
            crate::guarantee!(size > 0, "zero-sized object at {:#x}", start);
            let next = start + size;
            if next > addr {
                return start;
            }
            start = next;
        }
    }

    fn is_block_allocated(&self, addr: usize) -> bool {
        self.entries[self.index_for(addr)].load(Ordering::Acquire) != CLEAN
    }

    fn reset(&self) {
        let covered = self.covered_region();
        self.clear_range(covered.start(), covered.end());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::header::write_header;

    /// Word buffer with a start array over it
    fn setup(words: usize) -> (Vec<u64>, ObjectStartArray, MemRegion) {
        let mut buf = vec![0u64; words];
        let base = buf.as_mut_ptr() as usize;
        let region = MemRegion::with_size(base, words * HEAP_WORD_SIZE);
        let array = ObjectStartArray::with_reserved(region).unwrap();
        array.set_covered_region(region);
        (buf, array, region)
    }

    /// Lay out objects of the given byte sizes back to back
    fn place(array: &ObjectStartArray, base: usize, sizes: &[usize]) -> Vec<usize> {
        let mut addr = base;
        let mut starts = Vec::new();
        for &size in sizes {
            unsafe { write_header(addr, size) };
            array.allocate_block(addr);
            starts.push(addr);
            addr += size;
        }
        starts
    }

    #[test]
    fn test_fresh_array_is_clean() {
        let (_buf, array, region) = setup(BLOCK_WORDS * 4);
        assert!(!array.object_starts_in_range(region.start(), region.end()));
        assert!(!array.is_block_allocated(region.start()));
        assert_eq!(array.allocated_block_count(), 0);
    }

    #[test]
    fn test_object_start_within_block() {
        let (_buf, array, region) = setup(BLOCK_WORDS * 4);
        let starts = place(&array, region.start(), &[32, 64, 16]);

        assert_eq!(array.object_start(starts[0]), starts[0]);
        assert_eq!(array.object_start(starts[0] + 8), starts[0]);
        assert_eq!(array.object_start(starts[1] + 56), starts[1]);
        assert_eq!(array.object_start(starts[2]), starts[2]);
    }

    #[test]
    fn test_object_start_spans_blocks() {
        let (_buf, array, region) = setup(BLOCK_WORDS * 8);
        // A fills most of block 0, B spans blocks 0..3, C starts in block 3
        let starts = place(&array, region.start(), &[480, 1200, 64]);

        let inside_b = region.start() + 2 * BLOCK_SIZE + 16;
        assert!(!array.is_block_allocated(inside_b));
        assert_eq!(array.object_start(inside_b), starts[1]);
        assert_eq!(array.object_start(starts[2] + 8), starts[2]);
    }

    #[test]
    fn test_lowest_start_wins_out_of_order() {
        let (_buf, array, region) = setup(BLOCK_WORDS * 2);
        let base = region.start();
        unsafe {
            write_header(base, 64);
            write_header(base + 64, 64);
        }
        array.allocate_block(base + 64);
        array.allocate_block(base);

        assert_eq!(array.object_start(base + 8), base);
        assert_eq!(array.object_start(base + 72), base + 64);
    }

    #[test]
    fn test_starts_in_range_and_reset() {
        let (_buf, array, region) = setup(BLOCK_WORDS * 4);
        place(&array, region.start() + BLOCK_SIZE, &[64]);

        assert!(!array.object_starts_in_range(region.start(), region.start() + BLOCK_SIZE));
        assert!(array.object_starts_in_range(region.start(), region.start() + 2 * BLOCK_SIZE));

        array.reset();
        assert_eq!(array.allocated_block_count(), 0);
    }

    #[test]
    fn test_shrink_then_grow_clears_dropped_blocks() {
        let (_buf, array, region) = setup(BLOCK_WORDS * 4);
        place(&array, region.start() + 3 * BLOCK_SIZE, &[64]);
        assert_eq!(array.allocated_block_count(), 1);

        array.set_covered_region(MemRegion::new(region.start(), region.start() + 2 * BLOCK_SIZE));
        array.set_covered_region(region);
        assert_eq!(array.allocated_block_count(), 0);
    }

    #[test]
    #[should_panic(expected = "guarantee")]
    fn test_covered_outside_reserved_panics() {
        let (_buf, array, region) = setup(BLOCK_WORDS * 2);
        array.set_covered_region(MemRegion::new(region.start(), region.end() + BLOCK_SIZE));
    }
}
