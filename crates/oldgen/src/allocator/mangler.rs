//! Space Mangler - Poison Unused Memory
//!
//! With `zap_unused_heap_area` on, memory the allocator has not handed out
//! yet is filled with a recognizable pattern. Stray reads of unallocated
//! memory then show up as `0xBAADBABE...` instead of plausible data, and
//! `check_mangled_unused_area` can prove nothing wrote above `top`.

use crate::heap::mem_region::MemRegion;
use crate::util::constants::HEAP_WORD_SIZE;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fill pattern for unused heap words
pub const MANGLE_PATTERN: u64 = 0xBAAD_BABE_BAAD_BABE;

/// SpaceMangler - per-space mangling state
#[derive(Debug, Default)]
pub struct SpaceMangler {
    /// Highest top seen by the last `set_top_for_allocations`; everything
    /// above it is expected to still be mangled
    top_for_allocations: AtomicUsize,
}

impl SpaceMangler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill every word of `region` with `MANGLE_PATTERN`
    ///
    /// # Safety
    /// `region` must be committed, writable, word aligned, and not hold live
    /// objects.
    pub unsafe fn mangle_region(region: MemRegion) {
        debug_assert!(region.start().is_multiple_of(HEAP_WORD_SIZE));
        let words = region.word_size();
        let ptr = region.start() as *mut u64;
        for i in 0..words {
            ptr.add(i).write_volatile(MANGLE_PATTERN);
        }
    }

    /// Check whether the word at `addr` holds `MANGLE_PATTERN`
    ///
    /// # Safety
    /// `addr` must be a committed, word-aligned address.
    pub unsafe fn is_mangled(addr: usize) -> bool {
        (addr as *const u64).read_volatile() == MANGLE_PATTERN
    }

    pub fn top_for_allocations(&self) -> usize {
        self.top_for_allocations.load(Ordering::Relaxed)
    }

    pub fn set_top_for_allocations(&self, top: usize) {
        self.top_for_allocations.store(top, Ordering::Relaxed);
    }

    /// Mangle `[top, end)`
    ///
    /// # Safety
    /// Same contract as `mangle_region`.
    pub unsafe fn mangle_unused_area(&self, top: usize, end: usize) {
        if top < end {
            Self::mangle_region(MemRegion::new(top, end));
        }
    }

    /// Find the first unmangled word in `[top, limit)`
    ///
    /// Returns `None` when the whole range is mangled.
    ///
    /// # Safety
    /// `[top, limit)` must be committed.
    pub unsafe fn first_unmangled(top: usize, limit: usize) -> Option<usize> {
        let mut addr = top;
        while addr < limit {
            if !Self::is_mangled(addr) {
                return Some(addr);
            }
            addr += HEAP_WORD_SIZE;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mangle_and_check() {
        let mut buf = vec![0u64; 32];
        let start = buf.as_mut_ptr() as usize;
        let region = MemRegion::with_size(start, 32 * HEAP_WORD_SIZE);

        unsafe {
            SpaceMangler::mangle_region(region);
            assert!(SpaceMangler::is_mangled(start));
            assert_eq!(SpaceMangler::first_unmangled(region.start(), region.end()), None);
        }
        assert!(buf.iter().all(|&w| w == MANGLE_PATTERN));

        buf[5] = 1;
        let found = unsafe { SpaceMangler::first_unmangled(region.start(), region.end()) };
        assert_eq!(found, Some(start + 5 * HEAP_WORD_SIZE));
    }

    #[test]
    fn test_top_for_allocations() {
        let mangler = SpaceMangler::new();
        assert_eq!(mangler.top_for_allocations(), 0);
        mangler.set_top_for_allocations(0x4000);
        assert_eq!(mangler.top_for_allocations(), 0x4000);
    }
}
