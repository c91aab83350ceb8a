//! Virtual Space - Reserved Range with a Committed Prefix
//!
//! ============================================================================
//! LAYOUT
//! ============================================================================
//!
//! ```text
//! low_boundary                   high                        high_boundary
//!      │◄──────── committed ──────►│◄──────── uncommitted ──────►│
//!      │                           │                             │
//!      └── low                     └── grows up on expand_by,
//!                                      down on shrink_by
//! ```
//!
//! The old generation grows upward: `low` is pinned at `low_boundary` and
//! only `high` moves. Every size passed to `expand_by` / `shrink_by` is a
//! multiple of `alignment()`.
//!
//! ============================================================================
//! COMMIT/UNCOMMIT LIFECYCLE
//! ============================================================================
//!
//! ```text
//! Reserve ──► Commit ──► Use ──► Uncommit ──► (Return to OS)
//!    │          │                    │
//!    │          │                    └── madvise(MADV_DONTNEED)
//!    │          └── high-water mark moves up
//!    └── anonymous mmap, over-reserved by one alignment unit
//! ```

use crate::error::{OldGenError, Result};
use crate::heap::mem_region::MemRegion;
use crate::heap::memory_mapping::ReservedMapping;
use crate::util::Alignment;

/// Committed region tracker
///
/// Implementations are driven exclusively under the generation's expand
/// lock, so mutation takes `&mut self`.
pub trait VirtualSpace: Send + Sync {
    /// Commit `bytes` more at the top of the committed region
    fn expand_by(&mut self, bytes: usize) -> bool;

    /// Decommit `bytes` from the top of the committed region
    fn shrink_by(&mut self, bytes: usize);

    /// Commit everything that is still uncommitted
    fn expand_to_reserved(&mut self) -> bool {
        let remaining = self.uncommitted_size();
        remaining > 0 && self.expand_by(remaining)
    }

    fn low(&self) -> usize;
    fn high(&self) -> usize;
    fn low_boundary(&self) -> usize;
    fn high_boundary(&self) -> usize;

    /// Granularity of every commit and decommit
    fn alignment(&self) -> usize;

    fn committed_size(&self) -> usize {
        self.high() - self.low()
    }

    fn reserved_size(&self) -> usize {
        self.high_boundary() - self.low_boundary()
    }

    fn uncommitted_size(&self) -> usize {
        self.reserved_size() - self.committed_size()
    }

    fn committed_region(&self) -> MemRegion {
        MemRegion::new(self.low(), self.high())
    }

    fn reserved_region(&self) -> MemRegion {
        MemRegion::new(self.low_boundary(), self.high_boundary())
    }
}

/// MappedVirtualSpace - VirtualSpace over an anonymous mapping
pub struct MappedVirtualSpace {
    /// Backing reservation, unmapped on drop
    mapping: ReservedMapping,

    /// Aligned start of the usable reservation
    low_boundary: usize,

    /// End of the usable reservation
    high_boundary: usize,

    /// Current committed end
    high: usize,

    alignment: usize,
}

impl MappedVirtualSpace {
    /// Reserve `size` bytes aligned to `alignment`
    ///
    /// `size` must be a non-zero multiple of `alignment`, and `alignment`
    /// a power of two. Nothing is committed yet.
    pub fn reserve(size: usize, alignment: usize) -> Result<Self> {
        if !alignment.is_power_of_two() {
            return Err(OldGenError::AlignmentError {
                address: size,
                alignment,
            });
        }
        if size == 0 || !Alignment::is_aligned(size, alignment) {
            return Err(OldGenError::InvalidArgument(format!(
                "reservation size {} is not a non-zero multiple of {}",
                size, alignment
            )));
        }

        let padded = size.checked_add(alignment).ok_or_else(|| {
            OldGenError::VirtualMemoryError(format!("reservation of {} bytes overflows", size))
        })?;
        let mapping = ReservedMapping::anonymous(padded)?;

        let low_boundary = Alignment::align_up(mapping.base(), alignment);
        let high_boundary = low_boundary + size;
        debug_assert!(mapping.contains_range(low_boundary, size));

        log::debug!(
            "Reserved {} KB at [{:#x}, {:#x})",
            size / 1024,
            low_boundary,
            high_boundary
        );

        Ok(Self {
            mapping,
            low_boundary,
            high_boundary,
            high: low_boundary,
            alignment,
        })
    }

    /// Reserve and commit `initial` bytes in one step
    pub fn reserve_and_commit(size: usize, initial: usize, alignment: usize) -> Result<Self> {
        let mut space = Self::reserve(size, alignment)?;
        if initial > 0 && !space.expand_by(initial) {
            return Err(OldGenError::VirtualMemoryError(format!(
                "initial commit of {} bytes failed (reserved {})",
                initial, size
            )));
        }
        Ok(space)
    }

    /// Request transparent huge pages for the reservation
    pub fn enable_large_pages(&self) -> bool {
        self.mapping.advise_huge_pages()
    }
}

impl VirtualSpace for MappedVirtualSpace {
    fn expand_by(&mut self, bytes: usize) -> bool {
        if bytes == 0 || !Alignment::is_aligned(bytes, self.alignment) {
            return false;
        }
        if bytes > self.uncommitted_size() {
            return false;
        }
        self.high += bytes;
        true
    }

    fn shrink_by(&mut self, bytes: usize) {
        crate::guarantee!(
            bytes <= self.committed_size(),
            "cannot shrink by {} with only {} committed",
            bytes,
            self.committed_size()
        );
        if bytes == 0 {
            return;
        }

        let new_high = self.high - bytes;
        if let Err(e) = self.mapping.advise_dont_need(new_high, bytes) {
            log::warn!("Failed to release [{:#x}, {:#x}): {}", new_high, self.high, e);
        }
        self.high = new_high;
    }

    fn low(&self) -> usize {
        self.low_boundary
    }

    fn high(&self) -> usize {
        self.high
    }

    fn low_boundary(&self) -> usize {
        self.low_boundary
    }

    fn high_boundary(&self) -> usize {
        self.high_boundary
    }

    fn alignment(&self) -> usize {
        self.alignment
    }
}

impl std::fmt::Debug for MappedVirtualSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedVirtualSpace")
            .field("reserved", &self.reserved_region())
            .field("committed", &self.committed_region())
            .field("alignment", &self.alignment)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALIGN: usize = 64 * 1024;

    #[test]
    fn test_reserve_is_aligned_and_uncommitted() {
        let vs = MappedVirtualSpace::reserve(16 * ALIGN, ALIGN).unwrap();

        assert_eq!(vs.low_boundary() % ALIGN, 0);
        assert_eq!(vs.reserved_size(), 16 * ALIGN);
        assert_eq!(vs.committed_size(), 0);
        assert_eq!(vs.uncommitted_size(), 16 * ALIGN);
        assert_eq!(vs.low(), vs.high());
    }

    #[test]
    fn test_expand_and_shrink() {
        let mut vs = MappedVirtualSpace::reserve(16 * ALIGN, ALIGN).unwrap();

        assert!(vs.expand_by(4 * ALIGN));
        assert_eq!(vs.committed_size(), 4 * ALIGN);
        assert_eq!(vs.high(), vs.low() + 4 * ALIGN);

        vs.shrink_by(ALIGN);
        assert_eq!(vs.committed_size(), 3 * ALIGN);
    }

    #[test]
    #[should_panic(expected = "cannot shrink by")]
    fn test_shrink_past_committed_panics() {
        let mut vs = MappedVirtualSpace::reserve(4 * ALIGN, ALIGN).unwrap();
        assert!(vs.expand_by(ALIGN));
        vs.shrink_by(2 * ALIGN);
    }

    #[test]
    fn test_expand_rejects_overcommit_and_misalignment() {
        let mut vs = MappedVirtualSpace::reserve(4 * ALIGN, ALIGN).unwrap();

        assert!(!vs.expand_by(5 * ALIGN));
        assert!(!vs.expand_by(ALIGN + 8));
        assert!(!vs.expand_by(0));
        assert_eq!(vs.committed_size(), 0);
    }

    #[test]
    fn test_expand_to_reserved() {
        let mut vs = MappedVirtualSpace::reserve(4 * ALIGN, ALIGN).unwrap();
        assert!(vs.expand_by(ALIGN));

        assert!(vs.expand_to_reserved());
        assert_eq!(vs.uncommitted_size(), 0);

        // Nothing left to commit
        assert!(!vs.expand_to_reserved());
    }

    #[test]
    fn test_committed_memory_is_writable() {
        let vs = MappedVirtualSpace::reserve_and_commit(4 * ALIGN, 2 * ALIGN, ALIGN).unwrap();
        let top_word = vs.high() - 8;
        unsafe {
            *(vs.low() as *mut u64) = 7;
            *(top_word as *mut u64) = 9;
            assert_eq!(*(vs.low() as *const u64), 7);
            assert_eq!(*(top_word as *const u64), 9);
        }
    }

    #[test]
    fn test_reserve_rejects_bad_geometry() {
        assert!(MappedVirtualSpace::reserve(0, ALIGN).is_err());
        assert!(MappedVirtualSpace::reserve(ALIGN + 8, ALIGN).is_err());
        assert!(MappedVirtualSpace::reserve(ALIGN, 3000).is_err());
    }
}
