//! Memory Regions - Half-Open Address Ranges
//!
//! Every range the generation talks about (reserved, committed, covered,
//! iteration blocks) is a `[start, end)` pair over the flat address space.

use crate::util::constants::HEAP_WORD_SIZE;
use std::fmt;

/// MemRegion - half-open address range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MemRegion {
    start: usize,
    end: usize,
}

impl MemRegion {
    /// Create region from bounds
    ///
    /// # Panics
    /// If `end < start`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(
            start <= end,
            "MemRegion end {:#x} precedes start {:#x}",
            end,
            start
        );
        Self { start, end }
    }

    /// Create region from start and size in bytes
    pub fn with_size(start: usize, byte_size: usize) -> Self {
        let end = start
            .checked_add(byte_size)
            .unwrap_or_else(|| panic!("MemRegion {:#x} + {} overflows", start, byte_size));
        Self { start, end }
    }

    /// Empty region
    pub const fn empty() -> Self {
        Self { start: 0, end: 0 }
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    #[inline]
    pub fn byte_size(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn word_size(&self) -> usize {
        self.byte_size() / HEAP_WORD_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if address lies in `[start, end)`
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.start && addr < self.end
    }

    /// Check if `other` lies entirely within this region
    pub fn contains_region(&self, other: &MemRegion) -> bool {
        other.is_empty() || (other.start >= self.start && other.end <= self.end)
    }

    /// Overlap of two regions, empty at `max(start)` if disjoint
    pub fn intersection(&self, other: &MemRegion) -> MemRegion {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end).max(start);
        MemRegion { start, end }
    }
}

impl fmt::Display for MemRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_sizes() {
        let region = MemRegion::new(0x1000, 0x3000);
        assert_eq!(region.byte_size(), 0x2000);
        assert_eq!(region.word_size(), 0x2000 / 8);
        assert!(!region.is_empty());
        assert_eq!(MemRegion::with_size(0x1000, 0x2000), region);
    }

    #[test]
    fn test_region_contains() {
        let region = MemRegion::new(0x1000, 0x2000);
        assert!(region.contains(0x1000));
        assert!(region.contains(0x1fff));
        assert!(!region.contains(0x2000));
        assert!(region.contains_region(&MemRegion::new(0x1800, 0x2000)));
        assert!(!region.contains_region(&MemRegion::new(0x1800, 0x2008)));
        assert!(region.contains_region(&MemRegion::empty()));
    }

    #[test]
    fn test_region_intersection() {
        let a = MemRegion::new(0x1000, 0x3000);
        let b = MemRegion::new(0x2000, 0x4000);
        assert_eq!(a.intersection(&b), MemRegion::new(0x2000, 0x3000));

        let c = MemRegion::new(0x5000, 0x6000);
        assert!(a.intersection(&c).is_empty());
    }

    #[test]
    #[should_panic]
    fn test_inverted_region_panics() {
        let _ = MemRegion::new(0x2000, 0x1000);
    }
}
