//! Alignment Utilities
//!
//! Helper functions for memory alignment.

/// Alignment - utility for alignment operations
///
/// All alignments must be powers of two.
pub struct Alignment;

impl Alignment {
    /// Align value up to boundary
    ///
    /// Wraps to zero when the rounded value does not fit in `usize`;
    /// callers that care check for that explicitly.
    ///
    /// # Examples
    /// ```
    /// use oldgen::util::Alignment;
    ///
    /// assert_eq!(Alignment::align_up(100, 8), 104);
    /// assert_eq!(Alignment::align_up(64, 8), 64);
    /// assert_eq!(Alignment::align_up(usize::MAX, 8), 0);
    /// ```
    #[inline]
    pub fn align_up(value: usize, alignment: usize) -> usize {
        debug_assert!(alignment.is_power_of_two());
        value.wrapping_add(alignment - 1) & !(alignment - 1)
    }

    /// Align value down to boundary
    #[inline]
    pub fn align_down(value: usize, alignment: usize) -> usize {
        debug_assert!(alignment.is_power_of_two());
        value & !(alignment - 1)
    }

    /// Check if value is aligned
    #[inline]
    pub fn is_aligned(value: usize, alignment: usize) -> bool {
        value & (alignment - 1) == 0
    }

    /// Get alignment padding needed
    pub fn padding(value: usize, alignment: usize) -> usize {
        Self::align_up(value, alignment).wrapping_sub(value)
    }

    /// Heap word alignment (8 bytes)
    pub const HEAP_WORD: usize = 8;

    /// Cache line alignment (64 bytes)
    pub const CACHE_LINE: usize = 64;
}
