//! Cooperative Allocation Pretouch
//!
//! Allocating threads share one cursor, `next`, marking how far ahead of
//! allocation pages have been faulted in. Each allocation smaller than a
//! stride may claim the next stride with a single compare-and-swap and
//! touch its first word. Losing the race means another thread did the
//! work, so there is never a retry.
//!
//! ```text
//!  bottom     alloc   new_alloc      next            next+limit       end
//!    │────────[========]─────────────│·····························│
//!                                    ▲ cursor: pages below are touched
//! ```
//!
//! The cursor only moves forward between resizes and never passes the
//! space end. It is advisory: a stale value costs a page fault, nothing
//! more.

use crate::heap::page;
use crate::util::Alignment;
use std::sync::atomic::{AtomicUsize, Ordering};

/// AllocationPretouch - shared pretouch cursor
#[derive(Debug)]
pub struct AllocationPretouch {
    /// Lowest address not known to be touched
    next: AtomicUsize,

    /// Bytes claimed per step (the page size)
    stride: usize,

    /// How far the cursor may run ahead of an allocation
    limit: usize,
}

impl AllocationPretouch {
    /// Cursor starting at `start`, `stride` bytes per step, running at most
    /// `workers` strides ahead of allocation
    pub fn new(start: usize, stride: usize, workers: usize) -> Self {
        debug_assert!(stride.is_power_of_two());
        Self {
            next: AtomicUsize::new(start),
            stride,
            limit: stride * workers.max(1),
        }
    }

    #[inline]
    pub fn next(&self) -> usize {
        self.next.load(Ordering::Relaxed)
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Hook for an allocation of `size` bytes at `alloc` in a space ending
    /// at `end`
    pub fn on_allocation(&self, alloc: usize, size: usize, end: usize) {
        // Large allocations fault in their own pages as they are written.
        if self.stride <= size {
            return;
        }

        let observed = self.next.load(Ordering::Relaxed);
        if observed >= end {
            return;
        }

        let new_alloc = alloc + size;
        let mut touch = observed;

        if new_alloc > touch {
            if new_alloc > Alignment::align_down(end - 1, self.stride) {
                // Allocation reached the last page: nothing left to touch.
                let _ = self.next.compare_exchange(
                    observed,
                    end,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                );
                return;
            }
            touch = Alignment::align_up(new_alloc, self.stride);
        } else if touch - new_alloc > self.limit {
            return;
        }

        let claimed = if end - touch < self.stride {
            end
        } else {
            touch + self.stride
        };

        if self
            .next
            .compare_exchange(observed, claimed, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
        {
            // SAFETY: touch < end, so the page is committed.
            unsafe { page::touch(touch) };
        }
    }

    /// Move the cursor forward to at least `end` (space was pretouched)
    pub fn advance_to(&self, end: usize) {
        self.next.fetch_max(end, Ordering::Relaxed);
    }

    /// Pull the cursor back to at most `end` (space shrank)
    pub fn clamp_to(&self, end: usize) {
        self.next.fetch_min(end, Ordering::Relaxed);
    }
}
