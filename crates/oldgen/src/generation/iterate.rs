//! Block-Parallel Iteration
//!
//! The used part of the space is cut into fixed-size blocks:
//!
//! ```text
//!  bottom                                                 top
//!    │ block 0        │ block 1        │ block 2   │
//!    [A    ][B           ][C][D    ][E          ]
//!     ▲ 0    ▲ 0           ▲ 1 ▲ 1   ▲ 2
//! ```
//!
//! Each object belongs to the block holding its start, so `B` is visited
//! by block 0 even though it reaches into block 1. Visiting every block,
//! in any order, visits every object exactly once. The space must be
//! quiescent while iterating.

use super::OldGen;
use crate::object::ObjectRef;

impl OldGen {
    /// Number of iteration blocks covering the used part of the space
    pub fn block_count(&self) -> usize {
        self.used_in_bytes()
            .div_ceil(self.config.iterate_block_size)
    }

    /// Visit every object that starts in block `block_index`
    pub fn iterate_block<F: FnMut(ObjectRef)>(&self, block_index: usize, mut action: F) {
        let block_size = self.config.iterate_block_size;
        debug_assert!(block_size.is_multiple_of(self.start_index.block_size()));

        let space = &self.object_space;
        let top = space.top();
        let begin = match block_index
            .checked_mul(block_size)
            .and_then(|offset| space.bottom().checked_add(offset))
        {
            Some(begin) if begin < top => begin,
            _ => return,
        };
        let end = top.min(begin.saturating_add(block_size));

        if !self.start_index.object_starts_in_range(begin, end) {
            return;
        }

        // Object starting at or reaching into this block
        let mut start = self.start_index.object_start(begin);
        if start < begin {
            // SAFETY: object_start returns a live object start.
            start += unsafe { ObjectRef::from_addr(start) }.size();
        }
        debug_assert!(start >= begin, "object start {:#x} before block {:#x}", start, begin);

        let mut p = start;
        while p < end {
            // SAFETY: walking object starts below top.
            let obj = unsafe { ObjectRef::from_addr(p) };
            let size = obj.size();
            crate::guarantee!(size > 0, "zero-sized object at {:#x}", p);
            action(obj);
            p += size;
        }
    }

    /// Visit every object in address order
    pub fn object_iterate<F: FnMut(ObjectRef)>(&self, action: F) {
        self.object_space.object_iterate(action);
    }

    /// Visit every object using the worker pool
    ///
    /// Workers claim blocks from the pool's shared counter; visiting order
    /// across blocks is unspecified.
    pub fn object_iterate_parallel<F: Fn(ObjectRef) + Sync>(&self, action: F) {
        self.workers
            .run_task(self.block_count(), |index| self.iterate_block(index, &action));
    }
}
