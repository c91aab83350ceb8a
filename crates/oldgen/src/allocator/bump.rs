//! Allocator Submodule - Bump Allocation Space
//!
//! The old generation's object space is a single `[bottom, top, end)`
//! range. Allocation is a compare-and-swap on `top`; the only other writer
//! of the layout is a resize, which republishes `end`.
//!
//! ```text
//! bottom              top                       end
//!   │◄──── used ──────►│◄──────── free ─────────►│
//! ```
//!
//! `end` is stored with release ordering and loaded with acquire ordering:
//! an allocator that sees the new `end` also sees every side table update
//! the resize made before publishing it.

use crate::allocator::mangler::SpaceMangler;
use crate::heap::mem_region::MemRegion;
use crate::object::header::{get_header, ObjectRef, MIN_OBJECT_SIZE, OBJECT_ALIGNMENT};
use crate::runtime::WorkerPool;
use crate::util::constants::HEAP_WORD_SIZE;
use crate::util::debug::to_kb;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pretouch parameters for `BumpSpace::initialize`
#[derive(Clone, Copy)]
pub struct PretouchSetup<'a> {
    pub page_size: usize,
    pub workers: &'a WorkerPool,
}

/// BumpSpace - contiguous space with an atomically bumped top
#[derive(Debug, Default)]
pub struct BumpSpace {
    bottom: AtomicUsize,
    top: AtomicUsize,
    end: AtomicUsize,
    mangler: SpaceMangler,
}

impl BumpSpace {
    /// Create an empty space; `initialize` gives it memory
    pub fn new() -> Self {
        Self::default()
    }

    /// (Re)configure the space over `region`
    ///
    /// - `clear_space` resets `top` to `bottom`, mangling the space when
    ///   `mangle_space` is set.
    /// - `pretouch` faults in the part of `region` not covered before.
    ///
    /// The new `end` is published last. Without `clear_space`, `top` must
    /// already lie within `region`.
    pub fn initialize(
        &self,
        region: MemRegion,
        clear_space: bool,
        mangle_space: bool,
        pretouch: Option<PretouchSetup<'_>>,
    ) {
        let old_bottom = self.bottom.load(Ordering::Relaxed);
        let old_end = self.end.load(Ordering::Relaxed);

        if let Some(setup) = pretouch {
            let fresh = old_bottom == old_end;
            // SAFETY: `region` is committed by the caller.
            unsafe {
                if fresh {
                    setup
                        .workers
                        .pretouch(region.start(), region.end(), setup.page_size);
                } else {
                    // Tail: memory added above the old end
                    if region.end() > old_end {
                        let start = old_end.max(region.start());
                        setup.workers.pretouch(start, region.end(), setup.page_size);
                    }
                    // Head: memory added below the old bottom
                    if region.start() < old_bottom {
                        let end = old_bottom.min(region.end());
                        setup.workers.pretouch(region.start(), end, setup.page_size);
                    }
                }
            }
        }

        self.bottom.store(region.start(), Ordering::Relaxed);

        if clear_space {
            self.top.store(region.start(), Ordering::Relaxed);
            if mangle_space {
                // SAFETY: a cleared space holds no live objects.
                unsafe { SpaceMangler::mangle_region(region) };
            }
            self.mangler.set_top_for_allocations(region.start());
        } else {
            debug_assert!(
                self.top() >= region.start() && self.top() <= region.end(),
                "top {:#x} outside new space {}",
                self.top(),
                region
            );
        }

        // Concurrent allocators may use the new space as soon as they see
        // this store.
        self.end.store(region.end(), Ordering::Release);
    }

    /// Allocate `word_size` words lock-free
    ///
    /// Returns the start of the new block, or `None` when it does not fit
    /// below `end`.
    pub fn cas_allocate(&self, word_size: usize) -> Option<usize> {
        let size = word_size.checked_mul(HEAP_WORD_SIZE)?;
        loop {
            let obj = self.top.load(Ordering::Acquire);
            let end = self.end.load(Ordering::Acquire);
            let new_top = obj.checked_add(size)?;
            if new_top > end {
                return None;
            }
            if self
                .top
                .compare_exchange_weak(obj, new_top, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                debug_assert!(obj.is_multiple_of(OBJECT_ALIGNMENT));
                return Some(obj);
            }
        }
    }

    #[inline]
    pub fn bottom(&self) -> usize {
        self.bottom.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn top(&self) -> usize {
        self.top.load(Ordering::Acquire)
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.end.load(Ordering::Acquire)
    }

    /// `[bottom, end)`
    pub fn region(&self) -> MemRegion {
        MemRegion::new(self.bottom(), self.end())
    }

    /// `[bottom, top)`
    pub fn used_region(&self) -> MemRegion {
        MemRegion::new(self.bottom(), self.top())
    }

    pub fn capacity_in_bytes(&self) -> usize {
        self.end() - self.bottom()
    }

    pub fn capacity_in_words(&self) -> usize {
        self.capacity_in_bytes() / HEAP_WORD_SIZE
    }

    pub fn used_in_bytes(&self) -> usize {
        self.top() - self.bottom()
    }

    pub fn used_in_words(&self) -> usize {
        self.used_in_bytes() / HEAP_WORD_SIZE
    }

    pub fn free_in_bytes(&self) -> usize {
        self.end().saturating_sub(self.top())
    }

    pub fn is_empty(&self) -> bool {
        self.top() == self.bottom()
    }

    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.bottom() && addr < self.end()
    }

    /// Move `top`; the address must lie in `[bottom, end]`
    pub fn set_top(&self, addr: usize) {
        crate::guarantee!(
            addr >= self.bottom() && addr <= self.end(),
            "top {:#x} outside {}",
            addr,
            self.region()
        );
        self.top.store(addr, Ordering::Release);
    }

    /// Drop every object in the space
    pub fn clear(&self, mangle_space: bool) {
        self.set_top(self.bottom());
        if mangle_space {
            self.mangle_unused_area();
        }
    }

    /// Visit every object in `[bottom, top)` in address order
    ///
    /// The space must be parsable: every block below `top` carries a header.
    pub fn object_iterate<F: FnMut(ObjectRef)>(&self, mut action: F) {
        let top = self.top();
        let mut p = self.bottom();
        while p < top {
            // SAFETY: the space is parsable below top.
            let obj = unsafe { ObjectRef::from_addr(p) };
            let size = obj.size();
            crate::guarantee!(size > 0, "zero-sized object at {:#x}", p);
            action(obj);
            p += size;
        }
    }

    /// Check the space is parsable from `bottom` to exactly `top`
    pub fn verify(&self) {
        let top = self.top();
        let mut p = self.bottom();
        while p < top {
            // SAFETY: walking object starts from bottom.
            let size = unsafe { get_header(p).size() };
            crate::guarantee!(
                size >= MIN_OBJECT_SIZE && size.is_multiple_of(OBJECT_ALIGNMENT),
                "bad object size {} at {:#x}",
                size,
                p
            );
            p += size;
        }
        crate::guarantee!(p == top, "last object ends at {:#x}, top is {:#x}", p, top);
    }

    // === Mangling support ===

    /// Mangle `[top, end)`
    pub fn mangle_unused_area(&self) {
        // SAFETY: nothing lives above top.
        unsafe { self.mangler.mangle_unused_area(self.top(), self.end()) };
    }

    /// Remember the current top as the allocation high-water mark
    pub fn set_top_for_allocations(&self) {
        self.mangler.set_top_for_allocations(self.top());
    }

    pub fn top_for_allocations(&self) -> usize {
        self.mangler.top_for_allocations()
    }

    /// Check `[top, limit)` is still mangled
    ///
    /// Skipped when `limit` is not the current end: the space is being
    /// reshaped and the range above the old end may not be mangled yet.
    pub fn check_mangled_unused_area(&self, limit: usize) {
        if limit != self.end() {
            return;
        }
        let top = self.top();
        // SAFETY: [top, end) is committed.
        if let Some(addr) = unsafe { SpaceMangler::first_unmangled(top, limit) } {
            crate::guarantee!(false, "unused area not mangled at {:#x} (top {:#x})", addr, top);
        }
    }

    /// Check everything above `top` is still mangled
    pub fn check_mangled_unused_area_complete(&self) {
        self.check_mangled_unused_area(self.end());
    }

    /// One-line summary: `space 1024K, 12% used [bottom, top, end)`
    pub fn summary(&self) -> String {
        let capacity = self.capacity_in_bytes();
        let used_pct = if capacity == 0 {
            0
        } else {
            self.used_in_bytes() * 100 / capacity
        };
        format!(
            "space {}K, {}% used [{:#x}, {:#x}, {:#x})",
            to_kb(capacity),
            used_pct,
            self.bottom(),
            self.top(),
            self.end()
        )
    }
}
