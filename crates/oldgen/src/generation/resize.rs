//! Resize Engine - Expand, Shrink and Resynchronize
//!
//! ## Expansion ladder
//!
//! ```text
//! expand(bytes)
//!   aligned = align_up(bytes)            (align_down if that wrapped to 0)
//!   delta   = align_up(min_heap_delta)   (>= alignment * numa_groups)
//!   delta > aligned ? try expand_by(delta)
//!   else / failed   : try expand_by(aligned)
//!   failed          : try expand_to_reserved()
//! ```
//!
//! ## Resynchronization order
//!
//! After every committed-size change:
//! 1. remembered set covers `[low, high)`
//! 2. object-start index covers `[low, high)`
//! 3. bump space is re-initialized; its new `end` is published last
//! 4. pretouch cursor moves to the new end (pretouched growth) or is
//!    clamped to it
//!
//! Allocators only look at `end`, so by the time they can use new memory
//! both side tables already describe it.

use super::OldGen;
use crate::allocator::{PretouchSetup, SpaceMangler};
use crate::heap::{MemRegion, VirtualSpace};
use crate::logging::{log_event, GenEvent};
use crate::stats::GcTimer;
use crate::util::debug::to_kb;
use crate::util::Alignment;
use parking_lot::MutexGuard;

/// Proof of holding a generation's expand lock
pub type ExpandGuard<'a> = MutexGuard<'a, Box<dyn VirtualSpace>>;

impl OldGen {
    /// Take the expand lock
    pub fn lock_for_expand(&self) -> ExpandGuard<'_> {
        self.virtual_space.lock()
    }

    fn assert_expand_lock(&self, guard: &ExpandGuard<'_>) {
        debug_assert!(
            std::ptr::eq(MutexGuard::mutex(guard), &self.virtual_space),
            "expand guard belongs to another generation"
        );
    }

    /// Grow by at least `bytes`, best effort
    ///
    /// Returns whether any commit succeeded.
    pub fn expand(&self, guard: &mut ExpandGuard<'_>, bytes: usize) -> bool {
        self.assert_expand_lock(guard);

        let alignment = guard.alignment();
        let mut aligned_bytes = Alignment::align_up(bytes, alignment);
        let mut aligned_expand_bytes =
            Alignment::align_up(self.config.min_heap_delta_bytes, alignment);

        if self.config.use_numa {
            // Round-robin placement needs at least a unit per group.
            aligned_expand_bytes = aligned_expand_bytes.max(alignment * self.numa_groups);
        }

        if aligned_bytes == 0 {
            // Alignment wrapped; take as much as aligning down allows.
            aligned_bytes = Alignment::align_down(bytes, alignment);
        }

        let mut success = false;
        if aligned_expand_bytes > aligned_bytes {
            success = self.expand_by(guard, aligned_expand_bytes);
        }
        if !success {
            success = self.expand_by(guard, aligned_bytes);
        }
        if !success {
            success = self.expand_to_reserved(guard);
        }

        if !success {
            self.resize_stats.record_failed_expand();
        }
        success
    }

    /// Commit exactly `bytes` more and resynchronize
    pub fn expand_by(&self, guard: &mut ExpandGuard<'_>, bytes: usize) -> bool {
        self.assert_expand_lock(guard);

        if bytes == 0 {
            return true;
        }

        let timer = GcTimer::start("expand");
        let old_high = guard.high();
        if !guard.expand_by(bytes) {
            return false;
        }
        self.commit_succeeded(&***guard, old_high, timer);
        true
    }

    /// Commit everything left in the reservation
    pub fn expand_to_reserved(&self, guard: &mut ExpandGuard<'_>) -> bool {
        self.assert_expand_lock(guard);

        let remaining = guard.uncommitted_size();
        if remaining == 0 {
            return false;
        }

        let timer = GcTimer::start("expand_to_reserved");
        let old_high = guard.high();
        if guard.expand_to_reserved() {
            self.commit_succeeded(&***guard, old_high, timer);
            return true;
        }

        log::warn!("{}: grow to reserve failed", self.name);
        log_event(GenEvent::ExpandFailure {
            name: self.name.clone(),
            requested: remaining,
            committed: guard.committed_size(),
            reserved: guard.reserved_size(),
        });
        false
    }

    fn commit_succeeded(&self, vs: &dyn VirtualSpace, old_high: usize, timer: GcTimer) {
        let new_high = vs.high();
        let by = new_high - old_high;

        if self.config.zap_unused_heap_area {
            // Mangle before post_resize makes the range allocatable. The
            // object space still ends at the old high here.
            debug_assert!(self.object_space.end() < new_high);
            // SAFETY: freshly committed, holds nothing yet.
            unsafe { SpaceMangler::mangle_region(MemRegion::new(old_high, new_high)) };
        }

        self.post_resize(vs, true);
        self.refresh_capacity_counters();
        self.resize_stats.record_expand(by, timer.finish());

        let new_size = vs.committed_size();
        let old_size = new_size - by;
        log::debug!(
            "Expanding {} from {}K by {}K to {}K",
            self.name,
            to_kb(old_size),
            to_kb(by),
            to_kb(new_size)
        );
        log_event(GenEvent::Expand {
            name: self.name.clone(),
            old_kb: to_kb(old_size),
            by_kb: to_kb(by),
            new_kb: to_kb(new_size),
        });
    }

    /// Give back `bytes` (aligned down) from the top
    ///
    /// Does not enforce `min_gen_size`; `resize` clamps before calling.
    pub fn shrink(&self, guard: &mut ExpandGuard<'_>, bytes: usize) {
        self.assert_expand_lock(guard);

        let size = Alignment::align_down(bytes, guard.alignment());
        if size == 0 {
            return;
        }

        crate::guarantee!(
            size <= guard.committed_size() && guard.high() - size >= self.object_space.top(),
            "shrinking {} by {} bytes would cut below top {:#x}",
            self.name,
            size,
            self.object_space.top()
        );

        let timer = GcTimer::start("shrink");
        guard.shrink_by(size);
        self.post_resize(&***guard, false);
        self.refresh_capacity_counters();
        self.resize_stats.record_shrink(size, timer.finish());

        let new_size = guard.committed_size();
        let old_size = new_size + size;
        log::debug!(
            "Shrinking {} from {}K by {}K to {}K",
            self.name,
            to_kb(old_size),
            to_kb(size),
            to_kb(new_size)
        );
        log_event(GenEvent::Shrink {
            name: self.name.clone(),
            old_kb: to_kb(old_size),
            by_kb: to_kb(size),
            new_kb: to_kb(new_size),
        });
    }

    /// Move capacity toward `used + desired_free_bytes`
    ///
    /// The target is clamped into `[min_gen_size, max_gen_size]` and
    /// aligned up. A target equal to the current capacity does nothing;
    /// the expand lock is not even taken.
    pub fn resize(&self, desired_free_bytes: usize) {
        let used = self.used_in_bytes();
        let capacity_before = self.capacity_in_bytes();

        let mut new_size = used
            .checked_add(desired_free_bytes)
            .unwrap_or(self.max_gen_size);
        new_size = new_size.clamp(self.min_gen_size, self.max_gen_size);
        new_size = Alignment::align_up(new_size, self.config.alignment);

        log::trace!(
            "{} size: desired free: {} used: {} new size: {} current size: {} gen limits: {} / {}",
            self.name,
            desired_free_bytes,
            used,
            new_size,
            capacity_before,
            self.max_gen_size,
            self.min_gen_size
        );
        log_event(GenEvent::ResizeDecision {
            name: self.name.clone(),
            desired_free: desired_free_bytes,
            used,
            capacity: capacity_before,
            target: new_size,
            min_size: self.min_gen_size,
            max_size: self.max_gen_size,
        });

        if new_size == capacity_before {
            return;
        }

        {
            let mut guard = self.lock_for_expand();
            if new_size > capacity_before {
                self.expand(&mut guard, new_size - capacity_before);
            } else {
                self.shrink(&mut guard, capacity_before - new_size);
            }
        }

        let capacity_after = self.capacity_in_bytes();
        log::trace!(
            "{} size: ({}) -> ({})",
            self.name,
            capacity_before,
            capacity_after
        );
        log_event(GenEvent::ResizeOutcome {
            name: self.name.clone(),
            capacity_before,
            capacity_after,
        });
    }

    /// Bring the side tables, the object space and the pretouch cursor in
    /// line with the committed region
    fn post_resize(&self, vs: &dyn VirtualSpace, expanded: bool) {
        let new_region = MemRegion::new(vs.low(), vs.high());

        crate::guarantee!(
            self.remembered_set.is_card_aligned(new_region.start()),
            "generation start {:#x} must be card aligned",
            new_region.start()
        );
        crate::guarantee!(
            new_region.end() == self.remembered_set.whole_heap().end()
                || self.remembered_set.is_card_aligned(new_region.end()),
            "generation end {:#x} must be card aligned",
            new_region.end()
        );

        self.remembered_set.resize_covered_region(new_region);
        self.start_index.set_covered_region(new_region);

        let pretouched = expanded && self.config.always_pretouch;
        let setup = pretouched.then_some(PretouchSetup {
            page_size: self.pretouch.stride(),
            workers: &self.workers,
        });
        // Publishes the new end; must stay the last layout update.
        self.object_space.initialize(new_region, false, false, setup);

        if pretouched {
            self.pretouch.advance_to(new_region.end());
        } else {
            self.pretouch.clamp_to(new_region.end());
        }

        debug_assert_eq!(self.object_space.capacity_in_bytes(), new_region.byte_size());
    }

    fn refresh_capacity_counters(&self) {
        if self.config.use_perf_data {
            let capacity = self.capacity_in_bytes();
            self.space_counters.update_capacity(capacity);
            self.gen_counters.update_all(capacity);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::util::constants::MB;

    #[test]
    fn test_expand_small_request_uses_delta_floor() {
        let gen = small_gen();
        let mut guard = gen.lock_for_expand();

        assert!(gen.expand(&mut guard, 8));
        let floor = Alignment::align_up(gen.config().min_heap_delta_bytes, gen.config().alignment);
        assert_eq!(guard.committed_size(), 4 * MB + floor);
        drop(guard);
        assert_eq!(gen.capacity_in_bytes(), 4 * MB + floor);
    }

    #[test]
    fn test_expand_exact_request() {
        let gen = small_gen();
        let mut guard = gen.lock_for_expand();
        assert!(gen.expand(&mut guard, 2 * MB));
        drop(guard);
        assert_eq!(gen.capacity_in_bytes(), 6 * MB);
    }

    #[test]
    fn test_expand_wraps_and_falls_back_to_reserve() {
        let gen = small_gen();
        let mut guard = gen.lock_for_expand();
        // align_up(usize::MAX) wraps; align_down is far too big; the
        // ladder ends at the reservation.
        assert!(gen.expand(&mut guard, usize::MAX));
        drop(guard);
        assert_eq!(gen.capacity_in_bytes(), 16 * MB);
    }

    #[test]
    fn test_expand_at_max_fails() {
        let gen = small_gen();
        gen.resize(usize::MAX);
        assert_eq!(gen.capacity_in_bytes(), 16 * MB);

        let mut guard = gen.lock_for_expand();
        assert!(!gen.expand(&mut guard, MB));
        drop(guard);
        assert_eq!(gen.resize_stats().snapshot().failed_expansions, 1);
    }

    #[test]
    fn test_shrink_aligns_down() {
        let gen = small_gen();
        let mut guard = gen.lock_for_expand();
        let alignment = guard.alignment();
        gen.shrink(&mut guard, alignment + 1);
        drop(guard);
        assert_eq!(gen.capacity_in_bytes(), 4 * MB - alignment);
    }

    #[test]
    fn test_shrink_below_alignment_is_noop() {
        let gen = small_gen();
        let mut guard = gen.lock_for_expand();
        gen.shrink(&mut guard, 100);
        drop(guard);
        assert_eq!(gen.capacity_in_bytes(), 4 * MB);
        assert_eq!(gen.resize_stats().snapshot().shrinks, 0);
    }

    #[test]
    #[should_panic(expected = "below top")]
    fn test_shrink_below_top_panics() {
        let gen = small_gen();
        gen.allocate((3 * MB) / 8).unwrap();
        let mut guard = gen.lock_for_expand();
        gen.shrink(&mut guard, 2 * MB);
    }

    #[test]
    fn test_resize_scenario() {
        let gen = small_gen();

        gen.resize(10 * MB);
        assert_eq!(gen.capacity_in_bytes(), 10 * MB);

        gen.allocate((2 * MB) / 8).unwrap();
        gen.resize(0);
        assert_eq!(gen.capacity_in_bytes(), 2 * MB);
    }

    #[test]
    fn test_resize_clamps_to_min() {
        let gen = small_gen();
        gen.resize(0);
        assert_eq!(gen.capacity_in_bytes(), MB);
    }

    #[test]
    fn test_resize_overflow_means_max() {
        let gen = small_gen();
        gen.allocate(16).unwrap();
        gen.resize(usize::MAX);
        assert_eq!(gen.capacity_in_bytes(), 16 * MB);
    }

    #[test]
    fn test_shrink_clamps_pretouch_cursor() {
        let gen = OldGen::new(
            crate::config::OldGenConfig {
                always_pretouch: true,
                ..small_config()
            },
            "old",
            1,
        )
        .unwrap();
        assert_eq!(gen.next_pretouch(), gen.object_space().end());

        gen.resize(12 * MB);
        assert_eq!(gen.next_pretouch(), gen.object_space().end());

        gen.resize(0);
        assert_eq!(gen.capacity_in_bytes(), MB);
        assert_eq!(gen.next_pretouch(), gen.object_space().end());
    }

    #[test]
    fn test_expand_mangles_new_range() {
        let gen = OldGen::new(
            crate::config::OldGenConfig {
                zap_unused_heap_area: true,
                ..small_config()
            },
            "old",
            1,
        )
        .unwrap();
        gen.object_space().check_mangled_unused_area_complete();

        gen.resize(8 * MB);
        gen.object_space().check_mangled_unused_area_complete();
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "another generation")]
    fn test_foreign_guard_rejected() {
        let a = small_gen();
        let b = small_gen();
        let mut guard = b.lock_for_expand();
        a.expand(&mut guard, MB);
    }
}
