//! Test Utilities for the Old Generation Test Suite
//!
//! Fixtures build small generations (1MB min, 4MB initial, 16MB max) so
//! every resize path is reachable without large reservations. Assertions
//! are strict: a violated invariant is a bug, never noise.

#![allow(dead_code)]

use oldgen::barrier::CardTable;
use oldgen::heap::{MappedVirtualSpace, MemRegion, VirtualSpace};
use oldgen::object::ObjectStartArray;
use oldgen::util::constants::MB;
use oldgen::{Collaborators, OldGen, OldGenConfig};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Commit granularity used by every fixture
pub const ALIGNMENT: usize = 64 * 1024;

pub const MIN_SIZE: usize = MB;
pub const INITIAL_SIZE: usize = 4 * MB;
pub const MAX_SIZE: usize = 16 * MB;

/// Fixture configuration
///
/// **Bug this finds:** Configuration validation rejecting a sane layout
pub fn small_config() -> OldGenConfig {
    OldGenConfig {
        min_size: MIN_SIZE,
        initial_size: INITIAL_SIZE,
        max_size: MAX_SIZE,
        alignment: alignment(),
        worker_threads: Some(4),
        zap_unused_heap_area: false,
        ..Default::default()
    }
}

/// Alignment that is valid on this machine
pub fn alignment() -> usize {
    ALIGNMENT.max(oldgen::heap::page::get_page_size())
}

/// ============================================================================
/// GENERATION FIXTURE
/// ============================================================================

/// Test fixture owning one generation
pub struct OldGenFixture {
    pub gen: Arc<OldGen>,
    pub config: OldGenConfig,
}

impl OldGenFixture {
    /// Create fixture with the small configuration
    ///
    /// **Bug this finds:** Initialization failures, wrong initial commit
    pub fn new() -> Self {
        Self::with_config(small_config())
    }

    /// Create fixture with a custom configuration
    pub fn with_config(config: OldGenConfig) -> Self {
        let gen = Arc::new(
            OldGen::new(config.clone(), "old", 1)
                .expect("generation initialization should succeed with valid config"),
        );
        Self { gen, config }
    }

    /// Create fixture over an instrumented virtual space
    ///
    /// **Bug this finds:** Hidden OS commit calls, broken fallback ladder
    pub fn with_counting_space(
        config: OldGenConfig,
        commit_limit: usize,
    ) -> (Self, CommitCounters) {
        let (space, counters) =
            CountingVirtualSpace::reserve(config.max_size, config.alignment, commit_limit);
        let card_table =
            CardTable::new(space.reserved_region()).expect("card table over test space");
        let collaborators = Collaborators {
            virtual_space: Box::new(space),
            remembered_set: Box::new(card_table),
            start_index: Box::new(ObjectStartArray::new()),
        };
        let gen = Arc::new(
            OldGen::with_collaborators(config.clone(), "old", 1, collaborators)
                .expect("generation initialization should succeed over counting space"),
        );
        (Self { gen, config }, counters)
    }

    /// Allocate or panic
    ///
    /// **Bug this finds:** Spurious allocation failure while room remains
    pub fn allocate(&self, word_size: usize) -> usize {
        self.gen
            .allocate(word_size)
            .unwrap_or_else(|e| panic!("allocation of {} words failed: {}", word_size, e))
    }

    /// Allocate `count` objects of varying size, returning their addresses
    pub fn allocate_mixed(&self, count: usize) -> Vec<usize> {
        (0..count).map(|i| self.allocate(2 + (i * 7) % 61)).collect()
    }

    /// Allocate without growing until roughly `bytes` are used
    pub fn fill_to(&self, bytes: usize) {
        while self.gen.used_in_bytes() < bytes {
            self.allocate(512);
        }
    }

    pub fn capacity(&self) -> usize {
        self.gen.capacity_in_bytes()
    }
}

/// ============================================================================
/// INSTRUMENTED VIRTUAL SPACE
/// ============================================================================

/// Shared call counters of a `CountingVirtualSpace`
#[derive(Clone, Default)]
pub struct CommitCounters {
    pub expand_calls: Arc<AtomicUsize>,
    pub failed_expands: Arc<AtomicUsize>,
    pub shrink_calls: Arc<AtomicUsize>,
}

impl CommitCounters {
    pub fn expands(&self) -> usize {
        self.expand_calls.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> usize {
        self.failed_expands.load(Ordering::SeqCst)
    }

    pub fn shrinks(&self) -> usize {
        self.shrink_calls.load(Ordering::SeqCst)
    }

    /// Commit plus decommit calls seen so far
    pub fn total(&self) -> usize {
        self.expands() + self.shrinks()
    }
}

/// Virtual space that counts OS-level calls and refuses commits that
/// would take the committed size above `commit_limit`
pub struct CountingVirtualSpace {
    inner: MappedVirtualSpace,
    commit_limit: usize,
    counters: CommitCounters,
}

impl CountingVirtualSpace {
    pub fn reserve(size: usize, alignment: usize, commit_limit: usize) -> (Self, CommitCounters) {
        let counters = CommitCounters::default();
        let space = Self {
            inner: MappedVirtualSpace::reserve(size, alignment).expect("reserve test space"),
            commit_limit,
            counters: counters.clone(),
        };
        (space, counters)
    }
}

impl VirtualSpace for CountingVirtualSpace {
    fn expand_by(&mut self, bytes: usize) -> bool {
        self.counters.expand_calls.fetch_add(1, Ordering::SeqCst);
        let fits = self
            .inner
            .committed_size()
            .checked_add(bytes)
            .is_some_and(|size| size <= self.commit_limit);
        if !fits || !self.inner.expand_by(bytes) {
            self.counters.failed_expands.fetch_add(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    fn shrink_by(&mut self, bytes: usize) {
        self.counters.shrink_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.shrink_by(bytes);
    }

    fn low(&self) -> usize {
        self.inner.low()
    }

    fn high(&self) -> usize {
        self.inner.high()
    }

    fn low_boundary(&self) -> usize {
        self.inner.low_boundary()
    }

    fn high_boundary(&self) -> usize {
        self.inner.high_boundary()
    }

    fn alignment(&self) -> usize {
        self.inner.alignment()
    }
}

/// ============================================================================
/// STRICT ASSERTION HELPERS
/// ============================================================================

/// Assert capacity lies within the generation bounds and the reservation
///
/// **Bug this finds:** Resize arithmetic escaping `[min, max]`
/// **Tolerance:** ZERO
#[track_caller]
pub fn assert_capacity_in_bounds(gen: &OldGen, context: &str) {
    let capacity = gen.capacity_in_bytes();
    assert!(
        capacity >= gen.min_gen_size(),
        "{}: capacity {} below min {}",
        context,
        capacity,
        gen.min_gen_size()
    );
    assert!(
        capacity <= gen.max_gen_size(),
        "{}: capacity {} above max {}",
        context,
        capacity,
        gen.max_gen_size()
    );
    assert!(
        capacity <= gen.reserved().byte_size(),
        "{}: capacity {} above reservation {}",
        context,
        capacity,
        gen.reserved().byte_size()
    );
}

/// Assert both side tables cover exactly the committed space
///
/// **Bug this finds:** A resize that skipped or misordered resynchronization
/// **Tolerance:** ZERO
#[track_caller]
pub fn assert_side_tables_synced(gen: &OldGen, context: &str) {
    let space = gen.object_space().region();
    assert_eq!(
        gen.card_table().covered_region(),
        space,
        "{}: card table out of sync",
        context
    );
    assert_eq!(
        gen.start_array().covered_region(),
        space,
        "{}: object start index out of sync",
        context
    );
}

/// Assert the generation's boundaries sit on card boundaries
///
/// **Bug this finds:** Committed sizes that split a card
#[track_caller]
pub fn assert_card_aligned(gen: &OldGen, context: &str) {
    let region: MemRegion = gen.object_space().region();
    let table = gen.card_table();
    assert!(
        table.is_card_aligned(region.start()),
        "{}: start {:#x} not card aligned",
        context,
        region.start()
    );
    assert!(
        region.end() == table.whole_heap().end() || table.is_card_aligned(region.end()),
        "{}: end {:#x} not card aligned",
        context,
        region.end()
    );
}

/// Assert all addresses are unique
///
/// **Bug this finds:** Races in the bump pointer handing out one block twice
#[track_caller]
pub fn assert_all_addresses_unique(addresses: &[usize], context: &str) {
    let unique: HashSet<_> = addresses.iter().collect();
    assert_eq!(
        unique.len(),
        addresses.len(),
        "{}: found {} duplicate addresses out of {}",
        context,
        addresses.len() - unique.len(),
        addresses.len()
    );
}
