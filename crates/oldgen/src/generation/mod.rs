//! Generation Module - The Growable Old Generation
//!
//! `OldGen` ties the pieces together:
//!
//! ```text
//!                ┌────────────────────── OldGen ──────────────────────┐
//!  allocate ───► │ BumpSpace ── cas on top ──► header + start index    │
//!                │     │ fails                       │                 │
//!                │     ▼                             ▼                 │
//!                │ expand lock ─► VirtualSpace   pretouch cursor       │
//!                │                    │                                │
//!                │                    ▼ post_resize                    │
//!                │   RememberedSet ─► ObjectStartIndex ─► publish end  │
//!                └────────────────────────────────────────────────────┘
//! ```
//!
//! Resizing is serialized by the expand lock, a mutex that owns the
//! virtual space; holding its guard is the only way to reach `expand` and
//! `shrink`. Allocation never takes the lock.
//!
//! Callers are expected to hold the heap lock or run at a safepoint around
//! `resize`, `shrink` and the iteration entry points. That is documented,
//! not enforced.

pub mod iterate;
pub mod pretouch;
pub mod resize;
pub mod verify;

pub use pretouch::AllocationPretouch;
pub use resize::ExpandGuard;

use crate::allocator::{BumpSpace, PretouchSetup};
use crate::barrier::{CardTable, RememberedSet};
use crate::config::OldGenConfig;
use crate::error::{OldGenError, Result};
use crate::heap::{MappedVirtualSpace, MemRegion, VirtualSpace};
use crate::object::{write_header, ObjectStartArray, ObjectStartIndex, MIN_OBJECT_WORDS};
use crate::runtime::WorkerPool;
use crate::stats::{GenerationCounters, ResizeStats, SpaceCounters};
use crate::util::constants::HEAP_WORD_SIZE;
use parking_lot::Mutex;
use std::time::Duration;

/// The services a generation is built from
pub struct Collaborators {
    /// Reserved range with its committed prefix
    pub virtual_space: Box<dyn VirtualSpace>,

    /// Card table over the heap
    pub remembered_set: Box<dyn RememberedSet>,

    /// Object-start index; `initialize` is called by the generation
    pub start_index: Box<dyn ObjectStartIndex>,
}

impl Collaborators {
    /// Default collaborators: an anonymous mapping of `max_size` bytes, a
    /// card table over it, and an object start array
    pub fn reserve(config: &OldGenConfig) -> Result<Self> {
        let space = MappedVirtualSpace::reserve(config.max_size, config.alignment).map_err(|e| {
            OldGenError::HeapInitialization(format!(
                "could not reserve {} bytes for the old generation: {}",
                config.max_size, e
            ))
        })?;

        if config.use_large_pages && !space.enable_large_pages() {
            log::debug!("Large pages requested but not available; using base pages");
        }

        let card_table = CardTable::new(space.reserved_region()).map_err(|e| {
            OldGenError::HeapInitialization(format!("could not create card table: {}", e))
        })?;

        Ok(Self {
            virtual_space: Box::new(space),
            remembered_set: Box::new(card_table),
            start_index: Box::new(ObjectStartArray::new()),
        })
    }
}

/// OldGen - growable generation for long-lived objects
pub struct OldGen {
    name: String,
    level: usize,
    config: OldGenConfig,

    /// Whole reservation, fixed at construction
    reserved: MemRegion,
    min_gen_size: usize,
    max_gen_size: usize,

    /// Locality groups used to size expansions
    numa_groups: usize,

    /// Expand lock; owns the committed region tracker
    virtual_space: Mutex<Box<dyn VirtualSpace>>,

    remembered_set: Box<dyn RememberedSet>,
    start_index: Box<dyn ObjectStartIndex>,
    object_space: BumpSpace,

    workers: WorkerPool,
    pretouch: AllocationPretouch,

    gen_counters: GenerationCounters,
    space_counters: SpaceCounters,
    resize_stats: ResizeStats,
}

impl OldGen {
    /// Create a generation over a fresh anonymous reservation
    ///
    /// # Errors
    /// - `Configuration` if the configuration does not validate
    /// - `HeapInitialization` if reservation or the initial commit fails
    pub fn new(config: OldGenConfig, name: &str, level: usize) -> Result<Self> {
        config.validate()?;
        let collaborators = Collaborators::reserve(&config)?;
        Self::with_collaborators(config, name, level, collaborators)
    }

    /// Create a generation from caller-supplied collaborators
    ///
    /// The virtual space must reserve at least `max_size` bytes; it is
    /// committed up to `initial_size` if it holds less.
    pub fn with_collaborators(
        config: OldGenConfig,
        name: &str,
        level: usize,
        collaborators: Collaborators,
    ) -> Result<Self> {
        config.validate()?;

        let Collaborators {
            mut virtual_space,
            remembered_set,
            mut start_index,
        } = collaborators;

        if virtual_space.alignment() != config.alignment {
            return Err(OldGenError::HeapInitialization(format!(
                "virtual space alignment {} differs from configured {}",
                virtual_space.alignment(),
                config.alignment
            )));
        }
        if virtual_space.reserved_size() < config.max_size {
            return Err(OldGenError::HeapInitialization(format!(
                "reserved {} bytes, need {}",
                virtual_space.reserved_size(),
                config.max_size
            )));
        }

        let committed = virtual_space.committed_size();
        if committed < config.initial_size
            && !virtual_space.expand_by(config.initial_size - committed)
        {
            return Err(OldGenError::HeapInitialization(format!(
                "could not commit initial {} bytes",
                config.initial_size
            )));
        }

        let reserved = virtual_space.reserved_region();
        let whole_heap = remembered_set.whole_heap();
        crate::guarantee!(
            remembered_set.is_card_aligned(reserved.start()),
            "generation start {:#x} must be card aligned",
            reserved.start()
        );
        crate::guarantee!(
            reserved.end() == whole_heap.end() || remembered_set.is_card_aligned(reserved.end()),
            "generation end {:#x} must be card aligned",
            reserved.end()
        );

        start_index.initialize(reserved).map_err(|e| {
            OldGenError::HeapInitialization(format!("could not create object start index: {}", e))
        })?;

        let committed_region = virtual_space.committed_region();
        remembered_set.resize_covered_region(committed_region);
        start_index.set_covered_region(committed_region);

        let workers = WorkerPool::new(config.effective_worker_threads());
        let page_size = config.pretouch_page_size();

        let object_space = BumpSpace::new();
        let setup = config.always_pretouch.then_some(PretouchSetup {
            page_size,
            workers: &workers,
        });
        object_space.initialize(committed_region, true, config.zap_unused_heap_area, setup);

        let cursor = if config.always_pretouch {
            committed_region.end()
        } else {
            committed_region.start()
        };
        let pretouch = AllocationPretouch::new(cursor, page_size, workers.threads());

        let gen_counters = GenerationCounters::new(
            name,
            level,
            1,
            config.min_size,
            config.max_size,
            committed_region.byte_size(),
        );
        let space_counters =
            SpaceCounters::new("object space", config.max_size, committed_region.byte_size());

        let numa_groups = if config.use_numa {
            config.effective_numa_groups()
        } else {
            1
        };

        log::debug!(
            "Initialized {}: reserved {}, committed {} KB, bounds [{} KB, {} KB]",
            name,
            reserved,
            committed_region.byte_size() / 1024,
            config.min_size / 1024,
            config.max_size / 1024
        );

        Ok(Self {
            name: name.to_string(),
            level,
            min_gen_size: config.min_size,
            max_gen_size: config.max_size,
            config,
            reserved,
            numa_groups,
            virtual_space: Mutex::new(virtual_space),
            remembered_set,
            start_index,
            object_space,
            workers,
            pretouch,
            gen_counters,
            space_counters,
            resize_stats: ResizeStats::new(),
        })
    }

    // === Accessors ===

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn config(&self) -> &OldGenConfig {
        &self.config
    }

    /// Whole reserved range
    pub fn reserved(&self) -> MemRegion {
        self.reserved
    }

    pub fn min_gen_size(&self) -> usize {
        self.min_gen_size
    }

    pub fn max_gen_size(&self) -> usize {
        self.max_gen_size
    }

    pub fn object_space(&self) -> &BumpSpace {
        &self.object_space
    }

    pub fn start_array(&self) -> &dyn ObjectStartIndex {
        self.start_index.as_ref()
    }

    pub fn card_table(&self) -> &dyn RememberedSet {
        self.remembered_set.as_ref()
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.workers
    }

    /// Current pretouch cursor
    pub fn next_pretouch(&self) -> usize {
        self.pretouch.next()
    }

    pub fn pretouch(&self) -> &AllocationPretouch {
        &self.pretouch
    }

    pub fn generation_counters(&self) -> &GenerationCounters {
        &self.gen_counters
    }

    pub fn space_counters(&self) -> &SpaceCounters {
        &self.space_counters
    }

    pub fn resize_stats(&self) -> &ResizeStats {
        &self.resize_stats
    }

    // === Sizes ===

    /// Committed bytes
    pub fn capacity_in_bytes(&self) -> usize {
        self.object_space.capacity_in_bytes()
    }

    pub fn used_in_bytes(&self) -> usize {
        self.object_space.used_in_bytes()
    }

    pub fn free_in_bytes(&self) -> usize {
        self.object_space.free_in_bytes()
    }

    /// Whether any memory is committed
    pub fn is_allocated(&self) -> bool {
        self.capacity_in_bytes() != 0
    }

    pub fn is_in(&self, addr: usize) -> bool {
        self.object_space.contains(addr)
    }

    pub fn is_in_reserved(&self, addr: usize) -> bool {
        self.reserved.contains(addr)
    }

    // === Allocation ===

    /// Allocate `word_size` words without growing
    ///
    /// On success the object header is written, the start recorded in the
    /// object-start index, and the pretouch hook run.
    pub fn cas_allocate_noexpand(&self, word_size: usize) -> Option<usize> {
        debug_assert!(
            word_size >= MIN_OBJECT_WORDS,
            "allocating {} words, below the minimum object size",
            word_size
        );

        let addr = self.object_space.cas_allocate(word_size)?;
        // SAFETY: the block was just handed out to this thread.
        unsafe { write_header(addr, word_size * HEAP_WORD_SIZE) };
        self.start_index.allocate_block(addr);
        self.pretouch_during_allocation(addr, word_size);
        Some(addr)
    }

    /// Allocate, growing the generation while that makes room
    ///
    /// # Errors
    /// - `InvalidArgument` for requests below the minimum object size
    /// - `OutOfMemory` once the generation cannot grow any further
    pub fn allocate(&self, word_size: usize) -> Result<usize> {
        if word_size < MIN_OBJECT_WORDS {
            return Err(OldGenError::InvalidArgument(format!(
                "object of {} words is below the minimum of {}",
                word_size, MIN_OBJECT_WORDS
            )));
        }

        loop {
            if let Some(addr) = self.cas_allocate_noexpand(word_size) {
                return Ok(addr);
            }
            if !self.expand_for_allocate(word_size) {
                return Err(OldGenError::OutOfMemory {
                    requested: word_size.saturating_mul(HEAP_WORD_SIZE),
                    available: self.free_in_bytes(),
                });
            }
        }
    }

    /// Grow by at least `word_size` words, then allocate once
    pub fn expand_and_allocate(&self, word_size: usize) -> Option<usize> {
        {
            let mut guard = self.lock_for_expand();
            self.expand(&mut guard, word_size.saturating_mul(HEAP_WORD_SIZE));
        }
        self.expand_to_allocate_delay();
        self.cas_allocate_noexpand(word_size)
    }

    /// Grow so an allocation of `word_size` words can succeed
    ///
    /// Rechecks free space under the expand lock so concurrent failures do
    /// not all expand. Returns `false` if growing failed.
    pub fn expand_for_allocate(&self, word_size: usize) -> bool {
        debug_assert!(word_size > 0, "allocating zero words?");
        let result = {
            let mut guard = self.lock_for_expand();
            if self.object_space.free_in_bytes() / HEAP_WORD_SIZE < word_size {
                self.expand(&mut guard, word_size.saturating_mul(HEAP_WORD_SIZE))
            } else {
                true
            }
        };
        self.expand_to_allocate_delay();
        result
    }

    fn expand_to_allocate_delay(&self) {
        if self.config.expand_to_allocate_delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(
                self.config.expand_to_allocate_delay_ms,
            ));
        }
    }

    /// Pretouch hook for an allocation of `word_size` words at `addr`
    pub fn pretouch_during_allocation(&self, addr: usize, word_size: usize) {
        self.pretouch.on_allocation(
            addr,
            word_size.saturating_mul(HEAP_WORD_SIZE),
            self.object_space.end(),
        );
    }
}

impl std::fmt::Debug for OldGen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OldGen")
            .field("name", &self.name)
            .field("reserved", &self.reserved)
            .field("space", &self.object_space.region())
            .field("top", &format_args!("{:#x}", self.object_space.top()))
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::util::constants::MB;

    pub const ALIGN: usize = 64 * 1024;

    /// Small generation: min 1MB, initial 4MB, max 16MB
    pub fn small_config() -> OldGenConfig {
        let alignment = ALIGN.max(crate::heap::page::get_page_size());
        OldGenConfig {
            min_size: MB,
            initial_size: 4 * MB,
            max_size: 16 * MB,
            alignment,
            worker_threads: Some(2),
            zap_unused_heap_area: false,
            ..Default::default()
        }
    }

    pub fn small_gen() -> OldGen {
        OldGen::new(small_config(), "old", 1).unwrap()
    }
}
