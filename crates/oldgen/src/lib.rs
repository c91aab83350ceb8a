//! # oldgen - A Growable Old Generation
//!
//! `oldgen` manages the tenured space of a generational heap: a contiguous
//! address range reserved once at startup, of which only a prefix is
//! committed. The committed prefix grows on allocation failure and shrinks
//! when a collector asks for it, always staying within `[min_size, max_size]`.
//!
//! ## Overview
//!
//! - **Lock-free allocation**: a bump pointer advanced by compare-and-swap
//! - **Serialized resizing**: an expand lock owns the virtual space, so only
//!   the holder of its guard can grow or shrink the generation
//! - **Side-table resync**: the card table and the object-start index are
//!   widened before the space publishes its new end
//! - **Allocation pretouch**: a shared cursor lets allocating threads touch
//!   pages just ahead of the allocation frontier
//! - **Block-parallel iteration**: objects are visited in fixed-size blocks
//!   handed out to a worker pool
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use oldgen::{OldGen, OldGenConfig};
//!
//! fn main() -> Result<(), oldgen::OldGenError> {
//!     let config = OldGenConfig::from_env();
//!     let gen = OldGen::new(config, "old", 1)?;
//!
//!     // Allocate 4 words; the generation grows if it has to
//!     let addr = gen.allocate(4)?;
//!     assert!(gen.is_in(addr));
//!
//!     // Ask for 1MB of headroom above the live data
//!     gen.resize(1024 * 1024);
//!
//!     gen.verify();
//!     println!("{}", gen.print_summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Layout
//!
//! ```text
//!  low_boundary                              high           high_boundary
//!  │                                          │                    │
//!  ▼                                          ▼                    ▼
//!  ┌──────────── committed ───────────────────┬──── uncommitted ───┐
//!  │ objects ...          │ free             │                    │
//!  └──────────────────────┴───────────────────┴────────────────────┘
//!  bottom                 top                 end
//! ```
//!
//! ## Thread Safety
//!
//! - `OldGen` is `Send + Sync`
//! - `cas_allocate_noexpand` may race freely with itself and with expansion
//! - `resize`, `shrink` and the iteration entry points expect the caller to
//!   hold the heap lock or to run at a safepoint

pub mod allocator;
pub mod barrier;
pub mod config;
pub mod error;
pub mod generation;
pub mod heap;
pub mod logging;
pub mod object;
pub mod runtime;
pub mod stats;
pub mod util;

pub use config::{ConfigError, OldGenConfig};
pub use error::{OldGenError, Result};
pub use generation::{AllocationPretouch, Collaborators, ExpandGuard, OldGen};
pub use heap::{MemRegion, VirtualSpace};

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_old_gen_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OldGen>();
    }
}
