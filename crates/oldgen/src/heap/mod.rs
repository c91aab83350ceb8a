//! Heap Management Module - Reserved and Committed Memory
//!
//! The old generation lives in one contiguous reservation sized to its
//! maximum. Only a prefix of it is committed at any time:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Reserved (max_size)                      │
//! │  ┌──────────────────────────────┐                             │
//! │  │     Committed (capacity)     │       Uncommitted           │
//! │  │  ┌────────────┐              │                             │
//! │  │  │ Used (top) │    Free      │                             │
//! │  │  └────────────┘              │                             │
//! │  └──────────────────────────────┘                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Virtual Memory Features:
//! - Reserve large address space upfront
//! - Commit on expand, decommit on shrink
//! - Page geometry and pretouch helpers
//! - NUMA node detection for expansion sizing

pub mod mem_region;
pub mod memory_mapping;
pub mod numa;
pub mod page;
pub mod virtual_space;

pub use mem_region::MemRegion;
pub use memory_mapping::ReservedMapping;
pub use virtual_space::{MappedVirtualSpace, VirtualSpace};
