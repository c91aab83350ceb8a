//! Util Module - Shared Utilities
//!
//! Utilities and helper functions used throughout the crate.

pub mod alignment;
pub mod debug;

pub use alignment::Alignment;

/// Size constants
pub mod constants {
    /// 1 Kilobyte
    pub const KB: usize = 1024;
    /// 1 Megabyte
    pub const MB: usize = 1024 * 1024;
    /// 1 Gigabyte
    pub const GB: usize = 1024 * 1024 * 1024;

    /// Size of a heap word in bytes
    pub const HEAP_WORD_SIZE: usize = 8;
}
