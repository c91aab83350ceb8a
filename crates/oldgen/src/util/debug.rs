//! Debug Utilities
//!
//! Formatting helpers for diagnostics output.

/// Debug formatter for memory addresses
pub fn format_address(address: usize) -> String {
    format!("0x{:016x}", address)
}

/// Bytes to whole kilobytes, truncating
pub fn to_kb(bytes: usize) -> usize {
    bytes / 1024
}
