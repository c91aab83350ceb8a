//! Error Module - Old Generation Error Types
//!
//! Defines all error types used by the old generation.
//!
//! # Error Categories
//!
//! ## Initialization Errors
//! - `HeapInitialization` - Reservation or initial commit failed (fatal)
//! - `Configuration` - Invalid configuration
//!
//! ## Memory Errors
//! - `VirtualMemoryError` - OS mapping call failed
//! - `OutOfMemory` - Generation cannot grow to satisfy a request
//! - `AlignmentError` - Misaligned boundary or size
//!
//! ## Programming Errors
//! - `InvalidArgument` - Invalid function argument
//!
//! Resize failures are not errors: `expand` reports them as `false` and the
//! caller decides whether that becomes an out-of-memory condition.

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for all old generation operations
///
/// # Examples
///
/// ```rust
/// use oldgen::error::OldGenError;
///
/// fn handle_error(err: OldGenError) {
///     match err {
///         OldGenError::HeapInitialization(msg) => {
///             eprintln!("Cannot start heap: {}", msg);
///             std::process::exit(1);
///         }
///         _ => {
///             eprintln!("Other error: {}", err);
///         }
///     }
/// }
/// ```
#[derive(Debug, Error)]
pub enum OldGenError {
    /// Heap initialization failed
    ///
    /// **When returned:** Reserving the maximum address range or committing
    /// the initial size fails
    ///
    /// **Recovery strategy:** Cannot recover - abort startup
    #[error("Heap initialization failed: {0}")]
    HeapInitialization(String),

    /// Virtual memory error
    ///
    /// **When returned:** OS virtual memory API call failed
    ///
    /// **Recovery strategy:** Platform-specific recovery or fail
    #[error("Virtual memory error: {0}")]
    VirtualMemoryError(String),

    /// Out of memory
    ///
    /// **When returned:** The generation could not grow to satisfy an
    /// allocation
    ///
    /// **Recovery strategy:** Collect, then retry or fail the allocation
    #[error("Out of memory: requested {requested} bytes, available {available} bytes")]
    OutOfMemory { requested: usize, available: usize },

    /// Configuration error
    ///
    /// **When returned:** Invalid generation configuration detected
    ///
    /// **Example scenarios:**
    /// - min_size larger than max_size
    /// - alignment not a power of two
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Invalid argument
    ///
    /// **When returned:** Function argument fails validation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Alignment error
    ///
    /// **When returned:** Address not properly aligned for operation
    #[error("Alignment error: address {address:#x} is not aligned to {alignment} bytes")]
    AlignmentError { address: usize, alignment: usize },
}

impl OldGenError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, OldGenError::OutOfMemory { .. })
    }

    /// Check if this error indicates a bug in the code
    pub fn is_bug(&self) -> bool {
        matches!(
            self,
            OldGenError::AlignmentError { .. } | OldGenError::InvalidArgument(_)
        )
    }
}

/// Result type alias for old generation operations
pub type Result<T> = std::result::Result<T, OldGenError>;

/// Hard invariant check, active in every build profile
///
/// Violations are integration bugs; they terminate instead of returning.
#[macro_export]
macro_rules! guarantee {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            panic!("guarantee({}) failed: {}", stringify!($cond), $msg);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !$cond {
            panic!("guarantee({}) failed: {}", stringify!($cond), format!($fmt, $($arg)*));
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let oom = OldGenError::OutOfMemory {
            requested: 64,
            available: 0,
        };
        assert!(oom.is_recoverable());
        assert!(!oom.is_bug());

        let misaligned = OldGenError::AlignmentError {
            address: 0x1001,
            alignment: 8,
        };
        assert!(misaligned.is_bug());
        assert!(!misaligned.is_recoverable());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: OldGenError = ConfigError::InvalidSize("max_size must be > 0".to_string()).into();
        assert!(matches!(err, OldGenError::Configuration(_)));
        assert!(err.to_string().contains("max_size"));
    }

    #[test]
    #[should_panic(expected = "guarantee")]
    fn test_guarantee_panics() {
        guarantee!(1 + 1 == 3, "arithmetic is broken: {}", 2);
    }
}
