//! Configuration Module - Old Generation Tuning Parameters
//!
//! Manages all configuration parameters for the old generation.
//! Sizing bounds, growth granularity and the debug knobs that affect how
//! newly committed memory is prepared all live here.

use crate::heap::{numa, page};
use crate::object::start_array;

/// Main configuration for the old generation
///
/// Most parameters have sensible defaults.
///
/// # Examples
///
/// ```rust
/// use oldgen::OldGenConfig;
///
/// // Use default configuration
/// let config = OldGenConfig::default();
///
/// // Small generation for tests
/// let config = OldGenConfig {
///     min_size: 1024 * 1024,
///     initial_size: 4 * 1024 * 1024,
///     max_size: 16 * 1024 * 1024,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct OldGenConfig {
    /// Minimum committed size in bytes
    ///
    /// `resize` never shrinks the generation below this size.
    /// Default: 4MB
    pub min_size: usize,

    /// Maximum committed size in bytes
    ///
    /// The whole range is reserved up front; the generation can never
    /// commit more than this.
    /// Default: 1/4 of physical memory, capped at 32GB
    pub max_size: usize,

    /// Committed size at startup
    ///
    /// Default: max(min_size, max_size / 64)
    pub initial_size: usize,

    /// Commit granularity in bytes
    ///
    /// Every committed size is a multiple of this. Must be a power of two
    /// and at least the system page size.
    /// Default: 64KB (or the page size if larger)
    pub alignment: usize,

    /// Minimum expansion in bytes
    ///
    /// Small expansion requests are rounded up to this to avoid expand
    /// storms.
    /// Default: 128KB
    pub min_heap_delta_bytes: usize,

    /// Enable NUMA-aware expansion
    ///
    /// When enabled, every expansion commits at least one alignment unit
    /// per locality group.
    /// Default: false
    pub use_numa: bool,

    /// Number of NUMA locality groups
    ///
    /// If None, detected from the system.
    /// Default: None
    pub numa_groups: Option<usize>,

    /// Enable large pages for the pretouch stride
    ///
    /// Default: false
    pub use_large_pages: bool,

    /// Large page size to use
    ///
    /// Default: 2MB
    pub large_page_size: usize,

    /// Touch every page as soon as it is committed
    ///
    /// Default: false
    pub always_pretouch: bool,

    /// Fill unused memory with a recognizable pattern
    ///
    /// Catches reads of uninitialized memory. Expensive.
    /// Default: true in debug builds
    pub zap_unused_heap_area: bool,

    /// Sleep after each expand-for-allocate (milliseconds)
    ///
    /// Diagnostic knob for widening race windows in tests. 0 disables it.
    /// Default: 0
    pub expand_to_allocate_delay_ms: u64,

    /// Number of worker threads
    ///
    /// Sizes the pretouch horizon and parallel space setup.
    /// If None, auto-detects based on CPU cores.
    /// Default: Auto-detect
    pub worker_threads: Option<usize>,

    /// Block size for block-parallel iteration (bytes)
    ///
    /// Must be a multiple of the object-start index block size.
    /// Default: 1MB
    pub iterate_block_size: usize,

    /// Maintain performance counters
    ///
    /// Default: true
    pub use_perf_data: bool,
}

impl Default for OldGenConfig {
    /// Default configuration for the old generation
    fn default() -> Self {
        let alignment = DEFAULT_ALIGNMENT.max(page::get_page_size());
        let max_size = align_down(calculate_max_size(get_total_memory()), alignment).max(alignment);
        let min_size = align_down(4 * MB, alignment).max(alignment).min(max_size);
        let initial_size = align_down(max_size / 64, alignment).max(min_size);

        OldGenConfig {
            // Sizing
            min_size,
            max_size,
            initial_size,
            alignment,
            min_heap_delta_bytes: 128 * KB,

            // NUMA
            use_numa: false,
            numa_groups: None,

            // Pages
            use_large_pages: false,
            large_page_size: 2 * MB,
            always_pretouch: false,

            // Debug
            zap_unused_heap_area: cfg!(debug_assertions),
            expand_to_allocate_delay_ms: 0,

            // Parallelism
            worker_threads: Some(default_worker_threads()),
            iterate_block_size: MB,

            use_perf_data: true,
        }
    }
}

impl OldGenConfig {
    /// Validate configuration
    ///
    /// Checks if all values are in valid ranges.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use oldgen::OldGenConfig;
    ///
    /// let config = OldGenConfig {
    ///     max_size: 0,  // Invalid!
    ///     ..Default::default()
    /// };
    ///
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Alignment validation
        if !self.alignment.is_power_of_two() {
            return Err(ConfigError::InvalidAlignment(format!(
                "alignment ({}) must be a power of two",
                self.alignment
            )));
        }

        if self.alignment < page::get_page_size() {
            return Err(ConfigError::InvalidAlignment(format!(
                "alignment ({}) must be at least the page size ({})",
                self.alignment,
                page::get_page_size()
            )));
        }

        // Size validation
        if self.max_size == 0 {
            return Err(ConfigError::InvalidSize(
                "max_size must be > 0".to_string(),
            ));
        }

        if self.min_size > self.max_size {
            return Err(ConfigError::InvalidSize(
                "min_size cannot exceed max_size".to_string(),
            ));
        }

        if self.initial_size < self.min_size || self.initial_size > self.max_size {
            return Err(ConfigError::InvalidSize(
                "initial_size must be between min_size and max_size".to_string(),
            ));
        }

        for (name, size) in [
            ("min_size", self.min_size),
            ("max_size", self.max_size),
            ("initial_size", self.initial_size),
        ] {
            if size % self.alignment != 0 {
                return Err(ConfigError::InvalidSize(format!(
                    "{} ({}) must be a multiple of alignment ({})",
                    name, size, self.alignment
                )));
            }
        }

        // Iteration block validation
        if self.iterate_block_size == 0
            || self.iterate_block_size % start_array::BLOCK_SIZE != 0
        {
            return Err(ConfigError::InvalidBlockSize(format!(
                "iterate_block_size ({}) must be a non-zero multiple of {}",
                self.iterate_block_size,
                start_array::BLOCK_SIZE
            )));
        }

        // Worker validation
        if let Some(threads) = self.worker_threads {
            if threads == 0 {
                return Err(ConfigError::InvalidWorkerThreads(
                    "worker_threads must be > 0".to_string(),
                ));
            }
        }

        if let Some(groups) = self.numa_groups {
            if groups == 0 {
                return Err(ConfigError::InvalidNuma(
                    "numa_groups must be > 0".to_string(),
                ));
            }
        }

        // Large page validation
        if self.use_large_pages && !self.large_page_size.is_power_of_two() {
            return Err(ConfigError::InvalidLargePages(format!(
                "large_page_size ({}) must be a power of two",
                self.large_page_size
            )));
        }

        Ok(())
    }

    /// Build configuration from environment variables
    ///
    /// Overrides defaults with environment variables:
    /// - OLDGEN_MAX_SIZE
    /// - OLDGEN_MIN_SIZE
    /// - OLDGEN_INITIAL_SIZE
    /// - OLDGEN_WORKER_THREADS
    /// - OLDGEN_ALWAYS_PRETOUCH
    /// - OLDGEN_ZAP_UNUSED
    /// - OLDGEN_EXPAND_DELAY_MS
    ///
    /// # Examples
    ///
    /// ```bash
    /// export OLDGEN_MAX_SIZE=268435456  # 256MB
    /// export OLDGEN_ALWAYS_PRETOUCH=1
    /// ```
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(size) = env_parse::<usize>("OLDGEN_MAX_SIZE") {
            config.max_size = size;
        }

        if let Some(size) = env_parse::<usize>("OLDGEN_MIN_SIZE") {
            config.min_size = size;
        }

        if let Some(size) = env_parse::<usize>("OLDGEN_INITIAL_SIZE") {
            config.initial_size = size;
        }

        if let Some(threads) = env_parse::<usize>("OLDGEN_WORKER_THREADS") {
            config.worker_threads = Some(threads);
        }

        if let Some(delay) = env_parse::<u64>("OLDGEN_EXPAND_DELAY_MS") {
            config.expand_to_allocate_delay_ms = delay;
        }

        if let Ok(val) = std::env::var("OLDGEN_ALWAYS_PRETOUCH") {
            config.always_pretouch = env_flag(&val);
        }

        if let Ok(val) = std::env::var("OLDGEN_ZAP_UNUSED") {
            config.zap_unused_heap_area = env_flag(&val);
        }

        config
    }

    /// Worker thread count, resolving auto-detection
    pub fn effective_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(default_worker_threads)
    }

    /// Locality group count used to size NUMA expansions
    pub fn effective_numa_groups(&self) -> usize {
        self.numa_groups.unwrap_or_else(numa::detect_numa_nodes)
    }

    /// Page size used as the pretouch stride
    pub fn pretouch_page_size(&self) -> usize {
        if self.use_large_pages {
            self.large_page_size
        } else {
            page::get_page_size()
        }
    }
}

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Invalid alignment: {0}")]
    InvalidAlignment(String),

    #[error("Invalid iterate block size: {0}")]
    InvalidBlockSize(String),

    #[error("Invalid worker threads: {0}")]
    InvalidWorkerThreads(String),

    #[error("Invalid NUMA configuration: {0}")]
    InvalidNuma(String),

    #[error("Invalid large pages: {0}")]
    InvalidLargePages(String),
}

// ============================================================================
// CONSTANTS & HELPERS
// ============================================================================

const KB: usize = 1024;
const MB: usize = 1024 * 1024;
const GB: usize = 1024 * 1024 * 1024;

const DEFAULT_ALIGNMENT: usize = 64 * KB;

fn align_down(value: usize, alignment: usize) -> usize {
    value & !(alignment - 1)
}

fn default_worker_threads() -> usize {
    num_cpus::get().clamp(1, 8)
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.parse().ok()
}

fn env_flag(val: &str) -> bool {
    val == "1" || val.eq_ignore_ascii_case("true")
}

/// Get total physical memory in bytes
fn get_total_memory() -> usize {
    #[cfg(target_os = "linux")]
    {
        if let Ok(meminfo) = std::fs::read_to_string("/proc/meminfo") {
            for line in meminfo.lines() {
                if line.starts_with("MemTotal:") {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    if parts.len() >= 2 {
                        if let Ok(kb) = parts[1].parse::<usize>() {
                            return kb * KB;
                        }
                    }
                }
            }
        }
    }

    8 * GB
}

/// Old generation gets a quarter of physical memory
fn calculate_max_size(total_memory: usize) -> usize {
    (total_memory / 4).min(32 * GB)
}
