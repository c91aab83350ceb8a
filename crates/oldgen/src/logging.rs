//! Generation Logging and Tracing
//!
//! Two layers:
//! - the `log` facade, used directly by the resize code (`debug!` for
//!   expand/shrink, `trace!` for resize decisions, `warn!` for failures);
//! - a structured event layer (`GenLogger` / `GenEvent`) that keeps a
//!   bounded, timestamped history of resize events and renders them as
//!   human text or JSON.
//!
//! Log Levels:
//! - WARN: Failed expansion
//! - INFO: Generation summaries
//! - DEBUG: Expand and shrink
//! - TRACE: Resize decisions and outcomes

use chrono::{DateTime, Local};
use log::Level;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

/// Generation event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenEvent {
    /// Committed size grew
    Expand {
        name: String,
        old_kb: usize,
        by_kb: usize,
        new_kb: usize,
    },

    /// Committed size shrank
    Shrink {
        name: String,
        old_kb: usize,
        by_kb: usize,
        new_kb: usize,
    },

    /// Inputs and clamped target of a resize request
    ResizeDecision {
        name: String,
        desired_free: usize,
        used: usize,
        capacity: usize,
        target: usize,
        min_size: usize,
        max_size: usize,
    },

    /// Capacity before and after a resize request
    ResizeOutcome {
        name: String,
        capacity_before: usize,
        capacity_after: usize,
    },

    /// Growing to the full reservation failed
    ExpandFailure {
        name: String,
        requested: usize,
        committed: usize,
        reserved: usize,
    },

    /// Generation summary line
    Summary {
        name: String,
        capacity_kb: usize,
        used_kb: usize,
        low: usize,
        high: usize,
        high_boundary: usize,
    },
}

impl GenEvent {
    /// Level the event is reported at
    pub fn level(&self) -> Level {
        match self {
            GenEvent::ExpandFailure { .. } => Level::Warn,
            GenEvent::Summary { .. } => Level::Info,
            GenEvent::Expand { .. } | GenEvent::Shrink { .. } => Level::Debug,
            GenEvent::ResizeDecision { .. } | GenEvent::ResizeOutcome { .. } => Level::Trace,
        }
    }

    /// Human-readable rendering
    pub fn to_human(&self) -> String {
        match self {
            GenEvent::Expand {
                name,
                old_kb,
                by_kb,
                new_kb,
            } => format!(
                "[{}] Expanding from {}K by {}K to {}K",
                name, old_kb, by_kb, new_kb
            ),
            GenEvent::Shrink {
                name,
                old_kb,
                by_kb,
                new_kb,
            } => format!(
                "[{}] Shrinking from {}K by {}K to {}K",
                name, old_kb, by_kb, new_kb
            ),
            GenEvent::ResizeDecision {
                name,
                desired_free,
                used,
                capacity,
                target,
                min_size,
                max_size,
            } => format!(
                "[{}] resize: desired free {} used {} capacity {} target {} (min {} max {})",
                name, desired_free, used, capacity, target, min_size, max_size
            ),
            GenEvent::ResizeOutcome {
                name,
                capacity_before,
                capacity_after,
            } => format!(
                "[{}] resize: capacity {} -> {}",
                name, capacity_before, capacity_after
            ),
            GenEvent::ExpandFailure {
                name,
                requested,
                committed,
                reserved,
            } => format!(
                "[{}] Failed to expand by {} bytes (committed {} of {} reserved)",
                name, requested, committed, reserved
            ),
            GenEvent::Summary {
                name,
                capacity_kb,
                used_kb,
                low,
                high,
                high_boundary,
            } => format!(
                "{} total {}K, used {}K [{:#x}, {:#x}, {:#x})",
                name, capacity_kb, used_kb, low, high, high_boundary
            ),
        }
    }

    /// JSON rendering
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }
}

/// Generation logger configuration
#[derive(Debug, Clone)]
pub struct GenLoggerConfig {
    /// Most verbose level recorded
    pub level: Level,

    /// Forward rendered events to the `log` facade
    pub forward: bool,

    /// Render as JSON instead of human text
    pub json: bool,

    /// Prefix rendered events with a local timestamp
    pub timestamps: bool,

    /// Maximum events kept in history
    pub history_limit: usize,
}

impl Default for GenLoggerConfig {
    fn default() -> Self {
        Self {
            level: Level::Debug,
            forward: true,
            json: false,
            timestamps: true,
            history_limit: 1024,
        }
    }
}

/// Generation Logger - bounded history of generation events
pub struct GenLogger {
    config: GenLoggerConfig,
    events: Mutex<VecDeque<(DateTime<Local>, GenEvent)>>,
    enabled: AtomicBool,
}

impl GenLogger {
    /// Create new logger
    pub fn new(config: GenLoggerConfig) -> Self {
        Self {
            config,
            events: Mutex::new(VecDeque::new()),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Record an event
    pub fn log(&self, event: GenEvent) {
        if !self.is_enabled() {
            return;
        }

        let level = event.level();
        if level > self.config.level {
            return;
        }

        let timestamp = Local::now();

        if self.config.forward && log::log_enabled!(level) {
            log::log!(level, "{}", self.render(&timestamp, &event));
        }

        let mut events = self.events.lock();
        if self.config.history_limit == 0 {
            return;
        }
        while events.len() >= self.config.history_limit {
            events.pop_front();
        }
        events.push_back((timestamp, event));
    }

    /// Render one event per the configured format
    pub fn render(&self, timestamp: &DateTime<Local>, event: &GenEvent) -> String {
        let body = if self.config.json {
            event.to_json()
        } else {
            event.to_human()
        };

        if self.config.timestamps {
            format!("[{}] {}", timestamp.format("%Y-%m-%d %H:%M:%S%.3f"), body)
        } else {
            body
        }
    }

    /// Get all recorded events, oldest first
    pub fn get_events(&self) -> Vec<(DateTime<Local>, GenEvent)> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }
}

impl Default for GenLogger {
    fn default() -> Self {
        Self::new(GenLoggerConfig::default())
    }
}

lazy_static::lazy_static! {
    /// Global generation logger
    static ref GLOBAL_LOGGER: Mutex<GenLogger> = Mutex::new(GenLogger::default());
}

/// Log an event to the global logger
pub fn log_event(event: GenEvent) {
    GLOBAL_LOGGER.lock().log(event);
}

/// Replace the global logger's configuration (clears history)
pub fn configure_logger(config: GenLoggerConfig) {
    *GLOBAL_LOGGER.lock() = GenLogger::new(config);
}

/// Number of events in the global history
pub fn get_event_count() -> usize {
    GLOBAL_LOGGER.lock().event_count()
}

/// Snapshot of the global history
pub fn get_events() -> Vec<(DateTime<Local>, GenEvent)> {
    GLOBAL_LOGGER.lock().get_events()
}
