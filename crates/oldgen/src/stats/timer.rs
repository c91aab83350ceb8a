//! Resize Timer - Timing Utilities
//!
//! Wall-clock timing for resize work, reported through `log` at trace
//! level when the timer finishes.

use std::time::{Duration, Instant};

/// GcTimer - times one labelled phase
pub struct GcTimer {
    label: &'static str,
    start: Instant,
}

impl GcTimer {
    /// Start timing `label`
    pub fn start(label: &'static str) -> Self {
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get elapsed microseconds
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed().as_micros() as u64
    }

    /// Stop the timer, log the phase and return its duration
    pub fn finish(self) -> Duration {
        let elapsed = self.elapsed();
        log::trace!("{} took {}us", self.label, elapsed.as_micros());
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_measures() {
        let timer = GcTimer::start("expand");
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(timer.label(), "expand");
        assert!(timer.elapsed_us() >= 1000);
        assert!(timer.finish() >= Duration::from_millis(2));
    }
}
