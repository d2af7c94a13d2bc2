//! Timer utilities
//!
//! Provides timing and measurement helpers.

use std::time::{Duration, Instant};

/// Simple timer for measuring elapsed time
#[derive(Debug)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Create and start a new timer
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Format a duration as whole minutes and seconds, e.g. `2m5s`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}m{}s", secs / 60, secs % 60)
}
