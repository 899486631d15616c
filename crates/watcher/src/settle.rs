//! Settle step before acting on a freshly created file
//!
//! Copies and downloads surface as a creation event long before the last
//! byte is written. The engine waits a fixed delay, then until two
//! consecutive size readings agree.

use std::fs;
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;
use tracing::debug;

/// Default fixed delay
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Default number of stability checks
pub const DEFAULT_SETTLE_CHECKS: u8 = 5;

/// Outcome of waiting on a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// Size stopped changing
    Stable,
    /// Still growing after every check; callers proceed anyway
    Unstable,
    /// The file disappeared
    Gone,
}

#[derive(Debug, Clone)]
pub struct Settler {
    delay: Duration,
    checks: u8,
}

impl Default for Settler {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_DELAY, DEFAULT_SETTLE_CHECKS)
    }
}

impl Settler {
    pub fn new(delay: Duration, checks: u8) -> Self {
        Self {
            delay,
            checks: checks.max(1),
        }
    }

    /// Block until `path` looks complete
    pub fn wait(&self, path: &Path) -> Settled {
        if !self.delay.is_zero() {
            sleep(self.delay);
        }

        for attempt in 0..self.checks {
            // 1. Stat before the pause
            let Ok(before) = fs::metadata(path) else {
                return Settled::Gone;
            };

            // 2. Exponential backoff between readings: 50ms, 100ms, 200ms...
            let backoff_ms = 50u64 << attempt.min(5);
            sleep(Duration::from_millis(backoff_ms));

            // 3. Stat after and compare
            let Ok(after) = fs::metadata(path) else {
                return Settled::Gone;
            };
            if before.len() == after.len() {
                return Settled::Stable;
            }
            debug!(path = %path.display(), attempt, size = after.len(), "file still growing");
        }

        Settled::Unstable
    }
}
