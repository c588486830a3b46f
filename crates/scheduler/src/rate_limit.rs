//! Rate limiting for user-visible failure notifications

use std::time::Duration;
use tokio::time::Instant;

/// Window within which at most one failure is surfaced
pub const DEFAULT_FAILURE_WINDOW: Duration = Duration::from_secs(5);

/// Allows one notification per window; the rest are suppressed
#[derive(Debug)]
pub struct FailureRateLimiter {
    window: Duration,
    last_shown: Option<Instant>,
}

impl FailureRateLimiter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_shown: None,
        }
    }

    /// Returns true if a notification may be shown at `now`, and starts a new
    /// window when it does
    pub fn allow(&mut self, now: Instant) -> bool {
        match self.last_shown {
            Some(last) if now.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last_shown = Some(now);
                true
            }
        }
    }
}

impl Default for FailureRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_WINDOW)
    }
}
