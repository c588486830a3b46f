//! Process-lifetime save statistics
//!
//! Only raw counters are stored. Rates are derived when a snapshot is read.

use chrono::{DateTime, Utc};

/// Running save counters for the current session
#[derive(Debug, Clone)]
pub struct SaveStats {
    total_attempts: u64,
    successful: u64,
    failed: u64,
    last_success: Option<DateTime<Utc>>,
    session_start: DateTime<Utc>,
}

impl SaveStats {
    /// Start a new session at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_attempts: 0,
            successful: 0,
            failed: 0,
            last_success: None,
            session_start: now,
        }
    }

    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.total_attempts += 1;
        self.successful += 1;
        self.last_success = Some(at);
    }

    pub fn record_failure(&mut self) {
        self.total_attempts += 1;
        self.failed += 1;
    }

    /// Zero every counter and restart the session at `now`
    pub fn reset(&mut self, now: DateTime<Utc>) {
        *self = Self::new(now);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total_attempts: self.total_attempts,
            successful: self.successful,
            failed: self.failed,
            last_success: self.last_success,
            session_start: self.session_start,
        }
    }
}

impl Default for SaveStats {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

/// Read-only copy of the counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total_attempts: u64,
    pub successful: u64,
    pub failed: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub session_start: DateTime<Utc>,
}

impl StatsSnapshot {
    /// Percentage of attempts that succeeded (100 when nothing was attempted)
    pub fn success_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            return 100.0;
        }
        self.successful as f64 / self.total_attempts as f64 * 100.0
    }

    /// Successful saves per hour since the session started
    pub fn saves_per_hour(&self, now: DateTime<Utc>) -> f64 {
        let elapsed_ms = (now - self.session_start).num_milliseconds();
        if elapsed_ms <= 0 {
            return 0.0;
        }
        self.successful as f64 * 3_600_000.0 / elapsed_ms as f64
    }
}
