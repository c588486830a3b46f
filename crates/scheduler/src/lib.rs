//! Debounced save scheduling for autosave
//!
//! This crate provides:
//! - Per-document debounce timers (50-10000ms configurable)
//! - Change coalescing with cancel-then-rearm semantics
//! - Bounded save execution (30s) with rate-limited failure notifications
//! - Stale-entry sweeping and a periodic health log

pub mod debounce;
pub mod host;
pub mod rate_limit;
pub mod status;
pub mod sweeper;

#[cfg(test)]
mod testing;

// Re-exports
pub use debounce::{PendingSave, SaveAllReport, SaveOutcome, Scheduler, WeakScheduler, SAVE_TIMEOUT};
pub use host::{DocumentHost, HostError, NotificationLevel, NullPresenter, Presenter, SaveError, SaveExecutor};
pub use rate_limit::FailureRateLimiter;
pub use status::StatusSnapshot;
pub use sweeper::{HealthReporter, StaleEntrySweeper};
