//! Background maintenance loops
//!
//! The stale-entry sweeper removes timer entries that outlived any sane
//! delay. Under correct cancellation it never finds anything; it catches
//! entries whose timer task was lost. It only cancels, never saves.
//!
//! The health reporter logs a one-line summary at a fixed cadence.

use crate::debounce::WeakScheduler;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// How often the timer table is scanned
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Entries older than this are considered leaked
pub const STALE_THRESHOLD: Duration = Duration::from_secs(5 * 60);

/// How often the health summary is logged
pub const HEALTH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Periodic stale-entry sweeper
pub struct StaleEntrySweeper {
    scheduler: WeakScheduler,

    /// Scan interval (default: 30 seconds)
    interval: Duration,

    /// Maximum entry age (default: 5 minutes)
    max_age: Duration,
}

impl StaleEntrySweeper {
    pub fn new(scheduler: WeakScheduler) -> Self {
        Self::with_timing(scheduler, SWEEP_INTERVAL, STALE_THRESHOLD)
    }

    pub fn with_timing(scheduler: WeakScheduler, interval: Duration, max_age: Duration) -> Self {
        Self {
            scheduler,
            interval,
            max_age,
        }
    }

    /// Run until the scheduler is dropped or shut down
    pub async fn run(self) {
        let mut timer = interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(
            "Starting stale-entry sweeper (interval: {:?}, threshold: {:?})",
            self.interval, self.max_age
        );

        loop {
            timer.tick().await;

            let Some(scheduler) = self.scheduler.upgrade() else {
                break;
            };
            if scheduler.is_disposing() {
                break;
            }

            let removed = scheduler.sweep_stale(self.max_age);
            if removed > 0 {
                warn!("Stale-entry sweep removed {} orphaned save timers", removed);
            }
        }

        debug!("Stale-entry sweeper stopped");
    }
}

/// Periodic health log
pub struct HealthReporter {
    scheduler: WeakScheduler,
    interval: Duration,
}

impl HealthReporter {
    pub fn new(scheduler: WeakScheduler) -> Self {
        Self {
            scheduler,
            interval: HEALTH_INTERVAL,
        }
    }

    pub async fn run(self) {
        let mut timer = interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            timer.tick().await;

            let Some(scheduler) = self.scheduler.upgrade() else {
                break;
            };
            if scheduler.is_disposing() {
                break;
            }

            let stats = scheduler.stats();
            info!(
                "Autosave health: enabled={}, pending={}, attempts={}, failed={}, success={:.1}%",
                scheduler.is_enabled(),
                scheduler.pending_count(),
                stats.total_attempts,
                stats.failed,
                stats.success_rate()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::harness;
    use autosave_core::{AutosaveConfig, ResourceKey};

    async fn advance(d: Duration) {
        tokio::time::sleep(d).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_old_entries() {
        let (scheduler, _host, executor, _) = harness(AutosaveConfig::default());

        scheduler.insert_orphan(ResourceKey::new("old.txt"));
        advance(Duration::from_secs(200)).await;
        scheduler.insert_orphan(ResourceKey::new("young.txt"));
        advance(Duration::from_secs(101)).await;

        assert_eq!(scheduler.sweep_stale(STALE_THRESHOLD), 1);
        let pending = scheduler.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key, ResourceKey::new("young.txt"));
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_orphan_removed_within_one_cycle() {
        let (scheduler, _host, executor, _) = harness(AutosaveConfig::default());
        scheduler.spawn_maintenance();
        scheduler.insert_orphan(ResourceKey::new("leaked.txt"));

        // Just past the threshold the entry is still there until the next sweep
        advance(STALE_THRESHOLD + Duration::from_secs(1)).await;
        advance(SWEEP_INTERVAL).await;

        assert_eq!(scheduler.pending_count(), 0);
        assert_eq!(executor.call_count(), 0);
        assert_eq!(scheduler.stats().total_attempts, 0);
        scheduler.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_exits_when_scheduler_dropped() {
        let (scheduler, _host, _executor, _) = harness(AutosaveConfig::default());
        let sweeper = StaleEntrySweeper::with_timing(
            scheduler.downgrade(),
            Duration::from_secs(1),
            Duration::from_secs(5),
        );
        let task = tokio::spawn(sweeper.run());

        drop(scheduler);
        advance(Duration::from_secs(2)).await;
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_exits_after_shutdown() {
        let (scheduler, _host, _executor, _) = harness(AutosaveConfig::default());
        let sweeper = StaleEntrySweeper::with_timing(
            scheduler.downgrade(),
            Duration::from_secs(1),
            Duration::from_secs(5),
        );
        let task = tokio::spawn(sweeper.run());

        scheduler.shutdown();
        advance(Duration::from_secs(2)).await;
        assert!(task.is_finished());
    }
}
