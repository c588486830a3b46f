//! Per-document debounced save scheduling
//!
//! Each document with a pending save owns exactly one timer entry. A new
//! change cancels the entry and arms a fresh one, so a burst of edits
//! produces a single save once the document has been quiet for the
//! configured delay.
//!
//! Timer tasks never trust that they are still wanted. When the delay
//! elapses the task re-checks, under the state lock, that the scheduler is
//! not shutting down and that its own entry (same generation) is still in the
//! table. From then on the entry is in flight and can no longer be aborted;
//! it is removed when the save completes, whatever the outcome.

use crate::host::{DocumentHost, HostError, NotificationLevel, Presenter, SaveError, SaveExecutor};
use crate::rate_limit::FailureRateLimiter;
use crate::status::StatusSnapshot;
use crate::sweeper::{HealthReporter, StaleEntrySweeper};
use ahash::AHashMap;
use autosave_core::eligibility::{self, Ineligible};
use autosave_core::{AutosaveConfig, ResourceKey, SaveStats, StatsSnapshot};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Upper bound on a single save before it counts as failed
pub const SAVE_TIMEOUT: Duration = Duration::from_secs(30);

/// Pending save for one document
#[derive(Debug)]
struct TimerEntry {
    /// Distinguishes this arming from any later one for the same document
    generation: u64,
    /// Change events coalesced since the entry was first armed
    change_count: u64,
    created_at: Instant,
    /// `None` once the delay has elapsed and the save is in flight
    handle: Option<AbortHandle>,
}

impl TimerEntry {
    fn is_in_flight(&self) -> bool {
        self.handle.is_none()
    }

    fn cancel(self) {
        if let Some(handle) = self.handle {
            handle.abort();
        }
    }
}

/// Public view of a timer entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSave {
    pub key: ResourceKey,
    pub change_count: u64,
    pub age: Duration,
    pub in_flight: bool,
}

/// Result of a single save attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Document was already clean or closed; nothing to do
    AlreadySaved,
    Failed,
}

impl SaveOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// Summary of a save-all run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveAllReport {
    pub eligible: usize,
    pub succeeded: usize,
    pub failed: usize,
}

struct State {
    timers: AHashMap<ResourceKey, TimerEntry>,
    stats: SaveStats,
    limiter: FailureRateLimiter,
    /// Sweeper and health tasks
    background: Vec<JoinHandle<()>>,
}

struct Inner {
    host: Arc<dyn DocumentHost>,
    executor: Arc<dyn SaveExecutor>,
    presenter: Arc<dyn Presenter>,
    config: RwLock<AutosaveConfig>,
    state: Mutex<State>,
    disposing: AtomicBool,
    next_generation: AtomicU64,
}

/// Debounced save scheduler
///
/// Cheap to clone; all clones share the same timer table and statistics.
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

/// Non-owning handle used by background loops
#[derive(Clone)]
pub struct WeakScheduler {
    inner: Weak<Inner>,
}

impl WeakScheduler {
    pub fn upgrade(&self) -> Option<Scheduler> {
        self.inner.upgrade().map(|inner| Scheduler { inner })
    }
}

/// Removes an in-flight entry when the save finishes, on every exit path
struct InFlightGuard<'a> {
    inner: &'a Inner,
    key: &'a ResourceKey,
    generation: u64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        // A newer arming for the same document must survive
        if state
            .timers
            .get(self.key)
            .is_some_and(|entry| entry.generation == self.generation)
        {
            state.timers.remove(self.key);
        }
    }
}

impl Scheduler {
    pub fn new(
        config: AutosaveConfig,
        host: Arc<dyn DocumentHost>,
        executor: Arc<dyn SaveExecutor>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                host,
                executor,
                presenter,
                config: RwLock::new(config),
                state: Mutex::new(State {
                    timers: AHashMap::new(),
                    stats: SaveStats::new(Utc::now()),
                    limiter: FailureRateLimiter::default(),
                    background: Vec::new(),
                }),
                disposing: AtomicBool::new(false),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Start the stale-entry sweeper and the periodic health log
    pub fn spawn_maintenance(&self) {
        let sweeper = StaleEntrySweeper::new(self.downgrade());
        let health = HealthReporter::new(self.downgrade());

        let handles = [tokio::spawn(sweeper.run()), tokio::spawn(health.run())];
        self.inner.state.lock().background.extend(handles);
    }

    pub fn downgrade(&self) -> WeakScheduler {
        WeakScheduler {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// A document changed; `edits` is the number of edits in the batch
    pub fn on_change(&self, key: &ResourceKey, edits: usize) {
        if self.is_disposing() {
            return;
        }

        let config = self.config();
        if !config.enabled {
            return;
        }

        // Cancel first: a change that turns out ineligible still stops the old timer
        // An in-flight save already covers earlier changes, so counting restarts
        let carried = self.cancel_entry(key).map_or(0, |entry| {
            if entry.in_flight {
                0
            } else {
                entry.change_count
            }
        });

        let snapshot = match self.inner.host.snapshot(key) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!("Not scheduling {}: {}", key, e);
                self.refresh_status();
                return;
            }
        };

        if let Err(reason) = eligibility::check(&snapshot, &config) {
            match reason {
                Ineligible::TooLarge { .. } => info!("Not scheduling {}: {}", key, reason),
                _ => debug!("Not scheduling {}: {}", key, reason),
            }
            self.refresh_status();
            return;
        }

        if config.save_on_every_change {
            debug!("Saving {} immediately ({} edits)", key, edits);
            let scheduler = self.clone();
            let key = key.clone();
            tokio::spawn(async move {
                scheduler.execute_save(&key).await;
                scheduler.refresh_status();
            });
            return;
        }

        let change_count = carried + 1;
        debug!(
            "Scheduling save of {} in {}ms ({} edits, {} changes coalesced)",
            key, config.delay_ms, edits, change_count
        );
        self.arm(key.clone(), change_count, config.delay());
        self.refresh_status();
    }

    /// A document was closed; it must never be the target of a deferred save
    pub fn on_close(&self, key: &ResourceKey) {
        if self.cancel_entry(key).is_some() {
            debug!("Cancelled pending save of closed document {}", key);
        }
        self.refresh_status();
    }

    /// A document was saved outside the scheduler, making any pending save moot
    pub fn on_external_save(&self, key: &ResourceKey) {
        if self.cancel_entry(key).is_some() {
            debug!("Cancelled pending save of {} (saved externally)", key);
        }
        self.refresh_status();
    }

    /// Cancel every pending save
    pub fn on_global_disable(&self) {
        let cancelled = self.cancel_all();
        info!("Autosave disabled, cancelled {} pending saves", cancelled);
        self.refresh_status();
    }

    /// Workspace folders were added or removed
    pub fn workspace_changed(&self, added: &[String], removed: &[String]) {
        info!(
            "Workspace folders changed: {} added, {} removed",
            added.len(),
            removed.len()
        );
        for folder in added {
            debug!("  + {}", folder);
        }
        for folder in removed {
            debug!("  - {}", folder);
        }
    }

    /// Apply a new settings table
    ///
    /// Invalid values are clamped or defaulted, and all problems are shown
    /// to the user as one warning.
    pub fn config_changed(&self, table: &toml::Table) {
        let (config, warnings) = AutosaveConfig::from_table(table);

        if !warnings.is_empty() {
            for warning in &warnings {
                warn!("Invalid autosave setting: {}", warning);
            }
            let details: Vec<String> = warnings.iter().map(ToString::to_string).collect();
            self.inner.presenter.notify(
                NotificationLevel::Warning,
                &format!("Autosave configuration has invalid values: {}", details.join("; ")),
            );
        }

        let was_enabled = {
            let mut current = self.inner.config.write();
            let was_enabled = current.enabled;
            *current = config;
            was_enabled
        };

        info!("Autosave configuration reloaded");

        if was_enabled && !self.config().enabled {
            self.on_global_disable();
        } else {
            self.refresh_status();
        }
    }

    /// Flip the global enabled flag and return the new state
    pub fn toggle_enabled(&self) -> bool {
        let enabled = !self.config().enabled;
        self.set_enabled(enabled);

        if self.config().show_notifications {
            let message = if enabled {
                "Autosave enabled"
            } else {
                "Autosave disabled"
            };
            self.inner.presenter.notify(NotificationLevel::Info, message);
        }

        enabled
    }

    pub fn set_enabled(&self, enabled: bool) {
        let was_enabled = {
            let mut config = self.inner.config.write();
            std::mem::replace(&mut config.enabled, enabled)
        };

        if was_enabled && !enabled {
            self.on_global_disable();
        } else {
            if enabled && !was_enabled {
                info!("Autosave enabled");
            }
            self.refresh_status();
        }
    }

    /// Save every dirty, eligible document now
    ///
    /// Each document gets its own attempt; failures are counted, never
    /// abort the batch.
    pub async fn save_all_now(&self) -> SaveAllReport {
        if self.is_disposing() {
            return SaveAllReport::default();
        }

        let config = self.config();
        let candidates: Vec<ResourceKey> = self
            .inner
            .host
            .dirty_documents()
            .into_iter()
            .filter(|doc| eligibility::is_eligible(doc, &config))
            .map(|doc| doc.key)
            .collect();

        let mut report = SaveAllReport {
            eligible: candidates.len(),
            ..SaveAllReport::default()
        };

        for key in &candidates {
            self.cancel_entry(key);
            if self.execute_save(key).await.is_success() {
                report.succeeded += 1;
            } else {
                report.failed += 1;
            }
        }

        info!(
            "Saved {}/{} eligible documents ({} failed)",
            report.succeeded, report.eligible, report.failed
        );

        if config.show_notifications {
            self.inner.presenter.notify(
                NotificationLevel::Info,
                &format!("Saved {} of {} documents", report.succeeded, report.eligible),
            );
        }

        self.refresh_status();
        report
    }

    pub fn reset_stats(&self) {
        self.inner.state.lock().stats.reset(Utc::now());
        info!("Autosave statistics reset");
        self.refresh_status();
    }

    pub fn config(&self) -> AutosaveConfig {
        self.inner.config.read().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.config.read().enabled
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.state.lock().stats.snapshot()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.state.lock().timers.len()
    }

    /// Every timer entry, sorted by key
    pub fn pending(&self) -> Vec<PendingSave> {
        let state = self.inner.state.lock();
        let now = Instant::now();

        let mut pending: Vec<PendingSave> = state
            .timers
            .iter()
            .map(|(key, entry)| PendingSave {
                key: key.clone(),
                change_count: entry.change_count,
                age: now.saturating_duration_since(entry.created_at),
                in_flight: entry.is_in_flight(),
            })
            .collect();
        pending.sort_by(|a, b| a.key.cmp(&b.key));
        pending
    }

    pub fn status(&self) -> StatusSnapshot {
        let enabled = self.is_enabled();
        let state = self.inner.state.lock();
        let stats = state.stats.snapshot();

        StatusSnapshot {
            enabled,
            pending_count: state.timers.len(),
            success_rate: stats.success_rate(),
            last_save: stats.last_success,
        }
    }

    /// Stop scheduling, cancel every pending save and tear down background tasks
    ///
    /// The disposing flag goes up first so no timer task that wakes during
    /// teardown can get past its guard.
    pub fn shutdown(&self) {
        if self.inner.disposing.swap(true, Ordering::SeqCst) {
            return;
        }

        let cancelled = self.cancel_all();
        let background = std::mem::take(&mut self.inner.state.lock().background);
        for handle in background {
            handle.abort();
        }

        info!("Autosave scheduler stopped ({} pending saves cancelled)", cancelled);
        self.inner.presenter.hide_status();
    }

    pub fn is_disposing(&self) -> bool {
        self.inner.disposing.load(Ordering::SeqCst)
    }

    /// Remove entries older than `max_age` without saving them
    pub(crate) fn sweep_stale(&self, max_age: Duration) -> usize {
        let stale: Vec<(ResourceKey, TimerEntry)> = {
            let mut state = self.inner.state.lock();
            let now = Instant::now();

            let keys: Vec<ResourceKey> = state
                .timers
                .iter()
                .filter(|(_, entry)| now.saturating_duration_since(entry.created_at) > max_age)
                .map(|(key, _)| key.clone())
                .collect();

            keys.into_iter()
                .filter_map(|key| state.timers.remove(&key).map(|entry| (key, entry)))
                .collect()
        };

        let removed = stale.len();
        for (key, entry) in stale {
            warn!(
                "Removing stale save timer for {} ({} changes, in flight: {})",
                key,
                entry.change_count,
                entry.is_in_flight()
            );
            entry.cancel();
        }

        if removed > 0 {
            self.refresh_status();
        }
        removed
    }

    fn arm(&self, key: ResourceKey, change_count: u64, delay: Duration) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);

        let mut state = self.inner.state.lock();
        // Checked under the lock so shutdown cannot miss this entry
        if self.is_disposing() {
            return;
        }

        let scheduler = self.clone();
        let task_key = key.clone();
        // The task cannot pass its guard until this lock is released and the entry is in place
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            scheduler.fire(&task_key, generation).await;
        });

        let entry = TimerEntry {
            generation,
            change_count,
            created_at: Instant::now(),
            handle: Some(task.abort_handle()),
        };
        if let Some(previous) = state.timers.insert(key, entry) {
            previous.cancel();
        }
    }

    async fn fire(&self, key: &ResourceKey, generation: u64) {
        {
            let mut state = self.inner.state.lock();
            if self.is_disposing() {
                return;
            }
            match state.timers.get_mut(key) {
                Some(entry) if entry.generation == generation => {
                    debug!(
                        "Save timer for {} elapsed after {} changes",
                        key, entry.change_count
                    );
                    entry.handle = None;
                }
                _ => return,
            }
        }

        let guard = InFlightGuard {
            inner: &self.inner,
            key,
            generation,
        };
        self.execute_save(key).await;
        drop(guard);

        self.refresh_status();
    }

    /// Save one document, bounded by [`SAVE_TIMEOUT`], and record the outcome
    pub async fn execute_save(&self, key: &ResourceKey) -> SaveOutcome {
        let snapshot = match self.inner.host.snapshot(key) {
            Ok(snapshot) => snapshot,
            Err(HostError::NotFound(_)) => {
                debug!("Skipping save of {}: document is gone", key);
                return SaveOutcome::AlreadySaved;
            }
            Err(e @ HostError::Unavailable(_)) => {
                return self.record_failure(key, &SaveError::Host(e));
            }
        };

        if !snapshot.is_dirty || snapshot.is_closed {
            debug!("Skipping save of {}: nothing to save", key);
            return SaveOutcome::AlreadySaved;
        }

        let result = match tokio::time::timeout(SAVE_TIMEOUT, self.inner.executor.save(key)).await {
            Ok(result) => result,
            Err(_) => Err(SaveError::TimedOut(SAVE_TIMEOUT)),
        };

        match result {
            Ok(()) => {
                self.inner.state.lock().stats.record_success(Utc::now());
                info!("Auto-saved {}", key);
                SaveOutcome::Saved
            }
            Err(e) => self.record_failure(key, &e),
        }
    }

    fn record_failure(&self, key: &ResourceKey, error: &SaveError) -> SaveOutcome {
        let show = {
            let mut state = self.inner.state.lock();
            state.stats.record_failure();
            state.limiter.allow(Instant::now())
        };

        warn!("Auto-save of {} failed: {}", key, error);

        if show {
            self.inner.presenter.notify(
                NotificationLevel::Error,
                &format!("Auto-save failed for {}: {}", key, error),
            );
        } else {
            debug!("Suppressed failure notification for {}", key);
        }

        SaveOutcome::Failed
    }

    fn cancel_entry(&self, key: &ResourceKey) -> Option<PendingSave> {
        let entry = self.inner.state.lock().timers.remove(key)?;
        let view = PendingSave {
            key: key.clone(),
            change_count: entry.change_count,
            age: Instant::now().saturating_duration_since(entry.created_at),
            in_flight: entry.is_in_flight(),
        };
        entry.cancel();
        Some(view)
    }

    fn cancel_all(&self) -> usize {
        let entries: Vec<TimerEntry> = self
            .inner
            .state
            .lock()
            .timers
            .drain()
            .map(|(_, entry)| entry)
            .collect();

        let count = entries.len();
        for entry in entries {
            entry.cancel();
        }
        count
    }

    fn refresh_status(&self) {
        if self.is_disposing() {
            return;
        }

        if self.config().show_status_bar {
            self.inner.presenter.show_status(&self.status());
        } else {
            self.inner.presenter.hide_status();
        }
    }

    /// Plant an entry whose timer task is gone, as a leaked entry would be
    #[cfg(test)]
    pub(crate) fn insert_orphan(&self, key: ResourceKey) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        self.inner.state.lock().timers.insert(
            key,
            TimerEntry {
                generation,
                change_count: 1,
                created_at: Instant::now(),
                handle: None,
            },
        );
    }
}
