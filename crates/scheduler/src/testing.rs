//! In-memory host, executor and presenter for scheduler tests

use crate::host::{DocumentHost, HostError, NotificationLevel, Presenter, SaveError, SaveExecutor};
use crate::status::StatusSnapshot;
use crate::Scheduler;
use async_trait::async_trait;
use autosave_core::{AutosaveConfig, DocumentSnapshot, ResourceKey};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
pub struct FakeHost {
    docs: DashMap<ResourceKey, DocumentSnapshot>,
}

impl FakeHost {
    /// Replace the document's text and mark it dirty
    pub fn edit(&self, location: &str, text: &str) -> ResourceKey {
        let snapshot = DocumentSnapshot::from_text(location, text, true);
        let key = snapshot.key.clone();
        self.docs.insert(key.clone(), snapshot);
        key
    }

    pub fn mark_clean(&self, key: &ResourceKey) {
        if let Some(mut doc) = self.docs.get_mut(key) {
            doc.is_dirty = false;
        }
    }
}

impl DocumentHost for FakeHost {
    fn snapshot(&self, key: &ResourceKey) -> Result<DocumentSnapshot, HostError> {
        self.docs
            .get(key)
            .map(|doc| doc.clone())
            .ok_or_else(|| HostError::NotFound(key.clone()))
    }

    fn dirty_documents(&self) -> Vec<DocumentSnapshot> {
        let mut dirty: Vec<DocumentSnapshot> = self
            .docs
            .iter()
            .filter(|doc| doc.is_dirty && !doc.is_closed)
            .map(|doc| doc.clone())
            .collect();
        dirty.sort_by(|a, b| a.key.cmp(&b.key));
        dirty
    }
}

/// Records every call; succeeds and marks the document clean unless told to fail
pub struct FakeExecutor {
    host: Arc<FakeHost>,
    calls: Mutex<Vec<(ResourceKey, Instant)>>,
    saved: Mutex<Vec<ResourceKey>>,
    failing: Mutex<HashSet<ResourceKey>>,
    latency: Mutex<Duration>,
}

impl FakeExecutor {
    pub fn new(host: Arc<FakeHost>) -> Self {
        Self {
            host,
            calls: Mutex::new(Vec::new()),
            saved: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            latency: Mutex::new(Duration::ZERO),
        }
    }

    pub fn fail_on(&self, key: &ResourceKey) {
        self.failing.lock().insert(key.clone());
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    pub fn calls(&self) -> Vec<(ResourceKey, Instant)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn saved_keys(&self) -> Vec<ResourceKey> {
        self.saved.lock().clone()
    }
}

#[async_trait]
impl SaveExecutor for FakeExecutor {
    async fn save(&self, key: &ResourceKey) -> Result<(), SaveError> {
        self.calls.lock().push((key.clone(), Instant::now()));

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.failing.lock().contains(key) {
            return Err(SaveError::Failed("disk full".to_string()));
        }

        self.host.mark_clean(key);
        self.saved.lock().push(key.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakePresenter {
    notifications: Mutex<Vec<(NotificationLevel, String)>>,
    status: Mutex<Option<StatusSnapshot>>,
    hidden: AtomicBool,
}

impl FakePresenter {
    pub fn messages(&self, level: NotificationLevel) -> Vec<String> {
        self.notifications
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn count(&self, level: NotificationLevel) -> usize {
        self.messages(level).len()
    }

    pub fn last_status(&self) -> Option<StatusSnapshot> {
        self.status.lock().clone()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.load(Ordering::SeqCst)
    }
}

impl Presenter for FakePresenter {
    fn notify(&self, level: NotificationLevel, message: &str) {
        self.notifications.lock().push((level, message.to_string()));
    }

    fn show_status(&self, status: &StatusSnapshot) {
        self.hidden.store(false, Ordering::SeqCst);
        *self.status.lock() = Some(status.clone());
    }

    fn hide_status(&self) {
        self.hidden.store(true, Ordering::SeqCst);
    }
}

pub fn harness(
    config: AutosaveConfig,
) -> (Scheduler, Arc<FakeHost>, Arc<FakeExecutor>, Arc<FakePresenter>) {
    let host = Arc::new(FakeHost::default());
    let executor = Arc::new(FakeExecutor::new(host.clone()));
    let presenter = Arc::new(FakePresenter::default());
    let scheduler = Scheduler::new(config, host.clone(), executor.clone(), presenter.clone());
    (scheduler, host, executor, presenter)
}
