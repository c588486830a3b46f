//! Boundary to the host editor
//!
//! The scheduler never touches text buffers, storage or UI directly. The
//! host implements these traits and hands them to [`crate::Scheduler::new`].

use crate::status::StatusSnapshot;
use async_trait::async_trait;
use autosave_core::{DocumentSnapshot, ResourceKey};
use std::time::Duration;
use thiserror::Error;

/// Failure to read a document's state from the host
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The host no longer knows the document (closed and released)
    #[error("document not found: {0}")]
    NotFound(ResourceKey),

    #[error("document state unavailable: {0}")]
    Unavailable(String),
}

/// Reason a save did not complete
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveError {
    #[error("{0}")]
    Failed(String),

    #[error("save timed out after {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Read access to the host's open documents
pub trait DocumentHost: Send + Sync {
    /// Current state of one document
    fn snapshot(&self, key: &ResourceKey) -> Result<DocumentSnapshot, HostError>;

    /// Every open document with unsaved changes
    fn dirty_documents(&self) -> Vec<DocumentSnapshot>;
}

/// Persists a document to durable storage
///
/// Implementations must tolerate the document becoming clean or closed
/// while the call is running, and report success in that case.
#[async_trait]
pub trait SaveExecutor: Send + Sync {
    async fn save(&self, key: &ResourceKey) -> Result<(), SaveError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// User-facing surface: transient notifications and a status indicator
pub trait Presenter: Send + Sync {
    fn notify(&self, level: NotificationLevel, message: &str);

    fn show_status(&self, status: &StatusSnapshot);

    fn hide_status(&self);
}

/// Presenter that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn notify(&self, _level: NotificationLevel, _message: &str) {}

    fn show_status(&self, _status: &StatusSnapshot) {}

    fn hide_status(&self) {}
}
