//! Document identity and point-in-time state

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Stable, unique key of an editable document (its location identifier)
///
/// Keys are compared verbatim. Untitled documents carry a host-chosen
/// placeholder such as `untitled:Untitled-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased file-type tag derived from the location suffix
    ///
    /// `src/Main.RS` yields `rs`. Returns an empty string when the location
    /// has no suffix.
    pub fn file_type(&self) -> String {
        // Strip a scheme prefix like `file://` or `untitled:` before looking at the path
        let location = self
            .0
            .rsplit_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.0);

        Path::new(location)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ResourceKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Snapshot of a document's state as reported by the host
///
/// The scheduler never owns documents. It reads snapshots when deciding
/// whether to schedule or run a save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    /// Document location
    pub key: ResourceKey,
    /// Has modifications not yet persisted
    pub is_dirty: bool,
    /// Closed by the host
    pub is_closed: bool,
    /// Never given a persistent location
    pub is_untitled: bool,
    /// UTF-8 byte length of the full text content
    pub size_bytes: u64,
}

impl DocumentSnapshot {
    /// Build a snapshot for an open document holding `text`
    pub fn from_text(key: impl Into<ResourceKey>, text: &str, is_dirty: bool) -> Self {
        let key = key.into();
        let is_untitled = key.as_str().starts_with("untitled:");
        Self {
            key,
            is_dirty,
            is_closed: false,
            is_untitled,
            size_bytes: text.len() as u64,
        }
    }

    /// Content size in kilobytes
    pub fn size_kb(&self) -> f64 {
        self.size_bytes as f64 / 1024.0
    }

    pub fn file_type(&self) -> String {
        self.key.file_type()
    }
}
