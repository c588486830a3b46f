//! Line-delimited JSON events accepted by `autosave run`
//!
//! ```text
//! {"event":"open","path":"src/main.rs","text":"fn main() {}"}
//! {"event":"change","path":"src/main.rs","text":"fn main() { }","edits":1}
//! {"event":"save","path":"src/main.rs"}
//! {"event":"close","path":"src/main.rs"}
//! {"event":"toggle"}
//! {"event":"save_all"}
//! {"event":"reset_stats"}
//! {"event":"status"}
//! {"event":"reload_config"}
//! {"event":"workspace","added":["/src/other"],"removed":[]}
//! {"event":"sleep","ms":250}
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HostEvent {
    /// Document opened with its on-disk text
    Open { path: String, text: String },
    /// Document text replaced
    Change {
        path: String,
        text: String,
        #[serde(default = "default_edits")]
        edits: usize,
    },
    /// Manual save through the host
    Save { path: String },
    Close { path: String },
    Toggle,
    SaveAll,
    ResetStats,
    Status,
    ReloadConfig,
    Workspace {
        #[serde(default)]
        added: Vec<String>,
        #[serde(default)]
        removed: Vec<String>,
    },
    /// Pause event processing (for scripted sessions)
    Sleep { ms: u64 },
}

fn default_edits() -> usize {
    1
}

impl HostEvent {
    /// Parse one input line; blank lines and `#` comments yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let event = serde_json::from_str(line)
            .with_context(|| format!("Invalid event: {}", line))?;
        Ok(Some(event))
    }
}
