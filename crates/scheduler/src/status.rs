//! Status indicator snapshot

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::fmt;

/// What the status indicator shows, refreshed after every state change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub enabled: bool,
    /// Documents with a scheduled or in-flight save
    pub pending_count: usize,
    /// Percentage of save attempts that succeeded this session
    pub success_rate: f64,
    pub last_save: Option<DateTime<Utc>>,
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.enabled {
            return write!(f, "Autosave: off");
        }

        write!(f, "Autosave: on")?;
        if self.pending_count > 0 {
            write!(f, " ({} pending)", self.pending_count)?;
        }
        write!(f, " | {:.0}% ok", self.success_rate)?;
        if let Some(ts) = self.last_save {
            write!(f, " | last save {}", ts.with_timezone(&Local).format("%H:%M:%S"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_disabled() {
        let status = StatusSnapshot {
            enabled: false,
            pending_count: 3,
            success_rate: 50.0,
            last_save: None,
        };
        assert_eq!(status.to_string(), "Autosave: off");
    }

    #[test]
    fn test_display_enabled() {
        let status = StatusSnapshot {
            enabled: true,
            pending_count: 2,
            success_rate: 87.5,
            last_save: None,
        };
        assert_eq!(status.to_string(), "Autosave: on (2 pending) | 88% ok");

        let idle = StatusSnapshot {
            pending_count: 0,
            last_save: Some(Utc::now()),
            ..status
        };
        assert!(idle.to_string().starts_with("Autosave: on | 88% ok | last save "));
    }
}
