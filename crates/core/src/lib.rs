//! Core types for autosave
//!
//! This crate provides:
//! - Document identity and state snapshots
//! - Validated configuration with clamped fallbacks
//! - The eligibility filter deciding whether a document may be auto-saved
//! - Process-lifetime save statistics

pub mod config;
pub mod document;
pub mod eligibility;
pub mod stats;

// Re-exports
pub use config::{AutosaveConfig, ConfigError, ConfigWarning};
pub use document::{DocumentSnapshot, ResourceKey};
pub use eligibility::{check, is_eligible, Ineligible};
pub use stats::{SaveStats, StatsSnapshot};
