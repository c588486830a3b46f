//! Eligibility filter
//!
//! Decides whether a document qualifies for scheduled saving right now.
//! Checks run in a fixed order and stop at the first failure:
//! 1. Document must be dirty
//! 2. Document must not be closed
//! 3. Untitled documents need `save_untitled`
//! 4. File type must not be excluded
//! 5. File type must be allowed (when an allow-list is configured)
//! 6. Content must not exceed `max_file_size_kb`

use crate::config::AutosaveConfig;
use crate::document::DocumentSnapshot;
use std::fmt;

/// Reason a document was rejected
#[derive(Debug, Clone, PartialEq)]
pub enum Ineligible {
    NotDirty,
    Closed,
    Untitled,
    Excluded { file_type: String },
    NotAllowed { file_type: String },
    TooLarge { size_kb: f64, limit_kb: u64 },
}

impl fmt::Display for Ineligible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDirty => write!(f, "no unsaved changes"),
            Self::Closed => write!(f, "document is closed"),
            Self::Untitled => write!(f, "untitled documents are not auto-saved"),
            Self::Excluded { file_type } => write!(f, "file type '{}' is excluded", file_type),
            Self::NotAllowed { file_type } => {
                write!(f, "file type '{}' is not in the allow-list", file_type)
            }
            Self::TooLarge { size_kb, limit_kb } => {
                write!(f, "size {:.1} KB exceeds limit of {} KB", size_kb, limit_kb)
            }
        }
    }
}

/// Run every check and report the first failing one
pub fn check(doc: &DocumentSnapshot, config: &AutosaveConfig) -> Result<(), Ineligible> {
    if !doc.is_dirty {
        return Err(Ineligible::NotDirty);
    }

    if doc.is_closed {
        return Err(Ineligible::Closed);
    }

    if doc.is_untitled && !config.save_untitled {
        return Err(Ineligible::Untitled);
    }

    let file_type = doc.file_type();

    if contains_tag(&config.exclude_file_types, &file_type) {
        return Err(Ineligible::Excluded { file_type });
    }

    if !config.file_types.is_empty() && !contains_tag(&config.file_types, &file_type) {
        return Err(Ineligible::NotAllowed { file_type });
    }

    let size_kb = doc.size_kb();
    if size_kb > config.max_file_size_kb as f64 {
        return Err(Ineligible::TooLarge {
            size_kb,
            limit_kb: config.max_file_size_kb,
        });
    }

    Ok(())
}

/// Whether the document may be auto-saved
pub fn is_eligible(doc: &DocumentSnapshot, config: &AutosaveConfig) -> bool {
    check(doc, config).is_ok()
}

fn contains_tag(tags: &[String], file_type: &str) -> bool {
    tags.iter().any(|tag| tag.eq_ignore_ascii_case(file_type))
}
