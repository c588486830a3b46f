//! Terminal notifications and status line

use owo_colors::OwoColorize;
use parking_lot::Mutex;
use scheduler::{NotificationLevel, Presenter, StatusSnapshot};

/// Prints notifications and status changes to stderr
#[derive(Default)]
pub struct TerminalPresenter {
    /// Last status line printed, to avoid repeating it
    last_status: Mutex<Option<String>>,
}

impl Presenter for TerminalPresenter {
    fn notify(&self, level: NotificationLevel, message: &str) {
        match level {
            NotificationLevel::Info => eprintln!("{} {}", "info:".blue().bold(), message),
            NotificationLevel::Warning => eprintln!("{} {}", "warning:".yellow().bold(), message),
            NotificationLevel::Error => eprintln!("{} {}", "error:".red().bold(), message),
        }
    }

    fn show_status(&self, status: &StatusSnapshot) {
        let line = status.to_string();
        let mut last = self.last_status.lock();
        if last.as_deref() != Some(line.as_str()) {
            eprintln!("{}", line.dimmed());
            *last = Some(line);
        }
    }

    fn hide_status(&self) {
        *self.last_status.lock() = None;
    }
}
