//! Run the scheduler against host events read from stdin

use anyhow::{Context, Result};
use autosave_core::config::read_table;
use autosave_core::{AutosaveConfig, ResourceKey};
use chrono::{DateTime, Utc};
use cli_lib::{logging, BufferStore, HostEvent, TerminalPresenter};
use scheduler::{NotificationLevel, Presenter, SaveExecutor, Scheduler, StatusSnapshot};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Config file looked up in the root when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = ".autosave.toml";

pub struct RunOptions {
    pub root: PathBuf,
    pub config: Option<PathBuf>,
    pub flush_on_exit: bool,
    pub log_file: Option<PathBuf>,
}

/// Status plus raw counters, printed for the `status` event
#[derive(Serialize)]
struct StatusReport {
    #[serde(flatten)]
    status: StatusSnapshot,
    total_attempts: u64,
    successful: u64,
    failed: u64,
    saves_per_hour: f64,
    session_start: DateTime<Utc>,
    pending: Vec<String>,
}

#[derive(Serialize)]
struct SaveAllOutput {
    eligible: usize,
    succeeded: usize,
    failed: usize,
}

pub async fn run(opts: RunOptions) -> Result<()> {
    std::fs::create_dir_all(&opts.root)
        .with_context(|| format!("Failed to create root directory {}", opts.root.display()))?;

    let config_path = opts
        .config
        .clone()
        .unwrap_or_else(|| opts.root.join(DEFAULT_CONFIG_FILE));
    let (config, warnings) = AutosaveConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;

    let _log_guard = logging::init(config.debug_logging, opts.log_file.as_deref())?;

    let store = Arc::new(BufferStore::new(&opts.root));
    let presenter = Arc::new(TerminalPresenter::default());

    if !warnings.is_empty() {
        for warning in &warnings {
            warn!("Invalid autosave setting: {}", warning);
        }
        presenter.notify(
            NotificationLevel::Warning,
            &format!("{} invalid autosave settings, using fallbacks", warnings.len()),
        );
    }

    let scheduler = Scheduler::new(config, store.clone(), store.clone(), presenter);
    scheduler.spawn_maintenance();

    info!("Autosave running in {}", opts.root.display());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read event from stdin")?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                None
            }
        };

        let Some(line) = line else {
            break;
        };

        match HostEvent::parse(&line) {
            Ok(Some(event)) => handle_event(&scheduler, &store, &config_path, event).await?,
            Ok(None) => {}
            Err(e) => warn!("{:#}", e),
        }
    }

    if opts.flush_on_exit {
        let report = scheduler.save_all_now().await;
        info!(
            "Flushed {}/{} documents before exit",
            report.succeeded, report.eligible
        );
    }

    scheduler.shutdown();
    Ok(())
}

async fn handle_event(
    scheduler: &Scheduler,
    store: &BufferStore,
    config_path: &Path,
    event: HostEvent,
) -> Result<()> {
    match event {
        HostEvent::Open { path, text } => {
            store.open(&path, &text);
        }
        HostEvent::Change { path, text, edits } => {
            let key = store.edit(&path, &text);
            scheduler.on_change(&key, edits);
        }
        HostEvent::Save { path } => {
            let key = ResourceKey::new(path);
            match store.save(&key).await {
                Ok(()) => scheduler.on_external_save(&key),
                Err(e) => warn!("Manual save of {} failed: {}", key, e),
            }
        }
        HostEvent::Close { path } => {
            let key = ResourceKey::new(path);
            store.close(&key);
            scheduler.on_close(&key);
        }
        HostEvent::Toggle => {
            scheduler.toggle_enabled();
        }
        HostEvent::SaveAll => {
            let report = scheduler.save_all_now().await;
            print_json(&SaveAllOutput {
                eligible: report.eligible,
                succeeded: report.succeeded,
                failed: report.failed,
            })?;
        }
        HostEvent::ResetStats => scheduler.reset_stats(),
        HostEvent::Status => {
            let stats = scheduler.stats();
            print_json(&StatusReport {
                status: scheduler.status(),
                total_attempts: stats.total_attempts,
                successful: stats.successful,
                failed: stats.failed,
                saves_per_hour: stats.saves_per_hour(Utc::now()),
                session_start: stats.session_start,
                pending: scheduler
                    .pending()
                    .into_iter()
                    .map(|p| p.key.to_string())
                    .collect(),
            })?;
        }
        HostEvent::ReloadConfig => match read_table(config_path) {
            Ok(table) => scheduler.config_changed(&table),
            Err(e) => warn!("Keeping current configuration: {:#}", anyhow::Error::new(e)),
        },
        HostEvent::Workspace { added, removed } => scheduler.workspace_changed(&added, &removed),
        HostEvent::Sleep { ms } => tokio::time::sleep(Duration::from_millis(ms)).await,
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let line = serde_json::to_string(value).context("Failed to serialize output")?;
    println!("{}", line);
    Ok(())
}
