//! Autosave CLI - autosave command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

/// Autosave - debounced automatic saving for open documents
#[derive(Parser)]
#[command(name = "autosave")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler, reading host events as JSON lines from stdin
    Run {
        /// Directory documents are saved under
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Config file (default: <root>/.autosave.toml)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Save every eligible dirty document before exiting
        #[arg(long)]
        flush_on_exit: bool,

        /// Write logs to this file instead of stderr
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Show the effective configuration
    Config {
        /// Config file to read
        #[arg(default_value = cmd::run::DEFAULT_CONFIG_FILE)]
        path: PathBuf,

        /// Fail if any setting is invalid
        #[arg(long)]
        check: bool,

        /// Print an example configuration instead
        #[arg(long)]
        example: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            root,
            config,
            flush_on_exit,
            log_file,
        } => {
            cmd::run::run(cmd::run::RunOptions {
                root,
                config,
                flush_on_exit,
                log_file,
            })
            .await
        }
        Commands::Config {
            path,
            check,
            example,
        } => {
            if example {
                cmd::config::run_example()
            } else {
                cmd::config::run_show(&path, check)
            }
        }
    }
}
