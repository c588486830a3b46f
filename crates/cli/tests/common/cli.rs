//! Helpers for driving the `autosave` binary
//!
//! Events are fed through stdin as JSON lines; the process exits once stdin
//! is exhausted.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// CLI command builder
pub struct AutosaveCommand {
    working_dir: PathBuf,
    args: Vec<String>,
    events: Vec<String>,
}

impl AutosaveCommand {
    /// Create a new command in the given working directory
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            working_dir: working_dir.as_ref().to_path_buf(),
            args: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Add command arguments
    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Queue one event line for stdin
    pub fn event(&mut self, json: &str) -> &mut Self {
        self.events.push(json.to_string());
        self
    }

    /// Execute command and return result with timing
    pub fn execute(&self) -> Result<CommandResult> {
        let start = Instant::now();

        let mut child = Command::new(env!("CARGO_BIN_EXE_autosave"))
            .args(&self.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to spawn autosave")?;

        if let Some(mut stdin) = child.stdin.take() {
            for line in &self.events {
                writeln!(stdin, "{}", line)?;
            }
            // Dropping stdin signals end of input
        }

        let output = child
            .wait_with_output()
            .context("Failed to wait for autosave")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }

    /// Execute and assert success
    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }

        Ok(result)
    }

    /// Execute and expect failure
    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }

        Ok(result)
    }
}

/// Command execution result with timing
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    /// Parse every stdout line that is a JSON object
    pub fn json_lines(&self) -> Vec<serde_json::Value> {
        self.stdout
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .filter(|value: &serde_json::Value| value.is_object())
            .collect()
    }
}

/// Write an `[autosave]` config file with the given settings
pub fn write_config(dir: &Path, settings: &str) -> Result<PathBuf> {
    let path = dir.join(".autosave.toml");
    std::fs::write(&path, format!("[autosave]\n{}\n", settings))
        .context("Failed to write config")?;
    Ok(path)
}

/// Macro for convenient command construction
///
/// Usage:
/// ```ignore
/// autosave!(dir, "run", "--flush-on-exit").event(r#"{"event":"save_all"}"#);
/// ```
#[macro_export]
macro_rules! autosave {
    ($dir:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::AutosaveCommand::new($dir);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}
