//! Configuration command
//!
//! Shows the effective configuration for a file, validates it, or prints an
//! example.

use anyhow::{Context, Result};
use autosave_core::config::{
    example_config, MAX_DELAY_MS, MAX_FILE_SIZE_KB, MIN_DELAY_MS, MIN_FILE_SIZE_KB,
};
use autosave_core::AutosaveConfig;
use owo_colors::OwoColorize;
use std::path::Path;

/// List the effective configuration values
///
/// With `check`, fails if any setting had to fall back.
pub fn run_show(path: &Path, check: bool) -> Result<()> {
    let (config, warnings) = AutosaveConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    println!("{}", "Autosave Configuration".bold());
    println!("{}: {}", "Location".dimmed(), path.display().dimmed());
    if !path.exists() {
        println!("{}", "File does not exist, showing defaults".yellow());
    }
    println!();

    println!("{}", "[autosave]".yellow());
    print_value("enabled", config.enabled);
    print_value("delay", format!("{} {}", config.delay_ms, "(ms)".dimmed()));
    print_value("save_on_every_change", config.save_on_every_change);
    print_value("save_untitled", config.save_untitled);
    print_value("file_types", format_types(&config.file_types, "(all)"));
    print_value("exclude_file_types", format_types(&config.exclude_file_types, "(none)"));
    print_value(
        "max_file_size_kb",
        format!("{} {}", config.max_file_size_kb, "(KB)".dimmed()),
    );
    print_value("show_notifications", config.show_notifications);
    print_value("show_status_bar", config.show_status_bar);
    print_value("debug_logging", config.debug_logging);

    println!("\n{}", "Valid Ranges:".bold());
    println!("  delay: {}-{} ms", MIN_DELAY_MS, MAX_DELAY_MS);
    println!("  max_file_size_kb: {}-{}", MIN_FILE_SIZE_KB, MAX_FILE_SIZE_KB);

    if !warnings.is_empty() {
        println!("\n{}", "Warnings:".bold());
        for warning in &warnings {
            println!("  {} {}", "!".yellow(), warning);
        }
    }

    if check && !warnings.is_empty() {
        anyhow::bail!("Configuration has {} invalid values", warnings.len());
    }

    Ok(())
}

/// Show example configuration
pub fn run_example() -> Result<()> {
    print!("{}", example_config());
    Ok(())
}

fn print_value(key: &str, value: impl std::fmt::Display) {
    println!("  {} = {}", key.cyan(), value);
}

fn format_types(types: &[String], empty: &str) -> String {
    if types.is_empty() {
        empty.dimmed().to_string()
    } else {
        format!("[{}]", types.join(", "))
    }
}
