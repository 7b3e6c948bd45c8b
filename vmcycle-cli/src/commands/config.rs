//! `vmcycle config` commands

use anyhow::{Context, Result};
use colored::Colorize;
use vmcycle_core::Config;

/// Print the effective configuration (file values over defaults).
pub fn show() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Print where the configuration file is read from.
pub fn path() {
    let path = Config::config_path();
    let note = if path.exists() { "" } else { " (not present, using defaults)" };
    println!("{}{}", path.display(), note);
}

/// Change one value and write the configuration file.
pub fn set(key: &str, value: &str) -> Result<()> {
    let path = Config::config_path();
    let mut config = Config::load().context("Failed to load configuration")?;
    config.set(key, value).with_context(|| format!("Cannot set '{}'", key))?;
    config
        .save_to(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("{} {} = {:?}", "✓".green(), key.bold(), value);
    Ok(())
}
