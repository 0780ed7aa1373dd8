//! Config command - manage stored preferences.

use std::path::Path;

use clap::{Args, Subcommand};
use console::style;

use pdfimg_core::Preferences;
use pdfimg_core::models::config::{MAX_DPI, MIN_DPI};

use super::preferences_path;

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Show current preferences
    Show,

    /// Get a specific preference
    Get {
        /// Preference key (e.g., "dpi")
        key: String,
    },

    /// Set a preference
    Set {
        /// Preference key
        key: String,
        /// New value
        value: String,
    },

    /// Restore default preferences
    Reset,

    /// Show preferences file path
    Path,
}

pub async fn run(args: ConfigArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let path = preferences_path(config_path);
    match args.command {
        ConfigCommand::Show => show_config(&path),
        ConfigCommand::Get { key } => get_config(&path, &key),
        ConfigCommand::Set { key, value } => set_config(&path, &key, &value),
        ConfigCommand::Reset => reset_config(&path),
        ConfigCommand::Path => show_path(&path),
    }
}

fn load(path: &Path) -> anyhow::Result<Preferences> {
    if path.exists() {
        Ok(Preferences::from_file(path)?)
    } else {
        Ok(Preferences::default())
    }
}

fn show_config(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        println!(
            "{} No preferences file found, showing defaults.",
            style("ℹ").blue()
        );
    }
    let prefs = load(path)?;

    println!("{}", serde_json::to_string_pretty(&prefs)?);

    Ok(())
}

fn get_config(path: &Path, key: &str) -> anyhow::Result<()> {
    let json = serde_json::to_value(load(path)?)?;

    let value = json
        .get(key)
        .ok_or_else(|| anyhow::anyhow!("Unknown preference: {}", key))?;

    println!("{}", serde_json::to_string_pretty(value)?);

    Ok(())
}

fn set_config(path: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let prefs = load(path)?;

    // Parse the value
    let parsed_value: serde_json::Value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));

    let mut json = serde_json::to_value(&prefs)?;
    let Some(obj) = json.as_object_mut() else {
        anyhow::bail!("Preferences are not a JSON object");
    };
    if !obj.contains_key(key) {
        anyhow::bail!("Unknown preference: {}", key);
    }
    obj.insert(key.to_string(), parsed_value.clone());

    let updated: Preferences = serde_json::from_value(json)
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))?;
    if !Preferences::dpi_in_range(updated.dpi) {
        anyhow::bail!("dpi must be between {} and {}", MIN_DPI, MAX_DPI);
    }
    updated.save(path)?;

    println!(
        "{} Set {} = {}",
        style("✓").green(),
        key,
        serde_json::to_string(&parsed_value)?
    );

    Ok(())
}

fn reset_config(path: &Path) -> anyhow::Result<()> {
    Preferences::default().save(path)?;

    println!(
        "{} Restored default preferences at {}",
        style("✓").green(),
        path.display()
    );

    Ok(())
}

fn show_path(path: &Path) -> anyhow::Result<()> {
    println!("Preferences file: {}", path.display());

    if path.exists() {
        println!("Status: {}", style("exists").green());
    } else {
        println!("Status: {}", style("not created").yellow());
        println!();
        println!("It is created on the first extract or batch run.");
    }

    Ok(())
}
