//! Config show/validate command.

use std::path::Path;

use anyhow::Result;
use jobsara_core::Config;

use crate::ui;

/// Config actions.
#[derive(Debug, Clone, Copy)]
pub enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Check syntax, schema and secret.
    Validate,
}

/// Run the config command.
pub fn run_config(path: &Path, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(path),
        ConfigAction::Validate => validate_config(path),
    }
}

/// Show the configuration with the secret redacted.
fn show_config(path: &Path) -> Result<()> {
    if !path.exists() {
        ui::warning(&format!("Config file not found: {}", path.display()));
        ui::info("Showing defaults");
    }

    let config = super::load_config(Some(path))?;
    let mut value = serde_json::to_value(&config)?;
    if let Some(secret) = value.pointer_mut("/auth/jwtSecret") {
        if !secret.is_null() {
            *secret = serde_json::Value::String("[REDACTED]".to_string());
        }
    }

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Validate the configuration.
fn validate_config(path: &Path) -> Result<()> {
    ui::header("Validating Configuration");

    if !path.exists() {
        ui::error(&format!("Config file not found: {}", path.display()));
        return Ok(());
    }

    let content = std::fs::read_to_string(path)?;
    if let Err(e) = json5::from_str::<serde_json::Value>(&content) {
        ui::error(&format!("Syntax error: {e}"));
        return Ok(());
    }
    ui::success("Syntax: Valid JSON5");

    let config = match Config::load(path) {
        Ok(config) => {
            ui::success("Schema: Configuration is valid");
            config.with_env_overrides()
        }
        Err(e) => {
            ui::error(&format!("Schema error: {e}"));
            return Ok(());
        }
    };

    match config.auth.signing_secret() {
        Ok(_) => ui::success("Secret: present"),
        Err(e) => {
            ui::warning(&format!("Secret: {e}"));
            ui::info("The server will not start without one");
        }
    }

    Ok(())
}
