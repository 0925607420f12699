//! CLI command implementations.

pub mod admin;
pub mod config;
pub mod secret;
pub mod serve;

pub use admin::run_admin;
pub use config::run_config;
pub use secret::run_secret;
pub use serve::run_serve;

use std::path::Path;

use jobsara_core::Config;

/// Load configuration from `path` (or the default location) with
/// environment overrides applied. A missing file yields defaults.
///
/// # Errors
///
/// Returns error if the file exists but cannot be parsed or validated.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) if path.exists() => Config::load(path)?,
        Some(_) => Config::default(),
        None => Config::load_default()?,
    };
    Ok(config.with_env_overrides())
}
