//! Signing secret generation.

use std::path::Path;

use anyhow::Result;
use jobsara_core::Config;
use jobsara_gateway::TokenCodec;

use crate::ui;

/// Print a new hex secret, or store it in the config file at `path`.
///
/// Saving replaces any existing secret, which invalidates every token
/// already issued.
pub fn run_secret(path: &Path, save: bool) -> Result<()> {
    let secret = TokenCodec::generate_hex_secret();

    if !save {
        println!("{secret}");
        return Ok(());
    }

    let mut config = if path.exists() {
        Config::load(path)?
    } else {
        Config::default()
    };
    if config.auth.jwt_secret.is_some() {
        ui::warning("Replacing existing secret; issued tokens will stop verifying");
    }
    config.auth.jwt_secret = Some(secret);
    config.save(path)?;

    ui::success(&format!("Secret written to {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_writes_loadable_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobsara.json");

        run_secret(&path, true).unwrap();
        let config = Config::load(&path).unwrap();
        assert!(config.auth.signing_secret().is_ok());
    }
}
