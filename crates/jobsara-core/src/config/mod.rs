//! Configuration loading and validation.
//!
//! Config is JSON5. Location: `~/.jobsara/jobsara.json`, or
//! `$JOBSARA_STATE_DIR/jobsara.json` when that variable is set.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default bearer token lifetime in hours.
const DEFAULT_TOKEN_TTL_HOURS: u64 = 24;
/// Default bound on a single credential store operation.
const DEFAULT_STORE_TIMEOUT_MS: u64 = 3000;
/// Default Argon2 iteration count.
const DEFAULT_HASH_COST: u32 = 2;
/// Minimum signing secret length in bytes.
pub const MIN_SECRET_BYTES: usize = 32;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway (HTTP server) configuration.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Authentication and session configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Global settings.
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Save configuration to a path.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("jobsara.json")
    }

    /// Get the JobSara state directory.
    ///
    /// Uses `JOBSARA_STATE_DIR` env var if set, otherwise `~/.jobsara`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("JOBSARA_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".jobsara")
        } else {
            PathBuf::from(".jobsara")
        }
    }

    /// Directory holding the credential store.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.gateway
            .data_dir
            .clone()
            .unwrap_or_else(|| Self::state_dir().join("data"))
    }

    /// Apply environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("JOBSARA_DATA_DIR") {
            self.gateway.data_dir = Some(PathBuf::from(dir));
        }
        self.auth = self.auth.with_env_overrides();
        self
    }

    /// Validate the configuration.
    ///
    /// A missing signing secret is not an error here; the gateway refuses to
    /// start without one, but offline admin commands do not need it.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.port == 0 {
            return Err(ConfigError::Validation(
                "Gateway port cannot be 0".to_string(),
            ));
        }

        self.auth.validate()
    }
}

/// Gateway server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address mode.
    #[serde(default)]
    pub mode: BindMode,

    /// Enable CORS.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Data directory override for the credential store.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            mode: BindMode::default(),
            cors: true,
            timeout_secs: default_timeout(),
            data_dir: None,
        }
    }
}

impl GatewayConfig {
    /// Resolve the bind address for the configured mode.
    #[must_use]
    pub fn bind_address(&self) -> String {
        match &self.mode {
            BindMode::Local => "127.0.0.1".to_string(),
            BindMode::Public => "0.0.0.0".to_string(),
            BindMode::Custom(addr) => addr.clone(),
        }
    }
}

const fn default_port() -> u16 {
    3000
}

const fn default_timeout() -> u64 {
    30
}

const fn default_true() -> bool {
    true
}

/// Gateway bind mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    /// Bind to localhost only.
    #[default]
    Local,
    /// Bind to all interfaces.
    Public,
    /// Custom bind address.
    Custom(String),
}

/// Authentication and session configuration.
///
/// Immutable once the gateway starts.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// Token signing secret (hex-encoded, at least 32 bytes). Required to serve.
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Bearer token lifetime in hours.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_hours: u64,

    /// Persist a session record per issued token. Disabling trades
    /// revocability for fewer store writes.
    #[serde(default = "default_true")]
    pub persist_sessions: bool,

    /// Bound on a single credential store operation, in milliseconds.
    #[serde(default = "default_store_timeout")]
    pub store_timeout_ms: u64,

    /// Password hashing work factor (Argon2 iterations).
    #[serde(default = "default_hash_cost")]
    pub hash_cost: u32,
}

const fn default_token_ttl() -> u64 {
    DEFAULT_TOKEN_TTL_HOURS
}

const fn default_store_timeout() -> u64 {
    DEFAULT_STORE_TIMEOUT_MS
}

const fn default_hash_cost() -> u32 {
    DEFAULT_HASH_COST
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_hours: default_token_ttl(),
            persist_sessions: true,
            store_timeout_ms: default_store_timeout(),
            hash_cost: default_hash_cost(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "[REDACTED]"))
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("persist_sessions", &self.persist_sessions)
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("hash_cost", &self.hash_cost)
            .finish()
    }
}

impl AuthConfig {
    /// Create a new auth config builder.
    #[must_use]
    pub fn builder() -> AuthConfigBuilder {
        AuthConfigBuilder::default()
    }

    /// Get token lifetime as Duration.
    #[must_use]
    pub const fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_hours * 3600)
    }

    /// Get the store operation bound as Duration.
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Decode the signing secret.
    ///
    /// # Errors
    ///
    /// Returns error if the secret is missing, not hex, or too short.
    pub fn signing_secret(&self) -> Result<Vec<u8>, ConfigError> {
        let hex_secret = self
            .jwt_secret
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField("auth.jwtSecret".to_string()))?;

        let secret = hex::decode(hex_secret.trim())
            .map_err(|e| ConfigError::Validation(format!("Invalid hex secret: {e}")))?;

        if secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::Validation(format!(
                "Signing secret must be at least {MIN_SECRET_BYTES} bytes, got {}",
                secret.len()
            )));
        }

        Ok(secret)
    }

    /// Load overrides from environment variables.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(secret) = std::env::var("JOBSARA_JWT_SECRET") {
            self.jwt_secret = Some(secret);
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.token_ttl_hours == 0 {
            return Err(ConfigError::Validation(
                "auth.tokenTtlHours must be positive".to_string(),
            ));
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "auth.storeTimeoutMs must be positive".to_string(),
            ));
        }
        if self.hash_cost == 0 {
            return Err(ConfigError::Validation(
                "auth.hashCost must be positive".to_string(),
            ));
        }
        if self.jwt_secret.is_some() {
            self.signing_secret()?;
        }
        Ok(())
    }
}

/// Builder for `AuthConfig`.
#[derive(Debug, Default)]
pub struct AuthConfigBuilder {
    config: AuthConfig,
}

impl AuthConfigBuilder {
    /// Set the signing secret (hex).
    #[must_use]
    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = Some(secret.into());
        self
    }

    /// Set token lifetime in hours.
    #[must_use]
    pub const fn token_ttl_hours(mut self, hours: u64) -> Self {
        self.config.token_ttl_hours = hours;
        self
    }

    /// Set whether session records are persisted.
    #[must_use]
    pub const fn persist_sessions(mut self, persist: bool) -> Self {
        self.config.persist_sessions = persist;
        self
    }

    /// Set the store operation bound in milliseconds.
    #[must_use]
    pub const fn store_timeout_ms(mut self, ms: u64) -> Self {
        self.config.store_timeout_ms = ms;
        self
    }

    /// Set the password hashing work factor.
    #[must_use]
    pub const fn hash_cost(mut self, cost: u32) -> Self {
        self.config.hash_cost = cost;
        self
    }

    /// Build the config.
    #[must_use]
    pub fn build(self) -> AuthConfig {
        self.config
    }
}

/// Global settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSettings {
    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,

    /// Log format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}
