//! # JobSara Gateway
//!
//! HTTP API server with bearer-token sessions backed by a credential store.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Account registration, login and administration.
pub mod accounts;
/// Authentication and authorization.
pub mod auth;
/// Teacher directory.
pub mod directory;
mod handlers;
/// Persisted records.
pub mod model;
mod server;
/// Credential store.
pub mod store;

pub use accounts::{AccountService, Registration, RoleCounts};
pub use auth::{AuthError, AuthState, SessionManager, TokenCodec};
pub use directory::{TeacherCard, TeacherDirectory, TeacherQuery};
pub use server::{Gateway, GatewayBuilder, GatewayState};
pub use store::{CredentialStore, MemoryStore, SledStore, StoreError};

/// Start the gateway server.
///
/// # Errors
///
/// Returns error if server fails to start.
pub async fn start(config: jobsara_core::Config) -> Result<(), GatewayError> {
    let gateway = Gateway::new(config)?;
    gateway.run().await
}

/// Gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Server error.
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),

    /// Credential store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
