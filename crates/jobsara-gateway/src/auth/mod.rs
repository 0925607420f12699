//! Authentication and session management for the gateway.
//!
//! This module provides:
//! - Password hashing on the blocking pool
//! - Signed bearer token issue/verify
//! - Server-side sessions with dual (signature + live record) validation
//! - Request authentication extractors for axum

mod middleware;
mod password;
mod session;
mod token;

pub use middleware::{ApiError, AuthState, RequestLocale, RequireAdmin, RequireAuth};
pub use password::PasswordHasher;
pub use session::{IssuedSession, SessionManager};
pub use token::{Claims, IssuedToken, TokenCodec};

use axum::http::StatusCode;
use jobsara_core::ConfigError;
use thiserror::Error;

use crate::store::StoreError;

/// Authentication and account errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No bearer token was presented.
    #[error("Missing bearer token")]
    MissingToken,

    /// The token is not a well-formed signed token.
    #[error("Malformed token")]
    MalformedToken,

    /// The token signature does not verify under the configured secret.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// The token's expiry has passed.
    #[error("Token expired")]
    ExpiredToken,

    /// The token names an account that no longer exists.
    #[error("Account not found")]
    AccountNotFound,

    /// No live session backs the token.
    #[error("Session revoked or unknown")]
    RevokedOrUnknown,

    /// The store failed or timed out.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Password hashing or verification faulted.
    #[error("Password hashing failed: {0}")]
    HashFailure(String),

    /// Unknown email or wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Username in use.
    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    /// Email in use.
    #[error("Email already registered: {0}")]
    EmailTaken(String),

    /// Authenticated but not allowed.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Target resource does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Request input rejected.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(String),
}

impl AuthError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingToken
            | Self::MalformedToken
            | Self::InvalidSignature
            | Self::ExpiredToken
            | Self::AccountNotFound
            | Self::RevokedOrUnknown
            | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UsernameTaken(_) | Self::EmailTaken(_) => StatusCode::CONFLICT,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::HashFailure(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code sent to clients.
    ///
    /// `AccountNotFound` and `RevokedOrUnknown` share a code so clients cannot
    /// probe which accounts exist.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::MalformedToken | Self::InvalidSignature => "invalid_token",
            Self::ExpiredToken => "token_expired",
            Self::AccountNotFound | Self::RevokedOrUnknown => "invalid_session",
            Self::InvalidCredentials => "invalid_credentials",
            Self::UsernameTaken(_) => "username_taken",
            Self::EmailTaken(_) => "email_taken",
            Self::PermissionDenied(_) => "permission_denied",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::StoreUnavailable(_) => "service_unavailable",
            Self::HashFailure(_) | Self::Config(_) => "internal_error",
        }
    }

    /// English message sent to clients (translated before rendering).
    ///
    /// Internal details never leave the process.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::MissingToken => "Access token required".to_string(),
            Self::MalformedToken | Self::InvalidSignature => "Invalid token".to_string(),
            Self::ExpiredToken => "Token expired".to_string(),
            Self::AccountNotFound | Self::RevokedOrUnknown => {
                "Session is no longer valid".to_string()
            }
            Self::InvalidCredentials => "Invalid email or password".to_string(),
            Self::UsernameTaken(_) => "Username already taken".to_string(),
            Self::EmailTaken(_) => "User with this email already exists".to_string(),
            Self::PermissionDenied(reason) => reason.clone(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::InvalidInput(reason) => reason.clone(),
            Self::StoreUnavailable(_) => "Service temporarily unavailable".to_string(),
            Self::HashFailure(_) | Self::Config(_) => "Internal server error".to_string(),
        }
    }

    /// Whether this is an expected client rejection rather than a fault.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        !matches!(
            self,
            Self::StoreUnavailable(_) | Self::HashFailure(_) | Self::Config(_)
        )
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UsernameTaken(name) => Self::UsernameTaken(name),
            StoreError::EmailTaken(email) => Self::EmailTaken(email),
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<ConfigError> for AuthError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_session_failures_are_indistinguishable() {
        let missing = AuthError::AccountNotFound;
        let revoked = AuthError::RevokedOrUnknown;

        assert_eq!(missing.status(), revoked.status());
        assert_eq!(missing.code(), revoked.code());
        assert_eq!(missing.public_message(), revoked.public_message());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AuthError::MissingToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::ExpiredToken.code(), "token_expired");
        assert_eq!(AuthError::InvalidSignature.code(), "invalid_token");
        assert_eq!(AuthError::MalformedToken.code(), "invalid_token");
        assert_eq!(
            AuthError::PermissionDenied("Access denied".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::StoreUnavailable("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AuthError::HashFailure("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_errors_map_to_unavailable() {
        let timeout = StoreError::Timeout {
            operation: "find_live_session",
            timeout: Duration::from_millis(5),
        };
        assert!(matches!(
            AuthError::from(timeout),
            AuthError::StoreUnavailable(_)
        ));
        assert!(matches!(
            AuthError::from(StoreError::EmailTaken("a@x.io".into())),
            AuthError::EmailTaken(_)
        ));
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let err = AuthError::StoreUnavailable("sled: io error at /var/lib".into());
        assert_eq!(err.public_message(), "Service temporarily unavailable");
        assert!(!err.is_rejection());
    }
}
