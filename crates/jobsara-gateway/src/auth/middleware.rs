//! Request authentication for axum.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRef, FromRequestParts},
    http::{
        HeaderMap,
        header::{ACCEPT_LANGUAGE, AUTHORIZATION},
        request::Parts,
    },
    response::{IntoResponse, Response},
};
use jobsara_core::{AccountId, AuthConfig, Locale, Translator};
use serde::Serialize;

use super::AuthError;
use super::password::PasswordHasher;
use super::session::SessionManager;
use super::token::TokenCodec;
use crate::accounts::AccountService;
use crate::model::Account;
use crate::store::CredentialStore;

/// Shared authentication state.
pub struct AuthState {
    /// Auth configuration.
    pub config: AuthConfig,
    /// Session manager.
    pub sessions: Arc<SessionManager>,
    /// Account operations.
    pub accounts: AccountService,
    /// Message translator.
    pub translator: Arc<dyn Translator>,
}

impl AuthState {
    /// Build the auth stack over a store.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the signing secret is missing or
    /// invalid.
    pub fn initialize(
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        translator: Arc<dyn Translator>,
    ) -> Result<Self, AuthError> {
        let sessions = Arc::new(SessionManager::from_config(&config, store)?);
        let accounts = AccountService::new(sessions.clone(), PasswordHasher::new(config.hash_cost));

        Ok(Self {
            config,
            sessions,
            accounts,
            translator,
        })
    }

    /// Authenticate a request from its headers.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingToken`] when no bearer token is present,
    /// otherwise whatever session validation rejects with.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<RequireAuth, AuthError> {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(TokenCodec::extract_from_header)
            .ok_or(AuthError::MissingToken)?;

        let account = self
            .sessions
            .validate(token, language_hint(headers))
            .await?;

        Ok(RequireAuth {
            account,
            token: token.to_string(),
        })
    }

    /// Translate a message.
    #[must_use]
    pub fn localize(&self, text: &str, locale: Locale) -> String {
        self.translator.translate(text, locale)
    }

    /// Render an error in the caller's locale.
    #[must_use]
    pub fn render_error(&self, err: &AuthError, locale: Locale) -> Response {
        if err.is_rejection() {
            tracing::debug!(code = err.code(), error = %err, "Request rejected");
        } else {
            tracing::error!(code = err.code(), error = %err, "Request failed");
        }

        ApiError {
            success: false,
            error: err.code(),
            message: self.localize(&err.public_message(), locale),
        }
        .into_response_with(err.status())
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState")
            .field("config", &self.config)
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

fn language_hint(headers: &HeaderMap) -> Option<&str> {
    headers.get(ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok())
}

/// Error body: `{success: false, error, message}`.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Always `false`.
    pub success: bool,
    /// Stable error code.
    pub error: &'static str,
    /// Human-readable, localized message.
    pub message: String,
}

impl ApiError {
    fn into_response_with(self, status: axum::http::StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError {
            success: false,
            error: self.code(),
            message: self.public_message(),
        }
        .into_response_with(self.status())
    }
}

/// Extractor for authenticated requests.
///
/// Use this in handler parameters to require authentication.
#[derive(Debug, Clone)]
pub struct RequireAuth {
    /// The resolved account.
    pub account: Account,
    /// The presented bearer token.
    pub token: String,
}

impl RequireAuth {
    /// Get the account ID.
    #[must_use]
    pub const fn account_id(&self) -> AccountId {
        self.account.id
    }

    /// Locale to answer in.
    #[must_use]
    pub fn locale(&self) -> Locale {
        self.account.display_locale()
    }

    /// Check if the account is an admin.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.account.role.is_admin()
    }

    /// Require admin role.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::PermissionDenied`] if the account is not an admin.
    pub fn require_admin(&self) -> Result<(), AuthError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AuthError::PermissionDenied(
                "Admin access required".to_string(),
            ))
        }
    }

    /// Require the caller to be `owner` or an admin.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::PermissionDenied`] otherwise.
    pub fn require_owner_or_admin(&self, owner: AccountId) -> Result<(), AuthError> {
        if self.account.id == owner || self.is_admin() {
            Ok(())
        } else {
            Err(AuthError::PermissionDenied("Access denied".to_string()))
        }
    }
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
    Arc<AuthState>: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = Arc::<AuthState>::from_ref(state);
        auth_state.authenticate(&parts.headers).await.map_err(|e| {
            let locale = Locale::from_accept_language(language_hint(&parts.headers));
            auth_state.render_error(&e, locale)
        })
    }
}

/// Require admin role extractor.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub RequireAuth);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
    Arc<AuthState>: FromRef<S>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = RequireAuth::from_request_parts(parts, state).await?;

        if let Err(e) = auth.require_admin() {
            let auth_state = Arc::<AuthState>::from_ref(state);
            return Err(auth_state.render_error(&e, auth.locale()));
        }

        Ok(Self(auth))
    }
}

/// Locale declared by an anonymous request's `Accept-Language` header.
#[derive(Debug, Clone, Copy)]
pub struct RequestLocale(pub Locale);

impl<S> FromRequestParts<S> for RequestLocale
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(Locale::from_accept_language(language_hint(
            &parts.headers,
        ))))
    }
}
