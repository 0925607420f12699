//! Session issuance, validation and revocation.
//!
//! A token authenticates only if two independent checks pass: the codec's
//! signature/expiry check and the store's live-session lookup. The first
//! never touches the store.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jobsara_core::{AccountId, AuthConfig, Locale};

use super::AuthError;
use super::token::TokenCodec;
use crate::model::{Account, Session};
use crate::store::{CredentialStore, StoreError, with_timeout};

/// A token handed to a client, with its absolute expiry.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Bearer token.
    pub token: String,
    /// When the token (and its session record) expire.
    pub expires_at: chrono::DateTime<Utc>,
}

/// Issues, validates and revokes sessions.
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
    token_ttl: Duration,
    persist_sessions: bool,
    store_timeout: Duration,
}

impl SessionManager {
    /// Create a session manager over a store.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>, codec: TokenCodec, config: &AuthConfig) -> Self {
        Self {
            store,
            codec,
            token_ttl: config.token_ttl(),
            persist_sessions: config.persist_sessions,
            store_timeout: config.store_timeout(),
        }
    }

    /// Create a session manager, building the codec from the configured secret.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the signing secret is missing or invalid.
    pub fn from_config(
        config: &AuthConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, AuthError> {
        Ok(Self::new(store, TokenCodec::from_config(config)?, config))
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Bound applied to every store call.
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Whether session records back issued tokens.
    #[must_use]
    pub const fn persists_sessions(&self) -> bool {
        self.persist_sessions
    }

    /// Run a store call under the configured timeout. Faults are logged and
    /// surface as [`AuthError::StoreUnavailable`]; uniqueness conflicts keep
    /// their own variants.
    pub(crate) async fn store_call<T, F>(
        &self,
        operation: &'static str,
        future: F,
    ) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        with_timeout(self.store_timeout, operation, future)
            .await
            .map_err(|e| {
                if !matches!(e, StoreError::UsernameTaken(_) | StoreError::EmailTaken(_)) {
                    tracing::error!(operation, error = %e, "Store call failed");
                }
                AuthError::from(e)
            })
    }

    /// Issue a token for an account and record its session.
    ///
    /// Does not modify the account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] if the session cannot be
    /// recorded.
    pub async fn issue_session(&self, account: &Account) -> Result<IssuedSession, AuthError> {
        let issued = self
            .codec
            .issue(account.id, &account.email, account.role, self.token_ttl)?;
        let expires_at = issued.claims.expires_at();

        if self.persist_sessions {
            let session = Session {
                token: issued.token.clone(),
                account_id: account.id,
                expires_at,
                created_at: Utc::now(),
            };
            self.store_call("insert_session", self.store.insert_session(&session))
                .await?;
        }

        tracing::debug!(account_id = %account.id, %expires_at, "Session issued");
        Ok(IssuedSession {
            token: issued.token,
            expires_at,
        })
    }

    /// Validate a token and resolve its account.
    ///
    /// `language_hint` is the request's `Accept-Language` value, used to
    /// assign a locale to accounts that have none. That assignment is
    /// best-effort and never fails validation.
    ///
    /// # Errors
    ///
    /// Returns the classified rejection, or [`AuthError::StoreUnavailable`].
    pub async fn validate(
        &self,
        token: &str,
        language_hint: Option<&str>,
    ) -> Result<Account, AuthError> {
        let claims = self.codec.verify(token).inspect_err(|e| {
            tracing::debug!(reason = %e, "Token rejected");
        })?;
        let account_id = claims.account_id;

        let Some(mut account) = self
            .store_call("find_account_by_id", self.store.find_account_by_id(account_id))
            .await?
        else {
            tracing::debug!(%account_id, "Token for unknown account");
            return Err(AuthError::AccountNotFound);
        };

        if self.persist_sessions {
            let live = self
                .store_call(
                    "find_live_session",
                    self.store.find_live_session(token, account_id, Utc::now()),
                )
                .await?;
            if live.is_none() {
                tracing::debug!(%account_id, "No live session for token");
                return Err(AuthError::RevokedOrUnknown);
            }
        }

        if account.locale.is_none() {
            let locale = Locale::from_accept_language(language_hint);
            self.enrich_locale(&mut account, locale).await;
        }

        Ok(account)
    }

    async fn enrich_locale(&self, account: &mut Account, locale: Locale) {
        let result = with_timeout(
            self.store_timeout,
            "update_account_locale",
            self.store.update_account_locale(account.id, locale),
        )
        .await;

        match result {
            Ok(true) => {
                tracing::debug!(account_id = %account.id, %locale, "Assigned account locale");
                account.locale = Some(locale);
            }
            Ok(false) => {
                tracing::warn!(account_id = %account.id, "Account vanished before locale update");
            }
            Err(e) => {
                tracing::warn!(account_id = %account.id, error = %e, "Failed to assign locale");
            }
        }
    }

    /// Revoke one token. Revoking an unknown or already-revoked token is not
    /// an error. Returns whether a session was removed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] on store failure.
    pub async fn revoke(&self, token: &str) -> Result<bool, AuthError> {
        if !self.persist_sessions {
            return Ok(false);
        }
        let removed = self
            .store_call("delete_session", self.store.delete_session(token))
            .await?;
        tracing::debug!(removed, "Session revoked");
        Ok(removed)
    }

    /// Revoke every session of an account. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] on store failure.
    pub async fn revoke_all(&self, account_id: AccountId) -> Result<usize, AuthError> {
        if !self.persist_sessions {
            return Ok(0);
        }
        let removed = self
            .store_call(
                "delete_sessions_for_account",
                self.store.delete_sessions_for_account(account_id),
            )
            .await?;
        tracing::info!(%account_id, removed, "Revoked all sessions");
        Ok(removed)
    }

    /// Physically delete expired session records.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] on store failure.
    pub async fn purge_expired(&self) -> Result<usize, AuthError> {
        if !self.persist_sessions {
            return Ok(0);
        }
        self.store_call(
            "purge_expired_sessions",
            self.store.purge_expired_sessions(Utc::now()),
        )
        .await
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("token_ttl", &self.token_ttl)
            .field("persist_sessions", &self.persist_sessions)
            .field("store_timeout", &self.store_timeout)
            .finish_non_exhaustive()
    }
}
