//! Credential store: the single shared mutable resource.
//!
//! Accounts, sessions and courses live behind [`CredentialStore`]. Two
//! backends ship with the gateway: [`SledStore`] (durable, default) and
//! [`MemoryStore`] (ephemeral deployments and tests).

mod memory;
mod sled_store;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobsara_core::{AccountId, Locale};
use thiserror::Error;

use crate::model::{Account, AccountChange, Course, NewAccount, NewCourse, Session};

pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another account already uses this username.
    #[error("Username already taken: {0}")]
    UsernameTaken(String),

    /// Another account already uses this email.
    #[error("Email already registered: {0}")]
    EmailTaken(String),

    /// A session with the same token already exists.
    #[error("Duplicate session token")]
    DuplicateSession,

    /// Backend failure (I/O, lock, connection).
    #[error("Storage error: {0}")]
    Backend(String),

    /// A stored record could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// The operation did not finish within its bound.
    #[error("Store operation '{operation}' timed out after {timeout:?}")]
    Timeout {
        /// Operation name.
        operation: &'static str,
        /// The bound that elapsed.
        timeout: Duration,
    },
}

/// Durable accounts/sessions/courses store.
///
/// Every method is a potentially slow unit of work; callers bound them with
/// [`with_timeout`]. Implementations must be safe to share across tasks.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Create an account, assigning its ID. Fails if the username or email
    /// is already in use.
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError>;

    /// Look up an account by ID.
    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Look up an account by email (case-insensitive).
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Look up an account by username (case-insensitive).
    async fn find_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, StoreError>;

    /// Overwrite an existing account. Returns `false` if it does not exist.
    async fn update_account(&self, account: &Account) -> Result<bool, StoreError>;

    /// Apply `change` to an account in one atomic read-modify-write, leaving
    /// every other field as currently stored. Returns the updated account, or
    /// `None` if it does not exist.
    async fn modify_account(
        &self,
        id: AccountId,
        change: &AccountChange,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, StoreError>;

    /// Set an account's locale. Returns `false` if it does not exist.
    async fn update_account_locale(
        &self,
        id: AccountId,
        locale: Locale,
    ) -> Result<bool, StoreError>;

    /// Delete an account and the courses it teaches. Sessions are revoked by
    /// the caller beforehand. Returns `false` if it did not exist.
    async fn delete_account(&self, id: AccountId) -> Result<bool, StoreError>;

    /// Accounts ordered by ID.
    async fn list_accounts(&self, limit: usize, offset: usize)
    -> Result<Vec<Account>, StoreError>;

    /// Insert a session. Fails with [`StoreError::DuplicateSession`] if the
    /// token is already present.
    async fn insert_session(&self, session: &Session) -> Result<(), StoreError>;

    /// The session for `token`, only if it belongs to `account_id` and its
    /// stored expiry is after `now`.
    async fn find_live_session(
        &self,
        token: &str,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError>;

    /// Delete one session. Returns `false` if it was already gone.
    async fn delete_session(&self, token: &str) -> Result<bool, StoreError>;

    /// Delete every session owned by an account. Returns how many were removed.
    async fn delete_sessions_for_account(&self, account_id: AccountId)
    -> Result<usize, StoreError>;

    /// Physically remove sessions whose expiry is at or before `now`.
    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Create a course, assigning its ID.
    async fn create_course(&self, course: NewCourse) -> Result<Course, StoreError>;

    /// Number of courses taught by an account.
    async fn count_courses(&self, teacher_id: AccountId) -> Result<usize, StoreError>;
}

/// Run a store operation under a deadline.
///
/// # Errors
///
/// Returns [`StoreError::Timeout`] if `timeout` elapses first, otherwise the
/// operation's own result.
pub async fn with_timeout<T, F>(
    timeout: Duration,
    operation: &'static str,
    future: F,
) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| StoreError::Timeout { operation, timeout })?
}

/// Index key for a case-insensitive unique field.
pub(crate) fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}
