//! Account lifecycle: registration, login, profile and admin operations.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use jobsara_core::{AccountId, Locale, Role};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::auth::{AuthError, IssuedSession, PasswordHasher, SessionManager};
use crate::model::{Account, AccountChange, NewAccount, ProfileUpdate};

const LIST_PAGE: usize = 500;
const DECOY_PASSWORD_LEN: usize = 24;

/// Registration request.
///
/// Fields are optional so missing ones can be reported together.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Registration {
    /// Username.
    pub username: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Plaintext password.
    pub password: Option<String>,
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
    /// Role name.
    pub user_type: Option<String>,
    /// Phone number.
    pub phone: Option<String>,
    /// Company name.
    pub company_name: Option<String>,
    /// Skills.
    pub skills: Option<String>,
    /// Experience level.
    pub experience_level: Option<String>,
    /// Resume.
    pub resume: Option<String>,
    /// Biography.
    pub bio: Option<String>,
}

impl Registration {
    /// Validate required fields and the role.
    fn validate(self) -> Result<(ValidRegistration, String), AuthError> {
        fn required(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        let (
            Some(username),
            Some(email),
            Some(password),
            Some(first_name),
            Some(last_name),
            Some(user_type),
        ) = (
            required(self.username),
            required(self.email),
            self.password.filter(|p| !p.is_empty()),
            required(self.first_name),
            required(self.last_name),
            required(self.user_type),
        )
        else {
            return Err(AuthError::InvalidInput("Missing required fields".to_string()));
        };

        let role: Role = user_type.parse().map_err(|_| {
            AuthError::InvalidInput(format!(
                "Invalid user type. Must be one of: {}",
                Role::valid_names()
            ))
        })?;

        if !email.contains('@') {
            return Err(AuthError::InvalidInput("Invalid email address".to_string()));
        }

        Ok((
            ValidRegistration {
                username,
                email,
                role,
                first_name,
                last_name,
                phone: self.phone,
                company_name: self.company_name,
                skills: self.skills,
                experience_level: self.experience_level,
                resume: self.resume,
                bio: self.bio,
            },
            password,
        ))
    }
}

struct ValidRegistration {
    username: String,
    email: String,
    role: Role,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    company_name: Option<String>,
    skills: Option<String>,
    experience_level: Option<String>,
    resume: Option<String>,
    bio: Option<String>,
}

impl ValidRegistration {
    fn into_new_account(self, password_hash: String) -> NewAccount {
        NewAccount {
            username: self.username,
            email: self.email,
            password_hash,
            role: self.role,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            company_name: self.company_name,
            skills: self.skills,
            experience_level: self.experience_level,
            resume: self.resume,
            bio: self.bio,
        }
    }
}

/// Account counts per role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleCounts {
    /// Count per role name.
    pub by_role: BTreeMap<String, usize>,
    /// Total accounts.
    pub total: usize,
}

/// Account operations over the credential store.
#[derive(Clone)]
pub struct AccountService {
    sessions: Arc<SessionManager>,
    hasher: PasswordHasher,
    decoy_hash: Arc<OnceCell<String>>,
}

impl AccountService {
    /// Create an account service sharing the session manager's store.
    #[must_use]
    pub fn new(sessions: Arc<SessionManager>, hasher: PasswordHasher) -> Self {
        Self {
            sessions,
            hasher,
            decoy_hash: Arc::new(OnceCell::new()),
        }
    }

    /// The session manager.
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Create an account without issuing a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidInput`] for missing fields or an unknown
    /// role, [`AuthError::EmailTaken`]/[`AuthError::UsernameTaken`] on
    /// conflicts, and [`AuthError::HashFailure`] if hashing fails.
    pub async fn create(&self, registration: Registration) -> Result<Account, AuthError> {
        let (registration, password) = registration.validate()?;
        let store = self.sessions.store();

        if self
            .sessions
            .store_call(
                "find_account_by_email",
                store.find_account_by_email(&registration.email),
            )
            .await?
            .is_some()
        {
            return Err(AuthError::EmailTaken(registration.email));
        }
        if self
            .sessions
            .store_call(
                "find_account_by_username",
                store.find_account_by_username(&registration.username),
            )
            .await?
            .is_some()
        {
            return Err(AuthError::UsernameTaken(registration.username));
        }

        let password_hash = self.hasher.hash_blocking(password).await.inspect_err(|e| {
            tracing::error!(error = %e, "Password hashing failed");
        })?;

        // The store re-checks uniqueness atomically.
        let account = self
            .sessions
            .store_call(
                "create_account",
                store.create_account(registration.into_new_account(password_hash)),
            )
            .await?;

        tracing::info!(account_id = %account.id, role = %account.role, "Account registered");
        Ok(account)
    }

    /// Register an account and sign it in.
    ///
    /// # Errors
    ///
    /// See [`Self::create`]; also fails if the session cannot be recorded.
    pub async fn register(
        &self,
        registration: Registration,
    ) -> Result<(Account, IssuedSession), AuthError> {
        let account = self.create(registration).await?;
        let session = self.sessions.issue_session(&account).await?;
        Ok((account, session))
    }

    /// Authenticate by email and password and issue a session.
    ///
    /// Unknown email and wrong password fail identically.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`], [`AuthError::HashFailure`]
    /// or [`AuthError::StoreUnavailable`].
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(Account, IssuedSession), AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput(
                "Email and password are required".to_string(),
            ));
        }

        let store = self.sessions.store();
        let Some(account) = self
            .sessions
            .store_call("find_account_by_email", store.find_account_by_email(email))
            .await?
        else {
            tracing::debug!("Login for unknown email");
            self.verify_decoy(password).await;
            return Err(AuthError::InvalidCredentials);
        };

        let matches = self
            .hasher
            .verify_blocking(password.to_string(), account.password_hash.clone())
            .await
            .inspect_err(|e| {
                tracing::error!(account_id = %account.id, error = %e, "Password verification failed");
            })?;
        if !matches {
            tracing::debug!(account_id = %account.id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.sessions.issue_session(&account).await?;
        tracing::info!(account_id = %account.id, "Login successful");
        Ok((account, session))
    }

    /// Verify against a throwaway hash at the configured cost, so a login
    /// for an unknown email costs the same as a wrong password.
    async fn verify_decoy(&self, password: &str) {
        let decoy = self
            .decoy_hash
            .get_or_try_init(|| {
                self.hasher
                    .hash_blocking(PasswordHasher::generate_password(DECOY_PASSWORD_LEN))
            })
            .await;
        let result = match decoy {
            Ok(hash) => {
                self.hasher
                    .verify_blocking(password.to_string(), hash.clone())
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "Decoy verification failed");
        }
    }

    /// Fetch an account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] if it does not exist.
    pub async fn get(&self, id: AccountId) -> Result<Account, AuthError> {
        self.sessions
            .store_call(
                "find_account_by_id",
                self.sessions.store().find_account_by_id(id),
            )
            .await?
            .ok_or(AuthError::NotFound("User"))
    }

    /// Look up an account by email or username.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] if neither matches.
    pub async fn find(&self, email_or_username: &str) -> Result<Account, AuthError> {
        let store = self.sessions.store();
        let lookup = if email_or_username.contains('@') {
            self.sessions
                .store_call(
                    "find_account_by_email",
                    store.find_account_by_email(email_or_username),
                )
                .await?
        } else {
            self.sessions
                .store_call(
                    "find_account_by_username",
                    store.find_account_by_username(email_or_username),
                )
                .await?
        };
        lookup.ok_or(AuthError::NotFound("User"))
    }

    async fn modify(&self, id: AccountId, change: AccountChange) -> Result<Account, AuthError> {
        self.sessions
            .store_call(
                "modify_account",
                self.sessions.store().modify_account(id, &change, Utc::now()),
            )
            .await?
            .ok_or(AuthError::NotFound("User"))
    }

    /// Apply a partial profile update.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidInput`] for an empty update and
    /// [`AuthError::NotFound`] for an unknown account.
    pub async fn update_profile(
        &self,
        id: AccountId,
        update: ProfileUpdate,
    ) -> Result<Account, AuthError> {
        if update.is_empty() {
            return Err(AuthError::InvalidInput("No fields to update".to_string()));
        }

        self.modify(id, AccountChange::Profile(update)).await
    }

    /// Change an account's role and revoke its sessions, whose tokens carry
    /// the old role.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] for an unknown account.
    pub async fn set_role(&self, id: AccountId, role: Role) -> Result<Account, AuthError> {
        let current = self.get(id).await?;
        if current.role == role {
            return Ok(current);
        }

        let previous = current.role;
        let account = self.modify(id, AccountChange::Role(role)).await?;
        self.sessions.revoke_all(id).await?;

        tracing::info!(account_id = %id, from = %previous, to = %role, "Role changed");
        Ok(account)
    }

    /// Set an account's display locale.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] for an unknown account.
    pub async fn set_locale(&self, id: AccountId, locale: Locale) -> Result<(), AuthError> {
        let updated = self
            .sessions
            .store_call(
                "update_account_locale",
                self.sessions.store().update_account_locale(id, locale),
            )
            .await?;
        if updated {
            Ok(())
        } else {
            Err(AuthError::NotFound("User"))
        }
    }

    /// Replace an account's password and revoke its sessions.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidInput`] for an empty password,
    /// [`AuthError::NotFound`] for an unknown account and
    /// [`AuthError::HashFailure`] if hashing fails.
    pub async fn reset_password(&self, id: AccountId, password: String) -> Result<(), AuthError> {
        if password.is_empty() {
            return Err(AuthError::InvalidInput("Password must not be empty".to_string()));
        }

        self.get(id).await?;
        let hash = self.hasher.hash_blocking(password).await?;
        self.modify(id, AccountChange::PasswordHash(hash)).await?;
        self.sessions.revoke_all(id).await?;

        tracing::info!(account_id = %id, "Password reset");
        Ok(())
    }

    /// Delete an account after revoking all of its sessions.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotFound`] for an unknown account.
    pub async fn delete(&self, id: AccountId) -> Result<Account, AuthError> {
        let account = self.get(id).await?;
        self.sessions.revoke_all(id).await?;

        let deleted = self
            .sessions
            .store_call("delete_account", self.sessions.store().delete_account(id))
            .await?;
        if !deleted {
            return Err(AuthError::NotFound("User"));
        }

        tracing::info!(account_id = %id, username = %account.username, "Account deleted");
        Ok(account)
    }

    /// A page of accounts ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] on store failure.
    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Account>, AuthError> {
        self.sessions
            .store_call(
                "list_accounts",
                self.sessions.store().list_accounts(limit, offset),
            )
            .await
    }

    /// Every account, read page by page.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] on store failure.
    pub async fn all(&self) -> Result<Vec<Account>, AuthError> {
        let mut accounts = Vec::new();
        loop {
            let page = self.list(LIST_PAGE, accounts.len()).await?;
            let done = page.len() < LIST_PAGE;
            accounts.extend(page);
            if done {
                return Ok(accounts);
            }
        }
    }

    /// Account counts per role.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::StoreUnavailable`] on store failure.
    pub async fn role_counts(&self) -> Result<RoleCounts, AuthError> {
        let mut counts = RoleCounts {
            by_role: Role::ALL
                .iter()
                .map(|role| (role.as_str().to_string(), 0))
                .collect(),
            total: 0,
        };

        for account in self.all().await? {
            *counts
                .by_role
                .entry(account.role.as_str().to_string())
                .or_default() += 1;
            counts.total += 1;
        }
        Ok(counts)
    }
}

impl std::fmt::Debug for AccountService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountService")
            .field("sessions", &self.sessions)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::auth::TokenCodec;
    use crate::store::MemoryStore;
    use jobsara_core::AuthConfig;

    pub fn registration(username: &str, role: &str) -> Registration {
        Registration {
            username: Some(username.to_string()),
            email: Some(format!("{username}@x.io")),
            password: Some("secret123".to_string()),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            user_type: Some(role.to_string()),
            ..Registration::default()
        }
    }

    pub fn service() -> (Arc<MemoryStore>, AccountService) {
        let store = Arc::new(MemoryStore::new());
        let config = AuthConfig::builder().hash_cost(1).build();
        let sessions = Arc::new(SessionManager::new(
            store.clone(),
            TokenCodec::new(&TokenCodec::generate_secret()),
            &config,
        ));
        (store, AccountService::new(sessions, PasswordHasher::new(1)))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::fixtures::{registration, service};
    use super::*;
    use crate::store::CredentialStore;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_register_issues_valid_session() {
        let (_, accounts) = service();
        let (account, session) = accounts
            .register(registration("ada", "job_seeker"))
            .await
            .unwrap();

        assert_eq!(account.role, Role::JobSeeker);
        assert_ne!(account.password_hash, "secret123");

        let resolved = accounts
            .sessions()
            .validate(&session.token, None)
            .await
            .unwrap();
        assert_eq!(resolved.id, account.id);
    }

    #[tokio::test]
    async fn test_register_rejects_missing_fields_and_bad_role() {
        let (store, accounts) = service();

        let mut missing = registration("ada", "job_seeker");
        missing.last_name = Some("   ".to_string());
        assert!(matches!(
            accounts.register(missing).await,
            Err(AuthError::InvalidInput(msg)) if msg == "Missing required fields"
        ));

        assert!(matches!(
            accounts.register(registration("ada", "wizard")).await,
            Err(AuthError::InvalidInput(msg)) if msg.starts_with("Invalid user type")
        ));

        assert_eq!(store.list_accounts(10, 0).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let (_, accounts) = service();
        accounts.register(registration("ada", "intern")).await.unwrap();

        let mut same_email = registration("other", "intern");
        same_email.email = Some("ADA@x.io".to_string());
        assert!(matches!(
            accounts.register(same_email).await,
            Err(AuthError::EmailTaken(_))
        ));

        let mut same_username = registration("ada", "intern");
        same_username.email = Some("fresh@x.io".to_string());
        assert!(matches!(
            accounts.register(same_username).await,
            Err(AuthError::UsernameTaken(_))
        ));
    }

    #[tokio::test]
    async fn test_login_failures_are_identical() {
        let (_, accounts) = service();
        accounts.register(registration("ada", "employer")).await.unwrap();

        let unknown = accounts.login("nobody@x.io", "secret123").await.unwrap_err();
        let wrong = accounts.login("ada@x.io", "wrong").await.unwrap_err();
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.public_message(), wrong.public_message());

        let (account, _) = accounts.login("ada@x.io", "secret123").await.unwrap();
        assert_eq!(account.username, "ada");
    }

    #[tokio::test]
    async fn test_unknown_email_verifies_decoy_hash() {
        let (_, accounts) = service();
        assert!(accounts.decoy_hash.get().is_none());

        let err = accounts.login("nobody@x.io", "secret123").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        let decoy = accounts.decoy_hash.get().cloned().unwrap();
        assert!(decoy.starts_with("$argon2id$"));

        accounts.login("ghost@x.io", "secret123").await.unwrap_err();
        assert_eq!(accounts.decoy_hash.get(), Some(&decoy));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let (_, accounts) = service();
        let account = accounts.create(registration("ada", "employer")).await.unwrap();

        let updated = accounts
            .update_profile(
                account.id,
                ProfileUpdate {
                    company_name: Some("Engines Ltd".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.company_name.as_deref(), Some("Engines Ltd"));
        assert_eq!(updated.username, "ada");

        assert!(matches!(
            accounts
                .update_profile(account.id, ProfileUpdate::default())
                .await,
            Err(AuthError::InvalidInput(_))
        ));
        assert!(matches!(
            accounts
                .update_profile(
                    AccountId(999),
                    ProfileUpdate {
                        bio: Some("x".into()),
                        ..ProfileUpdate::default()
                    }
                )
                .await,
            Err(AuthError::NotFound("User"))
        ));
    }

    #[tokio::test]
    async fn test_role_change_revokes_sessions() {
        let (_, accounts) = service();
        let (account, session) = accounts.register(registration("ada", "intern")).await.unwrap();

        let updated = accounts.set_role(account.id, Role::Employer).await.unwrap();
        assert_eq!(updated.role, Role::Employer);
        assert!(matches!(
            accounts.sessions().validate(&session.token, None).await,
            Err(AuthError::RevokedOrUnknown)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_profile_update_keeps_demotion() {
        let (store, accounts) = service();
        let id = accounts.create(registration("boss", "admin")).await.unwrap().id;
        store.set_latency(Duration::from_millis(100));

        let demote = {
            let accounts = accounts.clone();
            tokio::spawn(async move { accounts.set_role(id, Role::JobSeeker).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        accounts
            .update_profile(
                id,
                ProfileUpdate {
                    bio: Some("Hiring".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();
        demote.await.unwrap().unwrap();

        store.set_latency(Duration::ZERO);
        let stored = store.find_account_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::JobSeeker);
        assert_eq!(stored.bio.as_deref(), Some("Hiring"));
    }

    #[tokio::test]
    async fn test_reset_password_keeps_concurrent_profile_update() {
        let (store, accounts) = service();
        let id = accounts.create(registration("ada", "intern")).await.unwrap().id;
        store.set_latency(Duration::from_millis(100));

        let reset = {
            let accounts = accounts.clone();
            tokio::spawn(async move { accounts.reset_password(id, "n3w-pass".to_string()).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        accounts
            .update_profile(
                id,
                ProfileUpdate {
                    skills: Some("Rust".to_string()),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();
        reset.await.unwrap().unwrap();

        store.set_latency(Duration::ZERO);
        let stored = store.find_account_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.skills.as_deref(), Some("Rust"));
        assert!(accounts.login("ada@x.io", "n3w-pass").await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_password() {
        let (_, accounts) = service();
        let (account, session) = accounts.register(registration("ada", "intern")).await.unwrap();

        accounts
            .reset_password(account.id, "n3w-pass".to_string())
            .await
            .unwrap();

        assert!(accounts.sessions().validate(&session.token, None).await.is_err());
        assert!(accounts.login("ada@x.io", "secret123").await.is_err());
        assert!(accounts.login("ada@x.io", "n3w-pass").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_cascades_sessions() {
        let (store, accounts) = service();
        let (account, session) = accounts.register(registration("ada", "intern")).await.unwrap();

        accounts.delete(account.id).await.unwrap();

        assert!(
            store
                .find_live_session(&session.token, account.id, Utc::now())
                .await
                .unwrap()
                .is_none()
        );
        assert!(matches!(
            accounts.delete(account.id).await,
            Err(AuthError::NotFound("User"))
        ));
    }

    #[tokio::test]
    async fn test_role_counts() {
        let (_, accounts) = service();
        accounts.create(registration("a", "intern")).await.unwrap();
        accounts.create(registration("b", "intern")).await.unwrap();
        accounts.create(registration("c", "teacher")).await.unwrap();

        let counts = accounts.role_counts().await.unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.by_role["intern"], 2);
        assert_eq!(counts.by_role["teacher"], 1);
        assert_eq!(counts.by_role["admin"], 0);
    }

    #[tokio::test]
    async fn test_find_by_email_or_username() {
        let (_, accounts) = service();
        let account = accounts.create(registration("ada", "intern")).await.unwrap();

        assert_eq!(accounts.find("ada").await.unwrap().id, account.id);
        assert_eq!(accounts.find("ada@x.io").await.unwrap().id, account.id);
        assert!(accounts.find("nobody").await.is_err());
    }
}
