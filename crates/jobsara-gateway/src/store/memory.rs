//! In-memory store for tests and ephemeral deployments.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobsara_core::{AccountId, Locale};
use tokio::sync::RwLock;

use super::{CredentialStore, StoreError, normalize_key};
use crate::model::{Account, AccountChange, Course, NewAccount, NewCourse, Session};

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    sessions: HashMap<String, Session>,
    courses: BTreeMap<u64, Course>,
}

impl Tables {
    fn find_by(&self, pred: impl Fn(&Account) -> bool) -> Option<Account> {
        self.accounts.values().find(|a| pred(a)).cloned()
    }
}

/// Credential store held entirely in memory.
///
/// Counts every call and can be told to fail or stall, so callers can assert
/// how (and whether) the store was touched.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    next_id: AtomicU64,
    calls: AtomicUsize,
    failing: Mutex<Option<&'static str>>,
    latency: Mutex<Option<Duration>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store operations invoked so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the named operation fail with a backend error (`"*"` fails every
    /// operation; `None` clears).
    pub fn set_failing(&self, operation: Option<&'static str>) {
        if let Ok(mut failing) = self.failing.lock() {
            *failing = operation;
        }
    }

    /// Delay every operation by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut slot) = self.latency.lock() {
            *slot = Some(latency);
        }
    }

    async fn enter(&self, operation: &'static str) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let latency = self.latency.lock().ok().and_then(|l| *l);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failing = self.failing.lock().ok().and_then(|f| *f);
        match failing {
            Some(name) if name == "*" || name == operation => {
                Err(StoreError::Backend(format!("{operation}: injected failure")))
            }
            _ => Ok(()),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        self.enter("create_account").await?;
        let mut tables = self.tables.write().await;

        let username = normalize_key(&account.username);
        let email = normalize_key(&account.email);
        if tables
            .find_by(|a| normalize_key(&a.username) == username)
            .is_some()
        {
            return Err(StoreError::UsernameTaken(account.username));
        }
        if tables.find_by(|a| normalize_key(&a.email) == email).is_some() {
            return Err(StoreError::EmailTaken(account.email));
        }

        let id = AccountId(self.next_id());
        let account = account.into_account(id, Utc::now());
        tables.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.enter("find_account_by_id").await?;
        Ok(self.tables.read().await.accounts.get(&id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.enter("find_account_by_email").await?;
        let email = normalize_key(email);
        Ok(self
            .tables
            .read()
            .await
            .find_by(|a| normalize_key(&a.email) == email))
    }

    async fn find_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, StoreError> {
        self.enter("find_account_by_username").await?;
        let username = normalize_key(username);
        Ok(self
            .tables
            .read()
            .await
            .find_by(|a| normalize_key(&a.username) == username))
    }

    async fn update_account(&self, account: &Account) -> Result<bool, StoreError> {
        self.enter("update_account").await?;
        let mut tables = self.tables.write().await;
        Ok(tables
            .accounts
            .get_mut(&account.id)
            .map(|slot| *slot = account.clone())
            .is_some())
    }

    async fn modify_account(
        &self,
        id: AccountId,
        change: &AccountChange,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, StoreError> {
        self.enter("modify_account").await?;
        let mut tables = self.tables.write().await;
        Ok(tables.accounts.get_mut(&id).map(|account| {
            change.apply(account, now);
            account.clone()
        }))
    }

    async fn update_account_locale(
        &self,
        id: AccountId,
        locale: Locale,
    ) -> Result<bool, StoreError> {
        self.enter("update_account_locale").await?;
        let mut tables = self.tables.write().await;
        Ok(tables
            .accounts
            .get_mut(&id)
            .map(|account| account.locale = Some(locale))
            .is_some())
    }

    async fn delete_account(&self, id: AccountId) -> Result<bool, StoreError> {
        self.enter("delete_account").await?;
        let mut tables = self.tables.write().await;
        if tables.accounts.remove(&id).is_none() {
            return Ok(false);
        }
        tables.courses.retain(|_, course| course.teacher_id != id);
        Ok(true)
    }

    async fn list_accounts(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Account>, StoreError> {
        self.enter("list_accounts").await?;
        Ok(self
            .tables
            .read()
            .await
            .accounts
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        self.enter("insert_session").await?;
        let mut tables = self.tables.write().await;
        if tables.sessions.contains_key(&session.token) {
            return Err(StoreError::DuplicateSession);
        }
        tables
            .sessions
            .insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn find_live_session(
        &self,
        token: &str,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError> {
        self.enter("find_live_session").await?;
        Ok(self
            .tables
            .read()
            .await
            .sessions
            .get(token)
            .filter(|s| s.account_id == account_id && s.is_live(now))
            .cloned())
    }

    async fn delete_session(&self, token: &str) -> Result<bool, StoreError> {
        self.enter("delete_session").await?;
        Ok(self.tables.write().await.sessions.remove(token).is_some())
    }

    async fn delete_sessions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<usize, StoreError> {
        self.enter("delete_sessions_for_account").await?;
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.account_id != account_id);
        Ok(before - tables.sessions.len())
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        self.enter("purge_expired_sessions").await?;
        let mut tables = self.tables.write().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, s| s.is_live(now));
        Ok(before - tables.sessions.len())
    }

    async fn create_course(&self, course: NewCourse) -> Result<Course, StoreError> {
        self.enter("create_course").await?;
        let course = Course {
            id: self.next_id(),
            teacher_id: course.teacher_id,
            title: course.title,
            description: course.description,
            created_at: Utc::now(),
        };
        self.tables
            .write()
            .await
            .courses
            .insert(course.id, course.clone());
        Ok(course)
    }

    async fn count_courses(&self, teacher_id: AccountId) -> Result<usize, StoreError> {
        self.enter("count_courses").await?;
        Ok(self
            .tables
            .read()
            .await
            .courses
            .values()
            .filter(|c| c.teacher_id == teacher_id)
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::new_account;
    use jobsara_core::Role;

    fn session(token: &str, account_id: AccountId, ttl: chrono::Duration) -> Session {
        let now = Utc::now();
        Session {
            token: token.to_string(),
            account_id,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_counts_calls() {
        let store = MemoryStore::new();
        assert_eq!(store.calls(), 0);

        store.find_account_by_id(AccountId(1)).await.unwrap();
        store.delete_session("nope").await.unwrap();
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn test_unique_fields_case_insensitive() {
        let store = MemoryStore::new();
        store
            .create_account(new_account("ada", "ada@x.io", Role::Intern))
            .await
            .unwrap();

        assert!(matches!(
            store
                .create_account(new_account("Ada", "b@x.io", Role::Intern))
                .await,
            Err(StoreError::UsernameTaken(_))
        ));
        assert!(matches!(
            store
                .create_account(new_account("bob", "ADA@x.io", Role::Intern))
                .await,
            Err(StoreError::EmailTaken(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryStore::new();
        store.set_failing(Some("find_live_session"));

        assert!(store.find_account_by_id(AccountId(1)).await.is_ok());
        assert!(matches!(
            store
                .find_live_session("t", AccountId(1), Utc::now())
                .await,
            Err(StoreError::Backend(_))
        ));

        store.set_failing(Some("*"));
        assert!(store.find_account_by_id(AccountId(1)).await.is_err());

        store.set_failing(None);
        assert!(store.find_account_by_id(AccountId(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_sessions_filtered_by_account_and_expiry() {
        let store = MemoryStore::new();
        store
            .insert_session(&session("live", AccountId(1), chrono::Duration::hours(1)))
            .await
            .unwrap();
        store
            .insert_session(&session("dead", AccountId(1), chrono::Duration::seconds(-5)))
            .await
            .unwrap();

        let now = Utc::now();
        assert!(store.find_live_session("live", AccountId(1), now).await.unwrap().is_some());
        assert!(store.find_live_session("live", AccountId(2), now).await.unwrap().is_none());
        assert!(store.find_live_session("dead", AccountId(1), now).await.unwrap().is_none());

        assert_eq!(store.purge_expired_sessions(now).await.unwrap(), 1);
        assert_eq!(store.delete_sessions_for_account(AccountId(1)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_account_drops_courses() {
        let store = MemoryStore::new();
        let teacher = store
            .create_account(new_account("t", "t@x.io", Role::Teacher))
            .await
            .unwrap();
        store
            .create_course(NewCourse {
                teacher_id: teacher.id,
                title: "Persian".to_string(),
                description: Some("Beginner".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(store.count_courses(teacher.id).await.unwrap(), 1);
        assert!(store.delete_account(teacher.id).await.unwrap());
        assert_eq!(store.count_courses(teacher.id).await.unwrap(), 0);
    }
}
