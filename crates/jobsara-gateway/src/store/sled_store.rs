//! Durable store backed by sled.
//!
//! Trees:
//! - `accounts`: account id (big-endian) -> account JSON
//! - `account_index`: `username:{lower}` / `email:{lower}` -> account id
//! - `sessions`: token -> session JSON
//! - `account_sessions`: account id ++ token -> empty (per-account session index)
//! - `courses`: course id -> course JSON
//! - `teacher_courses`: teacher id ++ course id -> empty

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jobsara_core::{AccountId, Locale};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sled::Transactional;
use sled::transaction::{ConflictableTransactionResult, TransactionError, abort};

use super::{CredentialStore, StoreError, normalize_key};
use crate::model::{Account, AccountChange, Course, NewAccount, NewCourse, Session};

const USERNAME_PREFIX: &str = "username:";
const EMAIL_PREFIX: &str = "email:";

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

impl From<TransactionError<Self>> for StoreError {
    fn from(e: TransactionError<Self>) -> Self {
        match e {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(e) => e.into(),
        }
    }
}

/// Credential store backed by sled.
pub struct SledStore {
    db: sled::Db,
    accounts: sled::Tree,
    account_index: sled::Tree,
    sessions: sled::Tree,
    account_sessions: sled::Tree,
    courses: sled::Tree,
    teacher_courses: sled::Tree,
}

impl SledStore {
    /// Open or create a store under the given data directory.
    ///
    /// # Errors
    ///
    /// Returns error if the database cannot be opened.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = sled::open(path.join("store"))
            .map_err(|e| StoreError::Backend(format!("Failed to open store database: {e}")))?;
        Self::with_db(db)
    }

    /// Create a store on an existing sled database.
    ///
    /// # Errors
    ///
    /// Returns error if a tree cannot be opened.
    pub fn with_db(db: sled::Db) -> Result<Self, StoreError> {
        Ok(Self {
            accounts: db.open_tree("accounts")?,
            account_index: db.open_tree("account_index")?,
            sessions: db.open_tree("sessions")?,
            account_sessions: db.open_tree("account_sessions")?,
            courses: db.open_tree("courses")?,
            teacher_courses: db.open_tree("teacher_courses")?,
            db,
        })
    }

    /// Create a throwaway store that is removed when dropped.
    ///
    /// # Errors
    ///
    /// Returns error if the temporary database cannot be created.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::with_db(db)
    }

    fn next_id(&self) -> Result<u64, StoreError> {
        // sled ids start at 0; account ids start at 1.
        Ok(self.db.generate_id()? + 1)
    }

    fn get_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.accounts
            .get(id.to_be_bytes())?
            .map(|value| decode(&value))
            .transpose()
    }

    fn find_by_index(&self, prefix: &str, value: &str) -> Result<Option<Account>, StoreError> {
        let key = index_key(prefix, value);
        match self.account_index.get(key.as_bytes())? {
            Some(id_bytes) => self.get_account(decode_id(&id_bytes)?),
            None => Ok(None),
        }
    }

    fn get_session(&self, token: &str) -> Result<Option<Session>, StoreError> {
        self.sessions
            .get(token.as_bytes())?
            .map(|value| decode(&value))
            .transpose()
    }

    /// Remove the given sessions from both session trees in one transaction.
    async fn remove_sessions(
        &self,
        sessions: &[(String, AccountId)],
    ) -> Result<usize, StoreError> {
        if sessions.is_empty() {
            return Ok(0);
        }

        let removed = (&self.sessions, &self.account_sessions).transaction(
            |(tx_sessions, tx_by_account)| -> ConflictableTransactionResult<usize, StoreError> {
                let mut removed = 0;
                for (token, account_id) in sessions {
                    if tx_sessions.remove(token.as_bytes())?.is_some() {
                        removed += 1;
                    }
                    tx_by_account.remove(session_index_key(*account_id, token))?;
                }
                Ok(removed)
            },
        )?;

        self.db.flush_async().await?;
        Ok(removed)
    }
}

#[async_trait]
impl CredentialStore for SledStore {
    async fn create_account(&self, account: NewAccount) -> Result<Account, StoreError> {
        let id = AccountId(self.next_id()?);
        let account = account.into_account(id, Utc::now());
        let value = encode(&account)?;
        let username_key = index_key(USERNAME_PREFIX, &account.username);
        let email_key = index_key(EMAIL_PREFIX, &account.email);
        let id_bytes = id.to_be_bytes();

        (&self.accounts, &self.account_index).transaction(
            |(tx_accounts, tx_index)| -> ConflictableTransactionResult<(), StoreError> {
                if tx_index.get(username_key.as_bytes())?.is_some() {
                    return abort(StoreError::UsernameTaken(account.username.clone()));
                }
                if tx_index.get(email_key.as_bytes())?.is_some() {
                    return abort(StoreError::EmailTaken(account.email.clone()));
                }
                tx_index.insert(username_key.as_bytes(), id_bytes.as_slice())?;
                tx_index.insert(email_key.as_bytes(), id_bytes.as_slice())?;
                tx_accounts.insert(id_bytes.as_slice(), value.as_slice())?;
                Ok(())
            },
        )?;

        self.db.flush_async().await?;
        tracing::debug!(account_id = %id, username = %account.username, "Account created");
        Ok(account)
    }

    async fn find_account_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        self.get_account(id)
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        self.find_by_index(EMAIL_PREFIX, email)
    }

    async fn find_account_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Account>, StoreError> {
        self.find_by_index(USERNAME_PREFIX, username)
    }

    async fn update_account(&self, account: &Account) -> Result<bool, StoreError> {
        let key = account.id.to_be_bytes();
        let value = encode(account)?;

        let updated = self.accounts.transaction(
            |tx| -> ConflictableTransactionResult<bool, StoreError> {
                if tx.get(key.as_slice())?.is_none() {
                    return Ok(false);
                }
                tx.insert(key.as_slice(), value.as_slice())?;
                Ok(true)
            },
        )?;

        if updated {
            self.db.flush_async().await?;
        }
        Ok(updated)
    }

    async fn modify_account(
        &self,
        id: AccountId,
        change: &AccountChange,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, StoreError> {
        let key = id.to_be_bytes();

        let updated = self.accounts.transaction(
            |tx| -> ConflictableTransactionResult<Option<Account>, StoreError> {
                let Some(value) = tx.get(key.as_slice())? else {
                    return Ok(None);
                };
                let mut account: Account = match decode(&value) {
                    Ok(account) => account,
                    Err(e) => return abort(e),
                };
                change.apply(&mut account, now);
                let value = match encode(&account) {
                    Ok(value) => value,
                    Err(e) => return abort(e),
                };
                tx.insert(key.as_slice(), value)?;
                Ok(Some(account))
            },
        )?;

        if updated.is_some() {
            self.db.flush_async().await?;
        }
        Ok(updated)
    }

    async fn update_account_locale(
        &self,
        id: AccountId,
        locale: Locale,
    ) -> Result<bool, StoreError> {
        let key = id.to_be_bytes();

        let updated = self.accounts.transaction(
            |tx| -> ConflictableTransactionResult<bool, StoreError> {
                let Some(value) = tx.get(key.as_slice())? else {
                    return Ok(false);
                };
                let mut account: Account = match decode(&value) {
                    Ok(account) => account,
                    Err(e) => return abort(e),
                };
                account.locale = Some(locale);
                let value = match encode(&account) {
                    Ok(value) => value,
                    Err(e) => return abort(e),
                };
                tx.insert(key.as_slice(), value)?;
                Ok(true)
            },
        )?;

        if updated {
            self.db.flush_async().await?;
        }
        Ok(updated)
    }

    async fn delete_account(&self, id: AccountId) -> Result<bool, StoreError> {
        let Some(account) = self.get_account(id)? else {
            return Ok(false);
        };

        let course_keys = self
            .teacher_courses
            .scan_prefix(id.to_be_bytes())
            .keys()
            .collect::<Result<Vec<_>, _>>()?;

        let key = id.to_be_bytes();
        let username_key = index_key(USERNAME_PREFIX, &account.username);
        let email_key = index_key(EMAIL_PREFIX, &account.email);

        let removed = (
            &self.accounts,
            &self.account_index,
            &self.courses,
            &self.teacher_courses,
        )
            .transaction(
                |(tx_accounts, tx_index, tx_courses, tx_teacher_courses)| -> ConflictableTransactionResult<bool, StoreError> {
                    if tx_accounts.remove(key.as_slice())?.is_none() {
                        return Ok(false);
                    }
                    tx_index.remove(username_key.as_bytes())?;
                    tx_index.remove(email_key.as_bytes())?;
                    for course_key in &course_keys {
                        // teacher id (8 bytes) ++ course id
                        tx_courses.remove(&course_key[8..])?;
                        tx_teacher_courses.remove(&course_key[..])?;
                    }
                    Ok(true)
                },
            )?;

        if removed {
            self.db.flush_async().await?;
            tracing::debug!(account_id = %id, courses = course_keys.len(), "Account deleted");
        }
        Ok(removed)
    }

    async fn list_accounts(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Account>, StoreError> {
        self.accounts
            .iter()
            .values()
            .skip(offset)
            .take(limit)
            .map(|value| decode(&value?))
            .collect()
    }

    async fn insert_session(&self, session: &Session) -> Result<(), StoreError> {
        let value = encode(session)?;
        let by_account_key = session_index_key(session.account_id, &session.token);

        (&self.sessions, &self.account_sessions).transaction(
            |(tx_sessions, tx_by_account)| -> ConflictableTransactionResult<(), StoreError> {
                if tx_sessions.get(session.token.as_bytes())?.is_some() {
                    return abort(StoreError::DuplicateSession);
                }
                tx_sessions.insert(session.token.as_bytes(), value.as_slice())?;
                tx_by_account.insert(by_account_key.as_slice(), &[] as &[u8])?;
                Ok(())
            },
        )?;

        self.db.flush_async().await?;
        Ok(())
    }

    async fn find_live_session(
        &self,
        token: &str,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, StoreError> {
        Ok(self
            .get_session(token)?
            .filter(|session| session.account_id == account_id && session.is_live(now)))
    }

    async fn delete_session(&self, token: &str) -> Result<bool, StoreError> {
        let Some(session) = self.get_session(token)? else {
            return Ok(false);
        };
        let removed = self
            .remove_sessions(&[(session.token, session.account_id)])
            .await?;
        Ok(removed > 0)
    }

    async fn delete_sessions_for_account(
        &self,
        account_id: AccountId,
    ) -> Result<usize, StoreError> {
        let sessions = self
            .account_sessions
            .scan_prefix(account_id.to_be_bytes())
            .keys()
            .map(|key| {
                let key = key?;
                let token = String::from_utf8(key[8..].to_vec())
                    .map_err(|e| StoreError::Corrupt(format!("Session index key: {e}")))?;
                Ok((token, account_id))
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        self.remove_sessions(&sessions).await
    }

    async fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut expired = Vec::new();
        for value in self.sessions.iter().values() {
            let session: Session = decode(&value?)?;
            if !session.is_live(now) {
                expired.push((session.token, session.account_id));
            }
        }

        self.remove_sessions(&expired).await
    }

    async fn create_course(&self, course: NewCourse) -> Result<Course, StoreError> {
        let course = Course {
            id: self.next_id()?,
            teacher_id: course.teacher_id,
            title: course.title,
            description: course.description,
            created_at: Utc::now(),
        };
        let value = encode(&course)?;
        let course_key = course.id.to_be_bytes();
        let mut teacher_key = course.teacher_id.to_be_bytes().to_vec();
        teacher_key.extend_from_slice(&course_key);

        (&self.courses, &self.teacher_courses).transaction(
            |(tx_courses, tx_teacher_courses)| -> ConflictableTransactionResult<(), StoreError> {
                tx_courses.insert(course_key.as_slice(), value.as_slice())?;
                tx_teacher_courses.insert(teacher_key.as_slice(), &[] as &[u8])?;
                Ok(())
            },
        )?;

        self.db.flush_async().await?;
        Ok(course)
    }

    async fn count_courses(&self, teacher_id: AccountId) -> Result<usize, StoreError> {
        let mut count = 0;
        for key in self.teacher_courses.scan_prefix(teacher_id.to_be_bytes()).keys() {
            key?;
            count += 1;
        }
        Ok(count)
    }
}

fn index_key(prefix: &str, value: &str) -> String {
    format!("{prefix}{}", normalize_key(value))
}

fn session_index_key(account_id: AccountId, token: &str) -> Vec<u8> {
    let mut key = account_id.to_be_bytes().to_vec();
    key.extend_from_slice(token.as_bytes());
    key
}

fn decode_id(bytes: &[u8]) -> Result<AccountId, StoreError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Corrupt(format!("Index entry of {} bytes", bytes.len())))?;
    Ok(AccountId(u64::from_be_bytes(raw)))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::Corrupt(format!("Serialization error: {e}")))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes)
        .map_err(|e| StoreError::Corrupt(format!("Deserialization error: {e}")))
}
