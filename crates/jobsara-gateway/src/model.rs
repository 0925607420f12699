//! Persisted records: accounts, sessions and courses.

use chrono::{DateTime, Utc};
use jobsara_core::{AccountId, Locale, Role};
use serde::{Deserialize, Serialize};

/// Account record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Store-assigned, immutable ID.
    pub id: AccountId,
    /// Unique login name.
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// Argon2 PHC string. Never exposed through the public representation.
    pub password_hash: String,
    /// Authorization role.
    pub role: Role,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Employer's company.
    #[serde(default)]
    pub company_name: Option<String>,
    /// Free-form skill list.
    #[serde(default)]
    pub skills: Option<String>,
    /// Self-declared experience level.
    #[serde(default)]
    pub experience_level: Option<String>,
    /// Resume text or link.
    #[serde(default)]
    pub resume: Option<String>,
    /// Short biography shown in the teacher directory.
    #[serde(default)]
    pub bio: Option<String>,
    /// Display locale; assigned lazily on first authenticated request.
    #[serde(default)]
    pub locale: Option<Locale>,
    /// Rating, 0 until rated.
    #[serde(default)]
    pub rating: f64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Representation safe for API responses (no password hash).
    #[must_use]
    pub fn to_public(&self) -> PublicAccount {
        PublicAccount {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
            company_name: self.company_name.clone(),
            skills: self.skills.clone(),
            experience_level: self.experience_level.clone(),
            resume: self.resume.clone(),
            bio: self.bio.clone(),
            locale: self.locale,
            rating: self.rating,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Locale to render messages in, defaulting to English.
    #[must_use]
    pub fn display_locale(&self) -> Locale {
        self.locale.unwrap_or_default()
    }
}

/// Public account representation (for API responses).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAccount {
    /// Account ID.
    pub id: AccountId,
    /// Username.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Role, serialized under the historical `userType` key.
    #[serde(rename = "userType")]
    pub role: Role,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
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
    /// Display locale.
    pub locale: Option<Locale>,
    /// Rating.
    pub rating: f64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating an account. The store assigns the ID and
/// timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    /// Username.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Already-hashed password.
    pub password_hash: String,
    /// Role.
    pub role: Role,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
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

impl NewAccount {
    /// Materialize the record under an assigned ID.
    #[must_use]
    pub fn into_account(self, id: AccountId, now: DateTime<Utc>) -> Account {
        Account {
            id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            role: self.role,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            company_name: self.company_name,
            skills: self.skills,
            experience_level: self.experience_level,
            resume: self.resume,
            bio: self.bio,
            locale: None,
            rating: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial profile update. `None` leaves a field unchanged.
///
/// Username, email, role and password are not profile fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileUpdate {
    /// Given name.
    pub first_name: Option<String>,
    /// Family name.
    pub last_name: Option<String>,
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
    /// Display locale.
    pub locale: Option<Locale>,
}

impl ProfileUpdate {
    /// Whether the update carries no field at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to an account, bumping `updated_at`.
    pub fn apply(self, account: &mut Account, now: DateTime<Utc>) {
        if let Some(first_name) = self.first_name {
            account.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            account.last_name = last_name;
        }
        replace_if_set(&mut account.phone, self.phone);
        replace_if_set(&mut account.company_name, self.company_name);
        replace_if_set(&mut account.skills, self.skills);
        replace_if_set(&mut account.experience_level, self.experience_level);
        replace_if_set(&mut account.resume, self.resume);
        replace_if_set(&mut account.bio, self.bio);
        replace_if_set(&mut account.locale, self.locale);
        account.updated_at = now;
    }
}

/// A change to a subset of an account's fields. Stores apply it as a single
/// read-modify-write so concurrent changes to other fields survive.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountChange {
    /// Replace the profile fields that are set.
    Profile(ProfileUpdate),
    /// Replace the role.
    Role(Role),
    /// Replace the password hash.
    PasswordHash(String),
}

impl AccountChange {
    /// Apply to an account, bumping `updated_at`.
    pub fn apply(&self, account: &mut Account, now: DateTime<Utc>) {
        match self {
            Self::Profile(update) => update.clone().apply(account, now),
            Self::Role(role) => {
                account.role = *role;
                account.updated_at = now;
            }
            Self::PasswordHash(hash) => {
                account.password_hash.clone_from(hash);
                account.updated_at = now;
            }
        }
    }
}

fn replace_if_set<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Server-side session record backing one issued bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The bearer token string.
    pub token: String,
    /// Owning account.
    pub account_id: AccountId,
    /// Absolute expiry, stored independently of the token's own claim.
    pub expires_at: DateTime<Utc>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session still authenticates at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Course taught by a teacher account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    /// Store-assigned ID.
    pub id: u64,
    /// Teaching account.
    pub teacher_id: AccountId,
    /// Title.
    pub title: String,
    /// Description.
    pub description: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when creating a course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCourse {
    /// Teaching account.
    pub teacher_id: AccountId,
    /// Title.
    pub title: String,
    /// Description.
    pub description: Option<String>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn new_account(username: &str, email: &str, role: Role) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaGhhc2hoYXNo".to_string(),
            role,
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: None,
            company_name: None,
            skills: None,
            experience_level: None,
            resume: None,
            bio: None,
        }
    }
}
