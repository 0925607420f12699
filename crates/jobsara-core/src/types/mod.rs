//! Core types used throughout JobSara.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique numeric identifier for an account.
///
/// Assigned by the credential store on creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl AccountId {
    /// Create a new account ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Big-endian key bytes, so ordered stores iterate accounts by id.
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AccountId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for AccountId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

/// Account role. Closed set; governs authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Looking for a job.
    JobSeeker,
    /// Looking for an internship.
    Intern,
    /// Posts jobs.
    Employer,
    /// Full administrative access.
    Admin,
    /// Listed in the teacher directory.
    Teacher,
}

impl Role {
    /// Every role, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::JobSeeker,
        Self::Intern,
        Self::Employer,
        Self::Admin,
        Self::Teacher,
    ];

    /// Check if this role has admin privileges.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::JobSeeker => "job_seeker",
            Self::Intern => "intern",
            Self::Employer => "employer",
            Self::Admin => "admin",
            Self::Teacher => "teacher",
        }
    }

    /// Comma-separated list of valid role names, for error messages.
    #[must_use]
    pub fn valid_names() -> String {
        Self::ALL.map(Self::as_str).join(", ")
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "job_seeker" => Ok(Self::JobSeeker),
            "intern" => Ok(Self::Intern),
            "employer" => Ok(Self::Employer),
            "admin" => Ok(Self::Admin),
            "teacher" => Ok(Self::Teacher),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip_names() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("operator".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_uses_snake_case() {
        let json = serde_json::to_string(&Role::JobSeeker).unwrap();
        assert_eq!(json, "\"job_seeker\"");
        let role: Role = serde_json::from_str("\"teacher\"").unwrap();
        assert_eq!(role, Role::Teacher);
    }

    #[test]
    fn test_only_admin_is_admin() {
        assert!(Role::Admin.is_admin());
        assert!(!Role::Employer.is_admin());
        assert!(!Role::Teacher.is_admin());
    }

    #[test]
    fn test_valid_names() {
        assert_eq!(
            Role::valid_names(),
            "job_seeker, intern, employer, admin, teacher"
        );
    }

    #[test]
    fn test_account_id_parse() {
        assert_eq!(" 42 ".parse::<AccountId>().unwrap(), AccountId(42));
        assert!("abc".parse::<AccountId>().is_err());
        assert_eq!(AccountId(7).to_string(), "7");
    }
}
