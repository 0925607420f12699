//! Password hashing with Argon2id.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        self, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

use rand::Rng;

use super::AuthError;

/// Salted one-way password hasher with a configurable work factor.
///
/// The work factor is the Argon2 iteration count; memory and parallelism use
/// the library defaults. Verification reads parameters from the stored PHC
/// string, so hashes made under an older cost keep verifying.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    /// Create a hasher with the given iteration count.
    #[must_use]
    pub const fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Random password for operator-created accounts.
    #[must_use]
    pub fn generate_password(length: usize) -> String {
        const CHARSET: &[u8] =
            b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";
        let mut rng = rand::thread_rng();
        (0..length)
            .map(|_| char::from(CHARSET[rng.gen_range(0..CHARSET.len())]))
            .collect()
    }

    fn argon2(&self) -> Result<Argon2<'static>, AuthError> {
        let params = Params::new(
            Params::DEFAULT_M_COST,
            self.cost,
            Params::DEFAULT_P_COST,
            None,
        )
        .map_err(|e| AuthError::HashFailure(format!("Invalid hash parameters: {e}")))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hash a plaintext password into a PHC string.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::HashFailure`] if hashing fails.
    pub fn hash(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| AuthError::HashFailure(e.to_string()))
    }

    /// Check a plaintext password against a stored hash.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::HashFailure`] if the stored hash is unreadable or
    /// verification faults. A mismatch is `Ok(false)`.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AuthError::HashFailure(format!("Invalid stored hash: {e}")))?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::HashFailure(e.to_string())),
        }
    }

    /// [`Self::hash`] on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::HashFailure`] if hashing fails or the task panics.
    pub async fn hash_blocking(&self, password: String) -> Result<String, AuthError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::HashFailure(format!("Hashing task failed: {e}")))?
    }

    /// [`Self::verify`] on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::HashFailure`] if verification faults or the task
    /// panics.
    pub async fn verify_blocking(&self, password: String, hash: String) -> Result<bool, AuthError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::HashFailure(format!("Verification task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_password() {
        let a = PasswordHasher::generate_password(16);
        let b = PasswordHasher::generate_password(16);
        assert_eq!(a.chars().count(), 16);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::new(1);
        let hash = hasher.hash("pw1").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(!hash.contains("pw1"));
        assert!(hasher.verify("pw1", &hash).unwrap());
        assert!(!hasher.verify("pw2", &hash).unwrap());
    }

    #[test]
    fn test_salted() {
        let hasher = PasswordHasher::new(1);
        assert_ne!(hasher.hash("same").unwrap(), hasher.hash("same").unwrap());
    }

    #[test]
    fn test_verify_across_costs() {
        let old = PasswordHasher::new(1).hash("pw").unwrap();
        assert!(PasswordHasher::new(3).verify("pw", &old).unwrap());
    }

    #[test]
    fn test_garbage_hash_is_failure_not_mismatch() {
        let hasher = PasswordHasher::new(1);
        assert!(matches!(
            hasher.verify("pw", "plaintext-password"),
            Err(AuthError::HashFailure(_))
        ));
    }

    #[test]
    fn test_zero_cost_is_failure() {
        assert!(matches!(
            PasswordHasher::new(0).hash("pw"),
            Err(AuthError::HashFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_blocking_variants() {
        let hasher = PasswordHasher::new(1);
        let hash = hasher.hash_blocking("secret".to_string()).await.unwrap();
        assert!(
            hasher
                .verify_blocking("secret".to_string(), hash)
                .await
                .unwrap()
        );
    }
}
