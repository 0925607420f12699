//! Signed bearer tokens (HS256 JWT).

use std::time::Duration;

use chrono::{DateTime, Utc};
use jobsara_core::{AccountId, AuthConfig, Role};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::AuthError;

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Account the token was issued to.
    pub account_id: AccountId,
    /// Account email at issue time.
    pub email: String,
    /// Account role at issue time.
    pub role: Role,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expires at (Unix seconds).
    pub exp: i64,
    /// Random nonce; keeps tokens issued in the same second distinct.
    pub jti: String,
}

impl Claims {
    /// Expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

/// A freshly issued token with its claims.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Encoded token.
    pub token: String,
    /// Claims it carries.
    pub claims: Claims,
}

/// Issues and verifies signed tokens. Stateless and shareable.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Create a codec from raw secret bytes.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Create a codec from the configured hex secret.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if the secret is missing, not hex, or too
    /// short.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let secret = config.signing_secret()?;
        Ok(Self::new(&secret))
    }

    /// Generate a random 256-bit secret key.
    #[must_use]
    pub fn generate_secret() -> [u8; 32] {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }

    /// Generate a random secret as hex string.
    #[must_use]
    pub fn generate_hex_secret() -> String {
        hex::encode(Self::generate_secret())
    }

    /// Issue a token valid for `ttl` from now.
    ///
    /// # Errors
    ///
    /// Returns error if encoding fails.
    pub fn issue(
        &self,
        account_id: AccountId,
        email: &str,
        role: Role,
        ttl: Duration,
    ) -> Result<IssuedToken, AuthError> {
        self.issue_at(Utc::now(), account_id, email, role, ttl)
    }

    pub(crate) fn issue_at(
        &self,
        now: DateTime<Utc>,
        account_id: AccountId,
        email: &str,
        role: Role,
        ttl: Duration,
    ) -> Result<IssuedToken, AuthError> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| AuthError::Config(format!("Token TTL out of range: {e}")))?;

        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);

        let claims = Claims {
            account_id,
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: hex::encode(nonce),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Config(format!("Token encoding failed: {e}")))?;

        Ok(IssuedToken { token, claims })
    }

    /// Verify signature and expiry, returning the claims.
    ///
    /// The signature is checked before expiry, so a forged expired token is
    /// reported as a bad signature.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MalformedToken`], [`AuthError::InvalidSignature`]
    /// or [`AuthError::ExpiredToken`].
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            })
    }

    /// Extract token from Authorization header.
    ///
    /// Expects format: "Bearer <token>"
    #[must_use]
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}
