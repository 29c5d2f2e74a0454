//! Signed session tokens.
//!
//! Tokens are HS256 JWTs carrying the user id, username and role. Expiry is
//! checked against an explicit `now` instead of the system clock so the
//! caller decides what time it is.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SessionConfig;
use crate::db::User;
use crate::domain::{Role, UserId};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Invalid or expired token")]
    Invalid,

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Claims embedded in every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub jti: String,
    pub sub: UserId,
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub const fn user_id(&self) -> UserId {
        self.sub
    }

    #[must_use]
    pub const fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }
}

#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionIssuer {
    #[must_use]
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            config.secret.as_bytes(),
            Duration::hours(i64::from(config.expires_in_hours)),
        )
    }

    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<SessionToken, SessionError> {
        let expires_at = now + self.ttl;

        let claims = Claims {
            jti: uuid::Uuid::new_v4().to_string(),
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SessionError::Signing(e.to_string()))?;

        Ok(SessionToken { token, expires_at })
    }

    /// Check the signature and that `now` is strictly before expiry.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| SessionError::Invalid)?
            .claims;

        if claims.is_expired_at(now) {
            return Err(SessionError::Invalid);
        }

        Ok(claims)
    }
}
