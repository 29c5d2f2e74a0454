//! Domain service for admin authentication and password recovery.
//!
//! Handles login, session verification, and the two-step OTP password reset.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::db::{StoreError, User};
use crate::domain::{Otp, Role, UserId};
use crate::services::notifications::NotifyError;
use crate::services::session::{Claims, SessionError};

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("No account found with this email address")]
    UnknownEmail,

    #[error("Invalid or expired OTP")]
    InvalidOrExpiredOtp,

    #[error("Invalid or expired token")]
    InvalidSession,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Failed to send email: {0}")]
    Notification(#[from] NotifyError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::InvalidCredentials,
            StoreError::Database(e) => Self::Database(e.to_string()),
            StoreError::InvalidRow(msg) => Self::Internal(msg),
            StoreError::Other(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<SessionError> for AuthError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Invalid => Self::InvalidSession,
            SessionError::Signing(msg) => Self::Internal(msg),
        }
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// User info DTO for responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub id: UserId,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
        }
    }
}

/// Login result containing the signed session token.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserInfo,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and issues a session token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown username or a
    /// wrong password, without saying which.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Checks a session token's signature and expiry.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSession`] when the token is malformed,
    /// tampered with or expired.
    fn verify_session(&self, token: &str) -> Result<Claims, AuthError>;

    /// Gets information for the user behind a verified session.
    async fn current_user(&self, id: UserId) -> Result<UserInfo, AuthError>;

    /// Issues a reset code for the account registered under `email` and
    /// delivers it by email. Earlier outstanding codes stay valid.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnknownEmail`] when no account matches and
    /// disclosure is enabled, or [`AuthError::Notification`] when the code
    /// was stored but could not be delivered.
    async fn forgot_password(&self, email: &str) -> Result<(), AuthError>;

    /// Consumes a reset code and replaces the password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown email and
    /// [`AuthError::InvalidOrExpiredOtp`] when the code does not match an
    /// unused, unexpired token or another request consumed it first.
    async fn reset_password(
        &self,
        email: &str,
        otp: &Otp,
        new_password: &str,
    ) -> Result<(), AuthError>;
}
