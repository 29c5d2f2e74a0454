//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use chrono::Duration;
use mockable::Clock;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, SecurityConfig};
use crate::constants::limits;
use crate::db::repositories::user::hash_password_blocking;
use crate::db::{Store, StoreError, normalize_email};
use crate::domain::{Otp, UserId};
use crate::services::auth_service::{AuthError, AuthService, LoginResult, UserInfo};
use crate::services::notifications::{Notification, Notifier};
use crate::services::otp::OtpIssuer;
use crate::services::session::{Claims, SessionIssuer};

pub struct SeaOrmAuthService {
    store: Store,
    sessions: SessionIssuer,
    otp_issuer: OtpIssuer,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock + Send + Sync>,
    otp_ttl_minutes: u32,
    disclose_unknown_email: bool,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub fn new(
        store: Store,
        config: &Config,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            store,
            sessions: SessionIssuer::from_config(&config.session),
            otp_issuer: OtpIssuer::from_config(&config.otp),
            notifier,
            clock,
            otp_ttl_minutes: config.otp.expires_in_minutes,
            disclose_unknown_email: config.otp.disclose_unknown_email,
            security: config.security.clone(),
        }
    }

    fn check_new_password(new_password: &str) -> Result<(), AuthError> {
        let len = new_password.chars().count();
        if len < limits::MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters long",
                limits::MIN_PASSWORD_LENGTH
            )));
        }
        if len > limits::MAX_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "Password must be at most {} characters long",
                limits::MAX_PASSWORD_LENGTH
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        let Some(user) = self.store.verify_user_password(username, password).await? else {
            metrics::counter!("auth_login_total", "outcome" => "rejected").increment(1);
            warn!(username = %username, "Login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        let session = self.sessions.issue(&user, self.clock.utc())?;

        metrics::counter!("auth_login_total", "outcome" => "success").increment(1);
        info!(user_id = %user.id, "Login succeeded");

        Ok(LoginResult {
            token: session.token,
            expires_at: session.expires_at,
            user: UserInfo::from(user),
        })
    }

    fn verify_session(&self, token: &str) -> Result<Claims, AuthError> {
        self.sessions
            .verify(token, self.clock.utc())
            .map_err(AuthError::from)
    }

    async fn current_user(&self, id: UserId) -> Result<UserInfo, AuthError> {
        let user = self
            .store
            .get_user_by_id(id)
            .await?
            .ok_or(AuthError::InvalidSession)?;

        Ok(UserInfo::from(user))
    }

    async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);

        let Some(user) = self.store.get_user_by_email(&email).await? else {
            metrics::counter!("password_reset_requests_total", "outcome" => "unknown_email")
                .increment(1);
            info!("Password reset requested for unregistered address");
            return if self.disclose_unknown_email {
                Err(AuthError::UnknownEmail)
            } else {
                Ok(())
            };
        };

        let otp = self.otp_issuer.generate();
        let now = self.clock.utc();
        let expires_at = now + Duration::minutes(i64::from(self.otp_ttl_minutes));

        let token = self
            .store
            .issue_reset_token(user.id, &otp, now, expires_at)
            .await?;

        let notification = Notification::ResetCode {
            username: user.username.clone(),
            otp,
            expires_in_minutes: self.otp_ttl_minutes,
        };
        let recipient = user.email.as_deref().unwrap_or(&email);

        if let Err(e) = self.notifier.send(recipient, &notification).await {
            metrics::counter!("password_reset_requests_total", "outcome" => "delivery_failed")
                .increment(1);
            warn!(user_id = %user.id, token_id = token.id, error = %e, "Failed to deliver reset code");
            return Err(AuthError::Notification(e));
        }

        metrics::counter!("password_reset_requests_total", "outcome" => "issued").increment(1);
        info!(user_id = %user.id, token_id = token.id, "Reset code issued");
        Ok(())
    }

    async fn reset_password(
        &self,
        email: &str,
        otp: &Otp,
        new_password: &str,
    ) -> Result<(), AuthError> {
        Self::check_new_password(new_password)?;

        let email = normalize_email(email);

        let Some(user) = self.store.get_user_by_email(&email).await? else {
            metrics::counter!("password_resets_total", "outcome" => "unknown_email").increment(1);
            return Err(AuthError::InvalidCredentials);
        };

        let Some(token) = self
            .store
            .find_valid_reset_token(user.id, otp, self.clock.utc())
            .await?
        else {
            metrics::counter!("password_resets_total", "outcome" => "invalid_code").increment(1);
            info!(user_id = %user.id, "Reset attempt with invalid or expired code");
            return Err(AuthError::InvalidOrExpiredOtp);
        };

        let password_hash =
            hash_password_blocking(new_password, &self.security, self.security.rotated_time_cost)
                .await?;

        let consumed = match self
            .store
            .consume_reset_token_and_set_password(token.id, user.id, &password_hash, self.clock.utc())
            .await
        {
            Ok(consumed) => consumed,
            Err(StoreError::NotFound(_)) => return Err(AuthError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        if !consumed {
            metrics::counter!("password_resets_total", "outcome" => "lost_race").increment(1);
            info!(user_id = %user.id, token_id = token.id, "Reset code was consumed concurrently");
            return Err(AuthError::InvalidOrExpiredOtp);
        }

        metrics::counter!("password_resets_total", "outcome" => "success").increment(1);
        info!(user_id = %user.id, token_id = token.id, "Password reset completed");

        // The password is already changed; a failed confirmation is only logged.
        let recipient = user.email.as_deref().unwrap_or(&email);
        let confirmation = Notification::ResetConfirmation {
            username: user.username.clone(),
        };
        if let Err(e) = self.notifier.send(recipient, &confirmation).await {
            warn!(user_id = %user.id, error = %e, "Failed to send reset confirmation");
        }

        Ok(())
    }
}
