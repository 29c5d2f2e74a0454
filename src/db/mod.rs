use anyhow::Result;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::{AdminConfig, SecurityConfig};
use crate::domain::{Otp, Role, UserId};

pub mod migrator;
pub mod repositories;

pub use repositories::reset_token::ResetToken;
pub use repositories::user::User;
pub use repositories::{StoreError, StoreResult};

/// Owns the database pool. Built once at start-up and handed to services;
/// closed explicitly on shutdown.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        info!("Database connection closed");
        Ok(())
    }

    /// Create the configured admin when no user with that name exists, and
    /// fill in its recovery address when one is configured but missing.
    /// Returns true when the admin was created.
    pub async fn ensure_admin(&self, admin: &AdminConfig, security: &SecurityConfig) -> Result<bool> {
        let email = admin.email.as_deref().map(normalize_email);

        if let Some(existing) = self.get_user_by_username(&admin.username).await? {
            if let Some(email) = email.as_deref()
                && existing.email.is_none()
                && self.user_repo().set_email_if_missing(existing.id, email).await?
            {
                info!("Recovery email set for bootstrap user: {}", admin.username);
            }
            return Ok(false);
        }

        let password_hash = repositories::user::hash_password_blocking(
            &admin.password,
            security,
            security.argon2_time_cost,
        )
        .await?;

        self.user_repo()
            .create(repositories::user::NewUser {
                username: &admin.username,
                password_hash,
                email: email.as_deref(),
                role: Role::Admin,
            })
            .await?;

        info!("Bootstrap admin user created: {}", admin.username);
        Ok(true)
    }

    // ========== User Repository Methods ==========

    #[must_use]
    pub fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    pub async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.user_repo().get_by_email(email).await
    }

    pub async fn get_user_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn verify_user_password(
        &self,
        username: &str,
        password: &str,
    ) -> StoreResult<Option<User>> {
        self.user_repo().verify_password(username, password).await
    }

    pub async fn update_user_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.user_repo().update_password_hash(id, password_hash, now).await
    }

    // ========== Reset Token Repository Methods ==========

    #[must_use]
    pub fn reset_token_repo(&self) -> repositories::reset_token::ResetTokenRepository {
        repositories::reset_token::ResetTokenRepository::new(self.conn.clone())
    }

    pub async fn issue_reset_token(
        &self,
        user_id: UserId,
        otp: &Otp,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<ResetToken> {
        self.reset_token_repo()
            .issue(user_id, otp, issued_at, expires_at)
            .await
    }

    pub async fn find_valid_reset_token(
        &self,
        user_id: UserId,
        otp: &Otp,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ResetToken>> {
        self.reset_token_repo().find_valid(user_id, otp, now).await
    }

    pub async fn mark_reset_token_used(&self, id: i32) -> StoreResult<()> {
        self.reset_token_repo().mark_used(id).await
    }

    pub async fn reset_tokens_for_user(&self, user_id: UserId) -> StoreResult<Vec<ResetToken>> {
        self.reset_token_repo().list_for_user(user_id).await
    }

    pub async fn consume_reset_token_and_set_password(
        &self,
        token_id: i32,
        user_id: UserId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        self.reset_token_repo()
            .consume_and_set_password(token_id, user_id, password_hash, now)
            .await
    }
}

/// Emails are matched case-insensitively by storing and looking them up
/// trimmed and lower-cased.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
