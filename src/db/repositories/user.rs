use anyhow::Context;
use chrono::{DateTime, Utc};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, sea_query::Expr,
};
use tokio::task;

use super::{StoreError, StoreResult};
use crate::config::SecurityConfig;
use crate::domain::{Role, UserId};
use crate::entities::users;

/// User data returned from repository (without sensitive password hash)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub role: Role,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<users::Model> for User {
    type Error = StoreError;

    fn try_from(model: users::Model) -> Result<Self, Self::Error> {
        let role = model
            .role
            .parse()
            .map_err(|e| StoreError::InvalidRow(format!("user {}: {e}", model.id)))?;

        Ok(Self {
            id: UserId::new(model.id),
            username: model.username,
            email: model.email,
            role,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

/// Fields needed to provision a user.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: String,
    pub email: Option<&'a str>,
    pub role: Role,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await?
            .map(User::try_from)
            .transpose()
    }

    pub async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await?
            .map(User::try_from)
            .transpose()
    }

    pub async fn get_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        users::Entity::find_by_id(id.value())
            .one(&self.conn)
            .await?
            .map(User::try_from)
            .transpose()
    }

    /// Verify password for a user, returning the user when it matches.
    /// Note: This uses `spawn_blocking` because Argon2 hashing is CPU-intensive
    /// and would block the async runtime if run directly.
    pub async fn verify_password(&self, username: &str, password: &str) -> StoreResult<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await?;

        let Some(user) = user else {
            return Ok(None);
        };

        let password_hash = user.password_hash.clone();
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || verify_password_hash(&password, &password_hash))
            .await
            .context("Password verification task panicked")??;

        if is_valid {
            User::try_from(user).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Overwrite the stored hash and bump `updated_at`.
    pub async fn update_password_hash(
        &self,
        id: UserId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        set_password_hash(&self.conn, id, password_hash, now).await
    }

    pub async fn create(&self, new_user: NewUser<'_>) -> StoreResult<User> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            username: Set(new_user.username.to_string()),
            password_hash: Set(new_user.password_hash),
            email: Set(new_user.email.map(ToString::to_string)),
            role: Set(new_user.role.as_str().to_string()),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active.insert(&self.conn).await?;
        User::try_from(model)
    }

    /// Set the recovery address only when none is stored yet.
    pub async fn set_email_if_missing(&self, id: UserId, email: &str) -> StoreResult<bool> {
        let now = chrono::Utc::now().to_rfc3339();

        let result = users::Entity::update_many()
            .col_expr(users::Column::Email, Expr::value(email))
            .col_expr(users::Column::UpdatedAt, Expr::value(now))
            .filter(users::Column::Id.eq(id.value()))
            .filter(users::Column::Email.is_null())
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected == 1)
    }
}

/// Password update shared by the repository and the reset transaction.
/// Fails with `NotFound` when no row has that id.
pub(crate) async fn set_password_hash<C: ConnectionTrait>(
    conn: &C,
    id: UserId,
    password_hash: &str,
    now: DateTime<Utc>,
) -> StoreResult<()> {
    let result = users::Entity::update_many()
        .col_expr(users::Column::PasswordHash, Expr::value(password_hash))
        .col_expr(users::Column::UpdatedAt, Expr::value(now.to_rfc3339()))
        .filter(users::Column::Id.eq(id.value()))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(StoreError::NotFound("user"));
    }

    Ok(())
}

fn argon2_with_cost(config: &SecurityConfig, time_cost: u32) -> anyhow::Result<Argon2<'static>> {
    let params = Params::new(
        config.argon2_memory_cost_kib,
        time_cost,
        config.argon2_parallelism,
        None, // output length (use default)
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hash a password using Argon2id with the given time cost.
///
/// Bootstrap credentials use `argon2_time_cost`; rotated credentials use
/// `rotated_time_cost`.
pub fn hash_password(password: &str, config: &SecurityConfig, time_cost: u32) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = argon2_with_cost(config, time_cost)?;

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Hash on the blocking pool.
pub async fn hash_password_blocking(
    password: &str,
    config: &SecurityConfig,
    time_cost: u32,
) -> anyhow::Result<String> {
    let password = password.to_string();
    let config = config.clone();

    task::spawn_blocking(move || hash_password(&password, &config, time_cost))
        .await
        .context("Password hashing task panicked")?
}

/// The PHC string carries its own parameters, so verification works for
/// hashes produced under any cost setting.
pub fn verify_password_hash(password: &str, password_hash: &str) -> anyhow::Result<bool> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_config() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            rotated_time_cost: 2,
        }
    }

    #[test]
    fn hash_then_verify() {
        let config = cheap_config();
        let hash = hash_password("hunter22", &config, config.rotated_time_cost).unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hash.contains("t=2"));
        assert!(verify_password_hash("hunter22", &hash).unwrap());
        assert!(!verify_password_hash("hunter23", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let config = cheap_config();
        let a = hash_password("same", &config, 1).unwrap();
        let b = hash_password("same", &config, 1).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password_hash("pw", "not-a-phc-string").is_err());
    }
}
