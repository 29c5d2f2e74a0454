use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait, sea_query::Expr,
};

use super::user::set_password_hash;
use super::{StoreError, StoreResult};
use crate::domain::{Otp, UserId};
use crate::entities::password_reset_tokens;

/// One issued reset code and its consumption state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetToken {
    pub id: i32,
    pub user_id: UserId,
    pub otp: Otp,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: String,
}

impl ResetToken {
    /// Unused and strictly before expiry.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        !self.used && now < self.expires_at
    }
}

impl From<password_reset_tokens::Model> for ResetToken {
    fn from(model: password_reset_tokens::Model) -> Self {
        // An unreadable timestamp is treated as long expired.
        let expires_at = DateTime::<Utc>::from_timestamp_millis(model.expires_at)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Self {
            id: model.id,
            user_id: UserId::new(model.user_id),
            otp: Otp::new(model.token),
            expires_at,
            used: model.used,
            created_at: model.created_at,
        }
    }
}

pub struct ResetTokenRepository {
    conn: DatabaseConnection,
}

impl ResetTokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Record a freshly issued code. Earlier outstanding codes for the same
    /// user stay valid.
    ///
    /// Expiry is kept at millisecond precision; the returned token carries
    /// the stored instant, which is the one every later check compares with.
    pub async fn issue(
        &self,
        user_id: UserId,
        otp: &Otp,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<ResetToken> {
        let active = password_reset_tokens::ActiveModel {
            user_id: Set(user_id.value()),
            token: Set(otp.as_str().to_string()),
            expires_at: Set(expires_at.timestamp_millis()),
            used: Set(false),
            created_at: Set(issued_at.to_rfc3339()),
            ..Default::default()
        };

        let model = active.insert(&self.conn).await?;
        Ok(ResetToken::from(model))
    }

    /// Any unused, unexpired row matching the user and code. Codes are not
    /// unique per user, so when several match the newest one is returned.
    pub async fn find_valid(
        &self,
        user_id: UserId,
        otp: &Otp,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<ResetToken>> {
        let token = password_reset_tokens::Entity::find()
            .filter(password_reset_tokens::Column::UserId.eq(user_id.value()))
            .filter(password_reset_tokens::Column::Token.eq(otp.as_str()))
            .filter(password_reset_tokens::Column::Used.eq(false))
            .filter(password_reset_tokens::Column::ExpiresAt.gt(now.timestamp_millis()))
            .order_by_desc(password_reset_tokens::Column::Id)
            .one(&self.conn)
            .await?;

        Ok(token.map(ResetToken::from))
    }

    pub async fn get(&self, id: i32) -> StoreResult<Option<ResetToken>> {
        let token = password_reset_tokens::Entity::find_by_id(id)
            .one(&self.conn)
            .await?;

        Ok(token.map(ResetToken::from))
    }

    pub async fn list_for_user(&self, user_id: UserId) -> StoreResult<Vec<ResetToken>> {
        let tokens = password_reset_tokens::Entity::find()
            .filter(password_reset_tokens::Column::UserId.eq(user_id.value()))
            .order_by_asc(password_reset_tokens::Column::Id)
            .all(&self.conn)
            .await?;

        Ok(tokens.into_iter().map(ResetToken::from).collect())
    }

    /// Flip the used flag. Marking an already used token is a no-op.
    pub async fn mark_used(&self, id: i32) -> StoreResult<()> {
        let result = password_reset_tokens::Entity::update_many()
            .col_expr(password_reset_tokens::Column::Used, Expr::value(true))
            .filter(password_reset_tokens::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;

        if result.rows_affected == 0 && self.get(id).await?.is_none() {
            return Err(StoreError::NotFound("reset token"));
        }

        Ok(())
    }

    /// Compare-and-swap `used: false -> true`. Returns whether this call won.
    pub async fn try_consume(&self, id: i32) -> StoreResult<bool> {
        let result = password_reset_tokens::Entity::update_many()
            .col_expr(password_reset_tokens::Column::Used, Expr::value(true))
            .filter(password_reset_tokens::Column::Id.eq(id))
            .filter(password_reset_tokens::Column::Used.eq(false))
            .exec(&self.conn)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Consume the token and store the new password hash in one transaction.
    ///
    /// Returns `Ok(false)` without touching the password when another caller
    /// already consumed the token or it expired since it was looked up. A
    /// missing user rolls the consumption back.
    pub async fn consume_and_set_password(
        &self,
        token_id: i32,
        user_id: UserId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let txn = self.conn.begin().await?;

        let consumed = password_reset_tokens::Entity::update_many()
            .col_expr(password_reset_tokens::Column::Used, Expr::value(true))
            .filter(password_reset_tokens::Column::Id.eq(token_id))
            .filter(password_reset_tokens::Column::UserId.eq(user_id.value()))
            .filter(password_reset_tokens::Column::Used.eq(false))
            .filter(password_reset_tokens::Column::ExpiresAt.gt(now.timestamp_millis()))
            .exec(&txn)
            .await?;

        if consumed.rows_affected != 1 {
            txn.rollback().await?;
            return Ok(false);
        }

        if let Err(e) = set_password_hash(&txn, user_id, password_hash, now).await {
            txn.rollback().await?;
            return Err(e);
        }

        txn.commit().await?;
        Ok(true)
    }
}
