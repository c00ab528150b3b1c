//! Stored refresh tokens, one row per principal.
//!
//! Access tokens are stateless and never stored. A refresh token is only
//! honored while it matches the stored row byte for byte; rotating the row
//! on every reissue retires everything handed out before it.

use sqlx::sqlite::SqlitePool;

/// The live refresh token for a principal.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub user_id: String,
    pub token: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Clone)]
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Store `token` as the one live refresh token for a user. A single
    /// statement, so racing rotations settle on the later write whole.
    pub async fn upsert(&self, user_id: &str, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refresh_tokens (user_id, token) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET token = excluded.token, updated_at = unixepoch()",
        )
        .bind(user_id)
        .bind(token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get the stored record for a user.
    pub async fn find_by_user(
        &self,
        user_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT user_id, token, created_at, updated_at FROM refresh_tokens WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Whether `token` is byte for byte the stored token for this user.
    /// No stored row means not current.
    pub async fn is_current(&self, user_id: &str, token: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT token FROM refresh_tokens WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some_and(|(stored,)| stored == token))
    }

    /// Delete the stored token for a user (logout). Returns whether a row
    /// was removed.
    pub async fn delete_by_user(&self, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete rows whose last rotation predates `cutoff` (Unix seconds).
    pub async fn delete_stale(&self, cutoff: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE updated_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
