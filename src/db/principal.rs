use sqlx::sqlite::SqlitePool;

/// External identity provider a principal signed up through.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, sqlx::Type,
)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Provider {
    Google,
    Kakao,
}

/// An account known to this service. Keyed by a UUID minted at first
/// sign-in; the (provider, provider_id) pair identifies the external
/// identity it came from.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Principal {
    pub id: String,
    pub provider: Provider,
    pub provider_id: String,
    pub created_at: i64,
}

#[derive(Clone)]
pub struct PrincipalStore {
    pool: SqlitePool,
}

impl PrincipalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a principal by UUID.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Principal>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, provider, provider_id, created_at FROM principals WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Get a principal by its external identity.
    pub async fn find_by_provider_identity(
        &self,
        provider: Provider,
        provider_id: &str,
    ) -> Result<Option<Principal>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, provider, provider_id, created_at FROM principals
             WHERE provider = ? AND provider_id = ?",
        )
        .bind(provider)
        .bind(provider_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Get the principal for an external identity, creating it on first
    /// sight. The insert ignores conflicts, so two racing sign-ins for the
    /// same identity both land on the row that won.
    pub async fn find_or_create(
        &self,
        provider: Provider,
        provider_id: &str,
    ) -> Result<Principal, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO principals (id, provider, provider_id) VALUES (?, ?, ?)
             ON CONFLICT(provider, provider_id) DO NOTHING",
        )
        .bind(&id)
        .bind(provider)
        .bind(provider_id)
        .execute(&self.pool)
        .await?;

        match self.find_by_provider_identity(provider, provider_id).await? {
            Some(principal) => Ok(principal),
            None => Err(sqlx::Error::RowNotFound),
        }
    }
}
