use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

use crate::storage::{escape_like, expires_at, unix_now, KvStore, StoreError, StoreResult};

pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl KvStore for PostgresStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                key TEXT PRIMARY KEY,
                value BYTEA NOT NULL,
                expires_at BIGINT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_kv_expires_at ON kv_entries(expires_at)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let value = sqlx::query_scalar::<_, Vec<u8>>(
            r#"
            SELECT value
            FROM kv_entries
            WHERE key = $1 AND (expires_at IS NULL OR expires_at > $2)
            "#,
        )
        .bind(key)
        .bind(unix_now())
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| StoreError::Backend(e.into()))?;

        Ok(value)
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at(ttl_secs))
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| StoreError::Backend(e.into()))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE key = $1")
            .bind(key)
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| StoreError::Backend(e.into()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let keys = sqlx::query_scalar::<_, String>(
            r#"
            SELECT key
            FROM kv_entries
            WHERE key LIKE $1 ESCAPE '\' AND (expires_at IS NULL OR expires_at > $2)
            ORDER BY key
            "#,
        )
        .bind(format!("{}%", escape_like(prefix)))
        .bind(unix_now())
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(|e| StoreError::Backend(e.into()))?;

        Ok(keys)
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        let result =
            sqlx::query("DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= $1")
                .bind(unix_now())
                .execute(self.pool.as_ref())
                .await
                .map_err(|e| StoreError::Backend(e.into()))?;

        Ok(result.rows_affected())
    }
}
