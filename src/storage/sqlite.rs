use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::storage::{escape_like, expires_at, unix_now, KvStore, StoreError, StoreResult};

pub struct SqliteStore {
    pool: Arc<SqlitePool>,
}

impl SqliteStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                expires_at INTEGER
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
            WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)
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
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
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
        let result = sqlx::query("DELETE FROM kv_entries WHERE key = ?")
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
            WHERE key LIKE ? ESCAPE '\' AND (expires_at IS NULL OR expires_at > ?)
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
            sqlx::query("DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= ?")
                .bind(unix_now())
                .execute(self.pool.as_ref())
                .await
                .map_err(|e| StoreError::Backend(e.into()))?;

        Ok(result.rows_affected())
    }
}
