use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to encode stored value: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Eventually-consistent key-value store.
///
/// There is no compare-and-swap and no atomic increment: callers doing
/// read-modify-write accept that concurrent writers may lose updates.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Initialize the store (create tables, etc.)
    async fn init(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Fetch the raw value for `key`, or `None` if it is absent or expired
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// The entry expires `ttl_secs` seconds from now; every put restarts
    /// the clock. A TTL of zero means the entry never expires.
    async fn put(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> StoreResult<()>;

    /// Remove `key`, returning whether an entry was present
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// List live keys starting with `prefix`, in ascending order
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Physically remove expired entries, returning how many were dropped.
    ///
    /// Backends that evict on their own can keep the default.
    async fn purge_expired(&self) -> StoreResult<u64> {
        Ok(0)
    }
}
