use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::storage::{KvStore, StoreResult};

#[derive(Clone)]
struct StoredValue {
    bytes: Arc<Vec<u8>>,
    ttl: Option<Duration>,
}

/// Expires each entry after the TTL given on its most recent put
struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// Process-local store backed by a Moka cache
pub struct MemoryStore {
    entries: Cache<String, StoredValue>,
}

impl MemoryStore {
    pub fn new(max_entries: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();

        Self { entries }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(1_000_000)
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self
            .entries
            .get(key)
            .await
            .map(|value| value.bytes.as_ref().clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> StoreResult<()> {
        let ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));
        self.entries
            .insert(
                key.to_string(),
                StoredValue {
                    bytes: Arc::new(value),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self.entries.remove(key).await.is_some())
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.to_string())
            .collect();
        keys.sort();
        Ok(keys)
    }
}
