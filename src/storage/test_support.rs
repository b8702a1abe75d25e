//! Store wrappers shared by the unit and integration tests
//!
//! Compiled for `cfg(test)` and behind the `test-support` feature, which the
//! integration tests enable through the crate's own dev-dependency.

use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::storage::{KvStore, MemoryStore, StoreResult};

/// Memory store that counts calls and remembers the TTL of every put
#[derive(Default)]
pub struct CountingStore {
    inner: MemoryStore,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
    pub deletes: AtomicUsize,
    pub lists: AtomicUsize,
    pub put_ttls: Mutex<Vec<(String, u64)>>,
}

impl CountingStore {
    /// Calls across every store operation
    pub fn total_calls(&self) -> usize {
        [&self.gets, &self.puts, &self.deletes, &self.lists]
            .iter()
            .map(|counter| counter.load(Ordering::SeqCst))
            .sum()
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KvStore for CountingStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> StoreResult<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.put_ttls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((key.to_string(), ttl_secs));
        self.inner.put(key, value, ttl_secs).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.inner.list(prefix).await
    }
}

/// Store whose every operation fails, standing in for a missing binding
pub struct FailingStore;

#[async_trait]
impl KvStore for FailingStore {
    async fn get(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
        Err(anyhow!("store unavailable").into())
    }

    async fn put(&self, _key: &str, _value: Vec<u8>, _ttl_secs: u64) -> StoreResult<()> {
        Err(anyhow!("store unavailable").into())
    }

    async fn delete(&self, _key: &str) -> StoreResult<bool> {
        Err(anyhow!("store unavailable").into())
    }

    async fn list(&self, _prefix: &str) -> StoreResult<Vec<String>> {
        Err(anyhow!("store unavailable").into())
    }
}
