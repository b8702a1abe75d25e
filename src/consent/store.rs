use std::sync::Arc;
use tracing::warn;

use crate::clock::Clock;
use crate::consent::models::{ConsentCategories, ConsentRecord};
use crate::storage::{KvStore, StoreResult};

pub struct ConsentStore {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    ttl_secs: u64,
}

impl ConsentStore {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, ttl_secs: u64) -> Self {
        Self {
            store,
            clock,
            ttl_secs,
        }
    }

    pub fn key(domain: &str, consent_id: &str) -> String {
        format!("consent:{domain}:{consent_id}")
    }

    /// Fresh identifier for visitors without one: 128 random bits as hex
    pub fn generate_id() -> String {
        format!("{:032x}", rand::random::<u128>())
    }

    /// Overwrite the visitor's record; each save restarts its expiry
    pub async fn save(
        &self,
        domain: &str,
        consent_id: &str,
        categories: ConsentCategories,
        version: Option<String>,
    ) -> StoreResult<ConsentRecord> {
        let record = ConsentRecord {
            consent_id: consent_id.to_string(),
            domain: domain.to_string(),
            categories,
            version,
            timestamp: self.clock.now(),
        };

        self.store
            .put(
                &Self::key(domain, consent_id),
                serde_json::to_vec(&record)?,
                self.ttl_secs,
            )
            .await?;

        Ok(record)
    }

    pub async fn get(&self, domain: &str, consent_id: &str) -> StoreResult<Option<ConsentRecord>> {
        let key = Self::key(domain, consent_id);
        let Some(bytes) = self.store.get(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_slice::<ConsentRecord>(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!(key, error = %e, "ignoring malformed consent record");
                Ok(None)
            }
        }
    }

    pub async fn delete(&self, domain: &str, consent_id: &str) -> StoreResult<bool> {
        self.store.delete(&Self::key(domain, consent_id)).await
    }
}
