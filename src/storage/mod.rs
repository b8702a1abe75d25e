pub mod memory;
pub mod postgres;
pub mod sqlite;
pub mod trait_def;

#[cfg(any(test, feature = "test-support"))]
#[doc(hidden)]
pub mod test_support;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
pub use trait_def::{KvStore, StoreError, StoreResult};

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::{StoreBackend, StoreConfig};

/// Build the store selected by configuration and run its initialization
pub async fn connect(config: &StoreConfig) -> anyhow::Result<Arc<dyn KvStore>> {
    let store: Arc<dyn KvStore> = match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store");
            Arc::new(MemoryStore::default())
        }
        StoreBackend::Sqlite => {
            info!("Using SQLite store: {}", config.url);
            Arc::new(SqliteStore::new(&config.url, config.max_connections).await?)
        }
        StoreBackend::Postgres => {
            info!("Using PostgreSQL store: {}", config.url);
            Arc::new(PostgresStore::new(&config.url, config.max_connections).await?)
        }
    };

    store.init().await?;
    Ok(store)
}

/// Periodically drop expired rows so TTLs also bound table size
pub fn spawn_expiry_sweeper(
    store: Arc<dyn KvStore>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip the first tick which fires immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!("Purged {} expired store entries", purged),
                Err(e) => error!("Failed to purge expired store entries: {}", e),
            }
        }
    })
}

pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Absolute expiry for a TTL, `None` when the entry should never expire
pub(crate) fn expires_at(ttl_secs: u64) -> Option<i64> {
    if ttl_secs == 0 {
        return None;
    }
    let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX);
    Some(unix_now().saturating_add(ttl))
}

/// Escape `%`, `_` and `\` so a key prefix matches literally in `LIKE ... ESCAPE '\'`
pub(crate) fn escape_like(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
