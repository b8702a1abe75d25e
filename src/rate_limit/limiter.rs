use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::clock::Clock;
use crate::config::RateLimitConfig;
use crate::storage::{KvStore, StoreResult};

/// Persisted window state for one identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    pub count: u64,
    #[serde(rename = "resetAt")]
    pub reset_at: i64,
}

impl RateLimitState {
    /// Strictly validate a stored value.
    ///
    /// `count` must be a finite non-negative number and `resetAt` a finite
    /// number; anything else reads as no state at all.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(bytes).ok()?;
        let count = value.get("count")?.as_f64()?;
        let reset_at = value.get("resetAt")?.as_f64()?;

        if !count.is_finite() || count < 0.0 || !reset_at.is_finite() {
            return None;
        }

        Some(Self {
            count: count.floor() as u64,
            reset_at: reset_at.ceil() as i64,
        })
    }

    pub fn is_active(&self, now: i64) -> bool {
        self.reset_at > now
    }
}

/// Admission decision returned to the HTTP layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u64,
    pub reset_at: i64,
    pub limit: u32,
}

impl RateLimitDecision {
    /// Seconds until the window reopens, never less than one
    pub fn retry_after(&self, now: i64) -> i64 {
        (self.reset_at - now).max(1)
    }
}

pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn key(identity: &str) -> String {
        format!("rl:{identity}")
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Count one request from `identity` against its current window.
    ///
    /// # Arguments
    /// * `identity` - Caller key, usually the client IP
    /// * `config` - Request budget and window length
    ///
    /// # Returns
    /// The admission decision. State is written only for admitted requests;
    /// refused requests leave `reset_at` where it was.
    ///
    /// The read and the write are not atomic; two concurrent requests can
    /// both observe the same count and one increment is lost.
    pub async fn check(
        &self,
        identity: &str,
        config: &RateLimitConfig,
    ) -> StoreResult<RateLimitDecision> {
        let key = Self::key(identity);
        let now = self.clock.now();

        let stored = self
            .store
            .get(&key)
            .await?
            .and_then(|bytes| RateLimitState::parse(&bytes));

        let window = i64::try_from(config.window_secs).unwrap_or(i64::MAX);
        let tentative = match stored {
            Some(state) if state.is_active(now) => RateLimitState {
                count: state.count.saturating_add(1),
                reset_at: state.reset_at,
            },
            _ => RateLimitState {
                count: 1,
                reset_at: now.saturating_add(window),
            },
        };

        let limit = u64::from(config.max_requests);
        let allowed = tentative.count <= limit;

        if allowed {
            self.store
                .put(&key, serde_json::to_vec(&tentative)?, config.window_secs)
                .await?;
        } else {
            debug!(identity, count = tentative.count, "rate limit exceeded");
        }

        Ok(RateLimitDecision {
            allowed,
            remaining: limit.saturating_sub(tentative.count),
            reset_at: tentative.reset_at,
            limit: config.max_requests,
        })
    }

    /// Stored state for `identity`, if present and well formed
    pub async fn inspect(&self, identity: &str) -> StoreResult<Option<RateLimitState>> {
        Ok(self
            .store
            .get(&Self::key(identity))
            .await?
            .and_then(|bytes| RateLimitState::parse(&bytes)))
    }

    /// Drop the window for `identity` so its next request starts fresh
    pub async fn reset(&self, identity: &str) -> StoreResult<bool> {
        self.store.delete(&Self::key(identity)).await
    }
}
