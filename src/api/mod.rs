pub mod analytics;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod routes;

pub use error::{ApiError, ErrorResponse};
pub use routes::create_router;

use std::sync::Arc;

use crate::analytics::AnalyticsAggregator;
use crate::auth::AdminAuth;
use crate::clock::Clock;
use crate::config::Config;
use crate::consent::ConsentStore;
use crate::rate_limit::RateLimiter;
use crate::storage::KvStore;

/// Shared state handed to every handler
pub struct AppState {
    pub config: Arc<Config>,
    pub clock: Arc<dyn Clock>,
    pub rate_limiter: RateLimiter,
    pub analytics: AnalyticsAggregator,
    pub consents: ConsentStore,
    pub admin: AdminAuth,
}

impl AppState {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: Arc<Config>) -> Self {
        Self {
            rate_limiter: RateLimiter::new(Arc::clone(&store), Arc::clone(&clock)),
            analytics: AnalyticsAggregator::new(Arc::clone(&store), Arc::clone(&clock)),
            consents: ConsentStore::new(store, Arc::clone(&clock), config.consent.ttl_secs()),
            admin: AdminAuth::new(config.admin.token.clone()),
            clock,
            config,
        }
    }
}
