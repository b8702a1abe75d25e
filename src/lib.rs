pub mod analytics;
pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod consent;
pub mod rate_limit;
pub mod storage;
pub mod validation;
