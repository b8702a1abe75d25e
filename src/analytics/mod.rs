//! Consent banner analytics
//!
//! Events are folded into one bucket per domain per UTC day and kept for
//! 90 days. Reports aggregate a range of buckets into totals, acceptance
//! rates per category and the mean time-to-decision.

pub mod aggregator;
pub mod models;

pub use aggregator::{AnalyticsAggregator, ReportError, ANALYTICS_TTL_SECS, MAX_REPORT_DAYS};
pub use models::{
    AnalyticsEvent, AnalyticsReport, Category, CategoryChoices, DailyAnalytics, EventType,
};
