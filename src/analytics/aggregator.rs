//! Store-backed daily aggregation and range reporting
//!
//! Every event is a read-modify-write of the `analytics:{domain}:{date}`
//! bucket for the current UTC day. Without an atomic increment in the store,
//! concurrent events for the same bucket may lose updates; this is accepted
//! for banner analytics.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analytics::models::{
    AnalyticsEvent, AnalyticsReport, Category, CategoryCounts, CategoryRate, DailyAnalytics,
    DailyBreakdown, ReportPeriod, ReportTotals, TimeToDecision,
};
use crate::clock::Clock;
use crate::storage::{KvStore, StoreError};

/// Buckets live for 90 days after their last write
pub const ANALYTICS_TTL_SECS: u64 = 90 * 24 * 60 * 60;

/// Longest report range, in days (inclusive)
pub const MAX_REPORT_DAYS: i64 = 366;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("`from` date {from} is after `to` date {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },
    #[error("date range spans {days} days, maximum is {max}", max = MAX_REPORT_DAYS)]
    RangeTooLarge { days: i64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct AnalyticsAggregator {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
}

impl AnalyticsAggregator {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn bucket_key(domain: &str, date: NaiveDate) -> String {
        format!("analytics:{}:{}", domain, date.format("%Y-%m-%d"))
    }

    /// Record one event into today's bucket for its domain
    ///
    /// # Arguments
    /// * `event` - Validated event; its categories count only for decisions
    ///
    /// # Returns
    /// `Ok(())` once the updated bucket is written with a fresh 90-day TTL
    pub async fn record(&self, event: &AnalyticsEvent) -> Result<(), StoreError> {
        let date = self.clock.today();
        let key = Self::bucket_key(&event.domain, date);

        let mut bucket = self.load_bucket(&key).await?.unwrap_or_default();
        bucket.apply(
            event.event,
            event.categories.as_ref(),
            event.time_to_decision,
        );

        self.store
            .put(&key, serde_json::to_vec(&bucket)?, ANALYTICS_TTL_SECS)
            .await?;

        debug!(domain = %event.domain, event = %event.event, %date, "recorded analytics event");
        Ok(())
    }

    /// Aggregate every stored bucket for `domain` in `[from, to]`.
    ///
    /// The range is checked before the store is touched. Buckets are read
    /// one date at a time in ascending order; days without a bucket are
    /// left out of `daily`. Counters read from the store are summed with
    /// saturation, so an extreme bucket caps totals instead of wrapping.
    ///
    /// # Arguments
    /// * `domain` - Normalized site hostname
    /// * `from` - First day, inclusive
    /// * `to` - Last day, inclusive
    ///
    /// # Returns
    /// The aggregated report, or `InvalidRange` / `RangeTooLarge` without
    /// any store access
    pub async fn report(
        &self,
        domain: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AnalyticsReport, ReportError> {
        if from > to {
            return Err(ReportError::InvalidRange { from, to });
        }
        let days = (to - from).num_days() + 1;
        if days > MAX_REPORT_DAYS {
            return Err(ReportError::RangeTooLarge { days });
        }

        let mut totals = ReportTotals::default();
        let mut categories: BTreeMap<Category, CategoryCounts> = Category::ALL
            .into_iter()
            .map(|category| (category, CategoryCounts::default()))
            .collect();
        let mut time_to_decision = TimeToDecision::default();
        let mut daily = Vec::new();

        for date in from.iter_days().take_while(|date| *date <= to) {
            let key = Self::bucket_key(domain, date);
            let Some(bucket) = self.load_bucket(&key).await? else {
                continue;
            };

            totals.banner_shown = totals.banner_shown.saturating_add(bucket.banner_shown);
            totals.consent_given = totals.consent_given.saturating_add(bucket.consent_given);
            totals.consent_updated = totals.consent_updated.saturating_add(bucket.consent_updated);
            totals.banner_dismissed = totals
                .banner_dismissed
                .saturating_add(bucket.banner_dismissed);

            for (category, counts) in &bucket.categories {
                let total = categories.entry(*category).or_default();
                total.accepted = total.accepted.saturating_add(counts.accepted);
                total.rejected = total.rejected.saturating_add(counts.rejected);
            }

            time_to_decision.sum = time_to_decision
                .sum
                .saturating_add(bucket.time_to_decision.sum);
            time_to_decision.count = time_to_decision
                .count
                .saturating_add(bucket.time_to_decision.count);

            daily.push(DailyBreakdown {
                date,
                banner_shown: bucket.banner_shown,
                consent_given: bucket.consent_given,
                consent_updated: bucket.consent_updated,
                banner_dismissed: bucket.banner_dismissed,
            });
        }

        totals.opt_in_rate = if totals.banner_shown > 0 {
            totals.consent_given as f64 / totals.banner_shown as f64
        } else {
            0.0
        };

        let by_category = categories
            .into_iter()
            .map(|(category, counts)| {
                (
                    category,
                    CategoryRate {
                        accept_rate: counts.accept_rate(),
                    },
                )
            })
            .collect();

        Ok(AnalyticsReport {
            domain: domain.to_string(),
            period: ReportPeriod { from, to },
            totals,
            by_category,
            avg_time_to_decision: time_to_decision.average(),
            daily,
        })
    }

    /// Read a bucket; an unparsable bucket reads as absent so the next write starts it over
    async fn load_bucket(&self, key: &str) -> Result<Option<DailyAnalytics>, StoreError> {
        let Some(bytes) = self.store.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_slice::<DailyAnalytics>(&bytes) {
            Ok(bucket) => Ok(Some(bucket)),
            Err(e) => {
                warn!(key, error = %e, "discarding malformed analytics bucket");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::models::{CategoryChoices, EventType};
    use crate::clock::MockClock;
    use crate::storage::test_support::{CountingStore, FailingStore};
    use crate::storage::MemoryStore;
    use serde_json::json;

    // 2024-05-14T12:00:00Z
    const NOON: i64 = 1_715_688_000;
    const DAY: i64 = 24 * 60 * 60;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn setup(store: Arc<dyn KvStore>) -> (AnalyticsAggregator, Arc<MockClock>) {
        let clock = Arc::new(MockClock::new(NOON));
        let aggregator = AnalyticsAggregator::new(store, Arc::clone(&clock) as Arc<dyn Clock>);
        (aggregator, clock)
    }

    fn event(domain: &str, event: EventType) -> AnalyticsEvent {
        AnalyticsEvent {
            domain: domain.to_string(),
            event,
            categories: None,
            time_to_decision: None,
        }
    }

    #[tokio::test]
    async fn test_banner_then_consent_report() {
        let (aggregator, _clock) = setup(Arc::new(MemoryStore::default()));

        aggregator
            .record(&event("example.com", EventType::BannerShown))
            .await
            .unwrap();
        aggregator
            .record(&AnalyticsEvent {
                categories: Some(CategoryChoices {
                    analytics: Some(true),
                    marketing: Some(false),
                    functional: Some(true),
                }),
                time_to_decision: Some(3500.0),
                ..event("example.com", EventType::ConsentGiven)
            })
            .await
            .unwrap();

        let today = date("2024-05-14");
        let report = aggregator.report("example.com", today, today).await.unwrap();

        assert_eq!(report.totals.banner_shown, 1);
        assert_eq!(report.totals.consent_given, 1);
        assert_eq!(report.totals.opt_in_rate, 1.0);
        assert_eq!(report.by_category[&Category::Analytics].accept_rate, 1.0);
        assert_eq!(report.by_category[&Category::Marketing].accept_rate, 0.0);
        assert_eq!(report.by_category[&Category::Functional].accept_rate, 1.0);
        assert_eq!(report.avg_time_to_decision, Some(3500));
        assert_eq!(report.daily.len(), 1);
        assert_eq!(report.daily[0].date, today);
    }

    #[tokio::test]
    async fn test_report_serialization() {
        let (aggregator, _clock) = setup(Arc::new(MemoryStore::default()));
        aggregator
            .record(&event("example.com", EventType::BannerDismissed))
            .await
            .unwrap();

        let today = date("2024-05-14");
        let report = aggregator.report("example.com", today, today).await.unwrap();

        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "domain": "example.com",
                "period": {"from": "2024-05-14", "to": "2024-05-14"},
                "totals": {
                    "bannerShown": 0,
                    "consentGiven": 0,
                    "consentUpdated": 0,
                    "bannerDismissed": 1,
                    "optInRate": 0.0
                },
                "byCategory": {
                    "analytics": {"acceptRate": 0.0},
                    "marketing": {"acceptRate": 0.0},
                    "functional": {"acceptRate": 0.0}
                },
                "avgTimeToDecision": null,
                "daily": [{
                    "date": "2024-05-14",
                    "bannerShown": 0,
                    "consentGiven": 0,
                    "consentUpdated": 0,
                    "bannerDismissed": 1
                }]
            })
        );
    }

    #[tokio::test]
    async fn test_opt_in_rate_zero_without_banner_views() {
        let (aggregator, _clock) = setup(Arc::new(MemoryStore::default()));
        for _ in 0..3 {
            aggregator
                .record(&event("example.com", EventType::ConsentGiven))
                .await
                .unwrap();
        }

        let today = date("2024-05-14");
        let report = aggregator.report("example.com", today, today).await.unwrap();
        assert_eq!(report.totals.consent_given, 3);
        assert_eq!(report.totals.opt_in_rate, 0.0);
    }

    #[tokio::test]
    async fn test_daily_breakdown_skips_missing_days() {
        let (aggregator, clock) = setup(Arc::new(MemoryStore::default()));

        aggregator
            .record(&event("example.com", EventType::BannerShown))
            .await
            .unwrap();
        clock.advance(2 * DAY);
        aggregator
            .record(&event("example.com", EventType::BannerShown))
            .await
            .unwrap();
        aggregator
            .record(&event("example.com", EventType::ConsentGiven))
            .await
            .unwrap();
        // Another domain on the same day stays out of the report
        aggregator
            .record(&event("other.org", EventType::BannerShown))
            .await
            .unwrap();

        let report = aggregator
            .report("example.com", date("2024-05-13"), date("2024-05-20"))
            .await
            .unwrap();

        let dates: Vec<NaiveDate> = report.daily.iter().map(|d| d.date).collect();
        assert_eq!(dates, vec![date("2024-05-14"), date("2024-05-16")]);
        assert_eq!(report.totals.banner_shown, 2);
        assert_eq!(report.totals.opt_in_rate, 0.5);
        assert_eq!(report.daily[1].consent_given, 1);
    }

    #[tokio::test]
    async fn test_oversized_range_rejected_before_store_access() {
        let store = Arc::new(CountingStore::default());
        let (aggregator, _clock) = setup(Arc::clone(&store) as Arc<dyn KvStore>);

        let result = aggregator
            .report("example.com", date("2023-01-01"), date("2024-01-02"))
            .await;
        assert!(matches!(result, Err(ReportError::RangeTooLarge { days: 367 })));
        assert_eq!(store.total_calls(), 0);

        let result = aggregator
            .report("example.com", date("2024-02-01"), date("2024-01-01"))
            .await;
        assert!(matches!(result, Err(ReportError::InvalidRange { .. })));
        assert_eq!(store.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_full_leap_year_range_is_allowed() {
        let store = Arc::new(CountingStore::default());
        let (aggregator, _clock) = setup(Arc::clone(&store) as Arc<dyn KvStore>);

        let report = aggregator
            .report("example.com", date("2024-01-01"), date("2024-12-31"))
            .await
            .unwrap();
        assert!(report.daily.is_empty());
        assert_eq!(store.total_calls(), 366);
    }

    #[tokio::test]
    async fn test_malformed_bucket_restarts() {
        let store = Arc::new(MemoryStore::default());
        let (aggregator, _clock) = setup(Arc::clone(&store) as Arc<dyn KvStore>);
        let key = AnalyticsAggregator::bucket_key("example.com", date("2024-05-14"));
        store.put(&key, b"{broken".to_vec(), 60).await.unwrap();

        aggregator
            .record(&event("example.com", EventType::BannerShown))
            .await
            .unwrap();

        let raw = store.get(&key).await.unwrap().unwrap();
        let bucket: DailyAnalytics = serde_json::from_slice(&raw).unwrap();
        assert_eq!(bucket.banner_shown, 1);
    }

    #[tokio::test]
    async fn test_writes_use_ninety_day_ttl() {
        let store = Arc::new(CountingStore::default());
        let (aggregator, _clock) = setup(Arc::clone(&store) as Arc<dyn KvStore>);

        aggregator
            .record(&event("example.com", EventType::BannerShown))
            .await
            .unwrap();

        let ttls = store.put_ttls.lock().unwrap().clone();
        assert_eq!(
            ttls,
            vec![("analytics:example.com:2024-05-14".to_string(), 7_776_000)]
        );
    }

    #[tokio::test]
    async fn test_invalid_durations_still_count_event() {
        let (aggregator, _clock) = setup(Arc::new(MemoryStore::default()));

        for ms in [-10.0, f64::INFINITY, 0.0] {
            aggregator
                .record(&AnalyticsEvent {
                    time_to_decision: Some(ms),
                    ..event("example.com", EventType::ConsentUpdated)
                })
                .await
                .unwrap();
        }

        let today = date("2024-05-14");
        let report = aggregator.report("example.com", today, today).await.unwrap();
        assert_eq!(report.totals.consent_updated, 3);
        assert_eq!(report.avg_time_to_decision, None);
    }

    #[tokio::test]
    async fn test_repeated_report_is_identical() {
        let (aggregator, _clock) = setup(Arc::new(MemoryStore::default()));
        aggregator
            .record(&AnalyticsEvent {
                categories: Some(CategoryChoices {
                    analytics: Some(false),
                    marketing: Some(true),
                    functional: None,
                }),
                time_to_decision: Some(1234.0),
                ..event("example.com", EventType::ConsentGiven)
            })
            .await
            .unwrap();

        let today = date("2024-05-14");
        let first = aggregator.report("example.com", today, today).await.unwrap();
        let second = aggregator.report("example.com", today, today).await.unwrap();
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let (aggregator, _clock) = setup(Arc::new(FailingStore));

        assert!(aggregator
            .record(&event("example.com", EventType::BannerShown))
            .await
            .is_err());

        let today = date("2024-05-14");
        assert!(matches!(
            aggregator.report("example.com", today, today).await,
            Err(ReportError::Store(_))
        ));
    }

    #[tokio::test]
    async fn test_report_saturates_extreme_counters() {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::default());
        let bucket = json!({
            "banner_shown": u64::MAX,
            "consent_given": u64::MAX,
            "categories": {"analytics": {"accepted": u64::MAX, "rejected": 1}},
            "timeToDecision": {"sum": u64::MAX, "count": u64::MAX}
        });
        for day in ["2024-05-13", "2024-05-14"] {
            store
                .put(
                    &AnalyticsAggregator::bucket_key("example.com", date(day)),
                    serde_json::to_vec(&bucket).unwrap(),
                    0,
                )
                .await
                .unwrap();
        }
        let (aggregator, _clock) = setup(store);

        let report = aggregator
            .report("example.com", date("2024-05-13"), date("2024-05-14"))
            .await
            .unwrap();

        assert_eq!(report.totals.banner_shown, u64::MAX);
        assert_eq!(report.totals.consent_given, u64::MAX);
        assert_eq!(report.totals.opt_in_rate, 1.0);
        assert_eq!(report.by_category[&Category::Analytics].accept_rate, 1.0);
        assert_eq!(report.by_category[&Category::Marketing].accept_rate, 0.0);
        assert_eq!(report.avg_time_to_decision, Some(1));
        assert_eq!(report.daily.len(), 2);
    }
}
