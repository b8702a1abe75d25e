//! Data models for consent analytics

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Banner lifecycle events tracked per domain and day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    BannerShown,
    ConsentGiven,
    ConsentUpdated,
    BannerDismissed,
}

impl EventType {
    pub const ALL: [EventType; 4] = [
        EventType::BannerShown,
        EventType::ConsentGiven,
        EventType::ConsentUpdated,
        EventType::BannerDismissed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::BannerShown => "banner_shown",
            EventType::ConsentGiven => "consent_given",
            EventType::ConsentUpdated => "consent_updated",
            EventType::BannerDismissed => "banner_dismissed",
        }
    }

    /// Only explicit consent decisions carry per-category choices
    pub fn carries_categories(self) -> bool {
        matches!(self, EventType::ConsentGiven | EventType::ConsentUpdated)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown event type '{0}'")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// Consent categories a visitor can accept or reject
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Analytics,
    Marketing,
    Functional,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Analytics, Category::Marketing, Category::Functional];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Analytics => "analytics",
            Category::Marketing => "marketing",
            Category::Functional => "functional",
        }
    }
}

/// Per-category choices attached to a consent event.
///
/// Each category is independent: a missing or non-boolean value leaves
/// that category out without invalidating the others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryChoices {
    pub analytics: Option<bool>,
    pub marketing: Option<bool>,
    pub functional: Option<bool>,
}

impl CategoryChoices {
    /// Pick the boolean entries out of a JSON object, ignoring everything else
    pub fn from_json(value: &Value) -> Self {
        let pick = |category: Category| value.get(category.as_str()).and_then(Value::as_bool);
        Self {
            analytics: pick(Category::Analytics),
            marketing: pick(Category::Marketing),
            functional: pick(Category::Functional),
        }
    }

    pub fn get(&self, category: Category) -> Option<bool> {
        match category {
            Category::Analytics => self.analytics,
            Category::Marketing => self.marketing,
            Category::Functional => self.functional,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCounts {
    #[serde(default)]
    pub accepted: u64,
    #[serde(default)]
    pub rejected: u64,
}

impl CategoryCounts {
    /// Share of accepted decisions, rounded half-up to three decimals
    pub fn accept_rate(&self) -> f64 {
        if self.accepted == 0 && self.rejected == 0 {
            return 0.0;
        }
        let accepted = self.accepted as f64;
        round3(accepted / (accepted + self.rejected as f64))
    }
}

/// Running sum and count for the mean time-to-decision, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeToDecision {
    #[serde(default)]
    pub sum: u64,
    #[serde(default)]
    pub count: u64,
}

impl TimeToDecision {
    pub fn average(&self) -> Option<u64> {
        (self.count > 0).then(|| (self.sum as f64 / self.count as f64).round() as u64)
    }
}

/// One analytics bucket: a domain's counters for a single UTC day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAnalytics {
    #[serde(default)]
    pub banner_shown: u64,
    #[serde(default)]
    pub consent_given: u64,
    #[serde(default)]
    pub consent_updated: u64,
    #[serde(default)]
    pub banner_dismissed: u64,
    #[serde(default = "DailyAnalytics::empty_categories")]
    pub categories: BTreeMap<Category, CategoryCounts>,
    #[serde(default, rename = "timeToDecision")]
    pub time_to_decision: TimeToDecision,
}

impl Default for DailyAnalytics {
    fn default() -> Self {
        Self {
            banner_shown: 0,
            consent_given: 0,
            consent_updated: 0,
            banner_dismissed: 0,
            categories: Self::empty_categories(),
            time_to_decision: TimeToDecision::default(),
        }
    }
}

impl DailyAnalytics {
    fn empty_categories() -> BTreeMap<Category, CategoryCounts> {
        Category::ALL
            .into_iter()
            .map(|category| (category, CategoryCounts::default()))
            .collect()
    }

    pub fn counter(&self, event: EventType) -> u64 {
        match event {
            EventType::BannerShown => self.banner_shown,
            EventType::ConsentGiven => self.consent_given,
            EventType::ConsentUpdated => self.consent_updated,
            EventType::BannerDismissed => self.banner_dismissed,
        }
    }

    fn counter_mut(&mut self, event: EventType) -> &mut u64 {
        match event {
            EventType::BannerShown => &mut self.banner_shown,
            EventType::ConsentGiven => &mut self.consent_given,
            EventType::ConsentUpdated => &mut self.consent_updated,
            EventType::BannerDismissed => &mut self.banner_dismissed,
        }
    }

    /// Fold one event into the bucket.
    ///
    /// | input                                   | effect                           |
    /// |-----------------------------------------|----------------------------------|
    /// | any event                               | its counter += 1                 |
    /// | categories on `consent_given/updated`   | accepted/rejected += 1 per bool  |
    /// | categories on other events              | ignored                          |
    /// | time-to-decision finite and > 0         | sum += round(ms), count += 1     |
    /// | time-to-decision otherwise              | ignored                          |
    pub fn apply(
        &mut self,
        event: EventType,
        categories: Option<&CategoryChoices>,
        time_to_decision: Option<f64>,
    ) {
        let counter = self.counter_mut(event);
        *counter = counter.saturating_add(1);

        if let Some(choices) = categories.filter(|_| event.carries_categories()) {
            for category in Category::ALL {
                let Some(accepted) = choices.get(category) else {
                    continue;
                };
                let counts = self.categories.entry(category).or_default();
                if accepted {
                    counts.accepted = counts.accepted.saturating_add(1);
                } else {
                    counts.rejected = counts.rejected.saturating_add(1);
                }
            }
        }

        if let Some(ms) = time_to_decision.filter(|ms| ms.is_finite() && *ms > 0.0) {
            self.time_to_decision.sum = self.time_to_decision.sum.saturating_add(ms.round() as u64);
            self.time_to_decision.count = self.time_to_decision.count.saturating_add(1);
        }
    }
}

/// An event as accepted by the aggregator (already validated)
#[derive(Debug, Clone)]
pub struct AnalyticsEvent {
    pub domain: String,
    pub event: EventType,
    pub categories: Option<CategoryChoices>,
    pub time_to_decision: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTotals {
    pub banner_shown: u64,
    pub consent_given: u64,
    pub consent_updated: u64,
    pub banner_dismissed: u64,
    pub opt_in_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRate {
    pub accept_rate: f64,
}

/// Raw counters of one stored day in a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBreakdown {
    pub date: NaiveDate,
    pub banner_shown: u64,
    pub consent_given: u64,
    pub consent_updated: u64,
    pub banner_dismissed: u64,
}

/// Aggregated view over a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub domain: String,
    pub period: ReportPeriod,
    pub totals: ReportTotals,
    pub by_category: BTreeMap<Category, CategoryRate>,
    pub avg_time_to_decision: Option<u64>,
    pub daily: Vec<DailyBreakdown>,
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
