//! Wall-clock abstraction so window and date logic can be driven in tests

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};

pub trait Clock: Send + Sync + Debug {
    /// Current time as Unix seconds
    fn now(&self) -> i64;

    /// Current UTC calendar date
    fn today(&self) -> NaiveDate {
        DateTime::<Utc>::from_timestamp(self.now(), 0)
            .unwrap_or_default()
            .date_naive()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Manually driven clock
#[derive(Debug)]
pub struct MockClock {
    now: AtomicI64,
}

impl MockClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for MockClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
