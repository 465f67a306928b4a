//! Calendar source for the daily limiters.

use chrono::{Days, NaiveDate, Utc};
use parking_lot::Mutex;

/// Supplies "today" to the limiters.  Production uses [`SystemClock`];
/// tests drive date rollover with [`ManualClock`].
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// The UTC wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    today: Mutex<NaiveDate>,
}

impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Mutex::new(today),
        }
    }

    /// Move the calendar forward by `days`.
    pub fn advance_days(&self, days: u64) {
        let mut today = self.today.lock();
        *today = today.checked_add_days(Days::new(days)).unwrap_or(*today);
    }

    pub fn set(&self, date: NaiveDate) {
        *self.today.lock() = date;
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.today.lock()
    }
}
