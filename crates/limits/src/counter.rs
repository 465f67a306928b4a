//! The daily counter: the atomic unit every limiter is built from.

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::Serialize;

use crate::clock::Clock;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outcome of a check-and-increment.
///
/// On success `count` is the new count and `remaining = limit - count`.
/// On denial `count` is the unchanged count and `remaining` is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Admission {
    pub allowed: bool,
    pub count: u32,
    pub remaining: u32,
}

/// Read-only view of a counter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateLimitStatus {
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
    pub reset_date: NaiveDate,
    /// `100 * count / limit`, rounded to one decimal place.
    pub usage_percent: f64,
}

/// Count plus the day it belongs to.  Always mutated under a lock owned by
/// whichever limiter embeds it.
#[derive(Debug)]
pub(crate) struct CounterState {
    count: u32,
    date: NaiveDate,
}

impl CounterState {
    pub(crate) fn new(today: NaiveDate) -> Self {
        Self { count: 0, date: today }
    }

    /// Zero the count if `today` is past the stored day.  Returns `true`
    /// when a reset happened.
    pub(crate) fn roll(&mut self, today: NaiveDate) -> bool {
        if self.date < today {
            self.count = 0;
            self.date = today;
            true
        } else {
            false
        }
    }

    pub(crate) fn try_increment(&mut self, limit: u32) -> Admission {
        if self.count >= limit {
            return Admission {
                allowed: false,
                count: self.count,
                remaining: 0,
            };
        }
        self.count += 1;
        Admission {
            allowed: true,
            count: self.count,
            remaining: limit - self.count,
        }
    }

    /// Give back one unit charged earlier today.
    pub(crate) fn refund(&mut self) {
        self.count = self.count.saturating_sub(1);
    }

    pub(crate) fn clear(&mut self) {
        self.count = 0;
    }

    pub(crate) fn date(&self) -> NaiveDate {
        self.date
    }

    pub(crate) fn status(&self, limit: u32) -> RateLimitStatus {
        let usage_percent = if limit == 0 {
            100.0
        } else {
            (f64::from(self.count) * 1000.0 / f64::from(limit)).round() / 10.0
        };
        RateLimitStatus {
            count: self.count,
            limit,
            remaining: limit.saturating_sub(self.count),
            reset_date: self.date,
            usage_percent,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DailyCounter
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A thread-safe counter that allows `limit` increments per calendar day.
///
/// The date check, limit check and increment happen under one lock, so
/// concurrent callers can never push the count past `limit` or lose an
/// increment.
pub struct DailyCounter {
    limit: u32,
    clock: Arc<dyn Clock>,
    state: Mutex<CounterState>,
}

impl DailyCounter {
    pub fn new(limit: u32, clock: Arc<dyn Clock>) -> Self {
        let today = clock.today();
        Self {
            limit,
            clock,
            state: Mutex::new(CounterState::new(today)),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Increment if under the limit.  Never mutates on denial.
    pub fn check_and_increment(&self) -> Admission {
        let today = self.clock.today();
        let mut state = self.state.lock();
        state.roll(today);
        state.try_increment(self.limit)
    }

    /// Current usage.  Applies the day rollover but never changes the count.
    pub fn status(&self) -> RateLimitStatus {
        let today = self.clock.today();
        let mut state = self.state.lock();
        state.roll(today);
        state.status(self.limit)
    }

    /// Zero the count unconditionally (admin and tests).
    pub fn reset(&self) {
        self.state.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    #[test]
    fn first_limit_calls_pass_then_deny() {
        let counter = DailyCounter::new(3, Arc::new(ManualClock::new(day(1))));
        for i in 1..=3 {
            let a = counter.check_and_increment();
            assert!(a.allowed);
            assert_eq!(a.count, i);
            assert_eq!(a.remaining, 3 - i);
        }
        for _ in 0..5 {
            let a = counter.check_and_increment();
            assert_eq!(
                a,
                Admission {
                    allowed: false,
                    count: 3,
                    remaining: 0
                }
            );
        }
        assert_eq!(counter.status().count, 3);
    }

    #[test]
    fn status_does_not_consume() {
        let counter = DailyCounter::new(2, Arc::new(ManualClock::new(day(1))));
        counter.check_and_increment();
        for _ in 0..10 {
            let s = counter.status();
            assert_eq!(s.count, 1);
            assert_eq!(s.remaining, 1);
            assert!((s.usage_percent - 50.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn date_advance_resets_count() {
        let clock = Arc::new(ManualClock::new(day(1)));
        let counter = DailyCounter::new(2, clock.clone());
        counter.check_and_increment();
        counter.check_and_increment();
        assert!(!counter.check_and_increment().allowed);

        clock.advance_days(1);
        let a = counter.check_and_increment();
        assert!(a.allowed);
        assert_eq!(a.count, 1);
        assert_eq!(counter.status().reset_date, day(2));
    }

    #[test]
    fn status_reports_rollover_without_increment() {
        let clock = Arc::new(ManualClock::new(day(1)));
        let counter = DailyCounter::new(4, clock.clone());
        counter.check_and_increment();
        clock.advance_days(3);
        let s = counter.status();
        assert_eq!(s.count, 0);
        assert_eq!(s.remaining, 4);
        assert_eq!(s.reset_date, day(4));
    }

    #[test]
    fn reset_zeroes_count() {
        let counter = DailyCounter::new(1, Arc::new(ManualClock::new(day(1))));
        counter.check_and_increment();
        counter.reset();
        assert!(counter.check_and_increment().allowed);
    }

    #[test]
    fn usage_percent_rounds_to_one_decimal() {
        let counter = DailyCounter::new(3, Arc::new(ManualClock::new(day(1))));
        counter.check_and_increment();
        assert!((counter.status().usage_percent - 33.3).abs() < 1e-9);
    }

    #[test]
    fn concurrent_increments_never_exceed_limit() {
        let counter = Arc::new(DailyCounter::new(
            50,
            Arc::new(ManualClock::new(day(1))),
        ));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = counter.clone();
                std::thread::spawn(move || {
                    (0..25).filter(|_| c.check_and_increment().allowed).count()
                })
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
        assert_eq!(counter.status().count, 50);
    }
}
