//! Per-key daily counters sharing one limit.
//!
//! Each key owns its own lock.  The map itself is only locked long enough to
//! find or insert an entry, so callers with different keys do not serialize
//! on each other's increments.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};

use tp_domain::error::QuotaScope;
use tp_domain::trace::TraceEvent;

use crate::clock::Clock;
use crate::counter::{Admission, CounterState, RateLimitStatus};

pub struct KeyedDailyLimiter {
    scope: QuotaScope,
    limit: u32,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, Arc<Mutex<CounterState>>>>,
    /// Last day the map was swept for stale entries.
    swept: Mutex<NaiveDate>,
}

impl KeyedDailyLimiter {
    pub fn new(scope: QuotaScope, limit: u32, clock: Arc<dyn Clock>) -> Self {
        let today = clock.today();
        TraceEvent::LimiterInitialized { scope, limit }.emit();
        Self {
            scope,
            limit,
            clock,
            entries: RwLock::new(HashMap::new()),
            swept: Mutex::new(today),
        }
    }

    pub fn scope(&self) -> QuotaScope {
        self.scope
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Charge one action to `key`.  Unseen keys start at zero.
    pub fn check_and_increment(&self, key: &str) -> Admission {
        let today = self.clock.today();
        self.sweep_if_new_day(today);
        let entry = self.entry(key, today);
        let mut state = entry.lock();
        state.roll(today);
        state.try_increment(self.limit)
    }

    /// Usage for `key` without charging it.  Unseen keys report a full
    /// allowance and are not inserted.
    pub fn status(&self, key: &str) -> RateLimitStatus {
        let today = self.clock.today();
        let entry = self.entries.read().get(key).cloned();
        match entry {
            Some(entry) => {
                let mut state = entry.lock();
                state.roll(today);
                state.status(self.limit)
            }
            None => CounterState::new(today).status(self.limit),
        }
    }

    pub fn remaining(&self, key: &str) -> u32 {
        self.status(key).remaining
    }

    /// Give back one action charged to `key` today.  No-op for unseen keys
    /// or when the key's day has already rolled over.
    pub fn refund(&self, key: &str) {
        let today = self.clock.today();
        let entry = self.entries.read().get(key).cloned();
        if let Some(entry) = entry {
            let mut state = entry.lock();
            if !state.roll(today) {
                state.refund();
            }
        }
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.entries.read().len()
    }

    /// Forget every key (admin and tests).
    pub fn clear(&self) {
        self.entries.write().clear();
        tracing::info!(scope = %self.scope, "keyed limiter cleared");
    }

    // ── Private ──────────────────────────────────────────────────────

    fn entry(&self, key: &str, today: NaiveDate) -> Arc<Mutex<CounterState>> {
        // Fast path: entry already exists.
        if let Some(entry) = self.entries.read().get(key) {
            return entry.clone();
        }
        self.entries
            .write()
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(CounterState::new(today))))
            .clone()
    }

    /// Drop entries left over from earlier days, once per new day.
    ///
    /// An entry is only dropped while nobody else holds a handle to it:
    /// under the write lock no new handles can be taken, so a strong count
    /// of one means the map is the sole owner.
    fn sweep_if_new_day(&self, today: NaiveDate) {
        {
            let mut swept = self.swept.lock();
            if *swept >= today {
                return;
            }
            *swept = today;
        }

        let dropped = {
            let mut entries = self.entries.write();
            let before = entries.len();
            entries.retain(|_, entry| {
                Arc::strong_count(entry) > 1 || entry.lock().date() >= today
            });
            before - entries.len()
        };

        tracing::info!(scope = %self.scope, date = %today, dropped, "daily reset");
        TraceEvent::DailyReset {
            scope: self.scope,
            date: today.to_string(),
            stale_entries_dropped: dropped,
        }
        .emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(limit: u32) -> (KeyedDailyLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
        ));
        (
            KeyedDailyLimiter::new(QuotaScope::Anonymous, limit, clock.clone()),
            clock,
        )
    }

    #[test]
    fn keys_are_independent() {
        let (l, _) = limiter(2);
        assert!(l.check_and_increment("a").allowed);
        assert!(l.check_and_increment("a").allowed);
        assert!(!l.check_and_increment("a").allowed);
        let b = l.check_and_increment("b");
        assert!(b.allowed);
        assert_eq!(b.count, 1);
    }

    #[test]
    fn status_of_unseen_key_does_not_insert() {
        let (l, _) = limiter(4);
        assert_eq!(l.remaining("ghost"), 4);
        assert_eq!(l.tracked(), 0);
    }

    #[test]
    fn refund_returns_one_unit() {
        let (l, _) = limiter(1);
        assert!(l.check_and_increment("a").allowed);
        l.refund("a");
        assert!(l.check_and_increment("a").allowed);
    }

    #[test]
    fn refund_never_underflows() {
        let (l, _) = limiter(1);
        l.check_and_increment("a");
        l.refund("a");
        l.refund("a");
        assert_eq!(l.status("a").count, 0);
    }

    #[test]
    fn stale_entries_are_swept_on_new_day() {
        let (l, clock) = limiter(3);
        l.check_and_increment("a");
        l.check_and_increment("b");
        assert_eq!(l.tracked(), 2);

        clock.advance_days(1);
        let a = l.check_and_increment("c");
        assert_eq!(a.count, 1);
        assert_eq!(l.tracked(), 1);
        assert_eq!(l.remaining("a"), 3);
    }

    #[test]
    fn lazy_reset_without_sweep() {
        let (l, clock) = limiter(1);
        l.check_and_increment("a");
        clock.advance_days(1);
        // status() does not sweep but still applies the rollover.
        assert_eq!(l.remaining("a"), 1);
    }
}
