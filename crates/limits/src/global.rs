//! System-wide daily cap on downstream agent calls.
//!
//! Wraps a single day counter and announces usage thresholds (by default
//! 50/80/90/95%) at most once per day.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use tp_domain::error::QuotaScope;
use tp_domain::trace::TraceEvent;

use crate::clock::Clock;
use crate::counter::{Admission, CounterState, RateLimitStatus};

/// Receives one-time usage threshold notifications.
pub trait UsageAlertSink: Send + Sync {
    fn usage_warning(&self, percent: u32, count: u32, limit: u32);
}

/// Default sink: a structured warning log plus a trace event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl UsageAlertSink for LogAlertSink {
    fn usage_warning(&self, percent: u32, count: u32, limit: u32) {
        tracing::warn!(percent, count, limit, "daily API usage threshold reached");
        TraceEvent::UsageWarning {
            percent,
            count,
            limit,
        }
        .emit();
    }
}

struct GlobalState {
    counter: CounterState,
    /// Threshold percentages already announced today.
    announced: BTreeSet<u32>,
}

pub struct GlobalDailyLimiter {
    limit: u32,
    /// `(percent, ratio)` pairs, e.g. `(80, 0.8)`.
    thresholds: Vec<(u32, f64)>,
    clock: Arc<dyn Clock>,
    state: Mutex<GlobalState>,
    sink: Arc<dyn UsageAlertSink>,
}

impl GlobalDailyLimiter {
    pub fn new(limit: u32, thresholds: &[f64], clock: Arc<dyn Clock>) -> Self {
        let today = clock.today();
        let mut thresholds: Vec<(u32, f64)> = thresholds
            .iter()
            .map(|t| ((t * 100.0).round() as u32, *t))
            .collect();
        thresholds.sort_by_key(|(pct, _)| *pct);
        thresholds.dedup_by_key(|(pct, _)| *pct);

        TraceEvent::LimiterInitialized {
            scope: QuotaScope::Global,
            limit,
        }
        .emit();

        Self {
            limit,
            thresholds,
            clock,
            state: Mutex::new(GlobalState {
                counter: CounterState::new(today),
                announced: BTreeSet::new(),
            }),
            sink: Arc::new(LogAlertSink),
        }
    }

    /// Replace the alert sink.
    pub fn with_sink(mut self, sink: Arc<dyn UsageAlertSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Charge one call against today's cap.
    ///
    /// Threshold bookkeeping happens inside the same critical section as the
    /// increment; the sink is invoked after the lock is released.
    pub fn check_and_increment(&self) -> Admission {
        let today = self.clock.today();
        let (admission, fired, rolled) = {
            let mut state = self.state.lock();
            let rolled = state.counter.roll(today);
            if rolled {
                state.announced.clear();
            }
            let admission = state.counter.try_increment(self.limit);
            let mut fired = Vec::new();
            if admission.allowed && self.limit > 0 {
                let ratio = f64::from(admission.count) / f64::from(self.limit);
                for (pct, t) in &self.thresholds {
                    if ratio >= *t && state.announced.insert(*pct) {
                        fired.push(*pct);
                    }
                }
            }
            (admission, fired, rolled)
        };

        if rolled {
            tracing::info!(date = %today, "global daily counter reset");
            TraceEvent::DailyReset {
                scope: QuotaScope::Global,
                date: today.to_string(),
                stale_entries_dropped: 0,
            }
            .emit();
        }
        for pct in fired {
            self.sink.usage_warning(pct, admission.count, self.limit);
        }
        admission
    }

    pub fn status(&self) -> RateLimitStatus {
        let today = self.clock.today();
        let mut state = self.state.lock();
        if state.counter.roll(today) {
            state.announced.clear();
        }
        state.counter.status(self.limit)
    }

    /// `true` when no calls remain today.
    pub fn is_exhausted(&self) -> bool {
        self.status().remaining == 0
    }

    /// Zero the counter and forget announced thresholds (admin and tests).
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.counter.clear();
        state.announced.clear();
        tracing::info!("global daily counter manually reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::NaiveDate;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<u32>>);

    impl UsageAlertSink for Recorder {
        fn usage_warning(&self, percent: u32, _count: u32, _limit: u32) {
            self.0.lock().push(percent);
        }
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()))
    }

    const DEFAULT: [f64; 4] = [0.5, 0.8, 0.9, 0.95];

    #[test]
    fn each_threshold_fires_once() {
        let rec = Arc::new(Recorder::default());
        let limiter = GlobalDailyLimiter::new(20, &DEFAULT, clock()).with_sink(rec.clone());
        for _ in 0..30 {
            limiter.check_and_increment();
            limiter.status();
        }
        assert_eq!(*rec.0.lock(), vec![50, 80, 90, 95]);
    }

    #[test]
    fn small_limit_fires_multiple_thresholds_in_one_step() {
        let rec = Arc::new(Recorder::default());
        let limiter = GlobalDailyLimiter::new(2, &DEFAULT, clock()).with_sink(rec.clone());
        limiter.check_and_increment(); // 50%
        assert_eq!(*rec.0.lock(), vec![50]);
        limiter.check_and_increment(); // 100% crosses the rest at once
        assert_eq!(*rec.0.lock(), vec![50, 80, 90, 95]);
        limiter.check_and_increment(); // denied, nothing new
        assert_eq!(rec.0.lock().len(), 4);
    }

    #[test]
    fn thresholds_rearm_after_rollover() {
        let clock = clock();
        let rec = Arc::new(Recorder::default());
        let limiter =
            GlobalDailyLimiter::new(2, &[0.5], clock.clone()).with_sink(rec.clone());
        limiter.check_and_increment();
        limiter.check_and_increment();
        assert_eq!(*rec.0.lock(), vec![50]);

        clock.advance_days(1);
        limiter.check_and_increment();
        assert_eq!(*rec.0.lock(), vec![50, 50]);
    }

    #[test]
    fn manual_reset_rearms_thresholds() {
        let rec = Arc::new(Recorder::default());
        let limiter = GlobalDailyLimiter::new(2, &[0.5], clock()).with_sink(rec.clone());
        limiter.check_and_increment();
        limiter.reset();
        assert_eq!(limiter.status().count, 0);
        limiter.check_and_increment();
        assert_eq!(*rec.0.lock(), vec![50, 50]);
    }

    #[test]
    fn exhausted_after_limit() {
        let limiter = GlobalDailyLimiter::new(1, &DEFAULT, clock());
        assert!(!limiter.is_exhausted());
        assert!(limiter.check_and_increment().allowed);
        assert!(limiter.is_exhausted());
        assert!(!limiter.check_and_increment().allowed);
    }

    #[test]
    fn concurrent_callers_fire_each_threshold_once() {
        let rec = Arc::new(Recorder::default());
        let limiter = Arc::new(
            GlobalDailyLimiter::new(100, &DEFAULT, clock()).with_sink(rec.clone()),
        );
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let l = limiter.clone();
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        l.check_and_increment();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let mut fired = rec.0.lock().clone();
        fired.sort_unstable();
        assert_eq!(fired, vec![50, 80, 90, 95]);
        assert_eq!(limiter.status().count, 100);
    }
}
