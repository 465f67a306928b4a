//! Daily allowance for authenticated users.

use std::sync::Arc;

use tp_domain::error::QuotaScope;

use crate::clock::Clock;
use crate::counter::{Admission, RateLimitStatus};
use crate::keyed::KeyedDailyLimiter;

/// Same shape as [`crate::AnonymousLimiter`] but keyed by user id and with a
/// larger limit.  `status` never consumes quota, so UI polling is free.
pub struct UserLimiter {
    inner: KeyedDailyLimiter,
}

impl UserLimiter {
    pub fn new(daily_limit: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: KeyedDailyLimiter::new(QuotaScope::User, daily_limit, clock),
        }
    }

    pub fn daily_limit(&self) -> u32 {
        self.inner.limit()
    }

    pub fn status(&self, user_id: &str) -> RateLimitStatus {
        self.inner.status(user_id)
    }

    pub fn increment(&self, user_id: &str) -> Admission {
        self.inner.check_and_increment(user_id)
    }

    pub(crate) fn refund(&self, user_id: &str) {
        self.inner.refund(user_id)
    }

    /// Forget every user (admin and tests).
    pub fn reset(&self) {
        self.inner.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::NaiveDate;

    #[test]
    fn polling_status_is_free() {
        let clock = Arc::new(ManualClock::new(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()));
        let users = UserLimiter::new(50, clock);
        for _ in 0..100 {
            assert_eq!(users.status("alice").remaining, 50);
        }
        let a = users.increment("alice");
        assert_eq!((a.allowed, a.count, a.remaining), (true, 1, 49));
        assert_eq!(users.status("alice").count, 1);
    }
}
