//! Free-tier allowance for unauthenticated callers.
//!
//! Each client identity (normally the caller's IP address) gets its own
//! small daily allowance, so one address cannot drain the shared budget
//! meant for all anonymous traffic.

use std::sync::Arc;

use tp_domain::error::QuotaScope;

use crate::clock::Clock;
use crate::counter::{Admission, RateLimitStatus};
use crate::keyed::KeyedDailyLimiter;

pub struct AnonymousLimiter {
    inner: KeyedDailyLimiter,
}

impl AnonymousLimiter {
    pub fn new(free_limit: u32, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: KeyedDailyLimiter::new(QuotaScope::Anonymous, free_limit, clock),
        }
    }

    pub fn free_limit(&self) -> u32 {
        self.inner.limit()
    }

    pub fn check_and_increment(&self, client_id: &str) -> Admission {
        self.inner.check_and_increment(client_id)
    }

    /// Free actions left today.  Unseen clients report the full allowance.
    pub fn remaining(&self, client_id: &str) -> u32 {
        self.inner.remaining(client_id)
    }

    pub fn status(&self, client_id: &str) -> RateLimitStatus {
        self.inner.status(client_id)
    }

    pub(crate) fn refund(&self, client_id: &str) {
        self.inner.refund(client_id)
    }

    /// Forget every client (admin and tests).
    pub fn reset(&self) {
        self.inner.clear()
    }
}
