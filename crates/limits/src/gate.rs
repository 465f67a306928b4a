//! The per-request admission check.
//!
//! A request is charged to exactly one scoped limiter (anonymous client or
//! authenticated user) and then to the global cap.  The scoped limiter goes
//! first so a caller who is already out of free queries never burns a
//! global slot.  When the global cap rejects after the scoped charge
//! succeeded, the scoped charge is refunded unless
//! `refund_on_global_reject` is off.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use tp_domain::config::LimitsConfig;
use tp_domain::error::{Error, QuotaScope, Result};
use tp_domain::trace::TraceEvent;

use crate::anonymous::AnonymousLimiter;
use crate::clock::Clock;
use crate::counter::{Admission, RateLimitStatus};
use crate::global::{GlobalDailyLimiter, UsageAlertSink};
use crate::user::UserLimiter;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Who is making the request.  Identity is resolved before the gate is
/// consulted; the gate never validates credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Caller {
    Anonymous { client_id: String },
    Authenticated { user_id: String },
}

impl Caller {
    pub fn anonymous(client_id: impl Into<String>) -> Self {
        Self::Anonymous {
            client_id: client_id.into(),
        }
    }

    pub fn user(user_id: impl Into<String>) -> Self {
        Self::Authenticated {
            user_id: user_id.into(),
        }
    }

    pub fn scope(&self) -> QuotaScope {
        match self {
            Self::Anonymous { .. } => QuotaScope::Anonymous,
            Self::Authenticated { .. } => QuotaScope::User,
        }
    }

    /// The limiter key: client identity or user id.
    pub fn key(&self) -> &str {
        match self {
            Self::Anonymous { client_id } => client_id,
            Self::Authenticated { user_id } => user_id,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

/// Result of a successful admission.
#[derive(Debug, Clone, Serialize)]
pub struct GateDecision {
    pub authenticated: bool,
    /// The scoped (anonymous or per-user) charge.
    pub scoped: Admission,
    pub scoped_limit: u32,
    pub global: Admission,
    pub reset_date: NaiveDate,
}

impl GateDecision {
    /// Free uses left, only meaningful for anonymous callers.
    pub fn anonymous_remaining(&self) -> Option<u32> {
        (!self.authenticated).then_some(self.scoped.remaining)
    }
}

/// Non-mutating usage snapshot for a caller.
#[derive(Debug, Clone, Serialize)]
pub struct UsageView {
    pub authenticated: bool,
    pub scope: QuotaScope,
    pub caller: RateLimitStatus,
    pub global: RateLimitStatus,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// QuotaGate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct QuotaGate {
    global: GlobalDailyLimiter,
    anonymous: AnonymousLimiter,
    users: UserLimiter,
    refund_on_global_reject: bool,
}

impl QuotaGate {
    pub fn from_config(config: &LimitsConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            global: GlobalDailyLimiter::new(
                config.daily_api_limit,
                &config.warning_thresholds,
                clock.clone(),
            ),
            anonymous: AnonymousLimiter::new(config.anonymous_free_limit, clock.clone()),
            users: UserLimiter::new(config.user_daily_limit, clock),
            refund_on_global_reject: config.refund_on_global_reject,
        }
    }

    /// Route global usage warnings to `sink` instead of the log.
    pub fn with_alert_sink(mut self, sink: Arc<dyn UsageAlertSink>) -> Self {
        self.global = self.global.with_sink(sink);
        self
    }

    pub fn global(&self) -> &GlobalDailyLimiter {
        &self.global
    }

    pub fn anonymous(&self) -> &AnonymousLimiter {
        &self.anonymous
    }

    pub fn users(&self) -> &UserLimiter {
        &self.users
    }

    /// Charge one request.  Returns `Error::QuotaExceeded` naming the scope
    /// that rejected it.
    pub fn admit(&self, caller: &Caller) -> Result<GateDecision> {
        let scope = caller.scope();
        let (scoped, scoped_limit) = match caller {
            Caller::Anonymous { client_id } => (
                self.anonymous.check_and_increment(client_id),
                self.anonymous.free_limit(),
            ),
            Caller::Authenticated { user_id } => {
                (self.users.increment(user_id), self.users.daily_limit())
            }
        };

        if !scoped.allowed {
            return Err(self.denied(scope, Some(caller.key()), scoped.count, scoped_limit));
        }

        let global = self.global.check_and_increment();
        if !global.allowed {
            if self.refund_on_global_reject {
                self.refund(caller);
            }
            return Err(self.denied(
                QuotaScope::Global,
                None,
                global.count,
                self.global.limit(),
            ));
        }

        Ok(GateDecision {
            authenticated: caller.is_authenticated(),
            scoped,
            scoped_limit,
            global,
            reset_date: self.global.status().reset_date,
        })
    }

    /// Current counters for `caller` without charging anything.
    pub fn usage(&self, caller: &Caller) -> UsageView {
        let caller_status = match caller {
            Caller::Anonymous { client_id } => self.anonymous.status(client_id),
            Caller::Authenticated { user_id } => self.users.status(user_id),
        };
        UsageView {
            authenticated: caller.is_authenticated(),
            scope: caller.scope(),
            caller: caller_status,
            global: self.global.status(),
        }
    }

    /// Zero every counter (admin and tests).
    pub fn reset_all(&self) {
        self.global.reset();
        self.anonymous.reset();
        self.users.reset();
    }

    // ── Private ──────────────────────────────────────────────────────

    fn refund(&self, caller: &Caller) {
        match caller {
            Caller::Anonymous { client_id } => self.anonymous.refund(client_id),
            Caller::Authenticated { user_id } => self.users.refund(user_id),
        }
        TraceEvent::QuotaRefunded {
            scope: caller.scope(),
            key: caller.key().to_owned(),
        }
        .emit();
    }

    fn denied(&self, scope: QuotaScope, key: Option<&str>, count: u32, limit: u32) -> Error {
        tracing::info!(scope = %scope, key = ?key, count, limit, "quota exceeded");
        TraceEvent::QuotaDenied {
            scope,
            key: key.map(str::to_owned),
            count,
            limit,
        }
        .emit();
        Error::QuotaExceeded {
            scope,
            count,
            limit,
        }
    }
}
