//! In-memory daily quotas.
//!
//! Every limiter here counts actions per UTC calendar day and resets lazily
//! the first time it is touched on a new day.  Nothing is persisted: a
//! process restart starts every counter from zero.

pub mod anonymous;
pub mod clock;
pub mod counter;
pub mod gate;
pub mod global;
pub mod keyed;
pub mod user;

pub use anonymous::AnonymousLimiter;
pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::{Admission, DailyCounter, RateLimitStatus};
pub use gate::{Caller, GateDecision, QuotaGate, UsageView};
pub use global::{GlobalDailyLimiter, LogAlertSink, UsageAlertSink};
pub use keyed::KeyedDailyLimiter;
pub use user::UserLimiter;
