pub mod clock;
pub mod limiter;
pub mod policy;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{Admission, LimitDecision, LimitDenial, LimitViolation, UsageLimiter};
pub use policy::{CostModel, PolicyError, RateLimitPolicy};
pub use window::{SessionUsage, UsageSnapshot, UsageStats, WindowKind, WindowUsage, WINDOW_RETENTION_MS};
