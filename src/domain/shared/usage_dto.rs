use crate::domain::usage::{LimitDecision, LimitViolation, RateLimitPolicy, UsageSnapshot};
use serde::{Deserialize, Serialize};

/// Response for GET /api/usage
#[derive(Debug, Serialize, Deserialize)]
pub struct UsageResponse {
    pub visitor: String,
    pub usage: UsageSnapshot,
    pub limits: RateLimitPolicy,
    pub resets: WindowResets,
}

/// Milliseconds until each wall-clock window rolls over
#[derive(Debug, Serialize, Deserialize)]
pub struct WindowResets {
    pub hour_ms: u64,
    pub day_ms: u64,
}

/// Request for POST /api/usage/check
#[derive(Debug, Serialize, Deserialize)]
pub struct LimitCheckRequest {
    pub text: String,
    #[serde(default)]
    pub use_high_tier_voice: bool,
}

/// Response for POST /api/usage/check. A dry run: nothing is recorded.
#[derive(Debug, Serialize, Deserialize)]
pub struct LimitCheckResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violation: Option<LimitViolation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    pub current_usage: UsageSnapshot,
}

impl From<LimitDecision> for LimitCheckResponse {
    fn from(decision: LimitDecision) -> Self {
        match decision {
            LimitDecision::Allowed(admission) => Self {
                allowed: true,
                violation: None,
                reason: None,
                retry_after_ms: None,
                current_usage: admission.usage().clone(),
            },
            LimitDecision::Denied(denial) => Self {
                allowed: false,
                violation: Some(denial.violation),
                reason: Some(denial.reason),
                retry_after_ms: denial.retry_after_ms,
                current_usage: denial.current_usage,
            },
        }
    }
}
