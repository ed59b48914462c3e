//! Per-user tier, policy constraints, and rate-limit state.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Subscription tier driving the default policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserTier {
    Free,
    Pro,
    Enterprise,
}

impl UserTier {
    pub fn default_constraints(&self) -> PolicyConstraints {
        match self {
            UserTier::Free => PolicyConstraints {
                max_recursion_depth: 5,
                context_window_limit: 8000,
                max_tool_calls: 10,
                allowed_tools: Vec::new(),
                rate_limit: RateLimit {
                    per_minute: 10,
                    per_hour: 100,
                },
            },
            UserTier::Pro => PolicyConstraints {
                max_recursion_depth: 10,
                context_window_limit: 16000,
                max_tool_calls: 25,
                allowed_tools: Vec::new(),
                rate_limit: RateLimit {
                    per_minute: 30,
                    per_hour: 500,
                },
            },
            UserTier::Enterprise => PolicyConstraints {
                max_recursion_depth: 20,
                context_window_limit: 128000,
                max_tool_calls: 100,
                allowed_tools: Vec::new(),
                rate_limit: RateLimit {
                    per_minute: 100,
                    per_hour: 2000,
                },
            },
        }
    }

    /// Retention window (days) for audit events at this tier.
    pub fn audit_retention_days(&self) -> u32 {
        match self {
            UserTier::Free => 7,
            UserTier::Pro => 30,
            UserTier::Enterprise => 90,
        }
    }
}

impl Default for UserTier {
    fn default() -> Self {
        UserTier::Free
    }
}

/// Sliding-window rate limit bounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimit {
    pub per_minute: u32,
    pub per_hour: u32,
}

/// The effective constraints a policy decision is checked against. All
/// integer fields are positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConstraints {
    pub max_recursion_depth: u32,
    pub context_window_limit: u32,
    pub max_tool_calls: u32,
    pub allowed_tools: Vec<String>,
    pub rate_limit: RateLimit,
}

impl PolicyConstraints {
    /// Lowers `self`'s caps to the job's own caps wherever the job asks
    /// for something stricter. Only a strictly lower job value narrows
    /// the policy; a higher job value is ignored since it can never
    /// loosen a tier's policy.
    pub fn narrow_to_job_caps(&mut self, job_max_depth: u32, job_context_window_limit: u32) {
        self.max_recursion_depth = self.max_recursion_depth.min(job_max_depth);
        self.context_window_limit = self.context_window_limit.min(job_context_window_limit);
    }
}

/// A single tumbling window's counter state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WindowCounter {
    pub count: u32,
    pub window_start: SystemTime,
}

impl WindowCounter {
    pub fn fresh(now: SystemTime) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }
}

/// Per-user in-memory rate-limit state, covering both the minute and the
/// hour tumbling windows.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub minute: WindowCounter,
    pub hour: WindowCounter,
    pub last_updated: SystemTime,
}

impl RateLimitState {
    pub fn fresh(now: SystemTime) -> Self {
        Self {
            minute: WindowCounter::fresh(now),
            hour: WindowCounter::fresh(now),
            last_updated: now,
        }
    }
}

/// Why a policy check denied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationType {
    RecursionDepthExceeded,
    ContextWindowExceeded,
    RateLimitExceeded,
    ToolCallsExceeded,
    ToolNotAllowed,
}
