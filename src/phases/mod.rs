//! The pipeline orchestrators, one module per phase, plus the facade
//! that wires them together.

pub mod phase1;
pub mod phase3;
pub mod phase4;
pub mod phase5;

use crate::error::ErrorCode;
use crate::types::{Job, PolicyConstraints, Response};

/// Outcome of Phase 1: ingestion.
pub enum Phase1Outcome {
    Continue { job: Job, signature: String },
    CacheHit { job: Job, signature: String, cached_response: Response },
    Error { error: ErrorCode },
}

/// Outcome of Phase 3: policy.
pub enum Phase3Outcome {
    Continue { policy: PolicyConstraints },
    PolicyViolation { policy: PolicyConstraints, error: ErrorCode },
    Error { error: ErrorCode },
}
