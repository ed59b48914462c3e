//! Crate-wide error taxonomy.
//!
//! Each component gets its own `thiserror` enum; `EngineError` aggregates
//! them at the facade boundary. Fail-open components (cache, audit, rate
//! limiter, billing persistence) log and swallow these rather than
//! propagate them; see each component's own handling.

use serde_json::Value;
use thiserror::Error;

/// Schema/bounds violation at ingress or egress.
#[derive(Debug, Error, Clone)]
pub enum ValidationError {
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("missing field: {0}")]
    MissingField(String),
    #[error("field {path} out of bounds: {message}")]
    OutOfBounds { path: String, message: String },
    #[error("malformed shape: {0}")]
    MalformedShape(String),
}

/// A single structured validation issue.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
    pub code: String,
}

/// Recursion/context/rate/tool-calls/allowlist denial.
#[derive(Debug, Error, Clone)]
pub enum PolicyError {
    #[error("recursion depth exceeded: current={current_depth} max={max_depth}")]
    RecursionDepthExceeded { current_depth: u32, max_depth: u32 },
    #[error("context window exceeded: estimated={estimated} limit={limit}")]
    ContextWindowExceeded { estimated: u32, limit: u32 },
    #[error("rate limit exceeded: {reason}")]
    RateLimitExceeded { reason: String },
    #[error("tool call limit exceeded: used={used} max={max}")]
    ToolCallsExceeded { used: u32, max: u32 },
    #[error("tool not allowed: {tool_name}")]
    ToolNotAllowed { tool_name: String },
}

/// Retryable model/network failure; surfaces only after retry exhaustion.
#[derive(Debug, Error, Clone)]
#[error("transient model error {code}")]
pub struct TransientModelError {
    pub code: String,
    pub retry_after_ms: Option<u64>,
}

/// Non-retryable model failure (auth, invalid request, content policy).
#[derive(Debug, Error, Clone)]
#[error("terminal model error {code}")]
pub struct TerminalModelError {
    pub code: String,
}

/// Tool not found, invalid args, or executor exception.
#[derive(Debug, Error, Clone)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("tool executor failed: {0}")]
    ExecutionFailed(String),
}

/// Infrastructure failure in the result cache; never surfaced to the client.
#[derive(Debug, Error, Clone)]
#[error("cache backend error: {0}")]
pub struct CacheError(pub String);

/// Infrastructure failure in the audit logger; always swallowed.
#[derive(Debug, Error, Clone)]
#[error("audit backend error: {0}")]
pub struct AuditError(pub String);

/// Infrastructure failure writing a billing report; request proceeds.
#[derive(Debug, Error, Clone)]
#[error("billing persistence error: {0}")]
pub struct BillingPersistError(pub String);

/// Infrastructure failure in the execution-metadata store; best-effort.
#[derive(Debug, Error, Clone)]
#[error("metadata store error: {0}")]
pub struct MetadataStoreError(pub String);

/// Unexpected exception surfacing at the facade boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("policy denied: {0}")]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Transient(#[from] TransientModelError),
    #[error(transparent)]
    Terminal(#[from] TerminalModelError),
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),
    #[error("billing error: {0}")]
    Billing(#[from] BillingPersistError),
    #[error("job was cancelled")]
    Cancelled,
    #[error("unexpected engine failure: {0}")]
    Unexpected(String),
}

/// A structured `{code, message, details?}` error, the shape every
/// non-`CONTINUE` phase result and every `Response.error` carries.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorCode {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorCode {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Stable error codes surfaced on `Response.error.code`.
pub mod codes {
    pub const PHASE1_VALIDATION_FAILED: &str = "PHASE1_VALIDATION_FAILED";
    pub const PHASE3_RATE_LIMIT_EXCEEDED: &str = "PHASE3_RATE_LIMIT_EXCEEDED";
    pub const PHASE3_CONTEXT_EXCEEDED: &str = "PHASE3_CONTEXT_EXCEEDED";
    pub const PHASE3_RECURSION_EXCEEDED: &str = "PHASE3_RECURSION_EXCEEDED";
    pub const PHASE3_POLICY_VIOLATION: &str = "PHASE3_POLICY_VIOLATION";
    pub const PHASE3_UNKNOWN_ERROR: &str = "PHASE3_UNKNOWN_ERROR";
    pub const PHASE5_VALIDATION_FAILED: &str = "PHASE5_VALIDATION_FAILED";
    pub const PHASE5_UNKNOWN_ERROR: &str = "PHASE5_UNKNOWN_ERROR";
    pub const CONTEXT_EXCEEDED: &str = "CONTEXT_EXCEEDED";
    pub const PARSE_FAILURE: &str = "PARSE_FAILURE";
    pub const CANCELLED: &str = "CANCELLED";
    pub const ENGINE_ERROR: &str = "ENGINE_ERROR";
    pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
    pub const TIMEOUT: &str = "TIMEOUT";
    pub const SERVER_ERROR: &str = "SERVER_ERROR";
    pub const RATE_LIMIT: &str = "RATE_LIMIT";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    pub const INVALID_API_KEY: &str = "INVALID_API_KEY";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const INVALID_MODEL: &str = "INVALID_MODEL";
    pub const CONTENT_POLICY_VIOLATION: &str = "CONTENT_POLICY_VIOLATION";
    pub const UNKNOWN: &str = "UNKNOWN";
}
