//! Multi-tenant recursive reason-and-act execution engine: a five-phase
//! pipeline (ingestion, policy, execution, serialization) plus the
//! cross-cutting services (cache, audit, rate limiting, billing) each
//! phase depends on.

pub mod audit_log;
pub mod billing;
pub mod cache;
pub mod config;
pub mod context;
pub mod cost;
pub mod engine;
pub mod error;
pub mod llm;
pub mod phases;
pub mod policy_enforcer;
pub mod policy_store;
pub mod rate_limiter;
pub mod schema;
pub mod serializer;
pub mod signature;
pub mod tools;
pub mod types;

#[cfg(feature = "http-api")]
pub mod http;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::EngineError;

/// Initializes a `tracing` subscriber reading `RUST_LOG` (default
/// `info`). Embedding applications may call this once at startup, or
/// wire their own subscriber and skip it entirely.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();
}
