//! Error classification and retrying model client (C9, C10).

pub mod classifier;
pub mod client;
pub mod resilient;

pub use classifier::{classify, Classification, RawModelError};
pub use client::{CallConfig, LlmCallResult, LlmClient, MockLlmClient};
pub use resilient::{ResilientCallError, ResilientLlmClient};
