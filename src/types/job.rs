//! The client-submitted unit of work and its stable-subset extraction.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::tool::ToolResult;

/// Default recursion bound when a job does not specify one.
pub const DEFAULT_MAX_DEPTH: u32 = 5;
/// Default context window budget when a job does not specify one.
pub const DEFAULT_CONTEXT_WINDOW_LIMIT: u32 = 8000;

fn default_max_depth() -> u32 {
    DEFAULT_MAX_DEPTH
}

fn default_current_depth() -> u32 {
    0
}

fn default_context_window_limit() -> u32 {
    DEFAULT_CONTEXT_WINDOW_LIMIT
}

/// A client-submitted job. Unknown top-level fields are rejected at the
/// wire boundary via `deny_unknown_fields`; numeric bounds (`maxDepth` in
/// `[1,20]`, `contextWindowLimit` in `[100,128000]`) are enforced by the
/// schema registry, not by serde, since serde has no range validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Job {
    pub user_id: String,
    pub prompt: String,
    pub correlation_id: Uuid,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_current_depth")]
    pub current_depth: u32,
    #[serde(default = "default_context_window_limit")]
    pub context_window_limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<ToolResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

impl Job {
    /// Builds a `serde_json::Value` containing exactly the stable subset
    /// of the job: the fields whose change alters the request's intent.
    /// `correlationId` and `currentDepth` are volatile and excluded.
    /// Keys are emitted in the struct's declared order here; canonical
    /// ordering for signing happens in `crate::signature`.
    pub fn stable_subset(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("userId".to_string(), Value::String(self.user_id.clone()));
        map.insert("prompt".to_string(), Value::String(self.prompt.clone()));
        map.insert(
            "maxDepth".to_string(),
            Value::Number(self.max_depth.into()),
        );
        map.insert(
            "contextWindowLimit".to_string(),
            Value::Number(self.context_window_limit.into()),
        );
        if let Some(previous_context) = &self.previous_context {
            map.insert(
                "previousContext".to_string(),
                Value::String(previous_context.clone()),
            );
        }
        if let Some(tool_results) = &self.tool_results {
            map.insert(
                "toolResults".to_string(),
                serde_json::to_value(tool_results).expect("ToolResult always serializes"),
            );
        }
        if let Some(metadata) = &self.metadata {
            map.insert(
                "metadata".to_string(),
                serde_json::to_value(metadata).expect("metadata map always serializes"),
            );
        }
        Value::Object(map)
    }

    /// Concatenation used by the context estimator: prompt plus any
    /// accumulated previous context, joined by a blank line.
    pub fn combined_text(&self) -> String {
        match &self.previous_context {
            Some(previous) if !previous.is_empty() => format!("{}\n\n{}", self.prompt, previous),
            _ => self.prompt.clone(),
        }
    }
}
