//! Tool-related wire types shared by the registry, dispatcher, and job model.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of tool names the engine knows about. Any name
/// outside this set is rejected by the registry at lookup time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    WorkflowOrchestrator,
    GoogleSearch,
    CodeExecutor,
    SubmitParallelJob,
    RetrieveContext,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::WorkflowOrchestrator,
        ToolName::GoogleSearch,
        ToolName::CodeExecutor,
        ToolName::SubmitParallelJob,
        ToolName::RetrieveContext,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::WorkflowOrchestrator => "workflow_orchestrator",
            ToolName::GoogleSearch => "google_search",
            ToolName::CodeExecutor => "code_executor",
            ToolName::SubmitParallelJob => "submit_parallel_job",
            ToolName::RetrieveContext => "retrieve_context",
        }
    }

    pub fn from_str_opt(value: &str) -> Option<ToolName> {
        ToolName::ALL.into_iter().find(|name| name.as_str() == value)
    }

    /// The per-tool cost modifier applied by the dispatcher.
    pub fn cost_modifier(&self) -> f64 {
        match self {
            ToolName::WorkflowOrchestrator => 1.5,
            ToolName::CodeExecutor => 1.2,
            ToolName::SubmitParallelJob => 2.0,
            ToolName::GoogleSearch => 1.0,
            ToolName::RetrieveContext => 0.8,
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a prior tool invocation, as carried on a `Job` or produced
/// by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub tool_name: String,
    pub result: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
