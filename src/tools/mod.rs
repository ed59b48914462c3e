//! Tool registry and dispatcher (C11, C12).

pub mod dispatcher;
pub mod mocks;
pub mod registry;

pub use dispatcher::{DispatchContext, DispatchMetrics, DispatchMetricsTracker, ToolDispatcher};
pub use registry::{ToolDefinition, ToolExecutor, ToolRegistry};

use std::sync::Arc;

use crate::types::ToolName;

/// Wires the five mock tool executors into a fresh registry, the shape
/// a production deployment would instead populate with real adapters.
pub fn registry_with_mock_tools() -> ToolRegistry {
    let registry = ToolRegistry::new();
    let definitions = [
        (
            ToolName::WorkflowOrchestrator,
            "Orchestrates a multi-step workflow",
            Arc::new(mocks::WorkflowOrchestratorExecutor) as Arc<dyn ToolExecutor>,
        ),
        (
            ToolName::GoogleSearch,
            "Performs a web search",
            Arc::new(mocks::GoogleSearchExecutor),
        ),
        (
            ToolName::CodeExecutor,
            "Executes a code snippet in a sandbox",
            Arc::new(mocks::CodeExecutorExecutor),
        ),
        (
            ToolName::SubmitParallelJob,
            "Submits a batch of jobs for parallel execution",
            Arc::new(mocks::SubmitParallelJobExecutor),
        ),
        (
            ToolName::RetrieveContext,
            "Retrieves supporting context via RAG",
            Arc::new(mocks::RetrieveContextExecutor),
        ),
    ];

    for (name, description, executor) in definitions {
        registry
            .register(ToolDefinition {
                name,
                description: description.to_string(),
                executor,
            })
            .expect("mock tool registration cannot collide at startup");
    }

    registry
}
