//! Mock executors for the five closed-set tools. Real implementations
//! are supplied by the embedding application; these stand in for
//! registry wiring and dispatcher tests.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::registry::ToolExecutor;

pub struct EchoExecutor;

#[async_trait]
impl ToolExecutor for EchoExecutor {
    async fn execute(&self, args: &Value) -> Result<Value, String> {
        Ok(json!({ "echo": args }))
    }

    fn validate_args(&self, _args: &Value) -> bool {
        true
    }
}

pub struct WorkflowOrchestratorExecutor;

#[async_trait]
impl ToolExecutor for WorkflowOrchestratorExecutor {
    async fn execute(&self, args: &Value) -> Result<Value, String> {
        let workflow = args
            .get("workflow")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing \"workflow\" argument".to_string())?;
        Ok(json!({ "workflow": workflow, "status": "scheduled" }))
    }

    fn validate_args(&self, args: &Value) -> bool {
        args.get("workflow").and_then(Value::as_str).is_some()
    }
}

pub struct GoogleSearchExecutor;

#[async_trait]
impl ToolExecutor for GoogleSearchExecutor {
    async fn execute(&self, args: &Value) -> Result<Value, String> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing \"query\" argument".to_string())?;
        Ok(json!({ "query": query, "results": [] }))
    }

    fn validate_args(&self, args: &Value) -> bool {
        args.get("query").and_then(Value::as_str).is_some()
    }
}

pub struct CodeExecutorExecutor;

#[async_trait]
impl ToolExecutor for CodeExecutorExecutor {
    async fn execute(&self, args: &Value) -> Result<Value, String> {
        let code = args
            .get("code")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing \"code\" argument".to_string())?;
        Ok(json!({ "stdout": "", "exitCode": 0, "source": code }))
    }

    fn validate_args(&self, args: &Value) -> bool {
        args.get("code").and_then(Value::as_str).is_some()
    }
}

pub struct SubmitParallelJobExecutor;

#[async_trait]
impl ToolExecutor for SubmitParallelJobExecutor {
    async fn execute(&self, args: &Value) -> Result<Value, String> {
        let jobs = args
            .get("jobs")
            .and_then(Value::as_array)
            .ok_or_else(|| "missing \"jobs\" array argument".to_string())?;
        Ok(json!({ "submitted": jobs.len() }))
    }

    fn validate_args(&self, args: &Value) -> bool {
        args.get("jobs").and_then(Value::as_array).is_some()
    }
}

pub struct RetrieveContextExecutor;

#[async_trait]
impl ToolExecutor for RetrieveContextExecutor {
    async fn execute(&self, args: &Value) -> Result<Value, String> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing \"query\" argument".to_string())?;
        Ok(json!({ "query": query, "passages": [] }))
    }

    fn validate_args(&self, args: &Value) -> bool {
        args.get("query").and_then(Value::as_str).is_some()
    }
}
