//! The model's per-step decision: continue reasoning, call a tool, or finalize.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status attached to every decision, regardless of its variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionStatus {
    Complete,
    Error,
    NextStep,
    ToolDispatched,
    ParallelPending,
}

/// A tagged variant over the three shapes the model can emit.
/// Represented as a proper Rust enum rather than a loose record; schema
/// validation for this shape lives at the Response boundary and at the
/// Phase 4 parse step, not here.
/// The enum-level `rename_all` governs the `actionType` tag value
/// (`LLM_CALL`/`TOOL_CALL`/`FINAL_ANSWER`); each variant overrides it
/// with `camelCase` for its own fields, since a single `rename_all`
/// applies the same case convention to both.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "actionType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentDecision {
    #[serde(rename_all = "camelCase")]
    LlmCall {
        next_prompt: String,
        reasoning: String,
        status: DecisionStatus,
    },
    #[serde(rename_all = "camelCase")]
    ToolCall {
        tool_name: String,
        tool_arguments: Value,
        reasoning: String,
        status: DecisionStatus,
    },
    #[serde(rename_all = "camelCase")]
    FinalAnswer {
        final_answer: String,
        reasoning: String,
        status: DecisionStatus,
    },
}

impl AgentDecision {
    pub fn status(&self) -> DecisionStatus {
        match self {
            AgentDecision::LlmCall { status, .. } => *status,
            AgentDecision::ToolCall { status, .. } => *status,
            AgentDecision::FinalAnswer { status, .. } => *status,
        }
    }

    pub fn reasoning(&self) -> &str {
        match self {
            AgentDecision::LlmCall { reasoning, .. } => reasoning,
            AgentDecision::ToolCall { reasoning, .. } => reasoning,
            AgentDecision::FinalAnswer { reasoning, .. } => reasoning,
        }
    }

    pub fn is_llm_call(&self) -> bool {
        matches!(self, AgentDecision::LlmCall { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let decision = AgentDecision::ToolCall {
            tool_name: "google_search".to_string(),
            tool_arguments: serde_json::json!({"query": "rust async"}),
            reasoning: "need fresh data".to_string(),
            status: DecisionStatus::ToolDispatched,
        };

        let json = serde_json::to_string(&decision).unwrap();
        let back: AgentDecision = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, AgentDecision::ToolCall { .. }));
    }

    #[test]
    fn parses_final_answer_tag() {
        let json = serde_json::json!({
            "actionType": "FINAL_ANSWER",
            "finalAnswer": "42",
            "reasoning": "done",
            "status": "COMPLETE",
        });
        let decision: AgentDecision = serde_json::from_value(json).unwrap();
        assert!(matches!(decision, AgentDecision::FinalAnswer { .. }));
    }
}
