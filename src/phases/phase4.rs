//! Phase 4: execution. The recursive reason-act driver.

use tokio_util::sync::CancellationToken;

use crate::audit_log::{log_infallible, AuditLogger};
use crate::config::ContextConfig;
use crate::context;
use crate::error::{codes, ErrorCode};
use crate::llm::resilient::{ResilientCallError, ResilientLlmClient};
use crate::tools::{DispatchContext, ToolDispatcher};
use crate::types::{AgentDecision, AuditEvent, DecisionStatus, Job, Phase, PolicyConstraints, ToolResult};

const SYSTEM_PREAMBLE: &str =
    "You are an autonomous agent. Respond with one JSON object conforming to AgentDecision.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Complete,
    Error,
}

pub struct ExecutionResult {
    pub status: ExecutionStatus,
    pub result: Option<String>,
    pub error: Option<ErrorCode>,
    pub decisions: Vec<AgentDecision>,
    pub tool_calls: Vec<ToolResult>,
    pub tokens_used: u32,
    pub depth_reached: u32,
}

struct LoopState {
    decisions: Vec<AgentDecision>,
    tool_calls: Vec<ToolResult>,
    accumulated_context: String,
    tokens_used: u32,
    depth: u32,
}

fn parse_decision(raw: &str) -> Option<AgentDecision> {
    serde_json::from_str(raw).ok()
}

/// Drives the loop bounded by `policy.maxRecursionDepth`. Cancellation
/// is checked at the top of every iteration, so a cancelled run unwinds
/// at the next suspension point rather than mid-call.
pub async fn run(
    job: &Job,
    policy: &PolicyConstraints,
    llm: &ResilientLlmClient<'_>,
    dispatcher: &ToolDispatcher<'_>,
    context_config: &ContextConfig,
    audit: &dyn AuditLogger,
    cancel: &CancellationToken,
) -> ExecutionResult {
    log_infallible(
        audit,
        AuditEvent::new(job.correlation_id, &job.user_id, Phase::Phase4, "LOOP_ENTERED"),
    )
    .await;

    let mut state = LoopState {
        decisions: Vec::new(),
        tool_calls: Vec::new(),
        accumulated_context: job.combined_text(),
        tokens_used: 0,
        depth: job.current_depth,
    };
    let mut consecutive_parse_failures = 0u32;

    let dispatch_ctx = DispatchContext {
        correlation_id: job.correlation_id,
        user_id: job.user_id.clone(),
    };

    let result = loop {
        if cancel.is_cancelled() {
            break terminate(
                &state,
                ExecutionStatus::Error,
                None,
                Some(ErrorCode::new(codes::CANCELLED, "execution was cancelled")),
            );
        }

        if state.depth >= policy.max_recursion_depth {
            break terminate(
                &state,
                ExecutionStatus::Complete,
                Some("depth budget exhausted".to_string()),
                None,
            );
        }

        let prompt = format!("{SYSTEM_PREAMBLE}\n\n{}", state.accumulated_context);
        let estimated = context::estimate_tokens(&prompt, context_config);
        let effective = context::effective_limit(policy.context_window_limit, context_config);
        if estimated > effective {
            break terminate(
                &state,
                ExecutionStatus::Error,
                None,
                Some(ErrorCode::new(
                    codes::CONTEXT_EXCEEDED,
                    format!("prompt of {estimated} tokens exceeds limit {effective}"),
                )),
            );
        }

        let call_result = match llm.call(&prompt, None).await {
            Ok(result) => result,
            Err(ResilientCallError::Terminal { code }) | Err(ResilientCallError::Transient { code }) => {
                break terminate(
                    &state,
                    ExecutionStatus::Error,
                    None,
                    Some(ErrorCode::new(code, "model call failed")),
                );
            }
        };

        let decision = match parse_decision(&call_result.content) {
            Some(decision) => {
                consecutive_parse_failures = 0;
                decision
            }
            None => {
                consecutive_parse_failures += 1;
                if consecutive_parse_failures >= 2 {
                    break terminate(
                        &state,
                        ExecutionStatus::Error,
                        None,
                        Some(ErrorCode::new(codes::PARSE_FAILURE, "model response was not valid JSON")),
                    );
                }
                state
                    .accumulated_context
                    .push_str("\n\n[error: could not parse prior response as JSON]");
                state.depth += 1;
                continue;
            }
        };

        state.tokens_used += call_result.tokens_used;
        state.decisions.push(decision.clone());

        match decision {
            AgentDecision::FinalAnswer { final_answer, .. } => {
                break terminate(&state, ExecutionStatus::Complete, Some(final_answer), None);
            }
            AgentDecision::LlmCall {
                next_prompt,
                reasoning,
                ..
            } => {
                state
                    .accumulated_context
                    .push_str(&format!("\n\n{reasoning}\n\n{next_prompt}"));
                state.depth += 1;
            }
            AgentDecision::ToolCall {
                tool_name,
                tool_arguments,
                ..
            } => {
                if !policy.allowed_tools.is_empty() && !policy.allowed_tools.contains(&tool_name) {
                    break terminate(
                        &state,
                        ExecutionStatus::Error,
                        None,
                        Some(ErrorCode::new(
                            codes::PHASE3_POLICY_VIOLATION,
                            format!("tool {tool_name} is not in the effective allowlist"),
                        )),
                    );
                }
                if state.tool_calls.len() as u32 >= policy.max_tool_calls {
                    break terminate(
                        &state,
                        ExecutionStatus::Error,
                        None,
                        Some(ErrorCode::new(
                            codes::PHASE3_POLICY_VIOLATION,
                            "tool call budget exhausted",
                        )),
                    );
                }

                log_infallible(
                    audit,
                    AuditEvent::new(job.correlation_id, &job.user_id, Phase::Phase4, "TOOL_CALL_DISPATCHED")
                        .with_detail("toolName", tool_name.clone()),
                )
                .await;

                let tool_result = dispatcher
                    .dispatch(&tool_name, tool_arguments, Some(&dispatch_ctx))
                    .await;
                state
                    .accumulated_context
                    .push_str(&format!("\n\n[tool result: {:?}]", tool_result.result));
                state.tool_calls.push(tool_result);
                state.depth += 1;
            }
        }
    };

    log_infallible(
        audit,
        AuditEvent::new(job.correlation_id, &job.user_id, Phase::Phase4, "LOOP_EXITED")
            .with_detail("depthReached", result.depth_reached),
    )
    .await;

    result
}

fn terminate(
    state: &LoopState,
    status: ExecutionStatus,
    result: Option<String>,
    error: Option<ErrorCode>,
) -> ExecutionResult {
    ExecutionResult {
        status,
        result,
        error,
        decisions: state.decisions.clone(),
        tool_calls: state.tool_calls.clone(),
        tokens_used: state.tokens_used,
        depth_reached: state.depth,
    }
}
