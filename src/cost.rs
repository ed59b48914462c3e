//! Deterministic cost math with a per-phase breakdown.

use serde::{Deserialize, Serialize};

use crate::config::CostConstants;
use crate::types::{AgentDecision, ToolResult};

#[derive(Debug, thiserror::Error)]
pub enum CostError {
    #[error("token count must be non-negative, got {0}")]
    NegativeTokens(i64),
    #[error("tool call count must be non-negative, got {0}")]
    NegativeToolCalls(i64),
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

pub fn token_cost(n: i64, constants: &CostConstants) -> Result<f64, CostError> {
    if n < 0 {
        return Err(CostError::NegativeTokens(n));
    }
    Ok(round6(n as f64 * constants.token))
}

pub fn tool_cost(k: i64, constants: &CostConstants) -> Result<f64, CostError> {
    if k < 0 {
        return Err(CostError::NegativeToolCalls(k));
    }
    Ok(round6(k as f64 * constants.tool))
}

pub fn total_cost(n: i64, k: i64, constants: &CostConstants) -> Result<f64, CostError> {
    Ok(round6(token_cost(n, constants)? + tool_cost(k, constants)?))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CostPhase {
    Ingestion,
    Policy,
    Execution,
    Aggregation,
    Serialization,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseCost {
    pub phase: CostPhase,
    pub tokens: u32,
    pub tools: u32,
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub phases: Vec<PhaseCost>,
    pub total_cost: f64,
}

/// Token attribution heuristic: EXECUTION gets `floor(0.9 * tokensUsed)`,
/// AGGREGATION gets the remainder; all tool calls attribute to
/// EXECUTION; INGESTION/POLICY/SERIALIZATION are always zero.
pub fn breakdown(
    tokens_used: u32,
    tool_calls: &[ToolResult],
    _decisions: &[AgentDecision],
    constants: &CostConstants,
) -> Result<CostBreakdown, CostError> {
    let execution_tokens = (0.9 * tokens_used as f64).floor() as u32;
    let aggregation_tokens = tokens_used - execution_tokens;
    let tool_count = tool_calls.len() as i64;

    let execution_cost = round6(
        token_cost(execution_tokens as i64, constants)? + tool_cost(tool_count, constants)?,
    );
    let aggregation_cost = token_cost(aggregation_tokens as i64, constants)?;

    let phases = vec![
        PhaseCost {
            phase: CostPhase::Ingestion,
            tokens: 0,
            tools: 0,
            cost: 0.0,
        },
        PhaseCost {
            phase: CostPhase::Policy,
            tokens: 0,
            tools: 0,
            cost: 0.0,
        },
        PhaseCost {
            phase: CostPhase::Execution,
            tokens: execution_tokens,
            tools: tool_calls.len() as u32,
            cost: execution_cost,
        },
        PhaseCost {
            phase: CostPhase::Aggregation,
            tokens: aggregation_tokens,
            tools: 0,
            cost: aggregation_cost,
        },
        PhaseCost {
            phase: CostPhase::Serialization,
            tokens: 0,
            tools: 0,
            cost: 0.0,
        },
    ];

    let total = total_cost(tokens_used as i64, tool_count, constants)?;

    Ok(CostBreakdown {
        phases,
        total_cost: total,
    })
}

/// Sum-of-phases equals `totalCost` within 1e-6.
pub fn validate_breakdown(breakdown: &CostBreakdown) -> bool {
    let sum: f64 = breakdown.phases.iter().map(|p| p.cost).sum();
    (sum - breakdown.total_cost).abs() < 1e-6
}
