//! Benchmarks the cost-attribution math and the intent signature, the
//! two deterministic hot paths every request pays regardless
//! of model latency.

use agent_exec_engine::config::CostConstants;
use agent_exec_engine::cost::{breakdown, total_cost};
use agent_exec_engine::signature::signature;
use agent_exec_engine::types::{Job, ToolResult};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use serde_json::Value;
use uuid::Uuid;

fn sample_tool_calls(n: usize) -> Vec<ToolResult> {
    (0..n)
        .map(|i| ToolResult {
            tool_name: "google_search".to_string(),
            result: Value::Null,
            execution_time: Some(100.0 + i as f64),
            cost: None,
            error: None,
        })
        .collect()
}

fn sample_job() -> Job {
    Job {
        user_id: "bench-user".to_string(),
        prompt: "Summarize the quarterly report and flag anomalies.".to_string(),
        correlation_id: Uuid::new_v4(),
        max_depth: 5,
        current_depth: 0,
        context_window_limit: 8000,
        previous_context: Some("prior reasoning accumulated over several turns".to_string()),
        tool_results: None,
        metadata: None,
    }
}

fn bench_total_cost(c: &mut Criterion) {
    let constants = CostConstants::default();
    c.bench_function("total_cost", |b| {
        b.iter(|| total_cost(5000, 3, &constants).unwrap());
    });
}

fn bench_breakdown(c: &mut Criterion) {
    let constants = CostConstants::default();
    let tool_calls = sample_tool_calls(3);
    c.bench_function("cost_breakdown", |b| {
        b.iter_batched(
            || tool_calls.clone(),
            |calls| breakdown(5000, &calls, &[], &constants).unwrap(),
            BatchSize::SmallInput,
        );
    });
}

fn bench_signature(c: &mut Criterion) {
    let job = sample_job();
    c.bench_function("intent_signature", |b| {
        b.iter(|| signature(&job));
    });
}

criterion_group!(benches, bench_total_cost, bench_breakdown, bench_signature);
criterion_main!(benches);
