//! Thin HTTP binding over the engine facade. Not part of the core
//! pipeline: a real deployment owns its own route registration and
//! auth, the same way this crate's HTTP feature is a bolt-on rather
//! than a runtime dependency.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response as AxumResponse};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures::FutureExt;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::engine::Engine;

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
}

/// Builds the router exposing the engine over HTTP. Callers mount this
/// under whatever prefix and middleware stack their deployment needs.
pub fn router(engine: Arc<Engine>) -> Router {
    let state = AppState { engine };
    Router::new()
        .route("/agent/execute", post(execute_handler))
        .route("/agent/audit/:correlation_id", get(audit_handler))
        .route("/agent/cache/stats", get(cache_stats_handler))
        .route("/agent/cache/:user_id", delete(cache_invalidate_handler))
        .route("/agent/health", get(health_handler))
        .with_state(state)
}

/// `POST /agent/execute`: status 200 on any structured Response (even
/// errors within the envelope), 500 only for engine crashes.
async fn execute_handler(State(state): State<AppState>, Json(payload): Json<Value>) -> AxumResponse {
    let result = std::panic::AssertUnwindSafe(state.engine.execute(payload))
        .catch_unwind()
        .await;

    match result {
        Ok(response) => {
            let http = crate::serializer::to_http_response(&response);
            let mut builder = axum::http::Response::builder().status(http.status_code);
            for (name, value) in http.headers {
                builder = builder.header(name, value);
            }
            builder
                .body(axum::body::Body::from(http.body))
                .expect("response with well-formed headers always builds")
        }
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "code": "ENGINE_ERROR", "message": "engine panicked" } })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
struct UserIdQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// `GET /agent/audit/:correlationId?userId=...`: `{correlationId, summary, trail[]}`.
async fn audit_handler(
    State(state): State<AppState>,
    Path(correlation_id): Path<Uuid>,
    Query(_query): Query<UserIdQuery>,
) -> AxumResponse {
    let summary = state.engine.audit().summary(correlation_id).await;
    let trail = state.engine.audit().trail(correlation_id).await;
    Json(json!({
        "correlationId": correlation_id,
        "summary": summary,
        "trail": trail,
    }))
    .into_response()
}

/// `GET /agent/cache/stats?userId=...`: cache stats block.
async fn cache_stats_handler(State(state): State<AppState>, Query(query): Query<UserIdQuery>) -> AxumResponse {
    let user_id = query.user_id.unwrap_or_default();
    let stats = state.engine.cache().stats(&user_id).await;
    Json(json!({ "userId": user_id, "entries": stats.entries, "totalHits": stats.total_hits })).into_response()
}

/// `DELETE /agent/cache/:userId`: invalidates all of a user's cache entries.
async fn cache_invalidate_handler(State(state): State<AppState>, Path(user_id): Path<String>) -> AxumResponse {
    state.engine.cache().invalidate_user(&user_id).await;
    StatusCode::NO_CONTENT.into_response()
}

/// `GET /agent/health`: `{status, components{cache, database}, timestamp}`.
/// `database` is reported healthy unconditionally since the relational
/// store is supplied by the embedding application, not this crate.
async fn health_handler(State(state): State<AppState>) -> AxumResponse {
    let cache_health = state.engine.cache().health_check().await;
    let status = if cache_health.healthy { "ok" } else { "degraded" };
    Json(json!({
        "status": status,
        "components": {
            "cache": { "healthy": cache_health.healthy, "entries": cache_health.entries },
            "database": { "healthy": true },
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::llm::client::MockLlmClient;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    fn app() -> Router {
        let decision = json!({
            "actionType": "FINAL_ANSWER",
            "finalAnswer": "42",
            "reasoning": "done",
            "status": "COMPLETE",
        })
        .to_string();
        let engine = Arc::new(Engine::new(EngineConfig::default(), Arc::new(MockLlmClient::new(decision))));
        router(engine)
    }

    #[tokio::test]
    async fn execute_returns_200_for_a_structured_response() {
        let payload = json!({
            "userId": "u1",
            "prompt": "hello",
            "correlationId": Uuid::new_v4().to_string(),
        });
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/agent/execute")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app()
            .oneshot(Request::builder().uri("/agent/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cache_invalidate_returns_no_content() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/agent/cache/u1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
