//! Phase 1: ingestion. Validate, sign, cache-lookup.

use serde_json::Value;

use crate::audit_log::{log_infallible, AuditLogger};
use crate::cache::ResultCache;
use crate::error::{codes, ErrorCode};
use crate::schema;
use crate::signature::{self, short_signature};
use crate::types::{AuditEvent, Phase};

use super::Phase1Outcome;

pub async fn run(raw_payload: &Value, cache: &dyn ResultCache, audit: &dyn AuditLogger) -> Phase1Outcome {
    let job = match schema::validate_job(raw_payload) {
        Ok(job) => job,
        Err(issues) => {
            let error = ErrorCode::new(
                codes::PHASE1_VALIDATION_FAILED,
                "job failed schema validation",
            )
            .with_details(serde_json::to_value(&issues).unwrap_or(Value::Null));
            return Phase1Outcome::Error { error };
        }
    };

    log_infallible(
        audit,
        AuditEvent::new(job.correlation_id, &job.user_id, Phase::Phase1, "VALIDATION_SUCCESS"),
    )
    .await;

    let sig = signature::signature(&job);
    log_infallible(
        audit,
        AuditEvent::new(job.correlation_id, &job.user_id, Phase::Phase1, "SIGNATURE_CALCULATED")
            .with_detail("signature", sig.clone())
            .with_detail("shortSignature", short_signature(&sig)),
    )
    .await;

    let lookup = cache.lookup(&sig, &job.user_id).await;
    if lookup.hit {
        log_infallible(
            audit,
            AuditEvent::new(job.correlation_id, &job.user_id, Phase::Phase1, "CACHE_HIT"),
        )
        .await;
        return Phase1Outcome::CacheHit {
            job,
            signature: sig,
            cached_response: lookup.response.expect("hit implies a response"),
        };
    }

    log_infallible(
        audit,
        AuditEvent::new(job.correlation_id, &job.user_id, Phase::Phase1, "CACHE_MISS"),
    )
    .await;
    Phase1Outcome::Continue { job, signature: sig }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit_log::InMemoryAuditLogger;
    use crate::cache::InMemoryResultCache;
    use crate::config::CacheConfig;
    use serde_json::json;
    use uuid::Uuid;

    fn payload() -> Value {
        json!({
            "userId": "u1",
            "prompt": "hello",
            "correlationId": Uuid::new_v4().to_string(),
            "maxDepth": 5,
            "currentDepth": 0,
            "contextWindowLimit": 8000,
        })
    }

    #[tokio::test]
    async fn invalid_payload_yields_phase1_validation_failed() {
        let cache = InMemoryResultCache::new(CacheConfig::default());
        let audit = InMemoryAuditLogger::new();
        let mut invalid = payload();
        invalid.as_object_mut().unwrap().remove("userId");

        let outcome = run(&invalid, &cache, &audit).await;
        match outcome {
            Phase1Outcome::Error { error } => {
                assert_eq!(error.code, codes::PHASE1_VALIDATION_FAILED);
            }
            _ => panic!("expected error outcome"),
        }
    }

    #[tokio::test]
    async fn miss_then_continue() {
        let cache = InMemoryResultCache::new(CacheConfig::default());
        let audit = InMemoryAuditLogger::new();
        let outcome = run(&payload(), &cache, &audit).await;
        assert!(matches!(outcome, Phase1Outcome::Continue { .. }));
    }
}
