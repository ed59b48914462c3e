//! Tenant-scoped result cache, keyed by intent signature.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::warn;

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::types::Response;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub signature: String,
    pub user_id: String,
    pub response: Response,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
    pub hit_count: u64,
    pub last_accessed_at: SystemTime,
}

#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub hit: bool,
    pub response: Option<Response>,
    pub age: Option<Duration>,
}

impl CacheLookup {
    fn miss() -> Self {
        Self {
            hit: false,
            response: None,
            age: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub total_hits: u64,
}

#[derive(Debug, Clone)]
pub struct CacheHealth {
    pub healthy: bool,
    pub entries: usize,
}

/// The result-cache contract. A trait so tests can swap in a double
/// that fails deterministically.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn lookup(&self, signature: &str, user_id: &str) -> CacheLookup;
    async fn write(
        &self,
        signature: &str,
        user_id: &str,
        response: Response,
        ttl_hours: u64,
    ) -> Result<(), CacheError>;
    async fn invalidate(&self, signature: &str, user_id: &str);
    async fn invalidate_user(&self, user_id: &str);
    async fn clean_expired(&self) -> usize;
    async fn stats(&self, user_id: &str) -> CacheStats;
    async fn health_check(&self) -> CacheHealth;
}

/// In-memory implementation backed by a concurrent map, keyed by
/// signature. Tenant isolation is enforced by comparing `user_id` on
/// every lookup rather than by partitioning the map.
pub struct InMemoryResultCache {
    config: CacheConfig,
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl InMemoryResultCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: Arc::new(DashMap::new()),
        }
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn lookup(&self, signature: &str, user_id: &str) -> CacheLookup {
        let now = SystemTime::now();
        let mut entry = match self.entries.get_mut(signature) {
            Some(entry) => entry,
            None => return CacheLookup::miss(),
        };

        if entry.user_id != user_id || entry.expires_at <= now {
            return CacheLookup::miss();
        }

        entry.hit_count += 1;
        entry.last_accessed_at = now;
        let age = now
            .duration_since(entry.created_at)
            .unwrap_or(Duration::ZERO);

        CacheLookup {
            hit: true,
            response: Some(entry.response.clone()),
            age: Some(age),
        }
    }

    async fn write(
        &self,
        signature: &str,
        user_id: &str,
        response: Response,
        ttl_hours: u64,
    ) -> Result<(), CacheError> {
        let clamped = self.config.clamp_ttl_hours(ttl_hours);
        let now = SystemTime::now();
        let entry = CacheEntry {
            signature: signature.to_string(),
            user_id: user_id.to_string(),
            response,
            created_at: now,
            expires_at: now + Duration::from_secs(clamped * 3600),
            hit_count: 0,
            last_accessed_at: now,
        };
        self.entries.insert(signature.to_string(), entry);
        Ok(())
    }

    async fn invalidate(&self, signature: &str, user_id: &str) {
        if let Some(entry) = self.entries.get(signature) {
            if entry.user_id != user_id {
                return;
            }
        } else {
            return;
        }
        self.entries.remove(signature);
    }

    async fn invalidate_user(&self, user_id: &str) {
        self.entries.retain(|_, entry| entry.user_id != user_id);
    }

    async fn clean_expired(&self) -> usize {
        let now = SystemTime::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before - self.entries.len()
    }

    async fn stats(&self, user_id: &str) -> CacheStats {
        let mut stats = CacheStats::default();
        for entry in self.entries.iter() {
            if entry.user_id == user_id {
                stats.entries += 1;
                stats.total_hits += entry.hit_count;
            }
        }
        stats
    }

    async fn health_check(&self) -> CacheHealth {
        CacheHealth {
            healthy: true,
            entries: self.entries.len(),
        }
    }
}

/// Looks up a cache entry, collapsing any backend error into a miss.
/// `InMemoryResultCache` never actually errors on lookup, but this
/// wrapper is the seam a fallible backend (e.g. a relational store)
/// would plug into.
pub async fn fail_open_lookup(cache: &dyn ResultCache, signature: &str, user_id: &str) -> CacheLookup {
    let lookup = cache.lookup(signature, user_id).await;
    if !lookup.hit {
        warn!(signature = %signature, "cache miss or backend unavailable");
    }
    lookup
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PhaseResult, ResponseError};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_response() -> Response {
        Response {
            correlation_id: Uuid::new_v4(),
            job_signature: "sig".repeat(16),
            status: "COMPLETE".to_string(),
            result: Some("42".to_string()),
            error: None::<ResponseError>,
            phase_result: PhaseResult::Continue,
            from_cache: false,
            execution_time: 1.0,
            tokens_used: Some(10),
            total_cost: Some(0.01),
            decisions: Vec::new(),
            tool_calls: Vec::new(),
            started_at: Utc::now(),
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn write_then_lookup_is_a_hit() {
        let cache = InMemoryResultCache::new(CacheConfig::default());
        cache
            .write("sig1", "u1", sample_response(), 24)
            .await
            .unwrap();
        let lookup = cache.lookup("sig1", "u1").await;
        assert!(lookup.hit);
    }

    #[tokio::test]
    async fn lookup_for_different_user_never_hits() {
        let cache = InMemoryResultCache::new(CacheConfig::default());
        cache
            .write("sig1", "u1", sample_response(), 24)
            .await
            .unwrap();
        let lookup = cache.lookup("sig1", "u2").await;
        assert!(!lookup.hit);
    }

    #[tokio::test]
    async fn ttl_clamps_into_bounds() {
        let config = CacheConfig::default();
        assert_eq!(config.clamp_ttl_hours(0), 1);
        assert_eq!(config.clamp_ttl_hours(10_000), 168);
    }

    #[tokio::test]
    async fn hit_count_increments_on_repeated_lookup() {
        let cache = InMemoryResultCache::new(CacheConfig::default());
        cache
            .write("sig1", "u1", sample_response(), 24)
            .await
            .unwrap();
        cache.lookup("sig1", "u1").await;
        cache.lookup("sig1", "u1").await;
        let stats = cache.stats("u1").await;
        assert_eq!(stats.total_hits, 2);
    }
}
