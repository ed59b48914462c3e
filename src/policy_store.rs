//! Per-user tier and policy retrieval/creation.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::FutureExt;
use tracing::warn;

use crate::config::AuthConfig;
use crate::types::{PolicyConstraints, UserTier};

#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Retrieves the user's policy, creating and inserting the default
    /// tier's policy idempotently if no row exists yet.
    async fn get_or_create(&self, user_id: &str) -> PolicyConstraints;
}

pub struct InMemoryPolicyStore {
    auth_config: AuthConfig,
    policies: Arc<DashMap<String, PolicyConstraints>>,
}

impl InMemoryPolicyStore {
    pub fn new(auth_config: AuthConfig) -> Self {
        Self {
            auth_config,
            policies: Arc::new(DashMap::new()),
        }
    }

    pub fn set_tier(&self, user_id: &str, tier: UserTier) {
        self.policies
            .insert(user_id.to_string(), tier.default_constraints());
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn get_or_create(&self, user_id: &str) -> PolicyConstraints {
        if let Some(policy) = self.policies.get(user_id) {
            return policy.clone();
        }
        let default = self.auth_config.default_tier.default_constraints();
        self.policies
            .entry(user_id.to_string())
            .or_insert_with(|| default.clone());
        default
    }
}

/// Retrieves via `store`, falling back to the free-tier default on any
/// internal failure. A retrieval exception never propagates; only a
/// failure in the fallback insertion itself would.
pub async fn fail_open_retrieve(store: &dyn PolicyStore, user_id: &str) -> PolicyConstraints {
    let result = std::panic::AssertUnwindSafe(store.get_or_create(user_id))
        .catch_unwind()
        .await;
    match result {
        Ok(policy) => policy,
        Err(_) => {
            warn!(user_id = %user_id, "policy retrieval panicked, falling back to free tier");
            UserTier::Free.default_constraints()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_default_free_policy_on_first_access() {
        let store = InMemoryPolicyStore::new(AuthConfig::default());
        let policy = store.get_or_create("u1").await;
        assert_eq!(policy.max_recursion_depth, 5);
    }

    #[tokio::test]
    async fn is_idempotent_across_repeated_calls() {
        let store = InMemoryPolicyStore::new(AuthConfig::default());
        let first = store.get_or_create("u1").await;
        let second = store.get_or_create("u1").await;
        assert_eq!(first.max_recursion_depth, second.max_recursion_depth);
    }

    #[tokio::test]
    async fn respects_assigned_tier() {
        let store = InMemoryPolicyStore::new(AuthConfig::default());
        store.set_tier("u1", UserTier::Enterprise);
        let policy = store.get_or_create("u1").await;
        assert_eq!(policy.max_recursion_depth, 20);
    }
}
