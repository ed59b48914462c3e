//! Engine-wide configuration, aggregated from per-component defaults.
//! Each sub-config seeds from `Default`; an optional `toml` file
//! overrides selected fields.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::UserTier;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub default_ttl_hours: u64,
    pub min_ttl_hours: u64,
    pub max_ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_hours: 24,
            min_ttl_hours: 1,
            max_ttl_hours: 168,
        }
    }
}

impl CacheConfig {
    pub fn clamp_ttl_hours(&self, requested: u64) -> u64 {
        requested.clamp(self.min_ttl_hours, self.max_ttl_hours)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    pub memory_ttl: Duration,
    pub sync_interval: Duration,
    pub cleanup_interval: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            memory_ttl: Duration::from_millis(3_600_000),
            sync_interval: Duration::from_millis(300_000),
            cleanup_interval: Duration::from_millis(600_000),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub chars_per_token: u32,
    pub safety_margin: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            chars_per_token: 4,
            safety_margin: 0.9,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub retention_days_free: u32,
    pub retention_days_pro: u32,
    pub retention_days_enterprise: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_days_free: 7,
            retention_days_pro: 30,
            retention_days_enterprise: 90,
        }
    }
}

impl AuditConfig {
    pub fn retention_days(&self, tier: UserTier) -> u32 {
        match tier {
            UserTier::Free => self.retention_days_free,
            UserTier::Pro => self.retention_days_pro,
            UserTier::Enterprise => self.retention_days_enterprise,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConstants {
    pub token: f64,
    pub tool: f64,
}

impl Default for CostConstants {
    fn default() -> Self {
        Self {
            token: 0.000_002,
            tool: 0.005,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub default_tier: UserTier,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_tier: UserTier::Free,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilientClientConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for ResilientClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

/// Aggregate configuration passed into the engine facade at construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub rate_limiter: RateLimiterConfig,
    pub context: ContextConfig,
    pub audit: AuditConfig,
    pub cost: CostConstants,
    pub auth: AuthConfig,
    pub resilient_client: ResilientClientConfig,
}

impl EngineConfig {
    /// Loads overrides from a TOML file on top of the defaults. Missing
    /// file or parse error is a hard error, not a fail-open path: config
    /// loading is a startup concern, not a request-time one.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(String),
    #[error("failed to parse config file: {0}")]
    Parse(String),
}
