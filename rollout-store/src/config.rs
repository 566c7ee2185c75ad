//! Store configuration types.

use crate::error::{StoreError, StoreResult};
use crate::memory::MemoryStore;
use crate::timeout::TimeoutStore;
use crate::traits::RolloutStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Store backend type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreType {
    /// In-memory store (single process only)
    #[default]
    Memory,
    /// Redis hash store (shared)
    Redis,
}

impl StoreType {
    /// Get backend from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "array" => Some(Self::Memory),
            "redis" => Some(Self::Redis),
            _ => None,
        }
    }
}

impl std::fmt::Display for StoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Redis => write!(f, "redis"),
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend type
    #[serde(default)]
    pub backend: StoreType,

    /// Redis connection URL, required for the Redis backend
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Name of the Redis hash holding feature records
    #[serde(default = "default_redis_hash")]
    pub redis_hash: String,

    /// Deadline for each store operation in milliseconds, none by default
    #[serde(default)]
    pub operation_timeout_ms: Option<u64>,
}

fn default_redis_hash() -> String {
    "rollout_feature".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreType::Memory,
            redis_url: None,
            redis_hash: default_redis_hash(),
            operation_timeout_ms: None,
        }
    }
}

impl StoreConfig {
    /// Configuration for an in-memory store.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Configuration for a Redis store.
    ///
    /// # Examples
    ///
    /// ```
    /// use rollout_store::{StoreConfig, StoreType};
    ///
    /// let config = StoreConfig::redis("redis://localhost:6379").with_hash("flags");
    /// assert_eq!(config.backend, StoreType::Redis);
    /// assert_eq!(config.redis_hash, "flags");
    /// ```
    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            backend: StoreType::Redis,
            redis_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Set the Redis hash name.
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.redis_hash = hash.into();
        self
    }

    /// Fail every store operation that takes longer than `timeout`.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Per-operation deadline, if one is configured.
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }

    /// Load configuration from environment variables.
    ///
    /// - `ROLLOUT_STORE` - `memory` or `redis`
    /// - `ROLLOUT_REDIS_URL` - Redis URL (implies `redis` when `ROLLOUT_STORE` is unset)
    /// - `ROLLOUT_REDIS_HASH` - Redis hash name
    /// - `ROLLOUT_STORE_TIMEOUT_MS` - per-operation deadline in milliseconds
    pub fn from_env() -> StoreResult<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("ROLLOUT_REDIS_URL") {
            config.backend = StoreType::Redis;
            config.redis_url = Some(url);
        }

        if let Ok(backend) = std::env::var("ROLLOUT_STORE") {
            config.backend = StoreType::parse(&backend).ok_or_else(|| {
                StoreError::config(format!("unknown store backend: {}", backend))
            })?;
        }

        if let Ok(hash) = std::env::var("ROLLOUT_REDIS_HASH") {
            config.redis_hash = hash;
        }

        if let Ok(timeout) = std::env::var("ROLLOUT_STORE_TIMEOUT_MS") {
            let millis = timeout.trim().parse::<u64>().map_err(|_| {
                StoreError::config(format!("invalid ROLLOUT_STORE_TIMEOUT_MS: {}", timeout))
            })?;
            config.operation_timeout_ms = Some(millis);
        }

        Ok(config)
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> StoreResult<()> {
        if self.backend == StoreType::Redis && self.redis_url.is_none() {
            return Err(StoreError::config("redis store requires a redis_url"));
        }
        if self.redis_hash.is_empty() {
            return Err(StoreError::config("redis_hash must not be empty"));
        }
        if self.operation_timeout_ms == Some(0) {
            return Err(StoreError::config("operation_timeout_ms must be positive"));
        }
        Ok(())
    }

    /// Build the configured store.
    pub async fn connect(&self) -> StoreResult<Arc<dyn RolloutStore>> {
        self.validate()?;

        let store: Arc<dyn RolloutStore> = match self.backend {
            StoreType::Memory => Arc::new(MemoryStore::new()),
            #[cfg(feature = "redis")]
            StoreType::Redis => Arc::new(crate::redis_store::RedisStore::from_config(self).await?),
            #[cfg(not(feature = "redis"))]
            StoreType::Redis => {
                return Err(StoreError::config(
                    "redis store requested but the `redis` feature is disabled",
                ));
            }
        };

        match self.operation_timeout() {
            Some(timeout) => Ok(Arc::new(TimeoutStore::new(store, timeout))),
            None => Ok(store),
        }
    }
}
