//! Redis store
//!
//! Keeps every key as a field of a single Redis hash so all feature records
//! of one application live under one Redis key. Requires the `redis` feature.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::traits::RolloutStore;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, trace};

/// Default name of the Redis hash holding feature records.
pub const DEFAULT_HASH: &str = "rollout_feature";

/// Redis-backed feature store.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    hash: String,
}

impl RedisStore {
    /// Connect to Redis and store records in the default hash.
    ///
    /// # Arguments
    ///
    /// * `url` - Redis connection URL (e.g., "redis://localhost:6379")
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rollout_store::*;
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), StoreError> {
    ///     let store = RedisStore::new("redis://localhost:6379").await?;
    ///     store.set("feature:chat", "100||||{}".to_string()).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(url: &str) -> StoreResult<Self> {
        Self::with_hash(url, DEFAULT_HASH).await
    }

    /// Connect to Redis and store records in a custom hash.
    pub async fn with_hash(url: &str, hash: impl Into<String>) -> StoreResult<Self> {
        let hash = hash.into();
        debug!(url = %url, hash = %hash, "Connecting to Redis for feature storage");

        let client = Client::open(url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self { connection, hash })
    }

    /// Connect using a store configuration.
    pub async fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        let url = config
            .redis_url
            .as_deref()
            .ok_or_else(|| StoreError::config("redis store requires a redis_url"))?;
        Self::with_hash(url, config.redis_hash.clone()).await
    }

    /// Wrap an existing connection manager.
    pub fn from_connection(connection: ConnectionManager, hash: impl Into<String>) -> Self {
        Self {
            connection,
            hash: hash.into(),
        }
    }

    /// Name of the hash holding the records.
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

#[async_trait]
impl RolloutStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.hget(&self.hash, key).await?;
        trace!(hash = %self.hash, key = %key, hit = value.is_some(), "Redis store get");

        // An empty field is indistinguishable from a missing one.
        Ok(value.filter(|v| !v.is_empty()))
    }

    async fn set(&self, key: &str, value: String) -> StoreResult<()> {
        trace!(hash = %self.hash, key = %key, "Redis store set");
        let mut conn = self.connection.clone();
        let _: () = conn.hset(&self.hash, key, value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        trace!(hash = %self.hash, key = %key, "Redis store remove");
        let mut conn = self.connection.clone();
        let _: () = conn.hdel(&self.hash, key).await?;
        Ok(())
    }

    async fn set_many(&self, items: &[(&str, String)]) -> StoreResult<()> {
        trace!(hash = %self.hash, count = items.len(), "Redis store atomic set_many");

        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in items {
            pipe.hset(&self.hash, *key, value).ignore();
        }

        let mut conn = self.connection.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "redis"
    }
}
