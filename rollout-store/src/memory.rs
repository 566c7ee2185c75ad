//! In-memory store
//!
//! Uses DashMap for thread-safe concurrent access. Suitable for single-instance
//! deployments or testing. For shared state across processes, use the Redis store.

use crate::error::StoreResult;
use crate::traits::RolloutStore;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, trace};

/// In-memory feature store
#[derive(Debug)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        debug!("Creating new in-memory rollout store");
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of stored keys (for monitoring)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RolloutStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self.entries.get(key).map(|entry| entry.value().clone());
        trace!(key = %key, hit = value.is_some(), "Memory store get");
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> StoreResult<()> {
        trace!(key = %key, "Memory store set");
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        trace!(key = %key, "Memory store remove");
        self.entries.remove(key);
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}
