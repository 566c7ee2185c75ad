//! Per-operation deadline around any store.

use crate::error::{StoreError, StoreResult};
use crate::traits::RolloutStore;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Wraps a store so every operation fails with [`StoreError::Timeout`]
/// instead of hanging past `timeout`.
///
/// A timed-out write may still have reached the backend.
pub struct TimeoutStore {
    inner: Arc<dyn RolloutStore>,
    timeout: Duration,
}

impl TimeoutStore {
    pub fn new(inner: Arc<dyn RolloutStore>, timeout: Duration) -> Self {
        debug!(
            store = inner.store_type(),
            timeout_ms = timeout.as_millis() as u64,
            "Applying store operation timeout"
        );
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn inner(&self) -> &Arc<dyn RolloutStore> {
        &self.inner
    }

    async fn deadline<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    store = self.inner.store_type(),
                    operation = operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Store operation timed out"
                );
                Err(StoreError::Timeout)
            }
        }
    }
}

#[async_trait]
impl RolloutStore for TimeoutStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.deadline("get", self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: String) -> StoreResult<()> {
        self.deadline("set", self.inner.set(key, value)).await
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.deadline("remove", self.inner.remove(key)).await
    }

    async fn set_many(&self, items: &[(&str, String)]) -> StoreResult<()> {
        self.deadline("set_many", self.inner.set_many(items)).await
    }

    fn store_type(&self) -> &'static str {
        self.inner.store_type()
    }
}
