//! Storage port trait definition.

use crate::error::StoreResult;
use async_trait::async_trait;

/// Key-value store holding serialized feature records.
///
/// Keys and values are opaque strings. Implementations must return values
/// byte-for-byte as they were written; no trimming or re-encoding.
#[async_trait]
pub trait RolloutStore: Send + Sync {
    /// Get a value from the store.
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(value))` if the key exists, `Ok(None)` if not found,
    /// or an error if the operation fails.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Set a value, replacing any previous one.
    async fn set(&self, key: &str, value: String) -> StoreResult<()>;

    /// Remove a key. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// Write several key-value pairs in order.
    ///
    /// The default implementation issues one `set` per pair, so a failure
    /// part-way through leaves the earlier writes in place. Backends with
    /// multi-key transactions override this to apply all pairs atomically.
    async fn set_many(&self, items: &[(&str, String)]) -> StoreResult<()> {
        for (key, value) in items {
            self.set(key, value.clone()).await?;
        }
        Ok(())
    }

    /// Get store type name for debugging
    fn store_type(&self) -> &'static str;
}
