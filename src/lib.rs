// Rollout - Feature toggles for Rust
//
// Activate features for specific users, code-defined groups, a percentage of
// users or a request parameter, and persist those decisions in memory or Redis.

// Re-export the feature layer
pub use rollout_features::*;

// Re-export the storage layer
pub use rollout_store;
pub use rollout_store::{MemoryStore, RolloutStore, StoreConfig, StoreError, StoreResult, StoreType};

#[cfg(feature = "redis")]
pub use rollout_store::RedisStore;

/// Prelude for common imports.
///
/// ```
/// use rollout::prelude::*;
/// ```
pub mod prelude {
    pub use rollout_features::prelude::*;
    pub use rollout_store::prelude::*;
}
