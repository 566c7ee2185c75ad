//! Storage port for Rollout feature toggles.
//!
//! Feature records are plain strings kept under string keys. This crate
//! defines the minimal contract the feature layer needs and ships the
//! backends that implement it.
//!
//! # Features
//!
//! - `redis` - Enable the Redis hash store
//!
//! # Examples
//!
//! ```
//! use rollout_store::*;
//!
//! # async fn example() -> Result<(), StoreError> {
//! let store = MemoryStore::new();
//! store.set("feature:chat", "100||||{}".to_string()).await?;
//! assert_eq!(store.get("feature:chat").await?, Some("100||||{}".to_string()));
//! # Ok(())
//! # }
//! ```
//!
//! ## From configuration
//!
//! ```no_run
//! use rollout_store::*;
//!
//! # async fn example() -> Result<(), StoreError> {
//! let store = StoreConfig::from_env()?.connect().await?;
//! println!("using {} store", store.store_type());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod memory;
pub mod timeout;
pub mod traits;

#[cfg(feature = "redis")]
pub mod redis_store;

pub use config::{StoreConfig, StoreType};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use timeout::TimeoutStore;
pub use traits::RolloutStore;

#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{StoreConfig, StoreType};
    pub use crate::error::{StoreError, StoreResult};
    pub use crate::memory::MemoryStore;
    pub use crate::timeout::TimeoutStore;
    pub use crate::traits::RolloutStore;

    #[cfg(feature = "redis")]
    pub use crate::redis_store::RedisStore;
}
