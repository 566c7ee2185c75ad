//! Feature Toggles for Rollout
//!
//! Decide per request whether a named feature is on, and change those
//! decisions at runtime without redeploying.
//!
//! # Features
//!
//! - 🎯 **User Targeting** - Activate a feature for specific users
//! - 👥 **Groups** - Activate for code-defined groups of users
//! - 🎲 **Percentage Rollout** - Stable CRC-32 bucketing or a ranked candidate pool
//! - 🔗 **Request Params** - Force a feature on with `?FF_feature=1`
//! - 💾 **Pluggable Storage** - In-memory or Redis via `rollout-store`
//!
//! # Quick Start
//!
//! ```
//! use rollout_features::*;
//! use rollout_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let rollout = Rollout::new(Arc::new(MemoryStore::new()));
//!
//! rollout.activate_percentage("new-ui", 25).await.unwrap();
//! rollout.activate_user("new-ui", "user-123").await.unwrap();
//!
//! let context = EvaluationContext::for_user(&"user-123");
//! assert!(rollout.is_active("new-ui", &context).await.unwrap());
//! # });
//! ```
//!
//! # Groups
//!
//! ```
//! use rollout_features::*;
//! use rollout_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let rollout = Rollout::new(Arc::new(MemoryStore::new()));
//! rollout.define_group("staff", |user: Option<&dyn RolloutUser>| {
//!     user.is_some_and(|u| u.rollout_identifier().ends_with("@company.com"))
//! });
//! rollout.activate_group("beta-search", "staff").await.unwrap();
//!
//! let staff = "ana@company.com";
//! assert!(rollout.is_active("beta-search", &EvaluationContext::for_user(&staff)).await.unwrap());
//! # });
//! ```
//!
//! # Request Params
//!
//! ```
//! use rollout_features::*;
//! use rollout_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let rollout = Rollout::new(Arc::new(MemoryStore::new()));
//! rollout.activate_request_param("chat", "FF_chat=1").await.unwrap();
//!
//! let request = RequestParams::new().with_param("FF_chat", "1");
//! let context = EvaluationContext::new().with_request(&request);
//! assert!(rollout.is_active("chat", &context).await.unwrap());
//! # });
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod feature;
pub mod group;
pub mod identity;
pub mod rollout;
pub mod settings;

pub use config::RolloutConfig;
pub use context::{loose_eq, Candidate, CandidatePool, EvaluationContext, RequestParams};
pub use error::{RolloutError, RolloutResult, SettingsError};
pub use feature::{hash_bucket, Feature, FeatureSnapshot};
pub use group::{GroupPredicate, GroupRegistry, GroupResolver, ALL_GROUP};
pub use identity::RolloutUser;
pub use rollout::{BulkChange, ChangeReport, Rollout};
pub use settings::{check_list_entry, check_request_param, RecordShape, Settings};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::RolloutConfig;
    pub use crate::context::{CandidatePool, EvaluationContext, RequestParams};
    pub use crate::error::{RolloutError, RolloutResult};
    pub use crate::feature::Feature;
    pub use crate::group::GroupResolver;
    pub use crate::identity::RolloutUser;
    pub use crate::rollout::{BulkChange, ChangeReport, Rollout};
}
