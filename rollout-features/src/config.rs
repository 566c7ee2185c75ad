//! Rollout key layout configuration.

use crate::error::{RolloutError, RolloutResult};
use serde::{Deserialize, Serialize};

/// Default prefix of every feature key.
pub const DEFAULT_KEY_PREFIX: &str = "feature:";

/// Default name under which the feature index is stored.
pub const DEFAULT_INDEX_NAME: &str = "__features__";

/// How feature records are laid out in the store.
///
/// A feature named `chat` lives under `{key_prefix}chat`; the comma-joined
/// list of all feature names lives under `{key_prefix}{index_name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutConfig {
    /// Prefix of every key written to the store
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Name of the feature index record
    #[serde(default = "default_index_name")]
    pub index_name: String,
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_index_name() -> String {
    DEFAULT_INDEX_NAME.to_string()
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            key_prefix: default_key_prefix(),
            index_name: default_index_name(),
        }
    }
}

impl RolloutConfig {
    /// Create the default layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the index record name.
    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = name.into();
        self
    }

    /// Load configuration from environment variables.
    ///
    /// - `ROLLOUT_KEY_PREFIX` - key prefix (default `feature:`)
    /// - `ROLLOUT_INDEX_NAME` - index record name (default `__features__`)
    pub fn from_env() -> RolloutResult<Self> {
        let mut config = Self::default();

        if let Ok(prefix) = std::env::var("ROLLOUT_KEY_PREFIX") {
            config.key_prefix = prefix;
        }

        if let Ok(name) = std::env::var("ROLLOUT_INDEX_NAME") {
            config.index_name = name;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the layout is usable.
    pub fn validate(&self) -> RolloutResult<()> {
        if self.index_name.is_empty() {
            return Err(RolloutError::config("index_name must not be empty"));
        }
        if self.index_name.contains(',') {
            return Err(RolloutError::config("index_name must not contain ','"));
        }
        Ok(())
    }

    /// Store key of a feature record.
    ///
    /// # Examples
    ///
    /// ```
    /// use rollout_features::RolloutConfig;
    ///
    /// let config = RolloutConfig::default();
    /// assert_eq!(config.feature_key("chat"), "feature:chat");
    /// assert_eq!(config.index_key(), "feature:__features__");
    /// ```
    pub fn feature_key(&self, name: &str) -> String {
        format!("{}{}", self.key_prefix, name)
    }

    /// Store key of the feature index.
    pub fn index_key(&self) -> String {
        self.feature_key(&self.index_name)
    }
}
