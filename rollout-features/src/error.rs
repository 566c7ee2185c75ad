//! Error types for feature operations

use rollout_store::StoreError;
use thiserror::Error;

/// Result type for feature operations
pub type RolloutResult<T> = Result<T, RolloutError>;

/// Feature toggle errors
#[derive(Debug, Error)]
pub enum RolloutError {
    /// Storage backend failure, passed through untouched
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A stored settings record could not be parsed strictly
    #[error("Invalid settings for feature '{name}': {source}")]
    InvalidSettings {
        name: String,
        #[source]
        source: SettingsError,
    },

    /// A user, group or request param cannot be written into the record
    #[error("Invalid value for feature '{name}': {source}")]
    InvalidValue {
        name: String,
        #[source]
        source: SettingsError,
    },

    /// Feature name cannot be stored under the configured keys
    #[error("Invalid feature name '{name}': {reason}")]
    InvalidFeatureName { name: String, reason: String },

    /// Configuration error
    #[error("Rollout configuration error: {0}")]
    Config(String),
}

impl RolloutError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new invalid feature name error
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFeatureName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error came from the storage backend
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}

/// Problems found in a serialized settings record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettingsError {
    /// Fewer than the three mandatory fields
    #[error("expected at least 3 fields, found {0}")]
    TooFewFields(usize),

    /// Percentage field is not an integer
    #[error("percentage is not an integer: {0:?}")]
    InvalidPercentage(String),

    /// Percentage field is an integer outside 0..=100
    #[error("percentage out of range: {0}")]
    PercentageOutOfRange(i64),

    /// Data field is not a JSON object
    #[error("data is not a JSON object: {0}")]
    InvalidData(String),

    /// Value would not survive encoding into a record
    #[error("{field} {value:?} {reason}")]
    Unencodable {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}
