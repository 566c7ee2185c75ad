//! Feature Core
//!
//! Defines a feature's activation rules and the evaluation logic over them.

use crate::context::{CandidatePool, EvaluationContext, RequestParams};
use crate::error::{RolloutError, RolloutResult};
use crate::group::GroupResolver;
use crate::identity::RolloutUser;
use crate::settings::{check_list_entry, check_request_param, Settings};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

/// A named feature and its activation rules.
///
/// A feature is active when any of its gates passes:
///
/// 1. the request-param gate,
/// 2. the percentage gate,
/// 3. the user allow-list,
/// 4. any of its groups.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    name: String,
    settings: Settings,
}

impl Feature {
    /// Create a feature with every gate off.
    ///
    /// # Examples
    ///
    /// ```
    /// use rollout_features::Feature;
    ///
    /// let feature = Feature::new("chat");
    /// assert_eq!(feature.percentage(), 0);
    /// assert_eq!(feature.serialize(), "0||||{}");
    /// ```
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: Settings::default(),
        }
    }

    /// Build a feature from an optional stored record.
    ///
    /// Never fails: malformed fields fall back to their "off" values so a
    /// corrupt record can't break evaluation.
    pub fn parse(name: impl Into<String>, settings: Option<&str>) -> Self {
        let name = name.into();
        match settings {
            Some(record) => {
                let settings = Settings::decode_lenient(&name, record);
                Self { name, settings }
            }
            None => Self::new(name),
        }
    }

    /// Build a feature from a stored record, rejecting malformed records.
    pub fn try_parse(name: impl Into<String>, settings: &str) -> RolloutResult<Self> {
        let name = name.into();
        match Settings::decode_strict(settings) {
            Ok(settings) => Ok(Self { name, settings }),
            Err(source) => Err(RolloutError::InvalidSettings { name, source }),
        }
    }

    /// Build a feature from already decoded settings.
    pub fn from_settings(name: impl Into<String>, settings: Settings) -> Self {
        let percentage = settings.percentage;
        let mut feature = Self {
            name: name.into(),
            settings,
        };
        feature.set_percentage(percentage);
        feature
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Encode the rules as a settings record.
    pub fn serialize(&self) -> String {
        self.settings.encode()
    }

    pub fn percentage(&self) -> u8 {
        self.settings.percentage
    }

    /// Set the percentage of users the feature is active for.
    ///
    /// Values above 100 are clamped to 100.
    pub fn set_percentage(&mut self, percentage: u8) {
        if percentage > 100 {
            warn!(feature = %self.name, percentage = percentage, "Clamping percentage to 100");
        }
        self.settings.percentage = percentage.min(100);
    }

    pub fn users(&self) -> &[String] {
        &self.settings.users
    }

    /// Allow a user. Returns `false` if it was already allowed, or if its
    /// identifier is empty or contains `,` or `|` and so cannot be stored.
    pub fn add_user<U: RolloutUser + ?Sized>(&mut self, user: &U) -> bool {
        let identifier = user.rollout_identifier();
        if let Err(err) = check_list_entry("user", &identifier) {
            warn!(feature = %self.name, error = %err, "Ignoring user");
            return false;
        }
        if self.settings.users.iter().any(|u| *u == identifier) {
            return false;
        }
        self.settings.users.push(identifier.into_owned());
        true
    }

    /// Disallow a user. Returns `false` if it was not allowed.
    pub fn remove_user<U: RolloutUser + ?Sized>(&mut self, user: &U) -> bool {
        let identifier = user.rollout_identifier();
        let before = self.settings.users.len();
        self.settings.users.retain(|u| *u != identifier);
        self.settings.users.len() != before
    }

    pub fn groups(&self) -> &[String] {
        &self.settings.groups
    }

    /// Activate a group. Returns `false` if it was already active, or if the
    /// name is empty or contains `,` or `|`.
    pub fn add_group(&mut self, group: &str) -> bool {
        if let Err(err) = check_list_entry("group", group) {
            warn!(feature = %self.name, error = %err, "Ignoring group");
            return false;
        }
        if self.settings.groups.iter().any(|g| g == group) {
            return false;
        }
        self.settings.groups.push(group.to_string());
        true
    }

    /// Deactivate a group. Returns `false` if it was not active.
    pub fn remove_group(&mut self, group: &str) -> bool {
        let before = self.settings.groups.len();
        self.settings.groups.retain(|g| g != group);
        self.settings.groups.len() != before
    }

    pub fn request_param(&self) -> &str {
        &self.settings.request_param
    }

    /// Set the request-param gate, `key` or `key=value`. Empty disables it.
    ///
    /// A gate containing `|` is refused and `false` returned; the previous
    /// gate stays in place.
    pub fn set_request_param(&mut self, request_param: impl Into<String>) -> bool {
        let request_param = request_param.into();
        if let Err(err) = check_request_param(&request_param) {
            warn!(feature = %self.name, error = %err, "Ignoring request param");
            return false;
        }
        self.settings.request_param = request_param;
        true
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.settings.data
    }

    /// Replace the metadata map.
    pub fn set_data(&mut self, data: Map<String, Value>) {
        self.settings.data = data;
    }

    /// Merge entries into the metadata map, overwriting existing keys.
    pub fn merge_data(&mut self, partial: Map<String, Value>) {
        self.settings.data.extend(partial);
    }

    /// Turn every gate off and drop all metadata.
    pub fn clear(&mut self) {
        self.settings = Settings::default();
    }

    /// Evaluate the feature.
    ///
    /// `groups` resolves the named groups this feature references; it is the
    /// only thing consulted outside the feature itself.
    ///
    /// # Examples
    ///
    /// ```
    /// use rollout_features::{EvaluationContext, Feature, GroupRegistry};
    ///
    /// let groups = GroupRegistry::new();
    /// let mut feature = Feature::new("chat");
    /// feature.add_user(&42);
    ///
    /// assert!(feature.is_active(&groups, &EvaluationContext::for_user(&42)));
    /// assert!(!feature.is_active(&groups, &EvaluationContext::for_user(&24)));
    /// assert!(!feature.is_active(&groups, &EvaluationContext::new()));
    /// ```
    pub fn is_active(&self, groups: &dyn GroupResolver, context: &EvaluationContext<'_>) -> bool {
        if self.is_request_param_active(context.request()) {
            return true;
        }

        match context.user() {
            None => self.settings.percentage == 100 || self.is_in_active_group(groups, None),
            Some(user) => {
                let identifier = user.rollout_identifier();
                self.is_user_in_percentage(&identifier, context.candidates())
                    || self.is_user_in_active_users(&identifier)
                    || self.is_in_active_group(groups, Some(user))
            }
        }
    }

    /// Read-only view of the rules for external consumers.
    pub fn snapshot(&self) -> FeatureSnapshot {
        FeatureSnapshot {
            percentage: self.settings.percentage,
            groups: self.settings.groups.clone(),
            users: self.settings.users.clone(),
            request_param: self.settings.request_param.clone(),
            data: self.settings.data.clone(),
        }
    }

    fn is_request_param_active(&self, request: Option<&RequestParams>) -> bool {
        if self.settings.request_param.is_empty() {
            return false;
        }
        request.is_some_and(|params| params.matches(&self.settings.request_param))
    }

    fn is_user_in_percentage(&self, identifier: &str, candidates: Option<&CandidatePool>) -> bool {
        match candidates {
            Some(pool) => pool.contains_within(identifier, self.settings.percentage),
            None => hash_bucket(identifier) < self.settings.percentage,
        }
    }

    fn is_user_in_active_users(&self, identifier: &str) -> bool {
        self.settings.users.iter().any(|u| u == identifier)
    }

    fn is_in_active_group(&self, groups: &dyn GroupResolver, user: Option<&dyn RolloutUser>) -> bool {
        self.settings
            .groups
            .iter()
            .any(|group| groups.is_active_in_group(group, user))
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

/// Bucket in `0..100` for the percentage gate.
///
/// CRC-32 (IEEE) of the identifier modulo 100. The bucket of an identifier
/// must never change, or users would flip in and out of rollouts.
pub fn hash_bucket(identifier: &str) -> u8 {
    (crc32fast::hash(identifier.as_bytes()) % 100) as u8
}

/// Serializable snapshot of a feature's rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSnapshot {
    pub percentage: u8,
    pub groups: Vec<String>,
    pub users: Vec<String>,
    pub request_param: String,
    pub data: Map<String, Value>,
}
