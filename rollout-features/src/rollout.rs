//! Feature orchestration over a storage backend.

use crate::config::RolloutConfig;
use crate::context::EvaluationContext;
use crate::error::{RolloutError, RolloutResult, SettingsError};
use crate::feature::Feature;
use crate::group::{GroupPredicate, GroupRegistry, GroupResolver};
use crate::identity::RolloutUser;
use crate::settings::{check_list_entry, check_request_param, LIST_SEPARATOR};
use rollout_store::{RolloutStore, StoreConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Loads, mutates and persists features, and evaluates them.
///
/// Every mutator reads the current record, applies one change and writes it
/// back. The read-modify-write is not transactional: two processes changing
/// the same feature concurrently can lose one of the updates.
///
/// # Examples
///
/// ```
/// use rollout_features::*;
/// use rollout_store::MemoryStore;
/// use std::sync::Arc;
///
/// # async fn example() -> RolloutResult<()> {
/// let rollout = Rollout::new(Arc::new(MemoryStore::new()));
///
/// rollout.activate_user("chat", &42).await?;
/// assert!(rollout.is_active("chat", &EvaluationContext::for_user(&42)).await?);
/// assert!(!rollout.is_active("chat", &EvaluationContext::for_user(&24)).await?);
/// # Ok(())
/// # }
/// ```
pub struct Rollout {
    store: Arc<dyn RolloutStore>,
    config: RolloutConfig,
    groups: GroupRegistry,
}

impl Rollout {
    /// Create a rollout with the default key layout.
    pub fn new(store: Arc<dyn RolloutStore>) -> Self {
        Self::with_config(store, RolloutConfig::default())
    }

    /// Create a rollout with a custom key layout.
    pub fn with_config(store: Arc<dyn RolloutStore>, config: RolloutConfig) -> Self {
        debug!(store = store.store_type(), prefix = %config.key_prefix, "Creating rollout");
        Self {
            store,
            config,
            groups: GroupRegistry::new(),
        }
    }

    /// Connect the configured store and build a rollout over it.
    pub async fn from_config(store: &StoreConfig, config: RolloutConfig) -> RolloutResult<Self> {
        config.validate()?;
        let store = store.connect().await?;
        Ok(Self::with_config(store, config))
    }

    pub fn store(&self) -> &Arc<dyn RolloutStore> {
        &self.store
    }

    pub fn config(&self) -> &RolloutConfig {
        &self.config
    }

    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    /// Load a feature, creating and persisting a cleared one if it is
    /// missing or stored empty.
    pub async fn get(&self, name: &str) -> RolloutResult<Feature> {
        self.check_name(name)?;

        let key = self.config.feature_key(name);
        match self.store.get(&key).await? {
            Some(record) if !record.is_empty() => Ok(Feature::parse(name, Some(&record))),
            _ => {
                debug!(feature = %name, "Creating missing feature");
                let feature = Feature::new(name);
                self.save(&feature).await?;
                Ok(feature)
            }
        }
    }

    /// Activate a feature for everyone.
    pub async fn activate(&self, name: &str) -> RolloutResult<()> {
        self.update(name, |feature| feature.set_percentage(100)).await
    }

    /// Turn every gate of a feature off.
    pub async fn deactivate(&self, name: &str) -> RolloutResult<()> {
        self.update(name, Feature::clear).await
    }

    pub async fn activate_percentage(&self, name: &str, percentage: u8) -> RolloutResult<()> {
        self.update(name, |feature| feature.set_percentage(percentage))
            .await
    }

    pub async fn deactivate_percentage(&self, name: &str) -> RolloutResult<()> {
        self.update(name, |feature| feature.set_percentage(0)).await
    }

    /// Activate a group. Names that are empty or contain `,` or `|` are
    /// rejected with [`RolloutError::InvalidValue`] before anything is read.
    pub async fn activate_group(&self, name: &str, group: &str) -> RolloutResult<()> {
        check_value(name, check_list_entry("group", group))?;
        self.update(name, |feature| {
            feature.add_group(group);
        })
        .await
    }

    pub async fn deactivate_group(&self, name: &str, group: &str) -> RolloutResult<()> {
        self.update(name, |feature| {
            feature.remove_group(group);
        })
        .await
    }

    /// Allow a user. Identifiers that are empty or contain `,` or `|` are
    /// rejected with [`RolloutError::InvalidValue`] before anything is read.
    pub async fn activate_user<U>(&self, name: &str, user: &U) -> RolloutResult<()>
    where
        U: RolloutUser + ?Sized,
    {
        check_value(name, check_list_entry("user", &user.rollout_identifier()))?;
        self.update(name, |feature| {
            feature.add_user(user);
        })
        .await
    }

    pub async fn deactivate_user<U>(&self, name: &str, user: &U) -> RolloutResult<()>
    where
        U: RolloutUser + ?Sized,
    {
        self.update(name, |feature| {
            feature.remove_user(user);
        })
        .await
    }

    /// Gate a feature on a request parameter, `key` or `key=value`. A gate
    /// containing `|` is rejected with [`RolloutError::InvalidValue`].
    pub async fn activate_request_param(&self, name: &str, param: &str) -> RolloutResult<()> {
        check_value(name, check_request_param(param))?;
        self.update(name, |feature| {
            feature.set_request_param(param);
        })
        .await
    }

    pub async fn deactivate_request_param(&self, name: &str) -> RolloutResult<()> {
        self.update(name, |feature| {
            feature.set_request_param("");
        })
        .await
    }

    /// Merge metadata into a feature. Existing keys not in `partial` are kept.
    pub async fn set_feature_data(
        &self,
        name: &str,
        partial: Map<String, Value>,
    ) -> RolloutResult<()> {
        self.update(name, |feature| feature.merge_data(partial)).await
    }

    pub async fn clear_feature_data(&self, name: &str) -> RolloutResult<()> {
        self.update(name, |feature| feature.set_data(Map::new()))
            .await
    }

    /// Register or replace a group.
    ///
    /// ```
    /// use rollout_features::*;
    /// use rollout_store::MemoryStore;
    /// use std::sync::Arc;
    ///
    /// let rollout = Rollout::new(Arc::new(MemoryStore::new()));
    /// rollout.define_group("fivesonly", |user: Option<&dyn RolloutUser>| {
    ///     user.is_some_and(|u| u.rollout_identifier() == "5")
    /// });
    ///
    /// assert!(rollout.is_active_in_group("fivesonly", Some(&5)));
    /// assert!(!rollout.is_active_in_group("fivesonly", Some(&1)));
    /// ```
    pub fn define_group<F>(&self, name: impl Into<String>, predicate: F)
    where
        F: Fn(Option<&dyn RolloutUser>) -> bool + Send + Sync + 'static,
    {
        self.groups.define(name, predicate);
    }

    /// Register or replace a group with a shared predicate value.
    pub fn define_group_predicate(
        &self,
        name: impl Into<String>,
        predicate: Arc<dyn GroupPredicate>,
    ) {
        self.groups.define_predicate(name, predicate);
    }

    /// Whether `user` belongs to `group`. Undefined groups are never active.
    pub fn is_active_in_group(&self, group: &str, user: Option<&dyn RolloutUser>) -> bool {
        self.groups.is_active_in_group(group, user)
    }

    /// Evaluate a feature.
    ///
    /// A name that cannot be stored is never active. Store failures are
    /// returned as errors.
    pub async fn is_active(
        &self,
        name: &str,
        context: &EvaluationContext<'_>,
    ) -> RolloutResult<bool> {
        if let Err(err) = self.check_name(name) {
            warn!(feature = %name, error = %err, "Evaluating unusable feature name as inactive");
            return Ok(false);
        }

        let feature = self.get(name).await?;
        let active = feature.is_active(self, context);

        trace!(feature = %name, active = active, user = context.user().is_some(), "Evaluated feature");
        Ok(active)
    }

    /// Apply a bulk change to `feature` and persist it once.
    ///
    /// Only users and groups that actually changed are reported. The
    /// percentage, when given, is set whether activating or deactivating.
    /// An activation naming a user or group that cannot be stored is rejected
    /// as a whole and leaves `feature` untouched.
    pub async fn configure(
        &self,
        feature: &mut Feature,
        change: &BulkChange,
    ) -> RolloutResult<ChangeReport> {
        if change.activate {
            for user in &change.users {
                check_value(feature.name(), check_list_entry("user", user))?;
            }
            for group in &change.groups {
                check_value(feature.name(), check_list_entry("group", group))?;
            }
        }

        let mut report = ChangeReport::default();

        if let Some(percentage) = change.percentage {
            feature.set_percentage(percentage);
        }

        for user in &change.users {
            let changed = if change.activate {
                feature.add_user(user)
            } else {
                feature.remove_user(user)
            };
            if changed {
                report.users.push(user.clone());
            }
        }

        for group in &change.groups {
            let changed = if change.activate {
                feature.add_group(group)
            } else {
                feature.remove_group(group)
            };
            if changed {
                report.groups.push(group.clone());
            }
        }

        self.save(feature).await?;

        debug!(
            feature = %feature.name(),
            activate = change.activate,
            users = report.users.len(),
            groups = report.groups.len(),
            "Configured feature"
        );
        Ok(report)
    }

    /// Delete a feature's record and drop it from the index.
    pub async fn remove(&self, name: &str) -> RolloutResult<()> {
        self.check_name(name)?;

        self.store.remove(&self.config.feature_key(name)).await?;

        let mut features = self.features().await?;
        let before = features.len();
        features.retain(|feature| feature != name);

        if features.len() != before {
            let index_key = self.config.index_key();
            if features.is_empty() {
                self.store.remove(&index_key).await?;
            } else {
                self.store.set(&index_key, join_index(&features)).await?;
            }
        }

        debug!(feature = %name, "Removed feature");
        Ok(())
    }

    /// Names of all known features, in creation order.
    pub async fn features(&self) -> RolloutResult<Vec<String>> {
        let index = self.store.get(&self.config.index_key()).await?;

        let mut names: Vec<String> = Vec::new();
        for name in index
            .as_deref()
            .unwrap_or("")
            .split(LIST_SEPARATOR)
            .filter(|name| !name.is_empty())
        {
            if !names.iter().any(|existing| existing == name) {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// Persist a feature and make sure it is listed in the index.
    ///
    /// When the name is new, the record and the index are written in one
    /// batch, which is atomic on stores that support it.
    pub async fn save(&self, feature: &Feature) -> RolloutResult<()> {
        let name = feature.name();
        self.check_name(name)?;

        let key = self.config.feature_key(name);
        let record = feature.serialize();
        let mut features = self.features().await?;

        if features.iter().any(|existing| existing == name) {
            self.store.set(&key, record).await?;
        } else {
            features.push(name.to_string());
            let index_key = self.config.index_key();
            self.store
                .set_many(&[(key.as_str(), record), (index_key.as_str(), join_index(&features))])
                .await?;
        }

        trace!(feature = %name, "Saved feature");
        Ok(())
    }

    async fn update<F>(&self, name: &str, mutate: F) -> RolloutResult<()>
    where
        F: FnOnce(&mut Feature) + Send,
    {
        let mut feature = self.get(name).await?;
        mutate(&mut feature);
        self.save(&feature).await?;

        debug!(feature = %name, settings = %feature, "Updated feature");
        Ok(())
    }

    fn check_name(&self, name: &str) -> RolloutResult<()> {
        if name.is_empty() {
            return Err(RolloutError::invalid_name(name, "name is empty"));
        }
        if name.contains(LIST_SEPARATOR) {
            return Err(RolloutError::invalid_name(name, "name contains ','"));
        }
        if name == self.config.index_name {
            return Err(RolloutError::invalid_name(name, "name is reserved for the feature index"));
        }
        Ok(())
    }
}

impl GroupResolver for Rollout {
    fn is_active_in_group(&self, group: &str, user: Option<&dyn RolloutUser>) -> bool {
        self.groups.is_active_in_group(group, user)
    }
}

impl std::fmt::Debug for Rollout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rollout")
            .field("store", &self.store.store_type())
            .field("config", &self.config)
            .field("groups", &self.groups)
            .finish()
    }
}

fn check_value(name: &str, checked: Result<(), SettingsError>) -> RolloutResult<()> {
    checked.map_err(|source| RolloutError::InvalidValue {
        name: name.to_string(),
        source,
    })
}

fn join_index(names: &[String]) -> String {
    names.join(",")
}

/// Users and groups to add to or remove from a feature in one save.
///
/// # Examples
///
/// ```
/// use rollout_features::BulkChange;
///
/// let change = BulkChange::activate()
///     .users([1, 2, 3])
///     .group("beta")
///     .percentage(25);
/// assert!(change.is_activation());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkChange {
    activate: bool,
    users: Vec<String>,
    groups: Vec<String>,
    percentage: Option<u8>,
}

impl BulkChange {
    /// A change adding users and groups.
    pub fn activate() -> Self {
        Self {
            activate: true,
            ..Self::default()
        }
    }

    /// A change removing users and groups.
    pub fn deactivate() -> Self {
        Self::default()
    }

    pub fn user<U: RolloutUser + ?Sized>(mut self, user: &U) -> Self {
        self.users.push(user.rollout_identifier().into_owned());
        self
    }

    pub fn users<I, U>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: RolloutUser,
    {
        self.users.extend(
            users
                .into_iter()
                .map(|user| user.rollout_identifier().into_owned()),
        );
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    pub fn groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    /// Also set the percentage, in either direction.
    pub fn percentage(mut self, percentage: u8) -> Self {
        self.percentage = Some(percentage);
        self
    }

    pub fn is_activation(&self) -> bool {
        self.activate
    }
}

/// Users and groups a [`BulkChange`] actually modified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub users: Vec<String>,
    pub groups: Vec<String>,
}

impl ChangeReport {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty()
    }
}
