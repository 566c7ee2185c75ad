//! Named group predicates.
//!
//! Groups are code-defined and live only in memory; features reference them
//! by name. A feature naming a group that was never defined is simply never
//! activated through it.

use crate::identity::RolloutUser;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Name of the builtin group matching every supplied user.
pub const ALL_GROUP: &str = "all";

/// Predicate deciding whether a user belongs to a group.
pub trait GroupPredicate: Send + Sync {
    /// Evaluate the predicate; `user` is `None` for anonymous evaluation.
    fn evaluate(&self, user: Option<&dyn RolloutUser>) -> bool;
}

impl<F> GroupPredicate for F
where
    F: Fn(Option<&dyn RolloutUser>) -> bool + Send + Sync,
{
    fn evaluate(&self, user: Option<&dyn RolloutUser>) -> bool {
        self(user)
    }
}

/// Resolves group membership during feature evaluation.
pub trait GroupResolver {
    /// Whether `user` belongs to `group`. Unknown groups resolve to `false`.
    fn is_active_in_group(&self, group: &str, user: Option<&dyn RolloutUser>) -> bool;
}

/// Registry of group predicates keyed by name.
///
/// Meant to be written during setup and read while serving; the lock only
/// guards against torn updates, it does not order writers.
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Arc<dyn GroupPredicate>>>,
}

impl GroupRegistry {
    /// Create a registry holding only the builtin `all` group.
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.define(ALL_GROUP, |user: Option<&dyn RolloutUser>| user.is_some());
        registry
    }

    /// Create a registry without any groups, not even `all`.
    pub fn empty() -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Register or replace a group defined by a closure.
    pub fn define<F>(&self, name: impl Into<String>, predicate: F)
    where
        F: Fn(Option<&dyn RolloutUser>) -> bool + Send + Sync + 'static,
    {
        self.define_predicate(name, Arc::new(predicate));
    }

    /// Register or replace a group backed by a predicate object.
    pub fn define_predicate(&self, name: impl Into<String>, predicate: Arc<dyn GroupPredicate>) {
        let name = name.into();
        debug!(group = %name, "Defining rollout group");
        self.groups.write().insert(name, predicate);
    }

    /// Remove a group. Returns whether it was defined.
    pub fn undefine(&self, name: &str) -> bool {
        self.groups.write().remove(name).is_some()
    }

    /// Whether a group with this name is defined.
    pub fn is_defined(&self, name: &str) -> bool {
        self.groups.read().contains_key(name)
    }

    /// Names of all defined groups, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GroupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupRegistry")
            .field("groups", &self.names())
            .finish()
    }
}

impl GroupResolver for GroupRegistry {
    fn is_active_in_group(&self, group: &str, user: Option<&dyn RolloutUser>) -> bool {
        // Clone the predicate out so user code never runs under the lock.
        let predicate = self.groups.read().get(group).cloned();
        predicate.is_some_and(|p| p.evaluate(user))
    }
}
