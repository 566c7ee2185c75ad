//! Evaluation context
//!
//! Bundles everything a single evaluation may look at besides the stored
//! rules: the user, an optional ranked candidate pool and the request
//! parameters.

use crate::identity::RolloutUser;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Request parameters checked by a feature's request-param gate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    params: HashMap<String, Value>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.params.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Check a gate of the form `key` or `key=value`.
    ///
    /// Only the first `=` separates key from value. An empty expected value
    /// matches on presence alone; otherwise the supplied value must loosely
    /// equal it (see [`loose_eq`]).
    pub fn matches(&self, gate: &str) -> bool {
        let (key, expected) = gate.split_once('=').unwrap_or((gate, ""));

        match self.params.get(key) {
            None => false,
            Some(_) if expected.is_empty() => true,
            Some(actual) => loose_eq(actual, expected),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for RequestParams
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            params: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<HashMap<String, Value>> for RequestParams {
    fn from(params: HashMap<String, Value>) -> Self {
        Self { params }
    }
}

/// Loose equality between a request value and the textual gate value.
///
/// - strings compare numerically when both sides are numbers, else exactly
/// - numbers compare numerically against a numeric gate value
/// - booleans compare against the truthiness of the gate value (`""` and
///   `"0"` are false, everything else is true)
/// - `null` equals only the empty string
/// - arrays and objects never match
pub fn loose_eq(actual: &Value, expected: &str) -> bool {
    match actual {
        Value::String(s) => match (parse_number(s), parse_number(expected)) {
            (Some(a), Some(b)) => a == b,
            _ => s == expected,
        },
        Value::Number(n) => match (n.as_f64(), parse_number(expected)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
        Value::Bool(b) => *b == is_truthy(expected),
        Value::Null => expected.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn parse_number(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn is_truthy(s: &str) -> bool {
    !(s.is_empty() || s == "0")
}

/// Entry of a ranked candidate pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub slug: String,
}

/// Caller-ordered population for the ranked-pool percentage algorithm.
///
/// The pool is used in the order given; it is never sorted here. Callers
/// must supply the same order on every evaluation for verdicts to be stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidatePool {
    slugs: Vec<String>,
}

impl CandidatePool {
    /// Build a pool from slugs in ranking order.
    pub fn new<I, S>(slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slugs: slugs.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a pool from users in ranking order.
    pub fn from_users<I, U>(users: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: RolloutUser,
    {
        Self {
            slugs: users
                .into_iter()
                .map(|u| u.rollout_identifier().into_owned())
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }

    pub fn slugs(&self) -> &[String] {
        &self.slugs
    }

    /// The leading `ceil(percentage / 100 * len)` slugs.
    pub fn leading(&self, percentage: u8) -> &[String] {
        let take = (usize::from(percentage.min(100)) * self.slugs.len()).div_ceil(100);
        &self.slugs[..take]
    }

    /// Whether `identifier` is within the leading share of the pool.
    pub fn contains_within(&self, identifier: &str, percentage: u8) -> bool {
        match percentage {
            0 => false,
            p if p >= 100 => true,
            p => self.leading(p).iter().any(|slug| slug == identifier),
        }
    }
}

impl FromIterator<Candidate> for CandidatePool {
    fn from_iter<I: IntoIterator<Item = Candidate>>(iter: I) -> Self {
        Self {
            slugs: iter.into_iter().map(|c| c.slug).collect(),
        }
    }
}

/// Inputs of a single feature evaluation.
///
/// # Examples
///
/// ```
/// use rollout_features::{CandidatePool, EvaluationContext, RequestParams};
///
/// let request = RequestParams::new().with_param("FF_chat", "1");
/// let pool = CandidatePool::new(["acme", "globex"]);
/// let user = "acme";
///
/// let context = EvaluationContext::for_user(&user)
///     .with_candidates(&pool)
///     .with_request(&request);
/// assert!(context.user().is_some());
/// ```
#[derive(Clone, Copy, Default)]
pub struct EvaluationContext<'a> {
    user: Option<&'a dyn RolloutUser>,
    candidates: Option<&'a CandidatePool>,
    request: Option<&'a RequestParams>,
}

impl<'a> EvaluationContext<'a> {
    /// Anonymous context: no user, no pool, no request parameters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_user(user: &'a dyn RolloutUser) -> Self {
        Self::new().with_user(user)
    }

    pub fn with_user(mut self, user: &'a dyn RolloutUser) -> Self {
        self.user = Some(user);
        self
    }

    /// Switch the percentage gate to the ranked-pool algorithm.
    pub fn with_candidates(mut self, candidates: &'a CandidatePool) -> Self {
        self.candidates = Some(candidates);
        self
    }

    pub fn with_request(mut self, request: &'a RequestParams) -> Self {
        self.request = Some(request);
        self
    }

    pub fn user(&self) -> Option<&'a dyn RolloutUser> {
        self.user
    }

    pub fn candidates(&self) -> Option<&'a CandidatePool> {
        self.candidates
    }

    pub fn request(&self) -> Option<&'a RequestParams> {
        self.request
    }
}

impl std::fmt::Debug for EvaluationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("user", &self.user.map(|u| u.rollout_identifier()))
            .field("candidates", &self.candidates.map(CandidatePool::len))
            .field("request", &self.request)
            .finish()
    }
}
