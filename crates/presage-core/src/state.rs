#![forbid(unsafe_code)]

//! State values, snapshots, and change events.
//!
//! Application state crosses into the engine as a closed set of scalars
//! ([`StateValue`]). Keeping the set closed makes template extraction
//! exhaustive: every value has exactly one string form that can be searched
//! for in rendered content and substituted back.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A scalar state value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

impl StateValue {
    /// The form this value takes when interpolated into rendered content.
    ///
    /// `Null` renders as the empty string. Integral numbers render without a
    /// fractional part (`42.0` becomes `"42"`).
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::Str(s) => s.clone(),
        }
    }

    /// The key used to select a conditional template branch.
    ///
    /// Identical to [`render`](Self::render) except that `Null` maps to
    /// `"null"`, so an absent value can never collide with an empty string
    /// branch.
    #[must_use]
    pub fn branch_key(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            other => other.render(),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Approximate heap footprint in bytes.
    #[must_use]
    pub fn estimated_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + match self {
                Self::Str(s) => s.len(),
                _ => 0,
            }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<bool> for StateValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for StateValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for StateValue {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i64> for StateValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<u32> for StateValue {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for StateValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl<T: Into<StateValue>> From<Option<T>> for StateValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A full snapshot of a component's state, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateSnapshot {
    values: BTreeMap<String, StateValue>,
}

impl StateSnapshot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<StateValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<StateValue>) {
        self.values.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.values.get(key)
    }

    /// Value of `key`, treating an absent key as `Null`.
    #[must_use]
    pub fn value_or_null(&self, key: &str) -> StateValue {
        self.values.get(key).cloned().unwrap_or(StateValue::Null)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<StateValue>> FromIterator<(K, V)> for StateSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// One state variable of one component type changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChange {
    pub component_type: String,
    pub state_key: String,
    pub old_value: StateValue,
    pub new_value: StateValue,
}

impl StateChange {
    #[must_use]
    pub fn new(
        component_type: impl Into<String>,
        state_key: impl Into<String>,
        old_value: impl Into<StateValue>,
        new_value: impl Into<StateValue>,
    ) -> Self {
        Self {
            component_type: component_type.into(),
            state_key: state_key.into(),
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }

    /// The state before the change, derived from any snapshot of the
    /// component by pinning the changed key to its old value.
    #[must_use]
    pub fn state_before(&self, snapshot: &StateSnapshot) -> StateSnapshot {
        snapshot
            .clone()
            .with(self.state_key.clone(), self.old_value.clone())
    }

    /// The state after the change, pinning the changed key to its new value.
    #[must_use]
    pub fn state_after(&self, snapshot: &StateSnapshot) -> StateSnapshot {
        snapshot
            .clone()
            .with(self.state_key.clone(), self.new_value.clone())
    }
}

/// An event of the state change feed: a change plus the full snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChangeEvent {
    #[serde(flatten)]
    pub change: StateChange,
    pub full_snapshot: StateSnapshot,
}
