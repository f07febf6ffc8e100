#![forbid(unsafe_code)]

//! Classification of state transitions.

use presage_core::StateValue;
use serde::{Deserialize, Serialize};

/// Shape of an `old -> new` state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionKind {
    NumericIncrement,
    NumericDecrement,
    BooleanToggle,
    /// Anything else, including a number that did not move.
    Literal,
}

impl TransitionKind {
    /// Classify the transition from `old` to `new`.
    #[must_use]
    pub fn classify(old: &StateValue, new: &StateValue) -> Self {
        match (old, new) {
            (StateValue::Number(a), StateValue::Number(b)) if b > a => Self::NumericIncrement,
            (StateValue::Number(a), StateValue::Number(b)) if b < a => Self::NumericDecrement,
            (StateValue::Bool(a), StateValue::Bool(b)) if a != b => Self::BooleanToggle,
            _ => Self::Literal,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::NumericIncrement | Self::NumericDecrement)
    }
}
