#![forbid(unsafe_code)]

//! Comparing a speculative tree against the authoritative one.
//!
//! Two trees match when reconciling one into the other yields no patches.
//! On a mismatch that same patch list is the correction to apply.

use presage_core::{Patch, UiNode, reconcile};

/// Outcome of comparing a predicted tree with the actual tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub matched: bool,
    /// Patches that turn the predicted tree into the actual one. Empty when
    /// `matched` is true.
    pub correction: Vec<Patch>,
}

impl Verification {
    /// Compare `predicted` against `actual`.
    #[must_use]
    pub fn compare(predicted: &UiNode, actual: &UiNode) -> Self {
        let correction = reconcile(predicted, actual);
        Self {
            matched: correction.is_empty(),
            correction,
        }
    }
}

/// Whether `a` and `b` render identically by path.
#[must_use]
pub fn trees_match(a: &UiNode, b: &UiNode) -> bool {
    reconcile(a, b).is_empty()
}
