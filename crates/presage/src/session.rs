#![forbid(unsafe_code)]

//! One component instance driven through the full data flow:
//!
//! ```text
//! state change ─> predict (hint) ─> render new tree ─> reconcile
//!                      │                                   │
//!                      └── materialize ─> verify <─────────┘
//!                                           │
//!                                         learn
//! ```
//!
//! A [`SessionUpdate`] carries everything a transport would ship: the
//! templated hint sent ahead of rendering, the authoritative patches, and
//! the correction for a client that applied the hint.

use std::sync::Arc;

use presage_client::materialize_all;
use presage_core::{
    Patch, StateChange, StateChangeEvent, StateSnapshot, StateValue, UiNode, patched, reconcile,
    validate_tree,
};
use presage_predict::{LearnOutcome, Prediction, Predictor, TemplateStorage};
use tracing::{debug, debug_span};

use crate::Result;

/// Renders a component's tree from its state.
pub trait TreeProducer {
    /// Component type this producer renders.
    fn component_type(&self) -> &str;

    /// Tree for `state`. Paths are (re)assigned by the session.
    fn render(&self, state: &StateSnapshot) -> UiNode;
}

/// A [`TreeProducer`] from a closure.
pub struct FnProducer<F> {
    component_type: String,
    render: F,
}

impl<F: Fn(&StateSnapshot) -> UiNode> FnProducer<F> {
    #[must_use]
    pub fn new(component_type: impl Into<String>, render: F) -> Self {
        Self {
            component_type: component_type.into(),
            render,
        }
    }
}

impl<F: Fn(&StateSnapshot) -> UiNode> TreeProducer for FnProducer<F> {
    fn component_type(&self) -> &str {
        &self.component_type
    }

    fn render(&self, state: &StateSnapshot) -> UiNode {
        (self.render)(state)
    }
}

impl<F> std::fmt::Debug for FnProducer<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProducer")
            .field("component_type", &self.component_type)
            .finish()
    }
}

/// Everything produced by one state change.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUpdate {
    pub change: StateChange,
    /// Prediction available before rendering, possibly templated.
    pub hint: Option<Prediction>,
    /// `reconcile(old tree, new tree)`.
    pub patches: Vec<Patch>,
    /// `Some(matched)` when the hint could be materialized and verified.
    pub verified: Option<bool>,
    /// Patches from the hinted tree to the new tree; empty on a hit.
    pub correction: Vec<Patch>,
    pub learned: LearnOutcome,
}

/// Drives one component instance: state, current tree, shared predictor.
#[derive(Debug)]
pub struct ReconcileSession<P> {
    producer: P,
    predictor: Arc<Predictor>,
    state: StateSnapshot,
    tree: UiNode,
}

impl<P: TreeProducer> ReconcileSession<P> {
    /// Render the initial tree for `initial`.
    pub fn new(producer: P, predictor: Arc<Predictor>, initial: StateSnapshot) -> Result<Self> {
        let tree = producer.render(&initial).with_assigned_paths();
        validate_tree(&tree, &predictor.config().validation)?;
        Ok(Self {
            producer,
            predictor,
            state: initial,
            tree,
        })
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> &StateSnapshot {
        &self.state
    }

    #[inline]
    #[must_use]
    pub fn tree(&self) -> &UiNode {
        &self.tree
    }

    #[inline]
    #[must_use]
    pub fn predictor(&self) -> &Arc<Predictor> {
        &self.predictor
    }

    /// Set `key` to `value` and run the full cycle.
    pub fn set(&mut self, key: &str, value: impl Into<StateValue>) -> Result<SessionUpdate> {
        let change = StateChange::new(
            self.producer.component_type(),
            key,
            self.state.value_or_null(key),
            value,
        );
        let state = self.state.clone();
        self.run(change, state)
    }

    /// Apply an event from the state change feed. Its snapshot replaces the
    /// session's view of the state.
    pub fn apply_event(&mut self, event: &StateChangeEvent) -> Result<SessionUpdate> {
        let before = event.change.state_before(&event.full_snapshot);
        self.run(event.change.clone(), before)
    }

    fn run(&mut self, change: StateChange, before: StateSnapshot) -> Result<SessionUpdate> {
        let _span = debug_span!(
            "session.update",
            component = %change.component_type,
            key = %change.state_key
        )
        .entered();

        let after = change.state_after(&before);
        let hint = self.predictor.predict(&change, &self.tree);
        let predicted = hint.as_ref().and_then(|p| {
            let concrete = materialize_all(&p.patches, &after).ok()?;
            patched(&self.tree, &concrete).ok()
        });
        if hint.is_some() && predicted.is_none() {
            self.predictor.discard_pending(&change);
        }

        let new_tree = self.producer.render(&after).with_assigned_paths();
        validate_tree(&new_tree, &self.predictor.config().validation)?;
        let patches = reconcile(&self.tree, &new_tree);

        let (verified, correction) = match &predicted {
            Some(predicted) => {
                let verification =
                    self.predictor
                        .verify_with_correction(&change, predicted, &new_tree);
                (Some(verification.matched), verification.correction)
            }
            None => (None, Vec::new()),
        };

        let learned = self.predictor.learn(&change, &self.tree, &new_tree, &before);
        debug!(
            patches = patches.len(),
            hinted = hint.is_some(),
            verified = ?verified,
            "session updated"
        );

        self.state = after;
        self.tree = new_tree;
        Ok(SessionUpdate {
            change,
            hint,
            patches,
            verified,
            correction,
            learned,
        })
    }

    /// Persist the predictor's templates for this component.
    pub fn save_templates(&self, storage: &dyn TemplateStorage) -> Result<()> {
        Ok(self
            .predictor
            .save_templates(storage, self.producer.component_type())?)
    }

    /// Load persisted templates for this component. Returns the number of
    /// state keys imported.
    pub fn load_templates(&self, storage: &dyn TemplateStorage) -> Result<usize> {
        Ok(self
            .predictor
            .load_templates(storage, self.producer.component_type())?)
    }
}
