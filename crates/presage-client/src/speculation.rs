#![forbid(unsafe_code)]

//! Speculate-then-correct rendering.
//!
//! Phase one, [`SpeculativeRenderer::speculate`], materializes a prediction
//! against the live state and applies it to the surface immediately. Phase
//! two, [`SpeculativeRenderer::settle`], runs when the authoritative tree
//! arrives: the predictor verifies the speculation and the surface receives
//! the correcting patches, which are ordinary reconciliation output.
//!
//! At most one speculation is outstanding. Nothing here blocks: when no
//! prediction can be applied the surface is left alone and `settle` simply
//! brings it up to date.

use presage_core::{Patch, StateChange, StateSnapshot, UiNode, patched, reconcile};
use presage_predict::{Prediction, PredictionSource, Predictor};
use tracing::{debug, debug_span, trace, warn};

use crate::materialize::{MaterializeError, materialize_all};
use crate::surface::RenderSurface;

/// Why nothing was applied speculatively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The predictor had nothing confident enough.
    NoPrediction,
    /// A conditional template has no branch for the live value.
    NoConditionalMatch,
    /// The prediction did not fit the current tree or template.
    Unapplicable(String),
    /// A previous speculation has not been settled.
    AlreadyPending,
}

/// Result of [`SpeculativeRenderer::speculate`].
#[derive(Debug, Clone, PartialEq)]
pub enum SpeculationOutcome {
    Applied {
        patches: usize,
        confidence: f64,
        source: PredictionSource,
    },
    Skipped(SkipReason),
}

impl SpeculationOutcome {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Result of [`SpeculativeRenderer::settle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// `Some(matched)` when a speculation was verified, `None` otherwise.
    pub verified: Option<bool>,
    /// Patches applied to bring the surface to the authoritative tree.
    pub correction: Vec<Patch>,
}

#[derive(Debug, Clone)]
struct Pending {
    change: StateChange,
}

/// Drives a [`RenderSurface`] through speculation and correction.
#[derive(Debug)]
pub struct SpeculativeRenderer<S> {
    surface: S,
    pending: Option<Pending>,
    speculations: u64,
    corrections: u64,
}

impl<S: RenderSurface> SpeculativeRenderer<S> {
    #[must_use]
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            pending: None,
            speculations: 0,
            corrections: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    #[must_use]
    pub fn into_surface(self) -> S {
        self.surface
    }

    /// Whether a speculation awaits settlement.
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Speculations applied so far.
    #[inline]
    #[must_use]
    pub fn speculations(&self) -> u64 {
        self.speculations
    }

    /// Settlements that needed a non-empty correction.
    #[inline]
    #[must_use]
    pub fn corrections(&self) -> u64 {
        self.corrections
    }

    /// Ask `predictor` for `change` on the current surface, then speculate.
    pub fn predict_and_speculate(
        &mut self,
        predictor: &Predictor,
        change: &StateChange,
        live_state: &StateSnapshot,
    ) -> SpeculationOutcome {
        if self.pending.is_some() {
            return SpeculationOutcome::Skipped(SkipReason::AlreadyPending);
        }
        let prediction = predictor.predict(change, self.surface.tree());
        let outcome = self.speculate(change, prediction.as_ref(), live_state);
        if prediction.is_some() && !outcome.is_applied() {
            predictor.discard_pending(change);
        }
        outcome
    }

    /// Apply `prediction`, materialized against `live_state`, to the surface.
    ///
    /// The surface is only touched when every patch materializes and the
    /// whole list applies to the current tree.
    pub fn speculate(
        &mut self,
        change: &StateChange,
        prediction: Option<&Prediction>,
        live_state: &StateSnapshot,
    ) -> SpeculationOutcome {
        if self.pending.is_some() {
            return SpeculationOutcome::Skipped(SkipReason::AlreadyPending);
        }
        let Some(prediction) = prediction else {
            trace!(key = %change.state_key, "no prediction, waiting for authoritative tree");
            return SpeculationOutcome::Skipped(SkipReason::NoPrediction);
        };

        let patches = match materialize_all(&prediction.patches, live_state) {
            Ok(patches) => patches,
            Err(MaterializeError::NoConditionalMatch { binding, value }) => {
                debug!(%binding, %value, "conditional has no branch, not speculating");
                return SpeculationOutcome::Skipped(SkipReason::NoConditionalMatch);
            }
            Err(err) => {
                warn!(error = %err, "prediction failed to materialize");
                return SpeculationOutcome::Skipped(SkipReason::Unapplicable(err.to_string()));
            }
        };
        // Dry run first so a bad prediction never leaves a half-applied surface.
        if let Err(err) = patched(self.surface.tree(), &patches) {
            debug!(error = %err, "prediction does not fit the current tree");
            return SpeculationOutcome::Skipped(SkipReason::Unapplicable(err.to_string()));
        }
        if let Err(err) = self.surface.apply_all(&patches) {
            warn!(error = %err, "surface rejected a patch that applied to its tree");
            return SpeculationOutcome::Skipped(SkipReason::Unapplicable(err.to_string()));
        }

        self.speculations += 1;
        self.pending = Some(Pending {
            change: change.clone(),
        });
        debug!(
            key = %change.state_key,
            patches = patches.len(),
            source = ?prediction.source,
            "speculation applied"
        );
        SpeculationOutcome::Applied {
            patches: patches.len(),
            confidence: prediction.confidence,
            source: prediction.source,
        }
    }

    /// Reconcile the surface with the authoritative `actual` tree.
    ///
    /// A pending speculation is verified through `predictor`, which records
    /// the hit or miss. Either way the surface ends up showing `actual`.
    pub fn settle(&mut self, predictor: &Predictor, actual: &UiNode) -> Settlement {
        let _span = debug_span!("speculation.settle", pending = self.pending.is_some()).entered();

        let (verified, correction) = match self.pending.take() {
            Some(Pending { change }) => {
                let verification =
                    predictor.verify_with_correction(&change, self.surface.tree(), actual);
                (Some(verification.matched), verification.correction)
            }
            None => (None, reconcile(self.surface.tree(), actual)),
        };

        if !correction.is_empty() {
            self.corrections += u64::from(verified.is_some());
            if let Err(err) = self.surface.apply_all(&correction) {
                warn!(error = %err, "correction failed to apply, resetting surface");
                self.surface.reset(actual.clone());
            }
        }
        debug!(
            verified = ?verified,
            corrections = correction.len(),
            "settled"
        );
        Settlement {
            verified,
            correction,
        }
    }
}
