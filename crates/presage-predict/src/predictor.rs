#![forbid(unsafe_code)]

//! The predictor: learn from observed changes, predict the next patch list,
//! and track how often predictions hold.
//!
//! # Data flow
//!
//! ```text
//! learn(change, old, new, snapshot)
//!   validate -> reconcile -> extract ─┬─ template ──> PatternStore
//!                                     └─ concrete ──> PatternStore (history)
//!
//! predict(change, current)
//!   template (confidence >= min) -> concrete history -> numeric heuristic -> None
//!
//! verify(change, predicted, actual)
//!   compare -> hit/miss on the source that served the prediction
//! ```
//!
//! Several predictions for one key may be in flight at once. Each served
//! prediction is queued on its key and claimed by the first verification of
//! the same `old -> new` transition, so every verdict reaches the source that
//! produced it.
//!
//! All store access goes through one mutex. Validation, reconciliation and
//! extraction run before the lock is taken. Eviction runs at the end of
//! `learn` while the lock is still held, so a concurrent `predict` never sees
//! a half-evicted store.

use std::sync::{Mutex, MutexGuard, PoisonError};

use presage_core::{
    Attributes, Patch, StateChange, StateSnapshot, StateValue, TreeError, UiNode, reconcile,
    validate_tree,
};
use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, debug_span, trace, warn};

use crate::config::PredictorConfig;
use crate::extract::{ExtractionKind, Extractor, TemplatedPatches};
use crate::pattern_store::{
    Observation, PatternEntry, PatternKey, PatternStore, PredictionSource, TemplateUpdate,
};
use crate::persistence::{StorageResult, TemplateSnapshot, TemplateStorage};
use crate::transition::TransitionKind;
use crate::verify::Verification;

/// A predicted patch list.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// May contain templated patches; materialize them against live state
    /// before applying.
    pub patches: Vec<Patch>,
    pub confidence: f64,
    pub source: PredictionSource,
}

impl Prediction {
    /// Whether any patch still needs materialization.
    #[must_use]
    pub fn is_templated(&self) -> bool {
        self.patches.iter().any(Patch::is_template)
    }
}

/// What `learn` did with an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LearnOutcome {
    /// A template explained the change.
    Template {
        update: TemplateUpdate,
        kinds: SmallVec<[ExtractionKind; 4]>,
    },
    /// No template fit; the concrete patches were recorded.
    Concrete { kind: TransitionKind },
    /// A tree exceeded the validation limits; nothing was learned.
    Rejected(TreeError),
}

impl LearnOutcome {
    #[must_use]
    pub fn is_template(&self) -> bool {
        matches!(self, Self::Template { .. })
    }
}

/// Point-in-time counters of one predictor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PredictorStats {
    /// Pattern entries currently stored.
    pub keys: usize,
    /// Entries holding a template.
    pub templates: usize,
    /// Concrete observations currently stored.
    pub observations: usize,
    pub estimated_bytes: usize,
    pub evictions: u64,
    pub templates_learned: u64,
    pub concrete_learned: u64,
    pub rejected: u64,
    pub template_predictions: u64,
    pub concrete_predictions: u64,
    pub builtin_predictions: u64,
    pub unavailable: u64,
    pub hits: u64,
    pub misses: u64,
}

impl PredictorStats {
    /// Predictions served from any source.
    #[must_use]
    pub fn predictions(&self) -> u64 {
        self.template_predictions + self.concrete_predictions + self.builtin_predictions
    }

    /// `hits / (hits + misses)`, or `None` before any verification.
    #[must_use]
    pub fn hit_rate(&self) -> Option<f64> {
        match self.hits + self.misses {
            0 => None,
            total => Some(self.hits as f64 / total as f64),
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    templates_learned: u64,
    concrete_learned: u64,
    rejected: u64,
    template_predictions: u64,
    concrete_predictions: u64,
    builtin_predictions: u64,
    unavailable: u64,
    hits: u64,
    misses: u64,
}

impl Counters {
    fn served(&mut self, source: Option<PredictionSource>) {
        match source {
            Some(PredictionSource::Template) => self.template_predictions += 1,
            Some(PredictionSource::Concrete) => self.concrete_predictions += 1,
            Some(PredictionSource::Builtin) => self.builtin_predictions += 1,
            None => self.unavailable += 1,
        }
    }
}

#[derive(Debug)]
struct Inner {
    store: PatternStore,
    counters: Counters,
}

/// Learns and predicts patch lists for one session.
#[derive(Debug)]
pub struct Predictor {
    config: PredictorConfig,
    inner: Mutex<Inner>,
}

impl Default for Predictor {
    fn default() -> Self {
        Self::new(PredictorConfig::default())
    }
}

impl Predictor {
    #[must_use]
    pub fn new(config: PredictorConfig) -> Self {
        let store = PatternStore::new(&config);
        Self {
            config,
            inner: Mutex::new(Inner {
                store,
                counters: Counters::default(),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    // A panic while holding the lock leaves the store consistent: every
    // mutation re-accounts bytes before returning.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Learning
    // ─────────────────────────────────────────────────────────────────────

    /// Learn from one observed change of `change.state_key`.
    ///
    /// `snapshot` is the component's full state; the changed key is pinned
    /// to `old_value` / `new_value` whichever side of the change it was
    /// taken on.
    pub fn learn(
        &self,
        change: &StateChange,
        old_tree: &UiNode,
        new_tree: &UiNode,
        snapshot: &StateSnapshot,
    ) -> LearnOutcome {
        let _span = debug_span!(
            "predictor.learn",
            component = %change.component_type,
            key = %change.state_key
        )
        .entered();

        for tree in [old_tree, new_tree] {
            if let Err(error) = validate_tree(tree, &self.config.validation) {
                warn!(%error, "tree exceeds validation limits, not learning");
                self.lock().counters.rejected += 1;
                return LearnOutcome::Rejected(error);
            }
        }

        let patches = reconcile(old_tree, new_tree);
        let templated = Extractor::new(change, snapshot).extract_patches(&patches, old_tree);
        let key = PatternKey::new(&change.component_type, &change.state_key);

        let mut inner = self.lock();
        let outcome = match templated {
            Some(TemplatedPatches { patches, kinds }) => {
                let update = inner.store.record_template(&key, patches);
                inner.counters.templates_learned += 1;
                debug!(?update, ?kinds, "learned template");
                LearnOutcome::Template { update, kinds }
            }
            None => {
                let observation =
                    Observation::new(change.old_value.clone(), change.new_value.clone(), patches);
                let kind = observation.kind;
                trace!(?kind, patches = observation.patches.len(), "recorded observation");
                inner.store.record_observation(&key, observation);
                inner.counters.concrete_learned += 1;
                LearnOutcome::Concrete { kind }
            }
        };

        let evicted = inner.store.enforce_limits(&key);
        if evicted > 0 {
            debug!(
                evicted,
                total_bytes = inner.store.total_bytes(),
                "pattern limits enforced"
            );
        }
        outcome
    }

    // ─────────────────────────────────────────────────────────────────────
    // Prediction
    // ─────────────────────────────────────────────────────────────────────

    /// Predict the patches `change` will produce on `current`.
    ///
    /// `None` means no source is confident enough; wait for the
    /// authoritative patches.
    pub fn predict(&self, change: &StateChange, current: &UiNode) -> Option<Prediction> {
        let _span = debug_span!(
            "predictor.predict",
            component = %change.component_type,
            key = %change.state_key
        )
        .entered();

        let key = PatternKey::new(&change.component_type, &change.state_key);
        let kind = TransitionKind::classify(&change.old_value, &change.new_value);
        let min = self.config.min_confidence;

        let mut inner = self.lock();
        let prediction = match inner.store.touch(&key) {
            Some(entry) => {
                let prediction = template_prediction(entry, change, min)
                    .or_else(|| concrete_prediction(entry, change, kind, min))
                    .or_else(|| builtin_prediction(&self.config, change, kind, current));
                if let Some(p) = &prediction {
                    entry.push_pending(change, p.source);
                }
                prediction
            }
            None => builtin_prediction(&self.config, change, kind, current),
        };
        inner.counters.served(prediction.as_ref().map(|p| p.source));

        match &prediction {
            Some(p) => debug!(
                source = ?p.source,
                confidence = p.confidence,
                patches = p.patches.len(),
                "prediction served"
            ),
            None => trace!("no prediction"),
        }
        prediction
    }

    // ─────────────────────────────────────────────────────────────────────
    // Verification
    // ─────────────────────────────────────────────────────────────────────

    /// Whether `predicted` matches `actual`. Records a hit or a miss.
    pub fn verify(&self, change: &StateChange, predicted: &UiNode, actual: &UiNode) -> bool {
        self.verify_with_correction(change, predicted, actual).matched
    }

    /// Like [`verify`](Self::verify), returning the patches that turn the
    /// predicted tree into the actual one.
    pub fn verify_with_correction(
        &self,
        change: &StateChange,
        predicted: &UiNode,
        actual: &UiNode,
    ) -> Verification {
        let _span = debug_span!(
            "predictor.verify",
            component = %change.component_type,
            key = %change.state_key
        )
        .entered();

        let verification = Verification::compare(predicted, actual);
        let matched = verification.matched;
        let key = PatternKey::new(&change.component_type, &change.state_key);

        let mut inner = self.lock();
        let source = inner.store.touch(&key).and_then(|entry| {
            let source = entry.take_pending(change);
            match source {
                Some(PredictionSource::Template) => {
                    if let Some(template) = entry.template.as_mut() {
                        template.counter.record(matched);
                    }
                }
                Some(PredictionSource::Concrete) => entry.concrete.record(matched),
                Some(PredictionSource::Builtin) | None => {}
            }
            source
        });
        if matched {
            inner.counters.hits += 1;
        } else {
            inner.counters.misses += 1;
            debug!(
                ?source,
                corrections = verification.correction.len(),
                "prediction missed"
            );
        }
        verification
    }

    /// Drop the oldest pending prediction for `change` without recording a
    /// verdict, for a prediction that was served but never applied. Returns
    /// whether one was pending.
    pub fn discard_pending(&self, change: &StateChange) -> bool {
        let key = PatternKey::new(&change.component_type, &change.state_key);
        self.lock()
            .store
            .touch(&key)
            .and_then(|entry| entry.take_pending(change))
            .is_some()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Inspection and maintenance
    // ─────────────────────────────────────────────────────────────────────

    /// Template patches learned for a key.
    #[must_use]
    pub fn template(&self, component_type: &str, state_key: &str) -> Option<Vec<Patch>> {
        let inner = self.lock();
        inner
            .store
            .peek(&PatternKey::new(component_type, state_key))?
            .template
            .as_ref()
            .map(|t| t.patches.clone())
    }

    /// Drop everything learned for a key. Returns whether anything was stored.
    pub fn forget(&self, component_type: &str, state_key: &str) -> bool {
        self.lock()
            .store
            .remove(&PatternKey::new(component_type, state_key))
            .is_some()
    }

    /// Drop all patterns. Counters are kept.
    pub fn clear(&self) {
        self.lock().store.clear();
    }

    #[must_use]
    pub fn stats(&self) -> PredictorStats {
        let inner = self.lock();
        let (templates, observations) = inner
            .store
            .iter()
            .fold((0, 0), |(templates, observations), (_, entry)| {
                (
                    templates + usize::from(entry.template.is_some()),
                    observations + entry.history.len(),
                )
            });
        let c = &inner.counters;
        PredictorStats {
            keys: inner.store.len(),
            templates,
            observations,
            estimated_bytes: inner.store.total_bytes(),
            evictions: inner.store.evictions(),
            templates_learned: c.templates_learned,
            concrete_learned: c.concrete_learned,
            rejected: c.rejected,
            template_predictions: c.template_predictions,
            concrete_predictions: c.concrete_predictions,
            builtin_predictions: c.builtin_predictions,
            unavailable: c.unavailable,
            hits: c.hits,
            misses: c.misses,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Template snapshots
    // ─────────────────────────────────────────────────────────────────────

    /// All templates learned for `component_type`.
    #[must_use]
    pub fn export_templates(&self, component_type: &str) -> TemplateSnapshot {
        let inner = self.lock();
        let mut snapshot = TemplateSnapshot::new(component_type);
        for (key, entry) in inner.store.iter() {
            if key.component_type == component_type
                && let Some(template) = &entry.template
            {
                snapshot.insert(&key.state_key, &template.patches);
            }
        }
        snapshot
    }

    /// Install the templates of `snapshot`, replacing learned ones for the
    /// same keys. Returns the number of keys imported.
    pub fn import_templates(&self, snapshot: &TemplateSnapshot) -> StorageResult<usize> {
        let by_key = snapshot.to_patches()?;
        let count = by_key.len();
        let mut inner = self.lock();
        for (state_key, patches) in by_key {
            let key = PatternKey::new(&snapshot.component_type, state_key);
            inner.store.import_template(&key, patches);
            inner.store.enforce_limits(&key);
        }
        debug!(
            component = %snapshot.component_type,
            keys = count,
            "imported templates"
        );
        Ok(count)
    }

    /// Persist the templates of `component_type`.
    pub fn save_templates(
        &self,
        storage: &dyn TemplateStorage,
        component_type: &str,
    ) -> StorageResult<()> {
        let snapshot = self.export_templates(component_type);
        storage.save(&snapshot)?;
        debug!(
            storage = storage.name(),
            component = component_type,
            keys = snapshot.len(),
            "saved templates"
        );
        Ok(())
    }

    /// Load persisted templates of `component_type`. Returns the number of
    /// keys imported, `0` when nothing was stored.
    pub fn load_templates(
        &self,
        storage: &dyn TemplateStorage,
        component_type: &str,
    ) -> StorageResult<usize> {
        match storage.load(component_type)? {
            Some(snapshot) => self.import_templates(&snapshot),
            None => Ok(0),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Prediction sources
// ─────────────────────────────────────────────────────────────────────────────

fn template_prediction(
    entry: &PatternEntry,
    change: &StateChange,
    min_confidence: f64,
) -> Option<Prediction> {
    let record = entry.template.as_ref()?;
    let confidence = record.confidence();
    if confidence < min_confidence {
        trace!(confidence, "template below confidence threshold");
        return None;
    }
    // A conditional on the changed key that never saw the new value cannot
    // be materialized.
    let branch = change.new_value.branch_key();
    let unseen_branch = record
        .patches
        .iter()
        .filter_map(Patch::template_patch)
        .any(|tp| {
            tp.is_conditional()
                && tp.conditional_binding().ok() == Some(change.state_key.as_str())
                && tp.select_branch(&branch).is_none()
        });
    if unseen_branch {
        trace!(branch = %branch, "conditional template has no branch for value");
        return None;
    }
    Some(Prediction {
        patches: record.patches.clone(),
        confidence,
        source: PredictionSource::Template,
    })
}

struct PatchGroup<'a> {
    patches: &'a [Patch],
    count: usize,
    transitions: SmallVec<[(&'a StateValue, &'a StateValue); 4]>,
}

fn concrete_prediction(
    entry: &PatternEntry,
    change: &StateChange,
    kind: TransitionKind,
    min_confidence: f64,
) -> Option<Prediction> {
    let same_kind: Vec<&Observation> = entry.history.iter().filter(|o| o.kind == kind).collect();
    if same_kind.is_empty() {
        return None;
    }

    let exact: SmallVec<[&Observation; 8]> = same_kind
        .iter()
        .copied()
        .filter(|o| o.old_value == change.old_value && o.new_value == change.new_value)
        .collect();

    let (patches, support) = match exact.last() {
        Some(latest) => {
            let agreeing = exact.iter().filter(|o| o.patches == latest.patches).count();
            (&latest.patches[..], agreeing as f64 / exact.len() as f64)
        }
        None => {
            let group = most_frequent_group(&same_kind)?;
            if group.transitions.len() < 2 {
                return None;
            }
            (group.patches, group.count as f64 / same_kind.len() as f64)
        }
    };

    let confidence = support * entry.concrete.hit_rate().unwrap_or(1.0);
    if confidence < min_confidence {
        trace!(confidence, "concrete history below confidence threshold");
        return None;
    }
    Some(Prediction {
        patches: patches.to_vec(),
        confidence,
        source: PredictionSource::Concrete,
    })
}

fn most_frequent_group<'a>(observations: &[&'a Observation]) -> Option<PatchGroup<'a>> {
    let mut groups: Vec<PatchGroup<'a>> = Vec::new();
    for obs in observations {
        let transition = (&obs.old_value, &obs.new_value);
        match groups.iter_mut().find(|g| g.patches == &obs.patches[..]) {
            Some(group) => {
                group.count += 1;
                if !group.transitions.contains(&transition) {
                    group.transitions.push(transition);
                }
            }
            None => groups.push(PatchGroup {
                patches: &obs.patches,
                count: 1,
                transitions: smallvec::smallvec![transition],
            }),
        }
    }
    groups.into_iter().max_by_key(|g| g.count)
}

/// Numeric increment/decrement: rewrite the old number wherever it stands
/// alone in the current tree's text and attributes.
fn builtin_prediction(
    config: &PredictorConfig,
    change: &StateChange,
    kind: TransitionKind,
    current: &UiNode,
) -> Option<Prediction> {
    if !kind.is_numeric() || config.builtin_confidence < config.min_confidence {
        return None;
    }
    let old = change.old_value.render();
    let new = change.new_value.render();

    let mut patches = Vec::new();
    for node in current.iter() {
        match node {
            UiNode::Text(text) => {
                if let Some(content) = replace_number(&text.content, &old, &new) {
                    patches.push(Patch::UpdateText {
                        path: text.path.clone(),
                        content,
                    });
                }
            }
            UiNode::Element(element) => {
                let attrs: Attributes = element
                    .attrs
                    .iter()
                    .filter_map(|(name, value)| {
                        replace_number(value, &old, &new).map(|v| (name.clone(), v))
                    })
                    .collect();
                if !attrs.is_empty() {
                    patches.push(Patch::UpdateProps {
                        path: element.path.clone(),
                        attrs,
                        removed: Vec::new(),
                    });
                }
            }
            UiNode::Null(_) => {}
        }
    }
    if patches.is_empty() {
        return None;
    }
    Some(Prediction {
        patches,
        confidence: config.builtin_confidence,
        source: PredictionSource::Builtin,
    })
}

/// Replace every occurrence of `old` in `haystack` that is not part of a
/// longer number. `None` if nothing was replaced.
fn replace_number(haystack: &str, old: &str, new: &str) -> Option<String> {
    let numeric = |c: Option<char>| c.is_some_and(|c| c.is_ascii_digit() || c == '.');
    let mut out = String::with_capacity(haystack.len());
    let mut last = 0;
    for (start, _) in haystack.match_indices(old) {
        let end = start + old.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        if numeric(before) || before == Some('-') || numeric(after) {
            continue;
        }
        out.push_str(&haystack[last..start]);
        out.push_str(new);
        last = end;
    }
    if last == 0 {
        return None;
    }
    out.push_str(&haystack[last..]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use presage_core::NodePath;

    fn counter(count: i32) -> UiNode {
        UiNode::element("div")
            .child(UiNode::text(format!("Count: {count}")))
            .build()
            .with_assigned_paths()
    }

    #[test]
    fn replace_number_respects_boundaries() {
        assert_eq!(replace_number("Count: 5", "5", "6").as_deref(), Some("Count: 6"));
        assert_eq!(replace_number("5 of 5", "5", "6").as_deref(), Some("6 of 6"));
        assert_eq!(replace_number("15 items", "5", "6"), None);
        assert_eq!(replace_number("2.5", "5", "6"), None);
        assert_eq!(replace_number("x-5", "5", "6"), None);
        assert_eq!(replace_number("none", "5", "6"), None);
    }

    #[test]
    fn learn_then_predict_template() {
        let predictor = Predictor::default();
        let change = StateChange::new("Counter", "count", 0, 1);
        let outcome = predictor.learn(&change, &counter(0), &counter(1), &StateSnapshot::new());
        assert!(outcome.is_template());

        let next = StateChange::new("Counter", "count", 1, 2);
        let prediction = predictor.predict(&next, &counter(1)).unwrap();
        assert_eq!(prediction.source, PredictionSource::Template);
        assert!(prediction.is_templated());
        assert_eq!(prediction.confidence, 1.0);
    }

    #[test]
    fn builtin_numeric_heuristic_without_history() {
        let predictor = Predictor::default();
        let change = StateChange::new("Counter", "count", 4, 5);
        let prediction = predictor.predict(&change, &counter(4)).unwrap();
        assert_eq!(prediction.source, PredictionSource::Builtin);
        assert_eq!(prediction.confidence, 0.85);
        assert_eq!(
            prediction.patches,
            vec![Patch::UpdateText {
                path: NodePath::root().child(0),
                content: "Count: 5".into(),
            }]
        );
    }

    #[test]
    fn builtin_disabled_below_threshold() {
        let predictor = Predictor::new(PredictorConfig::default().with_min_confidence(0.9));
        let change = StateChange::new("Counter", "count", 4, 5);
        assert!(predictor.predict(&change, &counter(4)).is_none());
        assert_eq!(predictor.stats().unavailable, 1);
    }

    #[test]
    fn concrete_exact_match() {
        let predictor = Predictor::default();
        let render = |open: bool| {
            UiNode::element("div")
                .child_if(open, UiNode::text("details"))
                .build()
                .with_assigned_paths()
        };
        let change = StateChange::new("Panel", "open", false, true);
        let outcome = predictor.learn(&change, &render(false), &render(true), &StateSnapshot::new());
        assert_eq!(
            outcome,
            LearnOutcome::Concrete {
                kind: TransitionKind::BooleanToggle
            }
        );
        let prediction = predictor.predict(&change, &render(false)).unwrap();
        assert_eq!(prediction.source, PredictionSource::Concrete);
        assert_eq!(prediction.patches, reconcile(&render(false), &render(true)));
    }

    #[test]
    fn concrete_generalizes_only_across_transitions() {
        let predictor = Predictor::default();
        let tree = |n: i32| {
            UiNode::element("div")
                .attr("class", if n > 2 { "big" } else { "small" })
                .build()
                .with_assigned_paths()
        };
        let big = StateChange::new("Box", "n", "a", "b");
        predictor.learn(&big, &tree(0), &tree(5), &StateSnapshot::new());
        let unseen = StateChange::new("Box", "n", "c", "d");
        assert!(predictor.predict(&unseen, &tree(0)).is_none());

        let other = StateChange::new("Box", "n", "e", "f");
        predictor.learn(&other, &tree(0), &tree(5), &StateSnapshot::new());
        let prediction = predictor.predict(&unseen, &tree(0)).unwrap();
        assert_eq!(prediction.source, PredictionSource::Concrete);
        assert_eq!(prediction.confidence, 1.0);
    }

    #[test]
    fn verification_feeds_template_confidence() {
        let predictor = Predictor::new(PredictorConfig::default().with_builtin_confidence(0.0));
        let change = StateChange::new("Counter", "count", 0, 1);
        predictor.learn(&change, &counter(0), &counter(1), &StateSnapshot::new());

        let next = StateChange::new("Counter", "count", 1, 2);
        assert!(predictor.predict(&next, &counter(1)).is_some());
        let v = predictor.verify_with_correction(&next, &counter(3), &counter(2));
        assert!(!v.matched);
        assert_eq!(v.correction.len(), 1);

        // Hit rate is now 0 / 1: the template is no longer trusted.
        assert!(predictor.predict(&next, &counter(1)).is_none());
        let stats = predictor.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.template_predictions, 1);
        assert_eq!(stats.hit_rate(), Some(0.0));
    }

    #[test]
    fn predictions_in_flight_are_verified_independently() {
        let config = PredictorConfig::default()
            .with_min_confidence(0.4)
            .with_builtin_confidence(0.0);
        let predictor = Predictor::new(config);
        let learned = StateChange::new("Counter", "count", 0, 1);
        predictor.learn(&learned, &counter(0), &counter(1), &StateSnapshot::new());

        let first = StateChange::new("Counter", "count", 1, 2);
        let second = StateChange::new("Counter", "count", 2, 3);
        assert!(predictor.predict(&first, &counter(1)).is_some());
        assert!(predictor.predict(&second, &counter(2)).is_some());

        assert!(predictor.verify(&first, &counter(2), &counter(2)));
        assert!(!predictor.verify(&second, &counter(9), &counter(3)));

        let third = StateChange::new("Counter", "count", 3, 4);
        let prediction = predictor.predict(&third, &counter(3)).unwrap();
        assert_eq!(prediction.confidence, 0.5);
        assert_eq!(predictor.stats().hits, 1);
        assert_eq!(predictor.stats().misses, 1);
    }

    #[test]
    fn discarded_predictions_record_no_verdict() {
        let predictor = Predictor::default();
        let learned = StateChange::new("Counter", "count", 0, 1);
        predictor.learn(&learned, &counter(0), &counter(1), &StateSnapshot::new());

        let next = StateChange::new("Counter", "count", 1, 2);
        assert!(predictor.predict(&next, &counter(1)).is_some());
        assert!(predictor.discard_pending(&next));
        assert!(!predictor.discard_pending(&next));

        // Nothing pending: the global counters move, the template's do not.
        assert!(!predictor.verify(&next, &counter(7), &counter(2)));
        assert_eq!(predictor.predict(&next, &counter(1)).unwrap().confidence, 1.0);
    }

    #[test]
    fn oversized_trees_are_rejected() {
        let config = PredictorConfig::default().with_validation(presage_core::ValidationConfig {
            max_nodes: 1,
            ..Default::default()
        });
        let predictor = Predictor::new(config);
        let change = StateChange::new("Counter", "count", 0, 1);
        let outcome = predictor.learn(&change, &counter(0), &counter(1), &StateSnapshot::new());
        assert!(matches!(outcome, LearnOutcome::Rejected(TreeError::TooManyNodes { .. })));
        assert_eq!(predictor.stats().keys, 0);
        assert_eq!(predictor.stats().rejected, 1);
    }

    #[test]
    fn forget_and_clear() {
        let predictor = Predictor::default();
        let change = StateChange::new("Counter", "count", 0, 1);
        predictor.learn(&change, &counter(0), &counter(1), &StateSnapshot::new());
        assert!(predictor.template("Counter", "count").is_some());
        assert!(predictor.forget("Counter", "count"));
        assert!(!predictor.forget("Counter", "count"));
        predictor.learn(&change, &counter(0), &counter(1), &StateSnapshot::new());
        predictor.clear();
        assert_eq!(predictor.stats().keys, 0);
        assert_eq!(predictor.stats().templates_learned, 2);
    }
}
