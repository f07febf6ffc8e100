//! Predictor scenario tests.
//!
//! # Running Tests
//!
//! ```sh
//! cargo test -p presage-predict --test predictor_scenarios
//! ```
//!
//! # Scenarios
//!
//! 1. **Counter**: `"Count: 0"` -> `"Count: 1"` learns `"Count: {0}"` bound to `count`
//! 2. **Online flag**: `"Online"` / `"Offline"` learns a two-branch conditional
//! 3. **Full name**: `"User: John Doe"` learns `"User: {0} {1}"` over `[first, last]`
//! 4. **Snapshots**: templates survive a save/load cycle through file storage

#![cfg(test)]

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use presage_core::{NodePath, Patch, StateChange, StateSnapshot, StateValue, UiNode};
use presage_predict::{
    ExtractionKind, FileTemplateStorage, LearnOutcome, MemoryTemplateStorage, PredictionSource,
    Predictor, PredictorConfig, TemplateStorage, TemplateUpdate,
};

// ============================================================================
// Test Utilities
// ============================================================================

fn label(text: impl Into<String>) -> UiNode {
    UiNode::element("span")
        .child(UiNode::text(text))
        .build()
        .with_assigned_paths()
}

fn text_path() -> NodePath {
    NodePath::root().child(0)
}

/// The single text template of a learned key.
fn only_template(predictor: &Predictor, component: &str, key: &str) -> presage_core::TemplatePatch {
    let patches = predictor.template(component, key).expect("template learned");
    assert_eq!(patches.len(), 1);
    match &patches[0] {
        Patch::UpdateTextTemplate {
            path,
            template_patch,
        } => {
            assert_eq!(*path, text_path());
            template_patch.clone()
        }
        other => panic!("expected a text template, got {other:?}"),
    }
}

// ============================================================================
// 1. Counter
// ============================================================================

#[test]
fn counter_learns_single_variable_template() {
    let predictor = Predictor::default();
    let change = StateChange::new("Counter", "count", 0, 1);
    let outcome = predictor.learn(
        &change,
        &label("Count: 0"),
        &label("Count: 1"),
        &StateSnapshot::new().with("count", 0),
    );
    assert!(matches!(
        outcome,
        LearnOutcome::Template { update: TemplateUpdate::Created, ref kinds }
            if kinds[..] == [ExtractionKind::SingleVariable]
    ));

    let template = only_template(&predictor, "Counter", "count");
    assert_eq!(template.template, "Count: {0}");
    assert_eq!(template.bindings, vec!["count".to_string()]);
    assert_eq!(template.slots, vec![7]);

    let prediction = predictor
        .predict(&StateChange::new("Counter", "count", 41, 42), &label("Count: 41"))
        .unwrap();
    assert_eq!(prediction.source, PredictionSource::Template);
    assert!(prediction.is_templated());
    assert_eq!(template.render(&["42".to_string()]).unwrap(), "Count: 42");
}

#[test]
fn counter_relearn_confirms() {
    let predictor = Predictor::default();
    let snapshot = StateSnapshot::new();
    for i in 0..3 {
        predictor.learn(
            &StateChange::new("Counter", "count", i, i + 1),
            &label(format!("Count: {i}")),
            &label(format!("Count: {}", i + 1)),
            &snapshot,
        );
    }
    let stats = predictor.stats();
    assert_eq!(stats.keys, 1);
    assert_eq!(stats.templates, 1);
    assert_eq!(stats.observations, 0);
    assert_eq!(stats.templates_learned, 3);
}

// ============================================================================
// 2. Online flag
// ============================================================================

#[test]
fn online_flag_learns_conditional() {
    let predictor = Predictor::default();
    let change = StateChange::new("Status", "isOnline", true, false);
    let outcome = predictor.learn(
        &change,
        &label("Online"),
        &label("Offline"),
        &StateSnapshot::new(),
    );
    assert!(matches!(
        outcome,
        LearnOutcome::Template { ref kinds, .. } if kinds[..] == [ExtractionKind::Conditional]
    ));

    let template = only_template(&predictor, "Status", "isOnline");
    let expected: BTreeMap<String, String> = [
        ("true".to_string(), "Online".to_string()),
        ("false".to_string(), "Offline".to_string()),
    ]
    .into_iter()
    .collect();
    assert_eq!(template.conditional_templates, Some(expected));
    assert_eq!(template.conditional_binding().unwrap(), "isOnline");

    // Both observed branches predict.
    for (old, new) in [(false, true), (true, false)] {
        let prediction = predictor.predict(
            &StateChange::new("Status", "isOnline", old, new),
            &label("whatever"),
        );
        assert_eq!(prediction.map(|p| p.source), Some(PredictionSource::Template));
    }

    // An unseen value is unavailable.
    let unseen = StateChange::new("Status", "isOnline", true, StateValue::Null);
    assert!(predictor.predict(&unseen, &label("Online")).is_none());
}

// ============================================================================
// 3. Full name
// ============================================================================

#[test]
fn full_name_learns_multi_variable_template() {
    let predictor = Predictor::default();
    let snapshot = StateSnapshot::new().with("first", "John").with("last", "Doe");
    let change = StateChange::new("Profile", "first", "John", "Jane");
    let outcome = predictor.learn(
        &change,
        &label("User: John Doe"),
        &label("User: Jane Doe"),
        &snapshot,
    );
    assert!(matches!(
        outcome,
        LearnOutcome::Template { ref kinds, .. } if kinds[..] == [ExtractionKind::MultiVariable]
    ));

    let template = only_template(&predictor, "Profile", "first");
    assert_eq!(template.template, "User: {0} {1}");
    assert_eq!(template.bindings, vec!["first".to_string(), "last".to_string()]);
    assert_eq!(
        template
            .render(&["Ada".to_string(), "Lovelace".to_string()])
            .unwrap(),
        "User: Ada Lovelace"
    );
}

// ============================================================================
// 4. Snapshots
// ============================================================================

fn learned_predictor() -> Predictor {
    let predictor = Predictor::default();
    predictor.learn(
        &StateChange::new("Counter", "count", 0, 1),
        &label("Count: 0"),
        &label("Count: 1"),
        &StateSnapshot::new(),
    );
    predictor.learn(
        &StateChange::new("Status", "isOnline", true, false),
        &label("Online"),
        &label("Offline"),
        &StateSnapshot::new(),
    );
    predictor
}

#[test]
fn export_is_per_component() {
    let predictor = learned_predictor();
    let counter = predictor.export_templates("Counter");
    assert_eq!(counter.component_type, "Counter");
    assert_eq!(counter.templates.keys().collect::<Vec<_>>(), vec!["count"]);
    assert!(predictor.export_templates("Nobody").is_empty());
}

#[test]
fn templates_survive_file_storage() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileTemplateStorage::new(dir.path());

    let original = learned_predictor();
    original.save_templates(&storage, "Counter").unwrap();
    original.save_templates(&storage, "Status").unwrap();
    assert_eq!(
        storage.components().unwrap(),
        vec!["Counter".to_string(), "Status".to_string()]
    );

    let restored = Predictor::default();
    assert_eq!(restored.load_templates(&storage, "Counter").unwrap(), 1);
    assert_eq!(restored.load_templates(&storage, "Status").unwrap(), 1);
    assert_eq!(restored.load_templates(&storage, "Missing").unwrap(), 0);

    assert_eq!(
        restored.template("Counter", "count"),
        original.template("Counter", "count")
    );
    assert_eq!(
        restored.template("Status", "isOnline"),
        original.template("Status", "isOnline")
    );
}

#[test]
fn imported_template_is_confirmed_by_relearning() {
    let storage = MemoryTemplateStorage::new();
    learned_predictor().save_templates(&storage, "Counter").unwrap();

    let restored = Predictor::new(PredictorConfig::default());
    restored.load_templates(&storage, "Counter").unwrap();
    let outcome = restored.learn(
        &StateChange::new("Counter", "count", 5, 6),
        &label("Count: 5"),
        &label("Count: 6"),
        &StateSnapshot::new(),
    );
    assert!(matches!(
        outcome,
        LearnOutcome::Template {
            update: TemplateUpdate::Confirmed,
            ..
        }
    ));
}
