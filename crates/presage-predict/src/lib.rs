#![forbid(unsafe_code)]

//! Learning and prediction for presage.
//!
//! A [`Predictor`] watches `(state change, old tree, new tree)` observations
//! of one session. When the new content can be explained as a function of
//! state it stores a template; otherwise it keeps a bounded history of the
//! concrete patches. On the next change of the same key it predicts the
//! patch list, and verification against the authoritative tree feeds the
//! confidence of whichever source served the prediction.
//!
//! # Example
//! ```
//! use presage_core::{StateChange, StateSnapshot, UiNode};
//! use presage_predict::{PredictionSource, Predictor};
//!
//! let render = |count: i32| {
//!     UiNode::element("div")
//!         .child(UiNode::text(format!("Count: {count}")))
//!         .build()
//!         .with_assigned_paths()
//! };
//!
//! let predictor = Predictor::default();
//! let change = StateChange::new("Counter", "count", 0, 1);
//! predictor.learn(&change, &render(0), &render(1), &StateSnapshot::new());
//!
//! let next = StateChange::new("Counter", "count", 1, 42);
//! let prediction = predictor.predict(&next, &render(1)).unwrap();
//! assert_eq!(prediction.source, PredictionSource::Template);
//! ```

pub mod config;
pub mod extract;
pub mod pattern_store;
pub mod persistence;
pub mod predictor;
pub mod transition;
pub mod verify;

pub use config::{EvictionPolicy, PredictorConfig, UnknownPolicy};
pub use extract::{ExtractionKind, Extractor, TemplatedPatches};
pub use pattern_store::{PatternKey, PredictionSource, TemplateUpdate};
pub use persistence::{
    FileTemplateStorage, MemoryTemplateStorage, StorageError, StorageResult, TemplateSnapshot,
    TemplateStorage,
};
pub use predictor::{LearnOutcome, Prediction, Predictor, PredictorStats};
pub use transition::TransitionKind;
pub use verify::{Verification, trees_match};
