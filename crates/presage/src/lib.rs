#![forbid(unsafe_code)]

//! presage public facade crate.
//!
//! Re-exports the tree model and reconciler, the predictor, and the client
//! materializer, and wires them together in [`ReconcileSession`].

use std::fmt;

pub mod session;

// --- Core re-exports -------------------------------------------------------

pub use presage_core::{
    ApplyError, NodePath, Patch, PathParseError, StateChange, StateChangeEvent, StateSnapshot,
    StateValue, TemplateError, TemplatePatch, TreeError, UiNode, ValidationConfig, apply_patches,
    patched, reconcile, validate_tree,
};

// --- Predict re-exports ----------------------------------------------------

pub use presage_predict::{
    EvictionPolicy, FileTemplateStorage, LearnOutcome, MemoryTemplateStorage, Prediction,
    PredictionSource, Predictor, PredictorConfig, PredictorStats, StorageError, TemplateSnapshot,
    TemplateStorage, Verification,
};

// --- Client re-exports -----------------------------------------------------

pub use presage_client::{
    MaterializeError, RenderSurface, Settlement, SpeculationOutcome, SpeculativeRenderer,
    TreeSurface, materialize, materialize_all,
};

pub use session::{FnProducer, ReconcileSession, SessionUpdate, TreeProducer};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for presage.
#[derive(Debug)]
pub enum Error {
    /// A rendered tree violates the validation limits.
    Tree(TreeError),
    /// A patch did not fit the tree.
    Apply(ApplyError),
    /// A template is malformed.
    Template(TemplateError),
    /// A templated patch could not be materialized.
    Materialize(MaterializeError),
    /// Template snapshot storage failed.
    Storage(StorageError),
    /// A node path string did not parse.
    Path(PathParseError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tree(err) => write!(f, "{err}"),
            Self::Apply(err) => write!(f, "{err}"),
            Self::Template(err) => write!(f, "{err}"),
            Self::Materialize(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::Path(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Tree(err) => Some(err),
            Self::Apply(err) => Some(err),
            Self::Template(err) => Some(err),
            Self::Materialize(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Path(err) => Some(err),
        }
    }
}

impl From<TreeError> for Error {
    fn from(err: TreeError) -> Self {
        Self::Tree(err)
    }
}

impl From<ApplyError> for Error {
    fn from(err: ApplyError) -> Self {
        Self::Apply(err)
    }
}

impl From<TemplateError> for Error {
    fn from(err: TemplateError) -> Self {
        Self::Template(err)
    }
}

impl From<MaterializeError> for Error {
    fn from(err: MaterializeError) -> Self {
        Self::Materialize(err)
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<PathParseError> for Error {
    fn from(err: PathParseError) -> Self {
        Self::Path(err)
    }
}

/// Standard result type for presage APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Error, Patch, Prediction, Predictor, PredictorConfig, ReconcileSession, Result,
        StateChange, StateSnapshot, StateValue, TreeProducer, UiNode, reconcile,
    };
    pub use crate::{client, core, predict};
}

pub use presage_client as client;
pub use presage_core as core;
pub use presage_predict as predict;
