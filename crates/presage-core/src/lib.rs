#![forbid(unsafe_code)]

//! Core data model and reconciler for presage.
//!
//! - [`NodePath`] - gap-allocated structural node identifiers
//! - [`UiNode`] - element, text, and null-placeholder tree nodes
//! - [`StateValue`] / [`StateChange`] - the closed state model
//! - [`Patch`] / [`TemplatePatch`] - wire-level update records
//! - [`reconcile`] - stateless old/new tree diff
//! - [`apply_patches`] - apply concrete patches to a tree
//! - [`validate_tree`] - size and shape limits
//!
//! # Example
//! ```
//! use presage_core::{reconcile, Patch, UiNode};
//!
//! let render = |count: u32| {
//!     UiNode::element("div")
//!         .child(UiNode::text(format!("Count: {count}")))
//!         .build()
//!         .with_assigned_paths()
//! };
//!
//! let patches = reconcile(&render(0), &render(1));
//! assert!(matches!(&patches[..], [Patch::UpdateText { content, .. }] if content == "Count: 1"));
//! ```

pub mod apply;
pub mod node;
pub mod patch;
pub mod path;
pub mod reconcile;
pub mod state;
pub mod template;
pub mod validate;

#[cfg(feature = "subscriber")]
pub mod logging;

pub use apply::{ApplyError, apply_patch, apply_patches, patched};
pub use node::{Attributes, Element, ElementBuilder, NodeKind, Null, Text, UiNode};
pub use patch::Patch;
pub use path::{NodePath, PATH_GAP, PathParseError};
pub use reconcile::reconcile;
pub use state::{StateChange, StateChangeEvent, StateSnapshot, StateValue};
pub use template::{TemplateError, TemplatePatch, escape_literal};
pub use validate::{TreeError, ValidationConfig, validate_tree};
