#![forbid(unsafe_code)]

//! Client side of presage: turn predictions into immediate local updates.
//!
//! - [`materialize`] - fill templated patches from live state
//! - [`RenderSurface`] / [`TreeSurface`] - where concrete patches land
//! - [`SpeculativeRenderer`] - apply a prediction now, correct it later

pub mod materialize;
pub mod speculation;
pub mod surface;

pub use materialize::{MaterializeError, materialize, materialize_all, materialize_template};
pub use speculation::{Settlement, SkipReason, SpeculationOutcome, SpeculativeRenderer};
pub use surface::{RenderSurface, TreeSurface};
