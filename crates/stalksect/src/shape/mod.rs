//! Parametric cross-section boundary model.
//!
//! [`params`] defines the twelve-parameter description of a notched,
//! asymmetric ellipse; [`model`] evaluates it into boundary polylines.

pub mod model;
pub mod params;

pub use model::{boundary_point, boundary_points, closed_boundary_points};
pub use params::{ParamBounds, ShapeParameters, N_PARAMS};
