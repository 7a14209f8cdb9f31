//! Population-level stiffness error analysis.
//!
//! This module is the glue layer that wires the stages together: the
//! population store feeds the residual basis build, reconstructions at
//! increasing component counts feed the section-moment integrator, and the
//! per-sample stiffness errors reduce to one percentile table.
//!
//! Entry points:
//! - [`prepare_bases`]: build and attach the residual bases a store lacks
//! - [`run_analysis`]: evaluate every stored sample
//! - [`run_analysis_for_keys`]: evaluate a chosen subset, reporting missing
//!   keys as problems
//!
//! Algorithmic primitives live in [`crate::basis`], [`crate::reconstruct`],
//! [`crate::moment`], and [`crate::stiffness`].

mod result;
mod run;

pub use result::AnalysisReport;
pub use run::{prepare_bases, run_analysis, run_analysis_for_keys, AnalysisConfig, AnalysisError};
