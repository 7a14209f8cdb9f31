//! stalksect — cross-section shape modeling and bending-stiffness
//! approximation for plant stalk populations.
//!
//! The pipeline stages are:
//!
//! 1. **Shape** – parametric boundary model: a notched, asymmetric,
//!    rotated ellipse.
//! 2. **Registration** – centroid centering, polar resampling onto a shared
//!    grid, unit mean radius, notch alignment to θ = π.
//! 3. **Basis** – population principal components of ellipse residuals.
//! 4. **Reconstruct** – ellipse baseline plus a truncated residual
//!    estimate, at any component count.
//! 5. **Moment** – midpoint-ring polar second moment of area for pith and
//!    rind regions.
//! 6. **Stiffness** – modulus-weighted stiffness proxy and percentile
//!    error summaries across the population.
//!
//! # Public API
//! [`pipeline::run_analysis`] drives the whole chain over a stored
//! population. The stage modules stay public for direct use; the commonly
//! needed types are re-exported at the crate root.

pub mod basis;
pub mod ellipse;
pub mod export;
pub mod fit;
mod math;
pub mod moment;
pub mod pipeline;
pub mod population;
pub mod reconstruct;
pub mod registration;
pub mod shape;
pub mod stiffness;
pub mod synth;

pub use basis::{build_basis, BasisChannel, BasisError, PcBasis};
pub use ellipse::{ellipse_from_extents, RadialEllipse};
pub use export::{section_case, SectionCase};
pub use fit::{fit_boundary, FitError, FitOptions, FitResult, FitStatus};
pub use moment::{polar_moment, section_moments, MomentConfig, MomentError, SectionMoments};
pub use pipeline::{
    prepare_bases, run_analysis, run_analysis_for_keys, AnalysisConfig, AnalysisError,
    AnalysisReport,
};
pub use population::{SampleKey, SectionRepo, SectionRow, StoreError};
pub use reconstruct::{ApproximationCase, InteriorPolicy};
pub use registration::{register_curve, register_sample, RegisteredSample, RegistrationError};
pub use shape::{boundary_points, closed_boundary_points, ParamBounds, ShapeParameters};
pub use stiffness::{stiffness_proxy, ErrorSummary, LevelSummary, StiffnessConfig};
pub use synth::{synthesize_population, SynthConfig, SynthError, SynthRanges};
