//! Optimization-based fit of the boundary model to an observed outline.
//!
//! The fit is a deterministic local search: a fixed starting guess derived
//! from the box bounds, an RMS point-distance objective, and a bounded
//! simplex minimizer. Callers wanting robustness to distant optima can
//! multi-start by overriding the initial guess.

mod objective;
mod result;
mod solver;

pub use result::{FitResult, FitStatus};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::registration::MIN_BOUNDARY_POINTS;
use crate::shape::{ParamBounds, ShapeParameters};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    /// Box bounds searched; also the source of the fixed starting guess.
    pub bounds: ParamBounds,
    /// Override for the starting guess. `None` starts from the bounds
    /// midpoint.
    pub initial: Option<ShapeParameters>,
    pub max_iters: usize,
    /// Relative value-spread tolerance of the simplex.
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            bounds: ParamBounds::default(),
            initial: None,
            max_iters: 4000,
            tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    InvalidBounds,
    TooFewPoints { needed: usize, got: usize },
    NonFiniteInput,
    InfeasibleStart,
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBounds => write!(f, "parameter bounds are not ordered finite intervals"),
            Self::TooFewPoints { needed, got } => {
                write!(f, "outline has {got} points, need at least {needed}")
            }
            Self::NonFiniteInput => write!(f, "outline contains non-finite coordinates"),
            Self::InfeasibleStart => {
                write!(f, "starting guess violates the axis-order constraint")
            }
        }
    }
}

impl std::error::Error for FitError {}

/// Fit the boundary model to an observed outline.
///
/// The outline is matched index-to-angle: point `i` of `n` pairs with model
/// angle `2πi/n`. A closing duplicate point is tolerated and dropped.
pub fn fit_boundary(target: &[[f64; 2]], options: &FitOptions) -> Result<FitResult, FitError> {
    if !options.bounds.is_valid() {
        return Err(FitError::InvalidBounds);
    }
    if target.iter().flatten().any(|c| !c.is_finite()) {
        return Err(FitError::NonFiniteInput);
    }
    let target = match target {
        [head @ .., last] if head.first() == Some(last) => head,
        other => other,
    };
    if target.len() < MIN_BOUNDARY_POINTS {
        return Err(FitError::TooFewPoints {
            needed: MIN_BOUNDARY_POINTS,
            got: target.len(),
        });
    }

    let start = options
        .bounds
        .clamp(&options.initial.unwrap_or_else(|| options.bounds.initial_guess()));
    if !start.is_feasible() {
        return Err(FitError::InfeasibleStart);
    }

    let objective = objective::Objective::new(target);
    let objective_at_start = objective.evaluate(&start.to_array());
    let outcome = solver::minimize(
        |x| objective.evaluate(x),
        start.to_array(),
        options.bounds.lower(),
        options.bounds.upper(),
        options.max_iters,
        options.tolerance,
    );

    let status = if outcome.converged {
        FitStatus::Converged
    } else {
        FitStatus::MaxIterations
    };
    tracing::debug!(
        objective = outcome.value,
        objective_at_start,
        iterations = outcome.iterations,
        evaluations = outcome.evaluations,
        status = ?status,
        "boundary fit finished"
    );

    Ok(FitResult {
        params: ShapeParameters::from_array(outcome.x),
        objective: outcome.value,
        objective_at_start,
        status,
        iterations: outcome.iterations,
        evaluations: outcome.evaluations,
    })
}
