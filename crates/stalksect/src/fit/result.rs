//! Outcome of one boundary fit.

use serde::{Deserialize, Serialize};

use crate::shape::ShapeParameters;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    /// The simplex value spread fell below tolerance.
    Converged,
    /// The iteration budget ran out first.
    MaxIterations,
}

/// Fitted parameters together with the descent evidence a caller needs to
/// judge the fit without re-evaluating anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub params: ShapeParameters,
    /// RMS point distance at the fitted parameters.
    pub objective: f64,
    /// RMS point distance at the fixed starting guess.
    pub objective_at_start: f64,
    pub status: FitStatus,
    pub iterations: usize,
    pub evaluations: usize,
}

impl FitResult {
    /// The fit moved below its starting objective.
    pub fn improved(&self) -> bool {
        self.objective < self.objective_at_start
    }
}
