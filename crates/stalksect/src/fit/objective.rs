//! Fit objective: RMS distance between model and observed boundary.

use crate::math::theta_at;
use crate::shape::{boundary_point, ShapeParameters, N_PARAMS};

/// Point-wise RMS objective over an observed outline. Sample `i` of the
/// outline corresponds to model angle `2πi/n`; the fitter relies on this
/// angular pairing rather than nearest-point matching.
pub(super) struct Objective<'a> {
    target: &'a [[f64; 2]],
}

impl<'a> Objective<'a> {
    pub fn new(target: &'a [[f64; 2]]) -> Self {
        Self { target }
    }

    /// Candidate value. The axis-order constraint is enforced here as a
    /// hard rejection: infeasible candidates evaluate to `+inf`, which the
    /// simplex treats as strictly worse than any feasible vertex.
    pub fn evaluate(&self, x: &[f64; N_PARAMS]) -> f64 {
        let params = ShapeParameters::from_array(*x);
        if !params.is_feasible() {
            return f64::INFINITY;
        }
        rms_distance(&params, self.target)
    }
}

pub(super) fn rms_distance(params: &ShapeParameters, target: &[[f64; 2]]) -> f64 {
    let n = target.len();
    let mut sum_sq = 0.0;
    for (i, observed) in target.iter().enumerate() {
        let modeled = boundary_point(params, theta_at(i, n));
        let dx = modeled[0] - observed[0];
        let dy = modeled[1] - observed[1];
        sum_sq += dx * dx + dy * dy;
    }
    (sum_sq / n as f64).sqrt()
}
