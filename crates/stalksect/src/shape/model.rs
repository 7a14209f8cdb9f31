//! Evaluation of the notched-ellipse boundary model.
//!
//! One kernel serves both population synthesis and the boundary fitter so the
//! two can never drift apart on notch orientation or asymmetry conventions.

use std::f64::consts::PI;

use super::params::ShapeParameters;
use crate::math::theta_at;

/// Keeps the sech^2 argument finite for needle-thin notches.
const NOTCH_WIDTH_FLOOR: f64 = 1e-6;

/// Squared-hyperbolic-secant dent profile at angle `theta`.
fn notch_dent(depth: f64, width: f64, location: f64, theta: f64) -> f64 {
    let w = width.max(NOTCH_WIDTH_FLOOR);
    let u = (10.0 / w) * (theta - location);
    // cosh overflows to +inf for huge arguments; the quotient then underflows
    // to zero, which is the correct tail value.
    depth / u.cosh().powi(2)
}

/// Evaluate the boundary model at a single parameter angle.
///
/// The dent displacement is rotated by `notch_location - π` so the notch sits
/// at the configured angle rather than at the model's fixed reference angle.
pub fn boundary_point(params: &ShapeParameters, theta: f64) -> [f64; 2] {
    let a = 0.5 * params.major_diameter;
    let b = 0.5 * params.minor_diameter;
    let phi = params.notch_location - PI;
    let dent = notch_dent(
        params.notch_depth,
        params.notch_width,
        params.notch_location,
        theta,
    );

    let x0 = a * theta.cos()
        + params.x_asym_amplitude * (theta - params.x_asym_phase).sin()
        + dent * phi.cos();
    let y0 = b * theta.sin()
        + params.y_asym_amplitude * (theta - params.y_asym_phase).sin()
        + dent * phi.sin();

    let (sin_r, cos_r) = params.rotation.sin_cos();
    [
        cos_r * x0 - sin_r * y0 + params.x_shift,
        sin_r * x0 + cos_r * y0 + params.y_shift,
    ]
}

/// Sample the boundary at `n_theta` uniform angles over `[0, 2π)`.
///
/// The closing point is *not* repeated; see [`closed_boundary_points`] for
/// the closed-polyline convention used by downstream exports.
pub fn boundary_points(params: &ShapeParameters, n_theta: usize) -> Vec<[f64; 2]> {
    (0..n_theta)
        .map(|i| boundary_point(params, theta_at(i, n_theta)))
        .collect()
}

/// Sample the boundary and repeat the first point at the end, yielding a
/// closed polyline of `n_theta + 1` points.
pub fn closed_boundary_points(params: &ShapeParameters, n_theta: usize) -> Vec<[f64; 2]> {
    let mut pts = boundary_points(params, n_theta);
    if let Some(first) = pts.first().copied() {
        pts.push(first);
    }
    pts
}
