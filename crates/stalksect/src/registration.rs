//! Boundary-curve registration onto the shared angular grid.
//!
//! Registration removes position, scale, and notch orientation from a closed
//! boundary so curves from different stalks become directly comparable:
//!
//! 1. resample the polyline radially onto `n_theta` uniform angles about its
//!    centroid, iterating the center until the resampled centroid vanishes,
//! 2. divide by the mean radius (unit characteristic size),
//! 3. circularly shift indices so the notch sits at the grid angle π.
//!
//! The notch is located as the deepest inward excursion against an ellipse
//! baseline oriented along the curve's own axes. Registering an
//! already-registered curve is an identity up to floating error.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ellipse::ellipse_from_extents;
use crate::math::{mean, theta_at, wrap_angle};

/// Fewest boundary points accepted for resampling.
pub const MIN_BOUNDARY_POINTS: usize = 8;

/// Coarsest angular grid accepted for registration.
pub const MIN_GRID: usize = 8;

const CENTERING_MAX_ITERS: usize = 32;
const CENTERING_TOL: f64 = 1e-13;

#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationError {
    TooFewPoints { needed: usize, got: usize },
    InvalidGrid { n_theta: usize },
    NonFiniteInput,
    DegenerateRadius,
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooFewPoints { needed, got } => {
                write!(f, "boundary has {got} points, need at least {needed}")
            }
            Self::InvalidGrid { n_theta } => {
                write!(f, "angular grid of {n_theta} points is too coarse")
            }
            Self::NonFiniteInput => write!(f, "boundary contains non-finite coordinates"),
            Self::DegenerateRadius => {
                write!(f, "boundary collapses to a degenerate radius about its centroid")
            }
        }
    }
}

impl std::error::Error for RegistrationError {}

/// Similarity transform removed from a curve during registration.
///
/// Kept so physical coordinates can be restored downstream: multiply
/// registered radii by `scale` and rotate indices back by `shift`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegistrationTransform {
    /// Resampling center in the input frame.
    pub center: [f64; 2],
    /// Mean radius divided out (input length units per registered unit).
    pub scale: f64,
    /// Circular index offset: `registered[j] = resampled[(j + shift) % n]`.
    pub shift: usize,
}

/// An exterior/interior pair registered into one shared frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredSample {
    pub exterior: Vec<f64>,
    pub interior: Vec<f64>,
    pub transform: RegistrationTransform,
}

/// Register a single closed boundary. Returns the registered radius vector
/// and the transform that was removed.
pub fn register_curve(
    points: &[[f64; 2]],
    n_theta: usize,
) -> Result<(Vec<f64>, RegistrationTransform), RegistrationError> {
    let pts = validated(points, n_theta)?;
    let (radii, center) = center_and_resample(pts, n_theta)?;
    finish(radii, center, n_theta)
}

/// Register an exterior boundary, then carry its interior partner through the
/// exact same transform so the pair stays geometrically consistent.
pub fn register_sample(
    exterior: &[[f64; 2]],
    interior: &[[f64; 2]],
    n_theta: usize,
) -> Result<RegisteredSample, RegistrationError> {
    let ext_pts = validated(exterior, n_theta)?;
    let int_pts = validated(interior, n_theta)?;

    let (ext_radii, center) = center_and_resample(ext_pts, n_theta)?;
    let (ext_registered, transform) = finish(ext_radii, center, n_theta)?;

    let int_resampled = resample_about(int_pts, transform.center, n_theta);
    let interior = (0..n_theta)
        .map(|j| int_resampled[(j + transform.shift) % n_theta] / transform.scale)
        .collect();

    Ok(RegisteredSample {
        exterior: ext_registered,
        interior,
        transform,
    })
}

/// Render a registered radius vector back into Cartesian points on the grid.
pub fn radii_to_points(radii: &[f64]) -> Vec<[f64; 2]> {
    let n = radii.len();
    radii
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let (sin_t, cos_t) = theta_at(i, n).sin_cos();
            [r * cos_t, r * sin_t]
        })
        .collect()
}

fn validated<'a>(
    points: &'a [[f64; 2]],
    n_theta: usize,
) -> Result<&'a [[f64; 2]], RegistrationError> {
    if n_theta < MIN_GRID {
        return Err(RegistrationError::InvalidGrid { n_theta });
    }
    if points.iter().flatten().any(|c| !c.is_finite()) {
        return Err(RegistrationError::NonFiniteInput);
    }
    // drop the closing duplicate if the polyline carries one
    let pts = match points {
        [head @ .., last] if head.first() == Some(last) => head,
        other => other,
    };
    if pts.len() < MIN_BOUNDARY_POINTS {
        return Err(RegistrationError::TooFewPoints {
            needed: MIN_BOUNDARY_POINTS,
            got: pts.len(),
        });
    }
    Ok(pts)
}

/// Resample about the point centroid, iterating the center until the
/// resampled curve's own centroid vanishes. The fixed point makes
/// registration idempotent.
fn center_and_resample(
    pts: &[[f64; 2]],
    n_theta: usize,
) -> Result<(Vec<f64>, [f64; 2]), RegistrationError> {
    let mut center = centroid(pts);
    let mut radii = resample_about(pts, center, n_theta);

    for _ in 0..CENTERING_MAX_ITERS {
        let m = mean(&radii);
        if !(m > 0.0) || !m.is_finite() {
            return Err(RegistrationError::DegenerateRadius);
        }
        let drift = polar_centroid(&radii);
        if drift[0].hypot(drift[1]) <= CENTERING_TOL * m {
            break;
        }
        // the resampled centroid responds to a center shift with factor -1/2
        // on a uniform grid, so the doubled step cancels the drift
        center = [center[0] + 2.0 * drift[0], center[1] + 2.0 * drift[1]];
        radii = resample_about(pts, center, n_theta);
    }
    Ok((radii, center))
}

fn finish(
    mut radii: Vec<f64>,
    center: [f64; 2],
    n_theta: usize,
) -> Result<(Vec<f64>, RegistrationTransform), RegistrationError> {
    let scale = mean(&radii);
    if !(scale > 0.0) || !scale.is_finite() {
        return Err(RegistrationError::DegenerateRadius);
    }
    for r in &mut radii {
        *r /= scale;
    }

    let shift = notch_shift(&radii)?;
    let registered = (0..n_theta)
        .map(|j| radii[(j + shift) % n_theta])
        .collect();

    Ok((
        registered,
        RegistrationTransform {
            center,
            scale,
            shift,
        },
    ))
}

/// Index offset that moves the deepest inward ellipse residual to θ = π.
///
/// The baseline is evaluated along the curve's own axes: `axis_phase` and
/// the paired-extent semi-axes both commute with circular index shifts, so
/// the residual field shifts index-for-index with the input and
/// re-registration reproduces the same notch index even for strongly
/// eccentric sections.
fn notch_shift(radii: &[f64]) -> Result<usize, RegistrationError> {
    let n = radii.len();
    let ellipse = ellipse_from_extents(radii).ok_or(RegistrationError::DegenerateRadius)?;
    let phase = axis_phase(radii);
    let mut notch_idx = 0;
    let mut deepest = f64::MIN;
    for (i, r) in radii.iter().enumerate() {
        let residual = ellipse.radius_at(theta_at(i, n) - phase) - r;
        if residual > deepest {
            deepest = residual;
            notch_idx = i;
        }
    }
    // registered[j] = radii[(j + shift) % n] puts notch_idx at j = n/2
    Ok((notch_idx + n - n / 2) % n)
}

/// Major-axis direction of a radius vector, read off the phase of its second
/// circular harmonic. Shifting the input by k grid steps shifts the result
/// by exactly k·Δθ (mod π), and the π ambiguity is harmless because the
/// ellipse radius is π-periodic.
fn axis_phase(radii: &[f64]) -> f64 {
    let n = radii.len();
    let mut cos_sum = 0.0;
    let mut sin_sum = 0.0;
    for (i, r) in radii.iter().enumerate() {
        let (sin_2t, cos_2t) = (2.0 * theta_at(i, n)).sin_cos();
        cos_sum += r * cos_2t;
        sin_sum += r * sin_2t;
    }
    0.5 * sin_sum.atan2(cos_sum)
}

fn centroid(pts: &[[f64; 2]]) -> [f64; 2] {
    let n = pts.len() as f64;
    let sum = pts
        .iter()
        .fold([0.0, 0.0], |acc, p| [acc[0] + p[0], acc[1] + p[1]]);
    [sum[0] / n, sum[1] / n]
}

/// Centroid of the points a radius vector renders to.
fn polar_centroid(radii: &[f64]) -> [f64; 2] {
    let n = radii.len();
    let mut cx = 0.0;
    let mut cy = 0.0;
    for (i, r) in radii.iter().enumerate() {
        let (sin_t, cos_t) = theta_at(i, n).sin_cos();
        cx += r * cos_t;
        cy += r * sin_t;
    }
    [cx / n as f64, cy / n as f64]
}

/// Piecewise-linear radial resampling of a closed polyline about `center`.
fn resample_about(pts: &[[f64; 2]], center: [f64; 2], n_theta: usize) -> Vec<f64> {
    let two_pi = 2.0 * PI;
    let mut nodes: Vec<(f64, f64)> = pts
        .iter()
        .map(|p| {
            let dx = p[0] - center[0];
            let dy = p[1] - center[1];
            (wrap_angle(dy.atan2(dx)), dx.hypot(dy))
        })
        .collect();
    nodes.sort_by(|a, b| a.0.total_cmp(&b.0));

    let last = nodes.len() - 1;
    (0..n_theta)
        .map(|i| {
            let t = theta_at(i, n_theta);
            let k = nodes.partition_point(|&(phi, _)| phi <= t);
            let ((phi0, r0), (phi1, r1)) = if k == 0 {
                ((nodes[last].0 - two_pi, nodes[last].1), nodes[0])
            } else if k == nodes.len() {
                (nodes[last], (nodes[0].0 + two_pi, nodes[0].1))
            } else {
                (nodes[k - 1], nodes[k])
            };
            let span = phi1 - phi0;
            if span <= f64::EPSILON {
                r0
            } else {
                r0 + (r1 - r0) * (t - phi0) / span
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::theta_step;
    use crate::shape::{boundary_points, closed_boundary_points, ShapeParameters};
    use approx::assert_relative_eq;

    const N: usize = 360;

    fn notched() -> ShapeParameters {
        ShapeParameters {
            major_diameter: 20.0,
            minor_diameter: 17.0,
            notch_depth: 2.0,
            notch_width: 1.0,
            notch_location: PI + 0.4,
            rotation: 0.15,
            x_shift: 2.0,
            y_shift: -1.0,
            x_asym_amplitude: 0.4,
            x_asym_phase: 0.3,
            y_asym_amplitude: 0.3,
            y_asym_phase: -0.2,
        }
    }

    #[test]
    fn registration_is_idempotent() {
        let pts = closed_boundary_points(&notched(), N);
        let (radii, _) = register_curve(&pts, N).unwrap();

        let rendered = radii_to_points(&radii);
        let (again, transform) = register_curve(&rendered, N).unwrap();

        for (a, b) in radii.iter().zip(again.iter()) {
            assert!((a - b).abs() < 1e-9, "radii drifted: {a} vs {b}");
        }
        assert_relative_eq!(transform.scale, 1.0, epsilon = 1e-9);
        assert_eq!(transform.shift, 0);
    }

    #[test]
    fn eccentric_rotated_registration_is_idempotent() {
        // a narrow notch on a strongly eccentric, rotated section; the
        // residual extrema of the rotated base ellipse dwarf the notch here
        // unless the baseline follows the axes
        let params = ShapeParameters {
            major_diameter: 30.0,
            minor_diameter: 8.0,
            notch_depth: 3.0,
            notch_width: 0.2,
            rotation: 0.7,
            ..ShapeParameters::default()
        };
        let n = 128;
        let pts = closed_boundary_points(&params, n);
        let (radii, _) = register_curve(&pts, n).unwrap();

        let rendered = radii_to_points(&radii);
        let (again, transform) = register_curve(&rendered, n).unwrap();

        assert_eq!(transform.shift, 0);
        for (a, b) in radii.iter().zip(again.iter()) {
            assert!((a - b).abs() < 1e-9, "radii drifted: {a} vs {b}");
        }
    }

    #[test]
    fn registered_curve_has_unit_mean_and_zero_centroid() {
        let pts = closed_boundary_points(&notched(), N);
        let (radii, _) = register_curve(&pts, N).unwrap();

        assert_relative_eq!(mean(&radii), 1.0, epsilon = 1e-12);
        let c = polar_centroid(&radii);
        assert!(c[0].hypot(c[1]) < 1e-9);
    }

    #[test]
    fn notch_lands_at_pi() {
        let pts = closed_boundary_points(&notched(), N);
        let (radii, _) = register_curve(&pts, N).unwrap();

        let deepest = (0..N)
            .min_by(|&a, &b| radii[a].total_cmp(&radii[b]))
            .unwrap();
        let off = (deepest as i64 - (N / 2) as i64).abs();
        assert!(off <= 1, "deepest radius at {deepest}, expected near {}", N / 2);

        // the dent is a clear feature of the registered curve
        assert!(radii[N / 2] < 0.95);
    }

    #[test]
    fn grid_aligned_rotation_is_removed() {
        let base = notched();
        let rotated = ShapeParameters {
            rotation: base.rotation + 40.0 * theta_step(N),
            x_shift: -3.0,
            y_shift: 4.0,
            ..base
        };

        let (r0, _) = register_curve(&boundary_points(&base, N), N).unwrap();
        let (r1, _) = register_curve(&boundary_points(&rotated, N), N).unwrap();
        for (a, b) in r0.iter().zip(r1.iter()) {
            assert!((a - b).abs() < 1e-6, "rotation leaked into frame: {a} vs {b}");
        }
    }

    #[test]
    fn interior_shares_exterior_transform() {
        let ext = notched();
        let int = ShapeParameters {
            major_diameter: ext.major_diameter - 3.0,
            minor_diameter: ext.minor_diameter - 3.0,
            ..ext
        };
        let sample = register_sample(
            &closed_boundary_points(&ext, N),
            &closed_boundary_points(&int, N),
            N,
        )
        .unwrap();

        // interior stays strictly inside the exterior in the shared frame
        for (e, i) in sample.exterior.iter().zip(sample.interior.iter()) {
            assert!(i < e);
            assert!(*i > 0.0);
        }
        // both dents sit together at the aligned angle
        let gap_at_notch = sample.exterior[N / 2] - sample.interior[N / 2];
        assert!(gap_at_notch > 0.0);
    }

    #[test]
    fn rejects_bad_inputs() {
        let few = [[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0]];
        assert_eq!(
            register_curve(&few, N),
            Err(RegistrationError::TooFewPoints { needed: 8, got: 3 })
        );

        let mut pts = closed_boundary_points(&notched(), N);
        pts[17] = [f64::NAN, 0.0];
        assert_eq!(register_curve(&pts, N), Err(RegistrationError::NonFiniteInput));

        let pts = closed_boundary_points(&notched(), N);
        assert_eq!(
            register_curve(&pts, 4),
            Err(RegistrationError::InvalidGrid { n_theta: 4 })
        );
    }

    #[test]
    fn open_and_closed_polylines_agree() {
        let open = boundary_points(&notched(), N);
        let closed = closed_boundary_points(&notched(), N);
        let (r_open, _) = register_curve(&open, N).unwrap();
        let (r_closed, _) = register_curve(&closed, N).unwrap();
        assert_eq!(r_open, r_closed);
    }
}
