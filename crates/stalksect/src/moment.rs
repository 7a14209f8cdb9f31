//! Polar second moment of area over closed radial boundaries.
//!
//! The integral `J = ∬ ρ² dA` is evaluated on the registered grid by
//! summing midpoint rings: each angular wedge `Δθ` contributes
//! `Σ ρ_m³ · dr · Δθ` over ring midpoints `ρ_m = (m + ½)·dr` that stay
//! inside the boundary. Accuracy is first order in `dr` and `Δθ`; both
//! sides of an error comparison use the same rule, so the discretization
//! largely cancels.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ellipse::RadialEllipse;
use crate::math::{theta_at, theta_step};

/// Anything that exposes a closed boundary as radii on the uniform grid.
pub trait RadialBoundary {
    fn n_theta(&self) -> usize;
    fn radius(&self, i: usize) -> f64;
}

impl RadialBoundary for [f64] {
    fn n_theta(&self) -> usize {
        self.len()
    }

    fn radius(&self, i: usize) -> f64 {
        self[i]
    }
}

impl RadialBoundary for Vec<f64> {
    fn n_theta(&self) -> usize {
        self.len()
    }

    fn radius(&self, i: usize) -> f64 {
        self[i]
    }
}

/// Ellipse sampled on an `n_theta` grid, viewable as a radial boundary.
#[derive(Debug, Clone, Copy)]
pub struct EllipseBoundary {
    pub ellipse: RadialEllipse,
    pub n_theta: usize,
}

impl RadialBoundary for EllipseBoundary {
    fn n_theta(&self) -> usize {
        self.n_theta
    }

    fn radius(&self, i: usize) -> f64 {
        self.ellipse.radius_at(theta_at(i, self.n_theta))
    }
}

/// Radial integration step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentConfig {
    /// Ring thickness in boundary units. Registered curves have unit mean
    /// radius, so the default yields on the order of a hundred rings.
    pub dr: f64,
}

impl Default for MomentConfig {
    fn default() -> Self {
        Self { dr: 1e-2 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MomentError {
    InvalidStep { dr: f64 },
    EmptyBoundary,
    NonPositiveRadius { index: usize, radius: f64 },
    NegativeRind { total: f64, pith: f64 },
}

impl fmt::Display for MomentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStep { dr } => write!(f, "radial step {dr} is not positive and finite"),
            Self::EmptyBoundary => write!(f, "boundary has no angular samples"),
            Self::NonPositiveRadius { index, radius } => {
                write!(f, "boundary radius {radius} at sample {index} is not positive")
            }
            Self::NegativeRind { total, pith } => write!(
                f,
                "interior moment {pith} exceeds exterior moment {total}; boundaries cross"
            ),
        }
    }
}

impl std::error::Error for MomentError {}

/// Polar moment of the region enclosed by one boundary.
///
/// Wedges thinner than one ring step integrate as a single midpoint slab
/// over `[0, r]`, so any boundary with positive radii yields a strictly
/// positive moment.
pub fn polar_moment<B>(boundary: &B, config: &MomentConfig) -> Result<f64, MomentError>
where
    B: RadialBoundary + ?Sized,
{
    let dr = config.dr;
    if !(dr > 0.0) || !dr.is_finite() {
        return Err(MomentError::InvalidStep { dr });
    }
    let n = boundary.n_theta();
    if n == 0 {
        return Err(MomentError::EmptyBoundary);
    }
    let dtheta = theta_step(n);

    let mut total = 0.0;
    for i in 0..n {
        let r = boundary.radius(i);
        if !(r > 0.0) || !r.is_finite() {
            return Err(MomentError::NonPositiveRadius { index: i, radius: r });
        }
        // midpoint rings: ρ_m = (m + ½)·dr while ρ_m ≤ r
        let rings = (r / dr + 0.5).floor() as u64;
        if rings == 0 {
            total += (0.5 * r).powi(3) * r * dtheta;
            continue;
        }
        let mut wedge = 0.0;
        for m in 0..rings {
            let rho = (m as f64 + 0.5) * dr;
            wedge += rho * rho * rho;
        }
        total += wedge * dr * dtheta;
    }
    Ok(total)
}

/// Pith and rind polar moments of a cross-section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionMoments {
    /// Moment of the interior (pith) region.
    pub pith: f64,
    /// Moment of the annulus between interior and exterior.
    pub rind: f64,
}

impl SectionMoments {
    pub fn total(&self) -> f64 {
        self.pith + self.rind
    }
}

/// Evaluate both regions of a section. The rind is always the difference of
/// whole-section and pith moments, never integrated separately, so the two
/// regions exactly tile the section.
pub fn section_moments<E, I>(
    exterior: &E,
    interior: &I,
    config: &MomentConfig,
) -> Result<SectionMoments, MomentError>
where
    E: RadialBoundary + ?Sized,
    I: RadialBoundary + ?Sized,
{
    let total = polar_moment(exterior, config)?;
    let pith = polar_moment(interior, config)?;
    let rind = total - pith;
    if rind < 0.0 {
        return Err(MomentError::NegativeRind { total, pith });
    }
    Ok(SectionMoments { pith, rind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn fine() -> MomentConfig {
        MomentConfig { dr: 1e-3 }
    }

    #[test]
    fn circle_matches_closed_form() {
        for radius in [0.5, 1.0, 2.0] {
            let boundary = vec![radius; 360];
            let j = polar_moment(&boundary, &fine()).unwrap();
            let expected = 0.5 * PI * radius.powi(4);
            assert_relative_eq!(j, expected, max_relative = 5e-3);
        }
    }

    #[test]
    fn ellipse_boundary_matches_closed_form() {
        // J for an ellipse: π a b (a² + b²) / 4
        let e = EllipseBoundary {
            ellipse: RadialEllipse {
                semi_major: 1.5,
                semi_minor: 1.0,
            },
            n_theta: 720,
        };
        let j = polar_moment(&e, &fine()).unwrap();
        let expected = PI * 1.5 * 1.0 * (1.5 * 1.5 + 1.0) / 4.0;
        assert_relative_eq!(j, expected, max_relative = 5e-3);
    }

    #[test]
    fn annulus_rind_is_difference() {
        let outer = vec![2.0; 360];
        let inner = vec![1.0; 360];
        let m = section_moments(&outer, &inner, &fine()).unwrap();
        assert_relative_eq!(m.pith, 0.5 * PI, max_relative = 5e-3);
        assert_relative_eq!(m.rind, 0.5 * PI * 15.0, max_relative = 5e-3);
        assert_relative_eq!(m.total(), 0.5 * PI * 16.0, max_relative = 5e-3);
    }

    #[test]
    fn crossing_boundaries_are_an_error() {
        let outer = vec![1.0; 90];
        let inner = vec![1.5; 90];
        match section_moments(&outer, &inner, &fine()) {
            Err(MomentError::NegativeRind { .. }) => {}
            other => panic!("expected NegativeRind, got {other:?}"),
        }
    }

    #[test]
    fn sub_ring_radii_still_contribute() {
        // radii below dr/2 fit no ring midpoint; the slab fallback keeps
        // the moment positive and monotone in r
        let cfg = MomentConfig::default();
        let thin = vec![0.004; 90];
        let tiny = polar_moment(&thin, &cfg).unwrap();
        assert!(tiny > 0.0, "expected a positive moment, got {tiny}");
        let thicker = vec![0.008; 90];
        let larger = polar_moment(&thicker, &cfg).unwrap();
        assert!(larger > tiny);
    }

    #[test]
    fn bad_radii_are_rejected() {
        let zero = vec![0.0; 16];
        assert!(matches!(
            polar_moment(&zero, &fine()),
            Err(MomentError::NonPositiveRadius { .. })
        ));

        let mut nan = vec![1.0; 16];
        nan[3] = f64::NAN;
        assert!(matches!(
            polar_moment(&nan, &fine()),
            Err(MomentError::NonPositiveRadius { index: 3, .. })
        ));
    }

    #[test]
    fn bad_step_is_rejected() {
        let boundary = vec![1.0; 16];
        assert!(matches!(
            polar_moment(&boundary, &MomentConfig { dr: 0.0 }),
            Err(MomentError::InvalidStep { .. })
        ));
    }

    #[test]
    fn slice_and_vec_views_agree() {
        let radii = vec![1.2; 90];
        let cfg = MomentConfig::default();
        let from_vec = polar_moment(&radii, &cfg).unwrap();
        let from_slice = polar_moment(radii.as_slice(), &cfg).unwrap();
        assert_eq!(from_vec, from_slice);
    }
}
