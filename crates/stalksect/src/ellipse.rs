//! Axis-aligned ellipse baseline in the registered frame.

use serde::{Deserialize, Serialize};

use crate::math::theta_at;

/// Centered, axis-aligned ellipse described by its semi-axes.
///
/// This is the baseline every reconstruction starts from; residual
/// components are layered on top of its radius function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadialEllipse {
    /// Semi-axis along x.
    pub semi_major: f64,
    /// Semi-axis along y.
    pub semi_minor: f64,
}

impl RadialEllipse {
    pub fn from_diameters(major: f64, minor: f64) -> Self {
        Self {
            semi_major: 0.5 * major,
            semi_minor: 0.5 * minor,
        }
    }

    /// Both semi-axes finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.semi_major.is_finite()
            && self.semi_minor.is_finite()
            && self.semi_major > 0.0
            && self.semi_minor > 0.0
    }

    /// Polar radius at parameter angle `theta`.
    pub fn radius_at(&self, theta: f64) -> f64 {
        let a = self.semi_major;
        let b = self.semi_minor;
        let (sin_t, cos_t) = theta.sin_cos();
        a * b / ((b * cos_t).powi(2) + (a * sin_t).powi(2)).sqrt()
    }

    /// Radius sampled on the uniform `n_theta` grid.
    pub fn radii(&self, n_theta: usize) -> Vec<f64> {
        (0..n_theta)
            .map(|i| self.radius_at(theta_at(i, n_theta)))
            .collect()
    }
}

/// Estimate ellipse semi-axes from a registered radius vector by paired
/// half-diameters: opposite samples are averaged into one half-diameter per
/// direction, and the extremes over all directions give the axes.
///
/// Localized features pull individual directions off the ellipse, so the
/// extreme over all directions is less biased than any fixed pair.
/// Returns `None` for vectors shorter than four samples or with non-finite
/// entries.
pub fn ellipse_from_extents(radii: &[f64]) -> Option<RadialEllipse> {
    let n = radii.len();
    if n < 4 || radii.iter().any(|r| !r.is_finite()) {
        return None;
    }
    let half = n / 2;
    let mut semi_major = f64::MIN;
    let mut semi_minor = f64::MAX;
    for i in 0..half {
        let d = 0.5 * (radii[i] + radii[(i + half) % n]);
        semi_major = semi_major.max(d);
        semi_minor = semi_minor.min(d);
    }
    let ellipse = RadialEllipse {
        semi_major,
        semi_minor,
    };
    ellipse.is_valid().then_some(ellipse)
}
