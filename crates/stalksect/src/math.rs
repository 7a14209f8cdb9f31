//! Small shared numeric helpers used across the analysis stages.

use std::f64::consts::PI;

/// Angular step of an `n_theta`-point uniform grid over `[0, 2π)`.
#[inline]
pub fn theta_step(n_theta: usize) -> f64 {
    2.0 * PI / n_theta as f64
}

/// Angle of grid node `i` on an `n_theta`-point uniform grid.
#[inline]
pub fn theta_at(i: usize, n_theta: usize) -> f64 {
    i as f64 * theta_step(n_theta)
}

/// Arithmetic mean. Returns 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Percentile of an ascending-sorted slice with linear interpolation
/// between adjacent order statistics. `q` is a fraction in `[0, 1]`.
///
/// Returns 0.0 for an empty slice so callers can skip the empty check.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = (sorted.len() - 1) as f64 * q.clamp(0.0, 1.0);
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = pos - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}

/// Central-difference derivative of a closed periodic signal sampled on a
/// uniform grid with step `step`. Index arithmetic wraps, so the result has
/// no one-sided ends.
pub fn cyclic_derivative(values: &[f64], step: f64) -> Vec<f64> {
    let n = values.len();
    if n < 3 {
        return vec![0.0; n];
    }
    let inv = 1.0 / (2.0 * step);
    (0..n)
        .map(|i| {
            let prev = values[(i + n - 1) % n];
            let next = values[(i + 1) % n];
            (next - prev) * inv
        })
        .collect()
}

/// Normalize an angle into `[0, 2π)`.
pub fn wrap_angle(theta: f64) -> f64 {
    let two_pi = 2.0 * PI;
    let mut t = theta % two_pi;
    if t < 0.0 {
        t += two_pi;
    }
    t
}
