//! Principal-component basis over registered boundary samples.
//!
//! The basis is built once per population and channel from the sample
//! matrix (one row per cross-section), mean-centered, and decomposed by
//! SVD. Components are stored in descending explained-variance order
//! together with the per-sample projection coefficients, so reconstruction
//! never needs the original matrix again.

use std::fmt;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Boundary channel a basis describes.
///
/// Radius channels hold ellipse-residual data in the analysis pipeline;
/// coordinate channels hold raw registered coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasisChannel {
    ExteriorRadius,
    InteriorRadius,
    X,
    Y,
}

impl fmt::Display for BasisChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExteriorRadius => "exterior_radius",
            Self::InteriorRadius => "interior_radius",
            Self::X => "x",
            Self::Y => "y",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BasisError {
    EmptyInput,
    RowLengthMismatch { expected: usize, got: usize },
    NonFiniteInput,
    NumericalFailure,
}

impl fmt::Display for BasisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "cannot build a basis from an empty sample matrix"),
            Self::RowLengthMismatch { expected, got } => {
                write!(f, "sample row has {got} values, expected {expected}")
            }
            Self::NonFiniteInput => write!(f, "sample matrix contains non-finite values"),
            Self::NumericalFailure => write!(f, "singular value decomposition failed"),
        }
    }
}

impl std::error::Error for BasisError {}

/// Orthonormal component basis with explained variance and stored
/// per-sample coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcBasis {
    pub channel: BasisChannel,
    /// Column mean of the sample matrix.
    pub mean: Vec<f64>,
    /// Unit-norm components, descending explained variance. At most
    /// `samples - 1` entries survive mean-centering.
    pub components: Vec<Vec<f64>>,
    /// Explained variance per component, percent of total.
    pub explained_pct: Vec<f64>,
    /// Projection coefficients; `coefficients[s][k]` pairs sample `s` with
    /// `components[k]`.
    pub coefficients: Vec<Vec<f64>>,
}

impl PcBasis {
    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    pub fn n_samples(&self) -> usize {
        self.coefficients.len()
    }

    pub fn n_points(&self) -> usize {
        self.mean.len()
    }

    /// Smallest K whose cumulative explained variance first exceeds
    /// `threshold_pct`. The crossing component is always included; if the
    /// threshold is never reached the full rank is returned.
    pub fn select_components(&self, threshold_pct: f64) -> usize {
        let mut cumulative = 0.0;
        for (k, pct) in self.explained_pct.iter().enumerate() {
            cumulative += pct;
            if cumulative > threshold_pct {
                return k + 1;
            }
        }
        self.explained_pct.len()
    }

    /// Mean plus the leading components weighted by `coeffs`. Extra
    /// coefficients beyond the stored rank are ignored.
    pub fn reconstruct_from(&self, coeffs: &[f64]) -> Vec<f64> {
        let mut out = self.mean.clone();
        for (c, component) in coeffs.iter().zip(self.components.iter()) {
            for (o, v) in out.iter_mut().zip(component.iter()) {
                *o += c * v;
            }
        }
        out
    }

    /// Reconstruction of stored sample `sample` truncated to `k` components.
    /// `k` larger than the stored rank uses the full rank.
    ///
    /// Panics if `sample` is out of range.
    pub fn reconstruct_row(&self, sample: usize, k: usize) -> Vec<f64> {
        let coeffs = &self.coefficients[sample];
        let k = k.min(coeffs.len());
        self.reconstruct_from(&coeffs[..k])
    }

    /// Projection coefficients of an arbitrary row against this basis.
    pub fn project(&self, row: &[f64]) -> Vec<f64> {
        self.components
            .iter()
            .map(|component| {
                row.iter()
                    .zip(self.mean.iter())
                    .zip(component.iter())
                    .map(|((x, m), v)| (x - m) * v)
                    .sum()
            })
            .collect()
    }
}

/// Copy of `base` with the coefficient at `component` scaled by
/// `multiplier`, for one-parameter sensitivity reconstructions.
pub fn perturbed_coefficients(base: &[f64], component: usize, multiplier: f64) -> Vec<f64> {
    let mut out = base.to_vec();
    if let Some(c) = out.get_mut(component) {
        *c *= multiplier;
    }
    out
}

/// Build a basis from one row per sample. Rows must share a common length.
pub fn build_basis(channel: BasisChannel, rows: &[Vec<f64>]) -> Result<PcBasis, BasisError> {
    let n_samples = rows.len();
    let n_points = rows.first().map(Vec::len).unwrap_or(0);
    if n_samples == 0 || n_points == 0 {
        return Err(BasisError::EmptyInput);
    }
    for row in rows {
        if row.len() != n_points {
            return Err(BasisError::RowLengthMismatch {
                expected: n_points,
                got: row.len(),
            });
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(BasisError::NonFiniteInput);
        }
    }

    let mut mean = vec![0.0; n_points];
    for row in rows {
        for (m, v) in mean.iter_mut().zip(row.iter()) {
            *m += v;
        }
    }
    for m in &mut mean {
        *m /= n_samples as f64;
    }

    let centered: Vec<Vec<f64>> = rows
        .iter()
        .map(|row| row.iter().zip(mean.iter()).map(|(v, m)| v - m).collect())
        .collect();

    let matrix = DMatrix::from_row_iterator(
        n_samples,
        n_points,
        centered.iter().flat_map(|row| row.iter().copied()),
    );
    let svd = matrix.svd(false, true);
    let Some(v_t) = svd.v_t else {
        return Err(BasisError::NumericalFailure);
    };

    // order explicitly by descending singular value
    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));

    // mean-centering leaves at most n_samples - 1 independent directions
    let rank = n_samples.saturating_sub(1).min(n_points);
    let total_var: f64 = svd.singular_values.iter().map(|s| s * s).sum();

    let mut components = Vec::with_capacity(rank);
    let mut explained_pct = Vec::with_capacity(rank);
    for &idx in order.iter().take(rank) {
        components.push(v_t.row(idx).iter().copied().collect::<Vec<f64>>());
        let share = if total_var > 0.0 {
            let s = svd.singular_values[idx];
            100.0 * s * s / total_var
        } else {
            0.0
        };
        explained_pct.push(share);
    }

    let coefficients: Vec<Vec<f64>> = centered
        .iter()
        .map(|row| {
            components
                .iter()
                .map(|component| {
                    row.iter()
                        .zip(component.iter())
                        .map(|(x, v)| x * v)
                        .sum()
                })
                .collect()
        })
        .collect();

    tracing::debug!(
        channel = %channel,
        n_samples,
        n_points,
        rank,
        "principal-component basis built"
    );

    Ok(PcBasis {
        channel,
        mean,
        components,
        explained_pct,
        coefficients,
    })
}
