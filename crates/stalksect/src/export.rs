//! Export of reconstructed cross-sections for downstream structural tools.
//!
//! Consumers get closed Cartesian boundaries in the input's physical length
//! units, two reference points marking the loading axis, and the material
//! moduli the stiffness proxy assumed. Everything here is plain data; no
//! retained handles into the store.

use serde::{Deserialize, Serialize};

use crate::math::theta_at;
use crate::population::SampleKey;
use crate::reconstruct::ApproximationCase;

/// One exported cross-section approximation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionCase {
    pub key: SampleKey,
    pub case: ApproximationCase,
    /// Closed exterior outline (first point repeated last), physical units.
    pub exterior: Vec<[f64; 2]>,
    /// Closed interior outline in the same frame.
    pub interior: Vec<[f64; 2]>,
    /// Boundary points nearest the 90° and 270° parameter angles, marking
    /// the minor (loading) axis.
    pub reference_points: [[f64; 2]; 2],
    pub rind_modulus: f64,
    pub pith_modulus: f64,
}

/// Assemble an export case from registered-frame radius vectors.
///
/// `scale` restores physical units: it is the registration scale stored
/// with the sample.
pub fn section_case(
    key: SampleKey,
    case: ApproximationCase,
    exterior_radii: &[f64],
    interior_radii: &[f64],
    scale: f64,
    rind_modulus: f64,
    pith_modulus: f64,
) -> SectionCase {
    let exterior = closed_points(exterior_radii, scale);
    let interior = closed_points(interior_radii, scale);

    let n = exterior_radii.len();
    let i90 = quarter_index(n, 1);
    let i270 = quarter_index(n, 3);
    let reference_points = [exterior[i90], exterior[i270]];

    SectionCase {
        key,
        case,
        exterior,
        interior,
        reference_points,
        rind_modulus,
        pith_modulus,
    }
}

/// Grid index nearest `quarters` quarter-turns.
fn quarter_index(n: usize, quarters: usize) -> usize {
    ((n * quarters) as f64 / 4.0).round() as usize % n
}

fn closed_points(radii: &[f64], scale: f64) -> Vec<[f64; 2]> {
    let n = radii.len();
    let mut pts: Vec<[f64; 2]> = radii
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let (sin_t, cos_t) = theta_at(i, n).sin_cos();
            [scale * r * cos_t, scale * r * sin_t]
        })
        .collect();
    if let Some(first) = pts.first().copied() {
        pts.push(first);
    }
    pts
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn key() -> SampleKey {
        SampleKey { slice: 0, stalk: 3 }
    }

    #[test]
    fn outlines_are_closed_and_scaled() {
        let exterior = vec![1.0; 360];
        let interior = vec![0.8; 360];
        let case = section_case(
            key(),
            ApproximationCase::True,
            &exterior,
            &interior,
            9.5,
            850.0,
            26.0,
        );

        assert_eq!(case.exterior.len(), 361);
        assert_eq!(case.exterior[0], case.exterior[360]);
        assert_eq!(case.interior.len(), 361);
        assert_eq!(case.interior[0], case.interior[360]);

        assert_relative_eq!(case.exterior[0][0], 9.5, epsilon = 1e-12);
        assert_relative_eq!(case.interior[0][0], 7.6, epsilon = 1e-12);
        assert_eq!(case.rind_modulus, 850.0);
        assert_eq!(case.pith_modulus, 26.0);
    }

    #[test]
    fn reference_points_mark_the_minor_axis() {
        let exterior: Vec<f64> = (0..360)
            .map(|i| 1.0 + 0.1 * (theta_at(i, 360)).cos())
            .collect();
        let interior = vec![0.5; 360];
        let case = section_case(
            key(),
            ApproximationCase::Elliptical { n_components: 2 },
            &exterior,
            &interior,
            2.0,
            850.0,
            26.0,
        );

        // nearest 90°: x ≈ 0, y ≈ scale · r(90°)
        assert_relative_eq!(case.reference_points[0][0], 0.0, epsilon = 1e-9);
        assert_relative_eq!(case.reference_points[0][1], 2.0, epsilon = 1e-9);
        // nearest 270°
        assert_relative_eq!(case.reference_points[1][0], 0.0, epsilon = 1e-9);
        assert_relative_eq!(case.reference_points[1][1], -2.0, epsilon = 1e-9);
    }

    #[test]
    fn quarter_indices_round_on_coarse_grids() {
        assert_eq!(quarter_index(360, 1), 90);
        assert_eq!(quarter_index(360, 3), 270);
        assert_eq!(quarter_index(10, 1), 3);
        assert_eq!(quarter_index(10, 3), 8);
    }
}
