//! Parameter set and box bounds for the notched-ellipse boundary model.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Number of free parameters in [`ShapeParameters`].
pub const N_PARAMS: usize = 12;

/// Full parameter set of the notched-ellipse boundary model.
///
/// Angles are radians. Diameters, depths, and shifts share one length unit;
/// the model is agnostic about which unit that is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeParameters {
    /// Major (x-axis) diameter of the base ellipse.
    pub major_diameter: f64,
    /// Minor (y-axis) diameter of the base ellipse. Must not exceed
    /// `major_diameter`.
    pub minor_diameter: f64,
    /// Peak radial depth of the notch dent.
    pub notch_depth: f64,
    /// Angular width scale of the notch.
    pub notch_width: f64,
    /// Angular location of the notch center.
    pub notch_location: f64,
    /// Rigid rotation applied to the assembled curve.
    pub rotation: f64,
    /// Translation along x applied after rotation.
    pub x_shift: f64,
    /// Translation along y applied after rotation.
    pub y_shift: f64,
    /// Amplitude of the sinusoidal x asymmetry term.
    pub x_asym_amplitude: f64,
    /// Phase of the sinusoidal x asymmetry term.
    pub x_asym_phase: f64,
    /// Amplitude of the sinusoidal y asymmetry term.
    pub y_asym_amplitude: f64,
    /// Phase of the sinusoidal y asymmetry term.
    pub y_asym_phase: f64,
}

impl Default for ShapeParameters {
    fn default() -> Self {
        Self {
            major_diameter: 20.0,
            minor_diameter: 17.0,
            notch_depth: 1.0,
            notch_width: 1.0,
            notch_location: PI,
            rotation: 0.0,
            x_shift: 0.0,
            y_shift: 0.0,
            x_asym_amplitude: 0.25,
            x_asym_phase: 0.0,
            y_asym_amplitude: 0.25,
            y_asym_phase: 0.0,
        }
    }
}

impl ShapeParameters {
    /// All entries finite and the axis ordering constraint holds.
    pub fn is_feasible(&self) -> bool {
        let v = self.to_array();
        v.iter().all(|x| x.is_finite())
            && self.major_diameter > 0.0
            && self.minor_diameter > 0.0
            && self.minor_diameter <= self.major_diameter
            && self.notch_depth >= 0.0
            && self.notch_width > 0.0
    }

    pub(crate) fn to_array(self) -> [f64; N_PARAMS] {
        [
            self.major_diameter,
            self.minor_diameter,
            self.notch_depth,
            self.notch_width,
            self.notch_location,
            self.rotation,
            self.x_shift,
            self.y_shift,
            self.x_asym_amplitude,
            self.x_asym_phase,
            self.y_asym_amplitude,
            self.y_asym_phase,
        ]
    }

    pub(crate) fn from_array(v: [f64; N_PARAMS]) -> Self {
        Self {
            major_diameter: v[0],
            minor_diameter: v[1],
            notch_depth: v[2],
            notch_width: v[3],
            notch_location: v[4],
            rotation: v[5],
            x_shift: v[6],
            y_shift: v[7],
            x_asym_amplitude: v[8],
            x_asym_phase: v[9],
            y_asym_amplitude: v[10],
            y_asym_phase: v[11],
        }
    }
}

/// Per-parameter `[low, high]` box bounds used by synthesis ranges and the
/// boundary fitter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamBounds {
    pub major_diameter: [f64; 2],
    pub minor_diameter: [f64; 2],
    pub notch_depth: [f64; 2],
    pub notch_width: [f64; 2],
    pub notch_location: [f64; 2],
    pub rotation: [f64; 2],
    pub x_shift: [f64; 2],
    pub y_shift: [f64; 2],
    pub x_asym_amplitude: [f64; 2],
    pub x_asym_phase: [f64; 2],
    pub y_asym_amplitude: [f64; 2],
    pub y_asym_phase: [f64; 2],
}

impl Default for ParamBounds {
    fn default() -> Self {
        Self {
            major_diameter: [10.0, 30.0],
            minor_diameter: [8.0, 28.0],
            notch_depth: [0.0, 5.0],
            // lower bound keeps the sech^2 argument finite
            notch_width: [0.2, 2.5],
            notch_location: [0.5 * PI, 1.5 * PI],
            rotation: [-0.25 * PI, 0.25 * PI],
            x_shift: [-5.0, 5.0],
            y_shift: [-5.0, 5.0],
            x_asym_amplitude: [0.0, 2.0],
            x_asym_phase: [-PI, PI],
            y_asym_amplitude: [0.0, 2.0],
            y_asym_phase: [-PI, PI],
        }
    }
}

impl ParamBounds {
    /// Every interval is finite and ordered `low <= high`.
    pub fn is_valid(&self) -> bool {
        self.to_pairs()
            .iter()
            .all(|[lo, hi]| lo.is_finite() && hi.is_finite() && lo <= hi)
    }

    /// Fixed starting point for the fitter: the midpoint of every interval,
    /// with the minor diameter capped so the start is always feasible.
    pub fn initial_guess(&self) -> ShapeParameters {
        let pairs = self.to_pairs();
        let mut mid = [0.0; N_PARAMS];
        for (m, [lo, hi]) in mid.iter_mut().zip(pairs.iter()) {
            *m = 0.5 * (lo + hi);
        }
        let mut guess = ShapeParameters::from_array(mid);
        if guess.minor_diameter > guess.major_diameter {
            guess.minor_diameter = guess.major_diameter;
        }
        guess
    }

    /// Component-wise clamp of `p` into the box.
    pub fn clamp(&self, p: &ShapeParameters) -> ShapeParameters {
        let pairs = self.to_pairs();
        let mut v = p.to_array();
        for (x, [lo, hi]) in v.iter_mut().zip(pairs.iter()) {
            *x = x.clamp(*lo, *hi);
        }
        ShapeParameters::from_array(v)
    }

    pub(crate) fn to_pairs(self) -> [[f64; 2]; N_PARAMS] {
        [
            self.major_diameter,
            self.minor_diameter,
            self.notch_depth,
            self.notch_width,
            self.notch_location,
            self.rotation,
            self.x_shift,
            self.y_shift,
            self.x_asym_amplitude,
            self.x_asym_phase,
            self.y_asym_amplitude,
            self.y_asym_phase,
        ]
    }

    pub(crate) fn lower(&self) -> [f64; N_PARAMS] {
        self.to_pairs().map(|[lo, _]| lo)
    }

    pub(crate) fn upper(&self) -> [f64; N_PARAMS] {
        self.to_pairs().map(|[_, hi]| hi)
    }
}
