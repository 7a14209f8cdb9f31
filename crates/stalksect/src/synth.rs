//! Seeded synthetic population generation.
//!
//! Draws boundary parameters uniformly from configured ranges, renders the
//! exterior and a thickness-derived interior, registers the pair, and files
//! the rows into a fresh population store. The same seed always produces
//! the same store.

use std::f64::consts::PI;
use std::fmt;

use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::ellipse::ellipse_from_extents;
use crate::math::mean;
use crate::population::{SectionRepo, SectionRow, StoreError};
use crate::registration::{register_sample, RegistrationError, MIN_GRID};
use crate::shape::{closed_boundary_points, ShapeParameters};

/// Uniform sampling ranges for each generated parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthRanges {
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
    /// Rind thickness as a fraction of the minor semi-axis. Must stay below
    /// 0.5 so the interior cannot collapse.
    pub rind_thickness_frac: [f64; 2],
}

impl Default for SynthRanges {
    fn default() -> Self {
        Self {
            major_diameter: [15.0, 25.0],
            minor_diameter: [15.0, 20.0],
            notch_depth: [0.5, 2.5],
            notch_width: [0.5, 1.5],
            notch_location: [PI - 0.5, PI + 0.5],
            rotation: [-0.2, 0.2],
            x_shift: [-2.0, 2.0],
            y_shift: [-2.0, 2.0],
            x_asym_amplitude: [0.0, 0.8],
            x_asym_phase: [-PI, PI],
            y_asym_amplitude: [0.0, 0.8],
            y_asym_phase: [-PI, PI],
            rind_thickness_frac: [0.12, 0.22],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthConfig {
    /// Shared angular grid of the generated store.
    pub n_theta: usize,
    /// Slice positions to populate; every stalk appears at every position.
    pub slices: Vec<i32>,
    pub stalks_per_slice: u32,
    pub seed: u64,
    pub ranges: SynthRanges,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            n_theta: 360,
            slices: vec![0],
            stalks_per_slice: 50,
            seed: 7,
            ranges: SynthRanges::default(),
        }
    }
}

#[derive(Debug)]
pub enum SynthError {
    Config(String),
    Registration(RegistrationError),
    Store(StoreError),
}

impl fmt::Display for SynthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "invalid synthesis config: {msg}"),
            Self::Registration(e) => write!(f, "generated boundary failed registration: {e}"),
            Self::Store(e) => write!(f, "could not file generated sample: {e}"),
        }
    }
}

impl std::error::Error for SynthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(_) => None,
            Self::Registration(e) => Some(e),
            Self::Store(e) => Some(e),
        }
    }
}

impl From<RegistrationError> for SynthError {
    fn from(e: RegistrationError) -> Self {
        Self::Registration(e)
    }
}

impl From<StoreError> for SynthError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// Generate a complete registered population from `config`.
pub fn synthesize_population(config: &SynthConfig) -> Result<SectionRepo, SynthError> {
    validate_config(config).map_err(SynthError::Config)?;
    tracing::info!(
        n_theta = config.n_theta,
        n_slices = config.slices.len(),
        stalks_per_slice = config.stalks_per_slice,
        seed = config.seed,
        "synthesizing population"
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut repo = SectionRepo::new(config.n_theta);

    for &slice in &config.slices {
        for stalk in 1..=config.stalks_per_slice {
            let params = draw_params(&mut rng, &config.ranges);
            let frac = draw(&mut rng, config.ranges.rind_thickness_frac);
            // uniform wall: both diameters lose twice the absolute thickness
            let thickness = frac * 0.5 * params.minor_diameter;
            let interior_params = ShapeParameters {
                major_diameter: params.major_diameter - 2.0 * thickness,
                minor_diameter: params.minor_diameter - 2.0 * thickness,
                ..params
            };

            let exterior = closed_boundary_points(&params, config.n_theta);
            let interior = closed_boundary_points(&interior_params, config.n_theta);
            let sample = register_sample(&exterior, &interior, config.n_theta)?;

            let exterior_ellipse = ellipse_from_extents(&sample.exterior)
                .ok_or(RegistrationError::DegenerateRadius)?;
            let interior_ellipse = ellipse_from_extents(&sample.interior)
                .ok_or(RegistrationError::DegenerateRadius)?;
            let gaps: Vec<f64> = sample
                .exterior
                .iter()
                .zip(sample.interior.iter())
                .map(|(e, i)| e - i)
                .collect();

            repo.insert_row(
                slice,
                SectionRow {
                    stalk,
                    exterior_radius: sample.exterior,
                    interior_radius: sample.interior,
                    exterior_ellipse,
                    interior_ellipse,
                    avg_rind_thickness: mean(&gaps),
                    scale: sample.transform.scale,
                    params: Some(params),
                },
            )?;
        }
    }

    tracing::info!(n_samples = repo.n_samples(), "population synthesized");
    Ok(repo)
}

fn draw(rng: &mut StdRng, range: [f64; 2]) -> f64 {
    if range[1] > range[0] {
        rng.gen_range(range[0]..range[1])
    } else {
        range[0]
    }
}

fn draw_params(rng: &mut StdRng, ranges: &SynthRanges) -> ShapeParameters {
    let major_diameter = draw(rng, ranges.major_diameter);
    // overlapping diameter ranges are legal; the draw is clamped so the
    // minor axis never exceeds the major
    let minor_diameter = draw(rng, ranges.minor_diameter).min(major_diameter);
    ShapeParameters {
        major_diameter,
        minor_diameter,
        notch_depth: draw(rng, ranges.notch_depth),
        notch_width: draw(rng, ranges.notch_width),
        notch_location: draw(rng, ranges.notch_location),
        rotation: draw(rng, ranges.rotation),
        x_shift: draw(rng, ranges.x_shift),
        y_shift: draw(rng, ranges.y_shift),
        x_asym_amplitude: draw(rng, ranges.x_asym_amplitude),
        x_asym_phase: draw(rng, ranges.x_asym_phase),
        y_asym_amplitude: draw(rng, ranges.y_asym_amplitude),
        y_asym_phase: draw(rng, ranges.y_asym_phase),
    }
}

fn validate_config(config: &SynthConfig) -> Result<(), String> {
    if config.n_theta < MIN_GRID {
        return Err(format!("angular grid {} is too coarse", config.n_theta));
    }
    if config.slices.is_empty() {
        return Err("no slice positions requested".to_string());
    }
    if config.stalks_per_slice == 0 {
        return Err("stalks_per_slice must be at least 1".to_string());
    }

    let r = &config.ranges;
    let named = [
        ("major_diameter", r.major_diameter),
        ("minor_diameter", r.minor_diameter),
        ("notch_depth", r.notch_depth),
        ("notch_width", r.notch_width),
        ("notch_location", r.notch_location),
        ("rotation", r.rotation),
        ("x_shift", r.x_shift),
        ("y_shift", r.y_shift),
        ("x_asym_amplitude", r.x_asym_amplitude),
        ("x_asym_phase", r.x_asym_phase),
        ("y_asym_amplitude", r.y_asym_amplitude),
        ("y_asym_phase", r.y_asym_phase),
        ("rind_thickness_frac", r.rind_thickness_frac),
    ];
    for (name, [lo, hi]) in named {
        if !lo.is_finite() || !hi.is_finite() || lo > hi {
            return Err(format!("range {name} = [{lo}, {hi}] is not an ordered interval"));
        }
    }
    if r.major_diameter[0] <= 0.0 || r.minor_diameter[0] <= 0.0 {
        return Err("diameters must be strictly positive".to_string());
    }
    if r.notch_depth[0] < 0.0 {
        return Err("notch depth cannot be negative".to_string());
    }
    if r.notch_width[0] <= 0.0 {
        return Err("notch width must be strictly positive".to_string());
    }
    if r.rind_thickness_frac[0] <= 0.0 || r.rind_thickness_frac[1] >= 0.5 {
        return Err("rind thickness fraction must lie in (0, 0.5)".to_string());
    }
    Ok(())
}
