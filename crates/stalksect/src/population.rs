//! Persisted population store of registered cross-section samples.
//!
//! The on-disk format is schema-tagged JSON: rows grouped into contiguous
//! blocks per slice position, with optional per-channel component bases
//! attached after a basis build. Loading validates the whole structure and
//! rebuilds the `(slice, stalk)` lookup index; lookups never scan.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::basis::{BasisChannel, PcBasis};
use crate::ellipse::RadialEllipse;
use crate::math::theta_at;
use crate::registration::MIN_GRID;
use crate::shape::ShapeParameters;

/// Schema tag expected in population files.
pub const POPULATION_SCHEMA_V1: &str = "stalksect.population.v1";

/// Compound row key: slice position along the stalk and stalk number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct SampleKey {
    /// Slice position identifier (e.g. millimetres from the node).
    pub slice: i32,
    /// Stalk number within the population, counted from 1.
    pub stalk: u32,
}

impl fmt::Display for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(slice {}, stalk {})", self.slice, self.stalk)
    }
}

/// One registered cross-section sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionRow {
    pub stalk: u32,
    /// Registered exterior radii on the shared grid, unit mean radius.
    pub exterior_radius: Vec<f64>,
    /// Registered interior radii in the exterior's frame.
    pub interior_radius: Vec<f64>,
    /// Ellipse baseline of the exterior channel.
    pub exterior_ellipse: RadialEllipse,
    /// Ellipse baseline of the interior channel.
    pub interior_ellipse: RadialEllipse,
    /// Mean exterior-to-interior gap, registered units.
    pub avg_rind_thickness: f64,
    /// Input length units per registered unit.
    pub scale: f64,
    /// Generating parameters, present for synthetic samples.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<ShapeParameters>,
}

/// Contiguous run of rows at one slice position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SliceBlock {
    pub slice: i32,
    pub rows: Vec<SectionRow>,
}

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Schema { found: String },
    Invalid(String),
    DuplicateKey { key: SampleKey },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "population store i/o error: {e}"),
            Self::Json(e) => write!(f, "population store is not valid JSON: {e}"),
            Self::Schema { found } => write!(
                f,
                "unsupported population schema {found:?}, expected {POPULATION_SCHEMA_V1:?}"
            ),
            Self::Invalid(msg) => write!(f, "population store failed validation: {msg}"),
            Self::DuplicateKey { key } => write!(f, "duplicate sample key {key}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PopulationFileV1 {
    schema: String,
    n_theta: usize,
    slices: Vec<SliceBlock>,
    #[serde(default)]
    bases: Vec<PcBasis>,
}

#[derive(Debug, Clone, Copy)]
struct RowLocation {
    block: usize,
    row: usize,
    flat: usize,
}

/// In-memory population store with keyed lookup.
#[derive(Debug, Clone)]
pub struct SectionRepo {
    n_theta: usize,
    slices: Vec<SliceBlock>,
    bases: Vec<PcBasis>,
    index: HashMap<SampleKey, RowLocation>,
}

impl SectionRepo {
    pub fn new(n_theta: usize) -> Self {
        Self {
            n_theta,
            slices: Vec::new(),
            bases: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn n_theta(&self) -> usize {
        self.n_theta
    }

    pub fn n_samples(&self) -> usize {
        self.index.len()
    }

    pub fn slices(&self) -> &[SliceBlock] {
        &self.slices
    }

    /// Slice positions in stored block order.
    pub fn slice_positions(&self) -> Vec<i32> {
        self.slices.iter().map(|b| b.slice).collect()
    }

    /// Append one row to its slice block. Rejects duplicate keys and rows
    /// that do not fit the store's grid. Any stored basis no longer covering
    /// every row is dropped; rebuild bases before the next analysis.
    pub fn insert_row(&mut self, slice: i32, row: SectionRow) -> Result<(), StoreError> {
        let key = SampleKey {
            slice,
            stalk: row.stalk,
        };
        if self.index.contains_key(&key) {
            return Err(StoreError::DuplicateKey { key });
        }
        validate_row(&row, self.n_theta).map_err(StoreError::Invalid)?;

        match self.slices.iter_mut().find(|b| b.slice == slice) {
            Some(block) => block.rows.push(row),
            None => self.slices.push(SliceBlock {
                slice,
                rows: vec![row],
            }),
        }
        self.rebuild_index();
        let total = self.index.len();
        let before = self.bases.len();
        self.bases.retain(|b| b.coefficients.len() == total);
        if self.bases.len() < before {
            tracing::debug!(
                key = %key,
                n_samples = total,
                "stored bases dropped after row insert"
            );
        }
        Ok(())
    }

    pub fn contains(&self, key: SampleKey) -> bool {
        self.index.contains_key(&key)
    }

    pub fn get(&self, key: SampleKey) -> Option<&SectionRow> {
        let loc = self.index.get(&key)?;
        Some(&self.slices[loc.block].rows[loc.row])
    }

    /// Position of the row in flat enumeration order; this is the sample
    /// index used by stored bases.
    pub fn flat_index(&self, key: SampleKey) -> Option<usize> {
        self.index.get(&key).map(|loc| loc.flat)
    }

    /// All keys in flat enumeration order (blocks in stored order, rows in
    /// stored order within each block).
    pub fn keys(&self) -> Vec<SampleKey> {
        self.iter_rows().map(|(key, _)| key).collect()
    }

    /// Rows in flat enumeration order.
    pub fn iter_rows(&self) -> impl Iterator<Item = (SampleKey, &SectionRow)> {
        self.slices.iter().flat_map(|block| {
            block.rows.iter().map(move |row| {
                (
                    SampleKey {
                        slice: block.slice,
                        stalk: row.stalk,
                    },
                    row,
                )
            })
        })
    }

    /// Sample matrix for one channel, rows in flat order. Coordinate
    /// channels are Cartesian renderings of the exterior boundary.
    pub fn channel_matrix(&self, channel: BasisChannel) -> Vec<Vec<f64>> {
        self.iter_rows()
            .map(|(_, row)| match channel {
                BasisChannel::ExteriorRadius => row.exterior_radius.clone(),
                BasisChannel::InteriorRadius => row.interior_radius.clone(),
                BasisChannel::X => polar_to_axis(&row.exterior_radius, Axis::X),
                BasisChannel::Y => polar_to_axis(&row.exterior_radius, Axis::Y),
            })
            .collect()
    }

    pub fn basis(&self, channel: BasisChannel) -> Option<&PcBasis> {
        self.bases.iter().find(|b| b.channel == channel)
    }

    /// Attach a basis, replacing any stored basis for the same channel.
    /// The basis must carry one coefficient row per stored sample and sit on
    /// the store's angular grid.
    pub fn set_basis(&mut self, basis: PcBasis) -> Result<(), StoreError> {
        if basis.mean.len() != self.n_theta {
            return Err(StoreError::Invalid(format!(
                "{} basis mean has {} samples, store grid is {}",
                basis.channel,
                basis.mean.len(),
                self.n_theta
            )));
        }
        let total = self.index.len();
        if basis.coefficients.len() != total {
            return Err(StoreError::Invalid(format!(
                "{} basis stores {} coefficient rows for {} samples",
                basis.channel,
                basis.coefficients.len(),
                total
            )));
        }
        self.bases.retain(|b| b.channel != basis.channel);
        self.bases.push(basis);
        Ok(())
    }

    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let reader = BufReader::new(File::open(path)?);
        let file: PopulationFileV1 = serde_json::from_reader(reader)?;
        Self::from_file_v1(file)
    }

    pub fn from_json_str(json: &str) -> Result<Self, StoreError> {
        let file: PopulationFileV1 = serde_json::from_str(json)?;
        Self::from_file_v1(file)
    }

    pub fn to_json_file(&self, path: &Path) -> Result<(), StoreError> {
        let writer = BufWriter::new(File::create(path)?);
        let file = PopulationFileV1 {
            schema: POPULATION_SCHEMA_V1.to_string(),
            n_theta: self.n_theta,
            slices: self.slices.clone(),
            bases: self.bases.clone(),
        };
        serde_json::to_writer(writer, &file)?;
        Ok(())
    }

    fn from_file_v1(file: PopulationFileV1) -> Result<Self, StoreError> {
        if file.schema != POPULATION_SCHEMA_V1 {
            return Err(StoreError::Schema { found: file.schema });
        }
        let mut repo = Self {
            n_theta: file.n_theta,
            slices: file.slices,
            bases: file.bases,
            index: HashMap::new(),
        };
        repo.rebuild_index();
        validate_repo(&repo).map_err(StoreError::Invalid)?;
        tracing::debug!(
            n_samples = repo.n_samples(),
            n_slices = repo.slices.len(),
            n_theta = repo.n_theta,
            "population store loaded"
        );
        Ok(repo)
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        let mut flat = 0;
        for (b, block) in self.slices.iter().enumerate() {
            for (r, row) in block.rows.iter().enumerate() {
                let key = SampleKey {
                    slice: block.slice,
                    stalk: row.stalk,
                };
                self.index.insert(key, RowLocation { block: b, row: r, flat });
                flat += 1;
            }
        }
    }
}

enum Axis {
    X,
    Y,
}

fn polar_to_axis(radii: &[f64], axis: Axis) -> Vec<f64> {
    let n = radii.len();
    radii
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let (sin_t, cos_t) = theta_at(i, n).sin_cos();
            match axis {
                Axis::X => r * cos_t,
                Axis::Y => r * sin_t,
            }
        })
        .collect()
}

fn validate_row(row: &SectionRow, n_theta: usize) -> Result<(), String> {
    if row.stalk == 0 {
        return Err("stalk numbers start at 1, got 0".to_string());
    }
    for (name, radii) in [
        ("exterior_radius", &row.exterior_radius),
        ("interior_radius", &row.interior_radius),
    ] {
        if radii.len() != n_theta {
            return Err(format!(
                "stalk {}: {name} has {} samples, store grid is {n_theta}",
                row.stalk,
                radii.len()
            ));
        }
        if radii.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(format!("stalk {}: {name} has non-positive entries", row.stalk));
        }
    }
    if !row.exterior_ellipse.is_valid() || !row.interior_ellipse.is_valid() {
        return Err(format!("stalk {}: degenerate ellipse baseline", row.stalk));
    }
    if !row.avg_rind_thickness.is_finite() || row.avg_rind_thickness < 0.0 {
        return Err(format!(
            "stalk {}: rind thickness {} is not a non-negative number",
            row.stalk, row.avg_rind_thickness
        ));
    }
    if !row.scale.is_finite() || row.scale <= 0.0 {
        return Err(format!(
            "stalk {}: registration scale {} is not positive",
            row.stalk, row.scale
        ));
    }
    Ok(())
}

fn validate_repo(repo: &SectionRepo) -> Result<(), String> {
    if repo.n_theta < MIN_GRID {
        return Err(format!("angular grid {} is too coarse", repo.n_theta));
    }
    let mut total_rows = 0;
    for block in &repo.slices {
        for row in &block.rows {
            validate_row(row, repo.n_theta)?;
            total_rows += 1;
        }
    }
    if repo.index.len() != total_rows {
        return Err("duplicate (slice, stalk) keys in store".to_string());
    }
    for basis in &repo.bases {
        if basis.mean.len() != repo.n_theta {
            return Err(format!(
                "{} basis mean has {} samples, store grid is {}",
                basis.channel,
                basis.mean.len(),
                repo.n_theta
            ));
        }
        if basis.components.iter().any(|c| c.len() != repo.n_theta) {
            return Err(format!("{} basis component length mismatch", basis.channel));
        }
        if basis.coefficients.len() != total_rows {
            return Err(format!(
                "{} basis stores {} coefficient rows for {} samples",
                basis.channel,
                basis.coefficients.len(),
                total_rows
            ));
        }
    }
    let mut seen = std::collections::HashSet::new();
    for basis in &repo.bases {
        if !seen.insert(basis.channel) {
            return Err(format!("duplicate basis for channel {}", basis.channel));
        }
    }
    Ok(())
}
