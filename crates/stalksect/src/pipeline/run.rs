//! Analysis orchestration: basis preparation and the per-sample
//! evaluation loop.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::result::AnalysisReport;
use crate::basis::{build_basis, BasisChannel, BasisError, PcBasis};
use crate::moment::{section_moments, MomentConfig, MomentError};
use crate::population::{SampleKey, SectionRepo, SectionRow, StoreError};
use crate::reconstruct::{interior_from_offset, radii_at_level, InteriorPolicy};
use crate::stiffness::{percent_error, stiffness_proxy, ErrorAggregator, StiffnessConfig};

/// Tunables of the end-to-end stiffness error analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Deepest component count to evaluate. `None` selects by cumulative
    /// explained variance.
    pub n_components: Option<usize>,
    /// Cumulative explained-variance threshold, percent, used when
    /// `n_components` is `None`.
    pub variance_threshold_pct: f64,
    /// Interior reconstruction policy.
    pub interior: InteriorPolicy,
    pub moment: MomentConfig,
    pub stiffness: StiffnessConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            n_components: None,
            variance_threshold_pct: 95.0,
            interior: InteriorPolicy::Pca,
            moment: MomentConfig::default(),
            stiffness: StiffnessConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum AnalysisError {
    EmptyPopulation,
    InvalidModulusRatio { got: f64 },
    MissingBasis { channel: BasisChannel },
    Basis(BasisError),
    Store(StoreError),
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPopulation => write!(f, "population store holds no samples"),
            Self::InvalidModulusRatio { got } => {
                write!(f, "modulus ratio {got} is not a positive finite number")
            }
            Self::MissingBasis { channel } => {
                write!(f, "no {channel} basis in store; build bases first")
            }
            Self::Basis(e) => write!(f, "basis construction failed: {e}"),
            Self::Store(e) => write!(f, "store rejected a basis: {e}"),
        }
    }
}

impl std::error::Error for AnalysisError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Basis(e) => Some(e),
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BasisError> for AnalysisError {
    fn from(e: BasisError) -> Self {
        Self::Basis(e)
    }
}

impl From<StoreError> for AnalysisError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

/// Where reconstructed interiors come from during evaluation.
enum InteriorSource<'a> {
    Offset,
    Basis(&'a PcBasis),
}

/// Why one sample dropped out of the evaluation loop.
enum SampleError {
    Moment(MomentError),
    StaleBasis { sample: usize, in_basis: usize },
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Moment(e) => e.fmt(f),
            Self::StaleBasis { sample, in_basis } => write!(
                f,
                "row {sample} is outside the stored basis of {in_basis} samples"
            ),
        }
    }
}

impl From<MomentError> for SampleError {
    fn from(e: MomentError) -> Self {
        Self::Moment(e)
    }
}

/// Build and attach the residual bases the analysis needs, leaving any
/// already-stored basis untouched.
///
/// The exterior channel is always prepared; the interior channel only when
/// `interior` is [`InteriorPolicy::Pca`].
pub fn prepare_bases(
    repo: &mut SectionRepo,
    interior: InteriorPolicy,
) -> Result<(), AnalysisError> {
    if repo.basis(BasisChannel::ExteriorRadius).is_none() {
        let rows = residual_rows(repo, false);
        repo.set_basis(build_basis(BasisChannel::ExteriorRadius, &rows)?)?;
        tracing::info!(channel = %BasisChannel::ExteriorRadius, "residual basis attached");
    }
    if interior == InteriorPolicy::Pca && repo.basis(BasisChannel::InteriorRadius).is_none() {
        let rows = residual_rows(repo, true);
        repo.set_basis(build_basis(BasisChannel::InteriorRadius, &rows)?)?;
        tracing::info!(channel = %BasisChannel::InteriorRadius, "residual basis attached");
    }
    Ok(())
}

/// Analyze every stored sample.
pub fn run_analysis(
    repo: &SectionRepo,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, AnalysisError> {
    run_analysis_for_keys(repo, &repo.keys(), config)
}

/// Analyze the requested samples against their stored bases.
///
/// Keys missing from the store, rows the stored bases do not cover, and
/// samples whose boundaries cannot be integrated land in the returned
/// problem list and are excluded from the summary; they never abort the
/// run.
pub fn run_analysis_for_keys(
    repo: &SectionRepo,
    keys: &[SampleKey],
    config: &AnalysisConfig,
) -> Result<AnalysisReport, AnalysisError> {
    if repo.n_samples() == 0 {
        return Err(AnalysisError::EmptyPopulation);
    }
    let ratio = config.stiffness.modulus_ratio;
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(AnalysisError::InvalidModulusRatio { got: ratio });
    }
    let exterior_basis =
        repo.basis(BasisChannel::ExteriorRadius)
            .ok_or(AnalysisError::MissingBasis {
                channel: BasisChannel::ExteriorRadius,
            })?;
    let interior_source = match config.interior {
        InteriorPolicy::NormalizedThickness => InteriorSource::Offset,
        InteriorPolicy::Pca => InteriorSource::Basis(
            repo.basis(BasisChannel::InteriorRadius)
                .ok_or(AnalysisError::MissingBasis {
                    channel: BasisChannel::InteriorRadius,
                })?,
        ),
    };

    let mut available = exterior_basis.n_components();
    if let InteriorSource::Basis(basis) = &interior_source {
        available = available.min(basis.n_components());
    }
    let requested = config
        .n_components
        .unwrap_or_else(|| exterior_basis.select_components(config.variance_threshold_pct));
    let n_components = requested.min(available);
    if n_components < requested {
        tracing::warn!(requested, available, "component request exceeds basis rank");
    }

    tracing::info!(
        n_keys = keys.len(),
        n_components,
        interior = ?config.interior,
        "running stiffness error analysis"
    );

    let mut aggregator = ErrorAggregator::new(n_components + 1);
    for &key in keys {
        let Some(row) = repo.get(key) else {
            tracing::warn!(%key, "sample not in store");
            aggregator.record_problem(key);
            continue;
        };
        // presence in the store guarantees a flat position
        let Some(sample) = repo.flat_index(key) else {
            aggregator.record_problem(key);
            continue;
        };
        match evaluate_sample(
            row,
            sample,
            exterior_basis,
            &interior_source,
            n_components,
            config,
        ) {
            Ok(errors) => aggregator.record(key, &errors),
            Err(e) => {
                tracing::warn!(%key, error = %e, "sample excluded from summary");
                aggregator.record_problem(key);
            }
        }
    }

    let summary = aggregator.summarize();
    tracing::info!(
        n_used = aggregator.n_recorded(),
        n_problems = aggregator.problems().len(),
        "analysis complete"
    );
    Ok(AnalysisReport {
        summary,
        problems: aggregator.problems().to_vec(),
        n_samples_used: aggregator.n_recorded(),
        n_components,
        explained_pct: exterior_basis.explained_pct[..n_components].to_vec(),
        config: config.clone(),
    })
}

/// Signed percent error per approximation level for one sample, level 0
/// first.
fn evaluate_sample(
    row: &SectionRow,
    sample: usize,
    exterior_basis: &PcBasis,
    interior_source: &InteriorSource<'_>,
    n_components: usize,
    config: &AnalysisConfig,
) -> Result<Vec<f64>, SampleError> {
    let mut in_basis = exterior_basis.n_samples();
    if let InteriorSource::Basis(basis) = interior_source {
        in_basis = in_basis.min(basis.n_samples());
    }
    if sample >= in_basis {
        return Err(SampleError::StaleBasis { sample, in_basis });
    }

    let truth = section_moments(&row.exterior_radius, &row.interior_radius, &config.moment)?;
    let s_true = stiffness_proxy(&truth, config.stiffness.modulus_ratio);

    let mut errors = Vec::with_capacity(n_components + 1);
    for level in 0..=n_components {
        let exterior = radii_at_level(&row.exterior_ellipse, exterior_basis, sample, level);
        let interior = match interior_source {
            InteriorSource::Offset => interior_from_offset(&exterior, row.avg_rind_thickness),
            InteriorSource::Basis(basis) => {
                radii_at_level(&row.interior_ellipse, basis, sample, level)
            }
        };
        let moments = section_moments(&exterior, &interior, &config.moment)?;
        let s_approx = stiffness_proxy(&moments, config.stiffness.modulus_ratio);
        errors.push(percent_error(s_approx, s_true));
    }
    Ok(errors)
}

/// Residual rows `ellipse - registered` for one radius channel, flat order.
fn residual_rows(repo: &SectionRepo, use_interior: bool) -> Vec<Vec<f64>> {
    repo.iter_rows()
        .map(|(_, row)| {
            let (radii, ellipse) = if use_interior {
                (&row.interior_radius, &row.interior_ellipse)
            } else {
                (&row.exterior_radius, &row.exterior_ellipse)
            };
            ellipse
                .radii(radii.len())
                .iter()
                .zip(radii.iter())
                .map(|(e, r)| e - r)
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stiffness::LevelSummary;
    use crate::synth::{synthesize_population, SynthConfig, SynthRanges};

    fn synth_repo(stalks: u32, n_theta: usize, seed: u64) -> SectionRepo {
        let config = SynthConfig {
            n_theta,
            slices: vec![0],
            stalks_per_slice: stalks,
            seed,
            ranges: SynthRanges::default(),
        };
        synthesize_population(&config).unwrap()
    }

    #[test]
    fn error_shrinks_with_each_component() {
        // stock configuration apart from the level count: the shipped
        // defaults must show the improvement, not a tuned override
        let mut repo = synth_repo(50, 360, 7);
        let config = AnalysisConfig {
            n_components: Some(3),
            ..Default::default()
        };
        prepare_bases(&mut repo, config.interior).unwrap();
        let report = run_analysis(&repo, &config).unwrap();

        assert_eq!(report.n_components, 3);
        assert_eq!(report.summary.levels.len(), 4);
        assert_eq!(report.n_samples_used, 50);
        assert!(report.problems.is_empty());
        for level in &report.summary.levels {
            assert_eq!(level.n_samples, 50);
            assert_eq!(level.percentiles.len(), 5);
        }
        assert!(report.level(3).is_some());
        assert!(report.level(4).is_none());

        let medians: Vec<f64> = report.summary.levels.iter().map(|l| l.abs_median).collect();
        for pair in medians.windows(2) {
            assert!(
                pair[1] < pair[0],
                "abs median did not shrink: {medians:?}"
            );
        }

        // the 5th-95th percentile band tightens as components are added
        let spread = |l: &LevelSummary| l.percentiles[4] - l.percentiles[0];
        let first = &report.summary.levels[0];
        let last = &report.summary.levels[3];
        assert!(spread(last) < spread(first));
    }

    #[test]
    fn offset_interior_still_improves_with_components() {
        let mut repo = synth_repo(40, 180, 19);
        let config = AnalysisConfig {
            n_components: Some(3),
            interior: InteriorPolicy::NormalizedThickness,
            ..Default::default()
        };
        prepare_bases(&mut repo, config.interior).unwrap();
        let report = run_analysis(&repo, &config).unwrap();

        assert_eq!(report.summary.levels.len(), 4);
        let baseline = report.summary.levels[0].abs_median;
        for level in &report.summary.levels[1..] {
            assert!(level.abs_median < baseline);
        }
    }

    #[test]
    fn full_rank_levels_match_truth() {
        let mut repo = synth_repo(8, 90, 9);
        prepare_bases(&mut repo, InteriorPolicy::Pca).unwrap();
        let config = AnalysisConfig {
            n_components: Some(7),
            interior: InteriorPolicy::Pca,
            ..Default::default()
        };
        let report = run_analysis(&repo, &config).unwrap();

        // at full rank the reconstruction reproduces the registered curves
        let last = report.summary.levels.last().unwrap();
        assert!(last.abs_median < 1e-3, "abs median {}", last.abs_median);
    }

    #[test]
    fn missing_sample_key_is_reported() {
        let mut repo = synth_repo(10, 180, 11);
        let config = AnalysisConfig {
            n_components: Some(2),
            ..Default::default()
        };
        prepare_bases(&mut repo, config.interior).unwrap();

        let mut keys = repo.keys();
        let missing = SampleKey {
            slice: 0,
            stalk: 981,
        };
        keys.push(missing);
        let report = run_analysis_for_keys(&repo, &keys, &config).unwrap();

        assert_eq!(report.problems, vec![missing]);
        assert_eq!(report.n_samples_used, 10);
        assert_eq!(report.summary.levels[0].n_samples, 10);
    }

    #[test]
    fn component_request_clamps_to_rank() {
        let mut repo = synth_repo(6, 90, 3);
        let config = AnalysisConfig {
            n_components: Some(99),
            ..Default::default()
        };
        prepare_bases(&mut repo, config.interior).unwrap();
        let report = run_analysis(&repo, &config).unwrap();

        // 6 samples leave 5 independent directions after mean-centering
        assert_eq!(report.n_components, 5);
        assert_eq!(report.summary.levels.len(), 6);
        assert_eq!(report.explained_pct.len(), 5);
    }

    #[test]
    fn auto_selection_follows_variance_threshold() {
        let mut repo = synth_repo(12, 90, 5);
        let config = AnalysisConfig::default();
        prepare_bases(&mut repo, config.interior).unwrap();
        let report = run_analysis(&repo, &config).unwrap();

        let expected = repo
            .basis(BasisChannel::ExteriorRadius)
            .unwrap()
            .select_components(95.0);
        assert_eq!(report.n_components, expected);
        assert!(report.n_components >= 1);
        assert_eq!(report.summary.levels.len(), expected + 1);
    }

    #[test]
    fn default_config_is_stable() {
        let config = AnalysisConfig::default();
        assert_eq!(config.n_components, None);
        assert_eq!(config.variance_threshold_pct, 95.0);
        assert_eq!(config.interior, InteriorPolicy::Pca);
        assert_eq!(config.moment.dr, 1e-2);
        assert_eq!(config.stiffness.modulus_ratio, 20.0);
    }

    #[test]
    fn empty_population_is_rejected() {
        let repo = SectionRepo::new(360);
        assert!(matches!(
            run_analysis(&repo, &AnalysisConfig::default()),
            Err(AnalysisError::EmptyPopulation)
        ));

        let mut repo = SectionRepo::new(360);
        assert!(matches!(
            prepare_bases(&mut repo, InteriorPolicy::NormalizedThickness),
            Err(AnalysisError::Basis(BasisError::EmptyInput))
        ));
    }

    #[test]
    fn rejects_invalid_modulus_ratio() {
        let mut repo = synth_repo(4, 90, 6);
        prepare_bases(&mut repo, AnalysisConfig::default().interior).unwrap();

        for bad in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let config = AnalysisConfig {
                stiffness: StiffnessConfig { modulus_ratio: bad },
                ..Default::default()
            };
            match run_analysis(&repo, &config) {
                Err(AnalysisError::InvalidModulusRatio { got }) => {
                    assert!(got == bad || (got.is_nan() && bad.is_nan()));
                }
                other => panic!("ratio {bad} slipped through: {other:?}"),
            }
        }
    }

    #[test]
    fn missing_basis_is_reported() {
        let repo = synth_repo(5, 90, 2);
        assert!(matches!(
            run_analysis(&repo, &AnalysisConfig::default()),
            Err(AnalysisError::MissingBasis {
                channel: BasisChannel::ExteriorRadius
            })
        ));

        let mut repo = synth_repo(5, 90, 2);
        prepare_bases(&mut repo, InteriorPolicy::NormalizedThickness).unwrap();
        let config = AnalysisConfig::default();
        assert!(matches!(
            run_analysis(&repo, &config),
            Err(AnalysisError::MissingBasis {
                channel: BasisChannel::InteriorRadius
            })
        ));
    }

    #[test]
    fn late_insert_invalidates_bases_without_panicking() {
        let mut repo = synth_repo(6, 90, 8);
        let config = AnalysisConfig {
            n_components: Some(2),
            ..Default::default()
        };
        prepare_bases(&mut repo, config.interior).unwrap();

        let donor = repo.get(SampleKey { slice: 0, stalk: 1 }).unwrap().clone();
        repo.insert_row(0, SectionRow { stalk: 981, ..donor }).unwrap();

        // the insert dropped the now-short bases, so the run asks for a
        // rebuild instead of indexing past the stored coefficients
        assert!(matches!(
            run_analysis(&repo, &config),
            Err(AnalysisError::MissingBasis { .. })
        ));

        prepare_bases(&mut repo, config.interior).unwrap();
        let report = run_analysis(&repo, &config).unwrap();
        assert_eq!(report.n_samples_used, 7);
        assert!(report.problems.is_empty());
    }

    #[test]
    fn prepare_bases_preserves_existing() {
        let mut repo = synth_repo(5, 90, 4);
        prepare_bases(&mut repo, InteriorPolicy::Pca).unwrap();
        let before = repo.basis(BasisChannel::ExteriorRadius).unwrap().clone();

        prepare_bases(&mut repo, InteriorPolicy::Pca).unwrap();
        assert_eq!(repo.basis(BasisChannel::ExteriorRadius), Some(&before));
    }
}
