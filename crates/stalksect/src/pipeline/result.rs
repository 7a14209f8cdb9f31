use serde::{Deserialize, Serialize};

use super::run::AnalysisConfig;
use crate::population::SampleKey;
use crate::reconstruct::ApproximationCase;
use crate::stiffness::{ErrorSummary, LevelSummary};

/// Full outcome of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// Percentile table, one row per approximation level.
    pub summary: ErrorSummary,
    /// Samples that were requested but could not be evaluated.
    pub problems: Vec<SampleKey>,
    /// Samples contributing to the summary.
    pub n_samples_used: usize,
    /// Component count at the deepest evaluated level.
    pub n_components: usize,
    /// Explained variance of the exterior components actually used, percent.
    pub explained_pct: Vec<f64>,
    /// Configuration the run was made with.
    pub config: AnalysisConfig,
}

impl AnalysisReport {
    /// Summary row for the level carrying `n_components` components.
    pub fn level(&self, n_components: usize) -> Option<&LevelSummary> {
        self.summary
            .levels
            .iter()
            .find(|l| l.case == ApproximationCase::Elliptical { n_components })
    }
}
