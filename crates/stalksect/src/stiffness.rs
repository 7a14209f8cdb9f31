//! Composite bending-stiffness proxy and population error aggregation.
//!
//! The proxy weights the rind annulus by the rind-to-pith modulus ratio:
//! `S = ratio · J_rind + J_pith`. Approximation quality is reported as
//! signed percent error against the true-shape proxy, reduced to fixed
//! percentiles per slice position and then averaged across slices so every
//! slice carries equal weight regardless of how many stalks it holds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::math::{mean, percentile};
use crate::moment::SectionMoments;
use crate::population::SampleKey;
use crate::reconstruct::ApproximationCase;

/// Percentile ranks of the signed error distribution, as fractions.
pub const ERROR_PERCENTILES: [f64; 5] = [0.05, 0.25, 0.50, 0.75, 0.95];

/// Material inputs of the stiffness proxy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StiffnessConfig {
    /// Rind elastic modulus divided by pith elastic modulus.
    pub modulus_ratio: f64,
}

impl Default for StiffnessConfig {
    fn default() -> Self {
        Self { modulus_ratio: 20.0 }
    }
}

/// Modulus-weighted section stiffness proxy.
pub fn stiffness_proxy(moments: &SectionMoments, modulus_ratio: f64) -> f64 {
    modulus_ratio * moments.rind + moments.pith
}

/// Signed percent error of `approx` against `truth`. `truth` must be
/// nonzero; sections with positive area always are.
pub fn percent_error(approx: f64, truth: f64) -> f64 {
    100.0 * (approx - truth) / truth
}

/// Error summary for one approximation level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub case: ApproximationCase,
    /// Signed percent-error percentiles at [`ERROR_PERCENTILES`], averaged
    /// across slices.
    pub percentiles: [f64; 5],
    /// Median of |percent error| per slice, averaged across slices.
    pub abs_median: f64,
    /// Mean of |percent error| per slice, averaged across slices.
    pub abs_mean: f64,
    /// Samples contributing over all slices.
    pub n_samples: usize,
}

/// Full population summary, one row per approximation level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub levels: Vec<LevelSummary>,
    pub n_slices: usize,
}

/// Accumulates per-sample percent errors grouped by slice position, one
/// error per approximation level, plus the samples that failed outright.
#[derive(Debug, Clone)]
pub struct ErrorAggregator {
    n_levels: usize,
    per_slice: BTreeMap<i32, Vec<Vec<f64>>>,
    problems: Vec<SampleKey>,
}

impl ErrorAggregator {
    /// `n_levels` is the number of approximation levels recorded per
    /// sample, i.e. components `0..n_levels` on top of the ellipse.
    pub fn new(n_levels: usize) -> Self {
        Self {
            n_levels,
            per_slice: BTreeMap::new(),
            problems: Vec::new(),
        }
    }

    /// Record one sample's errors, indexed by level. `errors` must hold
    /// exactly one entry per level; a shorter or longer vector would
    /// silently skew the percentile buckets.
    pub fn record(&mut self, key: SampleKey, errors: &[f64]) {
        assert_eq!(errors.len(), self.n_levels, "level count mismatch for {key}");
        let levels = self
            .per_slice
            .entry(key.slice)
            .or_insert_with(|| vec![Vec::new(); self.n_levels]);
        for (bucket, e) in levels.iter_mut().zip(errors.iter()) {
            bucket.push(*e);
        }
    }

    /// Record a sample that could not be evaluated at all.
    pub fn record_problem(&mut self, key: SampleKey) {
        self.problems.push(key);
    }

    pub fn problems(&self) -> &[SampleKey] {
        &self.problems
    }

    pub fn n_recorded(&self) -> usize {
        self.per_slice
            .values()
            .map(|levels| levels.first().map(Vec::len).unwrap_or(0))
            .sum()
    }

    /// Reduce each slice independently, then average the reductions across
    /// slices. Slices without samples do not contribute.
    pub fn summarize(&self) -> ErrorSummary {
        let mut levels = Vec::with_capacity(self.n_levels);
        for k in 0..self.n_levels {
            let mut slice_rows: Vec<[f64; 5]> = Vec::new();
            let mut abs_medians = Vec::new();
            let mut abs_means = Vec::new();
            let mut n_samples = 0;

            for slice_levels in self.per_slice.values() {
                let errors = &slice_levels[k];
                if errors.is_empty() {
                    continue;
                }
                n_samples += errors.len();

                let mut sorted = errors.clone();
                sorted.sort_by(f64::total_cmp);
                let mut row = [0.0; 5];
                for (p, q) in row.iter_mut().zip(ERROR_PERCENTILES.iter()) {
                    *p = percentile(&sorted, *q);
                }
                slice_rows.push(row);

                let mut abs: Vec<f64> = errors.iter().map(|e| e.abs()).collect();
                abs.sort_by(f64::total_cmp);
                abs_medians.push(percentile(&abs, 0.5));
                abs_means.push(mean(&abs));
            }

            let mut percentiles = [0.0; 5];
            if !slice_rows.is_empty() {
                for (j, p) in percentiles.iter_mut().enumerate() {
                    *p = slice_rows.iter().map(|row| row[j]).sum::<f64>() / slice_rows.len() as f64;
                }
            }
            levels.push(LevelSummary {
                case: ApproximationCase::Elliptical { n_components: k },
                percentiles,
                abs_median: mean(&abs_medians),
                abs_mean: mean(&abs_means),
                n_samples,
            });
        }
        ErrorSummary {
            levels,
            n_slices: self.per_slice.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn key(slice: i32, stalk: u32) -> SampleKey {
        SampleKey { slice, stalk }
    }

    #[test]
    fn proxy_weights_rind_by_modulus_ratio() {
        let m = SectionMoments {
            pith: 2.0,
            rind: 3.0,
        };
        assert_relative_eq!(stiffness_proxy(&m, 20.0), 62.0);
        assert_relative_eq!(stiffness_proxy(&m, 1.0), 5.0);
    }

    #[test]
    fn percent_error_is_signed() {
        assert_relative_eq!(percent_error(110.0, 100.0), 10.0);
        assert_relative_eq!(percent_error(90.0, 100.0), -10.0);
    }

    #[test]
    fn slices_reduce_independently_then_average() {
        let mut agg = ErrorAggregator::new(1);
        for (i, e) in [1.0, 2.0, 3.0, 4.0, 5.0].iter().enumerate() {
            agg.record(key(0, i as u32 + 1), &[*e]);
        }
        for (i, e) in [11.0, 12.0, 13.0, 14.0, 15.0].iter().enumerate() {
            agg.record(key(10, i as u32 + 1), &[*e]);
        }

        let summary = agg.summarize();
        assert_eq!(summary.n_slices, 2);
        let level = &summary.levels[0];
        assert_eq!(level.n_samples, 10);

        // slice percentiles are [1.2, 2, 3, 4, 4.8] and the same + 10
        let expected = [6.2, 7.0, 8.0, 9.0, 9.8];
        for (got, want) in level.percentiles.iter().zip(expected.iter()) {
            assert_relative_eq!(*got, *want, epsilon = 1e-12);
        }
        assert_relative_eq!(level.abs_median, 8.0, epsilon = 1e-12);
        assert_relative_eq!(level.abs_mean, 8.0, epsilon = 1e-12);
    }

    #[test]
    fn uneven_slices_carry_equal_weight() {
        let mut agg = ErrorAggregator::new(1);
        // one slice with many samples at error 0, one with a single sample at 10
        for i in 0..20 {
            agg.record(key(0, i + 1), &[0.0]);
        }
        agg.record(key(10, 1), &[10.0]);

        let summary = agg.summarize();
        // per-slice medians are 0 and 10; the average weights slices equally
        assert_relative_eq!(summary.levels[0].percentiles[2], 5.0, epsilon = 1e-12);
    }

    #[test]
    fn absolute_stats_use_magnitudes() {
        let mut agg = ErrorAggregator::new(1);
        agg.record(key(0, 1), &[-2.0]);
        agg.record(key(0, 2), &[1.0]);
        agg.record(key(0, 3), &[3.0]);

        let level = &agg.summarize().levels[0];
        assert_relative_eq!(level.abs_median, 2.0, epsilon = 1e-12);
        assert_relative_eq!(level.abs_mean, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn problems_are_kept_alongside_results() {
        let mut agg = ErrorAggregator::new(2);
        agg.record(key(0, 1), &[1.0, 0.5]);
        agg.record_problem(key(0, 981));

        assert_eq!(agg.problems(), &[key(0, 981)]);
        assert_eq!(agg.n_recorded(), 1);
        let summary = agg.summarize();
        assert_eq!(summary.levels.len(), 2);
        assert_eq!(summary.levels[1].n_samples, 1);
    }

    #[test]
    #[should_panic(expected = "level count mismatch")]
    fn record_rejects_mismatched_level_count() {
        let mut agg = ErrorAggregator::new(2);
        agg.record(key(0, 1), &[1.0]);
    }

    #[test]
    fn levels_are_tagged_by_component_count() {
        let agg = ErrorAggregator::new(3);
        let summary = agg.summarize();
        assert_eq!(
            summary.levels[2].case,
            ApproximationCase::Elliptical { n_components: 2 }
        );
        assert_eq!(summary.n_slices, 0);
    }
}
