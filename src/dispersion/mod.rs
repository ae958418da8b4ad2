//! Dispersion estimation for negative binomial counts
//!
//! Three stages: gene-wise moments estimates, a mean-dispersion trend fitted
//! across genes, and empirical Bayes shrinkage of each gene toward the trend.

mod gene_wise;
mod map;
mod trend;

pub use gene_wise::{gene_moments, moments_dispersion, GeneMoments};
pub use map::{estimate_prior_variance, shrink_dispersion, PriorVariance, ShrunkDispersion};
pub use trend::{fit_dispersion_trend, DispersionTrend, FittedTrend, TrendFitMethod};

use rayon::prelude::*;
use serde::Serialize;

use crate::data::ComparisonDesign;
use crate::error::{DegseaError, Result};
use crate::normalization::{NormalizedCounts, SizeFactors};

/// Configurable parameters for dispersion estimation
#[derive(Debug, Clone)]
pub struct DispersionParams {
    /// Lower bound for any dispersion
    pub min_disp: f64,
    /// Gene-wise estimates this many robust SDs above the trend are not shrunk
    pub outlier_sd: f64,
    pub trend_fit: TrendFitMethod,
}

impl Default for DispersionParams {
    fn default() -> Self {
        Self {
            min_disp: 1e-8,
            outlier_sd: 2.0,
            trend_fit: TrendFitMethod::Parametric,
        }
    }
}

/// Dispersion estimates for every gene of a normalized matrix
#[derive(Debug, Clone, Serialize)]
pub struct GeneDispersion {
    gene_ids: Vec<String>,
    base_means: Vec<f64>,
    /// `None` where the moments estimate was not informative
    gene_wise: Vec<Option<f64>>,
    trended: Vec<f64>,
    /// Final (shrunken) values used for testing
    dispersions: Vec<f64>,
    outlier: Vec<bool>,
    trend: DispersionTrend,
    prior_var: f64,
}

impl GeneDispersion {
    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn len(&self) -> usize {
        self.gene_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gene_ids.is_empty()
    }

    pub fn base_means(&self) -> &[f64] {
        &self.base_means
    }

    pub fn gene_wise(&self) -> &[Option<f64>] {
        &self.gene_wise
    }

    pub fn trended(&self) -> &[f64] {
        &self.trended
    }

    /// Final dispersion per gene, always positive and finite
    pub fn values(&self) -> &[f64] {
        &self.dispersions
    }

    pub fn outliers(&self) -> &[bool] {
        &self.outlier
    }

    pub fn trend(&self) -> &DispersionTrend {
        &self.trend
    }

    pub fn prior_var(&self) -> f64 {
        self.prior_var
    }

    /// Final dispersion of a gene by ID
    pub fn get(&self, gene_id: &str) -> Option<f64> {
        self.gene_ids
            .iter()
            .position(|g| g == gene_id)
            .map(|i| self.dispersions[i])
    }
}

/// Estimate dispersions for all genes.
///
/// Genes whose moments estimate is not informative (zero means, variance at
/// or below the Poisson level) receive the trend value.
pub fn estimate_dispersions(
    normalized: &NormalizedCounts,
    size_factors: &SizeFactors,
    design: &ComparisonDesign,
    params: &DispersionParams,
) -> Result<GeneDispersion> {
    let n_samples = normalized.n_samples();
    if design.n_samples() != n_samples || size_factors.len() != n_samples {
        return Err(DegseaError::DimensionMismatch {
            expected: format!("{} samples", n_samples),
            got: format!(
                "{} design samples, {} size factors",
                design.n_samples(),
                size_factors.len()
            ),
        });
    }
    if normalized.n_genes() == 0 {
        return Err(DegseaError::EmptyData {
            reason: "no genes for dispersion estimation".to_string(),
        });
    }

    let xim = size_factors.mean_inverse();
    let max_disp = (n_samples as f64).max(10.0);
    let values = normalized.values();

    // Step 1: gene-wise moments estimates
    let moments: Vec<GeneMoments> = (0..normalized.n_genes())
        .into_par_iter()
        .map(|i| gene_moments(values.row(i), design))
        .collect();
    let base_means: Vec<f64> = moments.iter().map(|m| m.mean).collect();
    let gene_wise: Vec<Option<f64>> = moments
        .iter()
        .map(|&m| moments_dispersion(m, xim, params.min_disp, max_disp))
        .collect();

    let n_estimable = gene_wise.iter().filter(|d| d.is_some()).count();
    log::info!(
        "Gene-wise dispersions: {} of {} genes estimable",
        n_estimable,
        gene_wise.len()
    );

    // Step 2: trend
    let fitted = fit_dispersion_trend(&base_means, &gene_wise, params.trend_fit, params.min_disp)?;

    // Step 3: shrinkage
    let prior = estimate_prior_variance(&gene_wise, &fitted.values, design.residual_df());
    let shrunk: Vec<ShrunkDispersion> = gene_wise
        .par_iter()
        .zip(fitted.values.par_iter())
        .map(|(&g, &t)| shrink_dispersion(g, t, &prior, params.outlier_sd, params.min_disp, max_disp))
        .collect();

    let n_outliers = shrunk.iter().filter(|s| s.outlier).count();
    if n_outliers > 0 {
        log::debug!("{} dispersion outliers kept at gene-wise values", n_outliers);
    }

    Ok(GeneDispersion {
        gene_ids: normalized.gene_ids().to_vec(),
        base_means,
        gene_wise,
        trended: fitted.values,
        dispersions: shrunk.iter().map(|s| s.value).collect(),
        outlier: shrunk.iter().map(|s| s.outlier).collect(),
        trend: fitted.trend,
        prior_var: prior.prior_var,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CountMatrix, SampleMetadata};
    use crate::normalization::{estimate_size_factors, normalize};

    fn setup(rows: Vec<Vec<u64>>) -> (NormalizedCounts, SizeFactors, ComparisonDesign) {
        let n_genes = rows.len();
        let counts = CountMatrix::from_rows(
            rows,
            (0..n_genes).map(|i| format!("gene{}", i)).collect(),
            (1..=6).map(|j| format!("s{}", j)).collect(),
        )
        .unwrap();
        let meta = SampleMetadata::from_pairs(
            "condition",
            [("s1", "A"), ("s2", "A"), ("s3", "A"), ("s4", "B"), ("s5", "B"), ("s6", "B")],
        )
        .unwrap();
        let design = ComparisonDesign::new(&counts, &meta, "condition", "A", "B", 2).unwrap();
        let sf = estimate_size_factors(&counts).unwrap();
        let norm = normalize(&counts, &sf).unwrap();
        (norm, sf, design)
    }

    fn noisy_rows() -> Vec<Vec<u64>> {
        // deterministic overdispersed pattern at several expression levels
        let pattern = [0.6, 1.3, 1.1, 0.8, 1.4, 0.9];
        (0..60)
            .map(|i| {
                let level = 5.0 * (1.0 + (i % 12) as f64).powi(2);
                pattern
                    .iter()
                    .cycle()
                    .skip(i % 6)
                    .take(6)
                    .map(|&p| (level * p).round() as u64 + 1)
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_dispersions_positive_and_finite() {
        let (norm, sf, design) = setup(noisy_rows());
        let disp = estimate_dispersions(&norm, &sf, &design, &DispersionParams::default()).unwrap();
        assert_eq!(disp.len(), 60);
        assert!(disp.values().iter().all(|d| d.is_finite() && *d > 0.0));
        assert!(disp.prior_var() >= 0.25);
        assert!(disp.get("gene0").is_some());
        assert!(disp.get("nope").is_none());
    }

    #[test]
    fn test_identical_replicates_take_trend() {
        let mut rows = noisy_rows();
        rows.push(vec![50, 50, 50, 80, 80, 80]);
        let (norm, sf, design) = setup(rows);
        let disp = estimate_dispersions(&norm, &sf, &design, &DispersionParams::default()).unwrap();
        let last = disp.len() - 1;
        assert_eq!(disp.gene_wise()[last], None);
        let expected = disp.trended()[last].clamp(1e-8, 10.0);
        assert!((disp.values()[last] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_no_estimable_gene_constant_floor() {
        // every gene has zero within-group variance
        let rows = vec![vec![10, 10, 10, 20, 20, 20], vec![30, 30, 30, 5, 5, 5]];
        let (norm, sf, design) = setup(rows);
        let params = DispersionParams::default();
        let disp = estimate_dispersions(&norm, &sf, &design, &params).unwrap();
        assert!(matches!(disp.trend(), DispersionTrend::Constant { .. }));
        assert!(disp.values().iter().all(|&d| (d - params.min_disp).abs() < 1e-20));
    }

    #[test]
    fn test_dimension_mismatch() {
        let (norm, _, design) = setup(noisy_rows());
        let other = SizeFactors::new(vec!["x".to_string(), "y".to_string()], vec![1.0, 1.0]).unwrap();
        let err = estimate_dispersions(&norm, &other, &design, &DispersionParams::default()).unwrap_err();
        assert!(matches!(err, DegseaError::DimensionMismatch { .. }));
    }
}
