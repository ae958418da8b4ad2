//! Size factor estimation using the median of ratios method

use ndarray::{ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::data::CountMatrix;
use crate::error::{DegseaError, Result};
use crate::stats::median;

/// Method for size factor estimation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SizeFactorMethod {
    /// Median of ratios over genes positive in every sample
    #[default]
    Ratio,
    /// Geometric means from positive counts only, for sparse data
    PosCounts,
}

/// One positive scale factor per sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeFactors {
    sample_ids: Vec<String>,
    factors: Vec<f64>,
}

impl SizeFactors {
    /// Wrap externally supplied size factors, checking they are positive and finite
    pub fn new(sample_ids: Vec<String>, factors: Vec<f64>) -> Result<Self> {
        if sample_ids.len() != factors.len() {
            return Err(DegseaError::DimensionMismatch {
                expected: format!("{} size factors", sample_ids.len()),
                got: format!("{} size factors", factors.len()),
            });
        }
        if let Some((id, sf)) = sample_ids
            .iter()
            .zip(factors.iter())
            .find(|(_, &sf)| !(sf > 0.0 && sf.is_finite()))
        {
            return Err(DegseaError::SizeFactorFailed {
                reason: format!("size factor {} for sample '{}' is not positive", sf, id),
            });
        }
        Ok(Self { sample_ids, factors })
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn values(&self) -> &[f64] {
        &self.factors
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Size factor of a sample by id
    pub fn get(&self, sample_id: &str) -> Option<f64> {
        self.sample_ids
            .iter()
            .position(|id| id == sample_id)
            .map(|j| self.factors[j])
    }

    /// Mean of the reciprocal size factors (x̄ in the moments dispersion estimate)
    pub fn mean_inverse(&self) -> f64 {
        self.factors.iter().map(|&s| 1.0 / s).sum::<f64>() / self.factors.len() as f64
    }
}

/// Estimate size factors with the standard median of ratios method
pub fn estimate_size_factors(counts: &CountMatrix) -> Result<SizeFactors> {
    estimate_size_factors_with(counts, SizeFactorMethod::Ratio)
}

/// Estimate size factors with an explicit method.
///
/// Fails if fewer than two samples are present or if some gene is zero in
/// every sample; the low-count filter is expected to have removed those.
pub fn estimate_size_factors_with(counts: &CountMatrix, method: SizeFactorMethod) -> Result<SizeFactors> {
    if counts.n_samples() < 2 {
        return Err(DegseaError::DegenerateInput {
            reason: format!("size factors need at least 2 samples, got {}", counts.n_samples()),
        });
    }
    if counts.n_genes() == 0 {
        return Err(DegseaError::EmptyData {
            reason: "Count matrix has no genes".to_string(),
        });
    }
    if let Some(i) = counts
        .counts()
        .axis_iter(Axis(0))
        .position(|row| row.iter().all(|&x| x == 0.0))
    {
        return Err(DegseaError::DegenerateInput {
            reason: format!(
                "gene '{}' has zero counts in every sample; apply the low-count filter first",
                counts.gene_ids()[i]
            ),
        });
    }

    let factors = match method {
        SizeFactorMethod::Ratio => median_of_ratios(counts.counts(), false)?,
        SizeFactorMethod::PosCounts => median_of_ratios(counts.counts(), true)?,
    };

    log::info!(
        "Size factors ({:?}): {}",
        method,
        factors.iter().map(|sf| format!("{:.4}", sf)).collect::<Vec<_>>().join(", ")
    );

    SizeFactors::new(counts.sample_ids().to_vec(), factors)
}

/// Median over genes of count / geometric mean.
///
/// With `positive_only` the geometric mean of a gene uses only its positive
/// counts (still divided by the total sample count) and samples without any
/// usable ratio fall back to 1.0.
fn median_of_ratios(counts: ArrayView2<f64>, positive_only: bool) -> Result<Vec<f64>> {
    let n_samples = counts.ncols();

    let reference: Vec<(usize, f64)> = counts
        .axis_iter(Axis(0))
        .enumerate()
        .filter_map(|(i, row)| {
            if positive_only {
                let log_sum: f64 = row.iter().filter(|&&x| x > 0.0).map(|x| x.ln()).sum();
                row.iter().any(|&x| x > 0.0).then(|| (i, (log_sum / n_samples as f64).exp()))
            } else if row.iter().all(|&x| x > 0.0) {
                let log_sum: f64 = row.iter().map(|x| x.ln()).sum();
                Some((i, (log_sum / n_samples as f64).exp()))
            } else {
                None
            }
        })
        .collect();

    if reference.is_empty() {
        return Err(DegseaError::DegenerateInput {
            reason: "no gene has a non-zero count in every sample".to_string(),
        });
    }

    let mut factors = vec![0.0; n_samples];
    for j in 0..n_samples {
        let mut ratios: Vec<f64> = reference
            .iter()
            .map(|&(i, geo_mean)| counts[[i, j]] / geo_mean)
            .filter(|&r| r > 0.0)
            .collect();

        factors[j] = match median(&mut ratios) {
            Some(m) => m,
            None if positive_only => 1.0,
            None => {
                return Err(DegseaError::SizeFactorFailed {
                    reason: format!("no valid ratios for sample {}", j),
                })
            }
        };
    }

    if factors.iter().any(|&x| x <= 0.0 || !x.is_finite()) {
        return Err(DegseaError::SizeFactorFailed {
            reason: "invalid size factors computed".to_string(),
        });
    }

    Ok(factors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn matrix(counts: Array2<f64>) -> CountMatrix {
        let genes = (1..=counts.nrows()).map(|i| format!("gene{}", i)).collect();
        let samples = (1..=counts.ncols()).map(|j| format!("s{}", j)).collect();
        CountMatrix::new(counts, genes, samples).unwrap()
    }

    #[test]
    fn test_size_factor_estimation() {
        let counts = matrix(array![
            [100.0, 200.0, 80.0, 160.0],
            [500.0, 1000.0, 400.0, 800.0],
            [50.0, 100.0, 40.0, 80.0],
            [200.0, 400.0, 160.0, 320.0]
        ]);
        let sf = estimate_size_factors(&counts).unwrap();
        assert_eq!(sf.len(), 4);
        assert!(sf.values().iter().all(|&x| x > 0.0));
        assert!((sf.values()[1] / sf.values()[0] - 2.0).abs() < 1e-12);
        assert_eq!(sf.get("s3"), Some(sf.values()[2]));
    }

    #[test]
    fn test_rescaling_one_sample_scales_its_relative_factor() {
        let base = array![
            [12.0, 30.0, 25.0, 8.0],
            [100.0, 90.0, 140.0, 120.0],
            [7.0, 3.0, 9.0, 5.0],
            [55.0, 61.0, 40.0, 47.0],
            [300.0, 280.0, 350.0, 310.0]
        ];
        let mut scaled = base.clone();
        scaled.column_mut(2).mapv_inplace(|x| x * 3.0);

        let sf = estimate_size_factors(&matrix(base)).unwrap();
        let sf_scaled = estimate_size_factors(&matrix(scaled)).unwrap();

        for i in [0usize, 1, 3] {
            let before = sf.values()[2] / sf.values()[i];
            let after = sf_scaled.values()[2] / sf_scaled.values()[i];
            assert!((after / before - 3.0).abs() < 1e-9, "ratio changed by {}", after / before);
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        let single = CountMatrix::new(array![[1.0], [2.0]], vec!["a".into(), "b".into()], vec!["s1".into()])
            .unwrap();
        assert!(matches!(
            estimate_size_factors(&single),
            Err(DegseaError::DegenerateInput { .. })
        ));

        let all_zero_gene = matrix(array![[10.0, 12.0], [0.0, 0.0]]);
        let err = estimate_size_factors(&all_zero_gene).unwrap_err();
        assert!(err.to_string().contains("gene2"));

        let no_reference = matrix(array![[10.0, 0.0], [0.0, 12.0]]);
        assert!(matches!(
            estimate_size_factors(&no_reference),
            Err(DegseaError::DegenerateInput { .. })
        ));
    }

    #[test]
    fn test_poscounts_handles_sparse_genes() {
        let counts = matrix(array![[10.0, 0.0, 20.0], [0.0, 12.0, 30.0], [5.0, 6.0, 0.0]]);
        let sf = estimate_size_factors_with(&counts, SizeFactorMethod::PosCounts).unwrap();
        assert!(sf.values().iter().all(|&x| x > 0.0 && x.is_finite()));
    }
}
