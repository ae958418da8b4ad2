//! Wald test for a two-group negative binomial comparison

use rayon::prelude::*;

use super::pvalue::{calculate_pvalue, calculate_pvalue_t};
use super::{adjust_pvalues, WaldParams};
use crate::data::{ComparisonDesign, Group};
use crate::dispersion::GeneDispersion;
use crate::error::{AnalysisWarning, DegseaError, Result};
use crate::normalization::{NormalizedCounts, SizeFactors};
use crate::results::{DeRecord, DeResults, GeneStatus};

/// Per-gene quantities of the Wald test on the natural-log scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaldStatistic {
    /// ln(mu_B / mu_A)
    pub log_ratio: f64,
    /// Standard error of `log_ratio`
    pub se: f64,
}

/// Inverse Fisher information of `log mu` for one group under NB(mu s_j, alpha)
fn log_mean_variance(mean: f64, sizes: &[f64], alpha: f64) -> f64 {
    let info: f64 = sizes.iter().map(|&s| s * mean / (1.0 + alpha * s * mean)).sum();
    1.0 / info
}

/// Wald statistic for one gene from its group means.
///
/// Returns `None` when both group means are zero. A single zero mean is
/// replaced by half a read spread over that group's depth.
pub fn wald_statistic(mean_a: f64, mean_b: f64, sizes_a: &[f64], sizes_b: &[f64], alpha: f64) -> Option<WaldStatistic> {
    if mean_a <= 0.0 && mean_b <= 0.0 {
        return None;
    }
    let floor = |mean: f64, sizes: &[f64]| {
        if mean > 0.0 {
            mean
        } else {
            0.5 / sizes.iter().sum::<f64>()
        }
    };
    let mu_a = floor(mean_a, sizes_a);
    let mu_b = floor(mean_b, sizes_b);

    let var = log_mean_variance(mu_a, sizes_a, alpha) + log_mean_variance(mu_b, sizes_b, alpha);
    let se = var.sqrt();
    if !se.is_finite() || se <= 0.0 {
        return None;
    }

    Some(WaldStatistic {
        log_ratio: (mu_b / mu_a).ln(),
        se,
    })
}

/// Test every gene for a difference between group B and group A.
///
/// Genes with zero counts in both groups get NA statistics and an
/// `UntestableGene` warning.
pub fn wald_test(
    normalized: &NormalizedCounts,
    size_factors: &SizeFactors,
    dispersions: &GeneDispersion,
    design: &ComparisonDesign,
    params: &WaldParams,
) -> Result<DeResults> {
    let n_genes = normalized.n_genes();
    if dispersions.len() != n_genes {
        return Err(DegseaError::DimensionMismatch {
            expected: format!("{} dispersions", n_genes),
            got: format!("{} dispersions", dispersions.len()),
        });
    }
    if design.n_samples() != normalized.n_samples() || size_factors.len() != normalized.n_samples() {
        return Err(DegseaError::DimensionMismatch {
            expected: format!("{} samples", normalized.n_samples()),
            got: format!(
                "{} design samples, {} size factors",
                design.n_samples(),
                size_factors.len()
            ),
        });
    }
    if params.lfc_threshold < 0.0 {
        return Err(DegseaError::InvalidInput {
            reason: format!("lfc_threshold must be non-negative, got {}", params.lfc_threshold),
        });
    }

    let sf = size_factors.values();
    let sizes_a: Vec<f64> = design.indices(Group::A).iter().map(|&j| sf[j]).collect();
    let sizes_b: Vec<f64> = design.indices(Group::B).iter().map(|&j| sf[j]).collect();

    let base_means = normalized.row_means();
    let means_a = normalized.group_means(design, Group::A);
    let means_b = normalized.group_means(design, Group::B);
    let t_df = design.residual_df() as f64;
    let ln2 = std::f64::consts::LN_2;

    let mut records: Vec<DeRecord> = (0..n_genes)
        .into_par_iter()
        .map(|i| {
            let gene_id = normalized.gene_ids()[i].clone();
            let alpha = dispersions.values()[i];
            let Some(wald) = wald_statistic(means_a[i], means_b[i], &sizes_a, &sizes_b, alpha) else {
                return DeRecord::untestable(gene_id, base_means[i]);
            };

            let lfc = wald.log_ratio / ln2;
            let lfc_se = wald.se / ln2;
            let stat = if params.lfc_threshold > 0.0 {
                // greater-abs alternative: H0 |lfc| <= threshold
                let excess = (lfc.abs() - params.lfc_threshold).max(0.0);
                lfc.signum() * excess / lfc_se
            } else {
                wald.log_ratio / wald.se
            };
            let p_value = if params.use_t {
                calculate_pvalue_t(stat, t_df)
            } else {
                calculate_pvalue(stat)
            };

            DeRecord {
                gene_id,
                base_mean: base_means[i],
                log2_fold_change: Some(lfc),
                lfc_se: Some(lfc_se),
                test_statistic: Some(stat),
                p_value,
                adjusted_p_value: None,
                dispersion: Some(alpha),
                status: GeneStatus::Tested,
            }
        })
        .collect();

    let pvalues: Vec<Option<f64>> = records.iter().map(|r| r.p_value).collect();
    for (record, padj) in records.iter_mut().zip(adjust_pvalues(&pvalues, params.fdr_method)) {
        record.adjusted_p_value = padj;
    }

    let warnings: Vec<AnalysisWarning> = records
        .iter()
        .filter(|r| r.status == GeneStatus::AllZero)
        .map(|r| AnalysisWarning::UntestableGene {
            gene_id: r.gene_id.clone(),
        })
        .collect();
    for w in &warnings {
        log::warn!("{}", w);
    }

    log::info!(
        "Wald test ({} vs {}): {} of {} genes tested",
        design.label(Group::B),
        design.label(Group::A),
        n_genes - warnings.len(),
        n_genes
    );

    Ok(DeResults {
        group_a: design.label(Group::A).to_string(),
        group_b: design.label(Group::B).to_string(),
        records,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CountMatrix, SampleMetadata};
    use crate::dispersion::{estimate_dispersions, DispersionParams};
    use crate::normalization::normalize;

    fn design_for(counts: &CountMatrix) -> ComparisonDesign {
        let meta = SampleMetadata::from_pairs(
            "condition",
            [("s1", "A"), ("s2", "A"), ("s3", "A"), ("s4", "B"), ("s5", "B"), ("s6", "B")],
        )
        .unwrap();
        ComparisonDesign::new(counts, &meta, "condition", "A", "B", 2).unwrap()
    }

    fn fixture(rows: Vec<Vec<u64>>) -> (NormalizedCounts, SizeFactors, GeneDispersion, ComparisonDesign) {
        let n = rows.len();
        let counts = CountMatrix::from_rows(
            rows,
            (0..n).map(|i| format!("gene{}", i)).collect(),
            (1..=6).map(|j| format!("s{}", j)).collect(),
        )
        .unwrap();
        let design = design_for(&counts);
        let sf = SizeFactors::new(counts.sample_ids().to_vec(), vec![1.0; 6]).unwrap();
        let norm = normalize(&counts, &sf).unwrap();
        let disp = estimate_dispersions(&norm, &sf, &design, &DispersionParams::default()).unwrap();
        (norm, sf, disp, design)
    }

    fn background() -> Vec<Vec<u64>> {
        let pattern = [0.9, 1.1, 1.0, 1.05, 0.95, 1.0];
        (0..40)
            .map(|i| {
                let level = 20.0 + 15.0 * i as f64;
                pattern.iter().map(|&p| (level * p).round() as u64).collect()
            })
            .collect()
    }

    #[test]
    fn test_fourfold_gene_is_significant() {
        let mut rows = background();
        rows.push(vec![9, 10, 11, 38, 40, 42]);
        let (norm, sf, disp, design) = fixture(rows);
        let res = wald_test(&norm, &sf, &disp, &design, &WaldParams::default()).unwrap();

        let rec = res.get("gene40").unwrap();
        assert!((rec.log2_fold_change.unwrap() - 2.0).abs() < 1e-9);
        assert!(rec.test_statistic.unwrap() > 0.0);
        assert!(rec.adjusted_p_value.unwrap() < 0.05);
        assert_eq!(rec.status, GeneStatus::Tested);
    }

    #[test]
    fn test_higher_dispersion_widens_se() {
        let sizes = [1.0, 1.0, 1.0];
        let low = wald_statistic(10.0, 40.0, &sizes, &sizes, 0.01).unwrap();
        let high = wald_statistic(10.0, 40.0, &sizes, &sizes, 0.5).unwrap();
        assert_eq!(low.log_ratio, high.log_ratio);
        assert!(high.se > low.se);
    }

    #[test]
    fn test_standard_error_formula() {
        let sizes = [1.0, 1.0, 1.0];
        let w = wald_statistic(10.0, 40.0, &sizes, &sizes, 0.1).unwrap();
        // 1/(3*10/2) + 1/(3*40/5)
        let expected = (2.0 / 30.0 + 5.0 / 120.0_f64).sqrt();
        assert!((w.se - expected).abs() < 1e-12);
        assert!((w.log_ratio - 4.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_zero_in_one_group_stays_finite() {
        let sizes = [1.0, 1.0, 1.0];
        let w = wald_statistic(0.0, 50.0, &sizes, &sizes, 0.1).unwrap();
        // mu_A floored to 0.5 / 3
        assert!((w.log_ratio - (50.0_f64 / (0.5 / 3.0)).ln()).abs() < 1e-9);
        assert!(w.se.is_finite());
        assert_eq!(wald_statistic(0.0, 0.0, &sizes, &sizes, 0.1), None);
    }

    #[test]
    fn test_all_zero_gene_is_na() {
        let mut rows = background();
        rows.push(vec![0, 0, 0, 0, 0, 0]);
        let (norm, sf, disp, design) = fixture(rows);
        let res = wald_test(&norm, &sf, &disp, &design, &WaldParams::default()).unwrap();
        let rec = res.get("gene40").unwrap();
        assert_eq!(rec.status, GeneStatus::AllZero);
        assert!(rec.log2_fold_change.is_none());
        assert!(rec.p_value.is_none());
        assert!(rec.adjusted_p_value.is_none());
        assert_eq!(res.untestable_genes(), vec!["gene40"]);
        assert_eq!(res.warnings.len(), 1);
    }

    #[test]
    fn test_adjusted_never_below_raw() {
        let mut rows = background();
        rows.push(vec![9, 10, 11, 38, 40, 42]);
        rows.push(vec![50, 45, 55, 12, 10, 14]);
        let (norm, sf, disp, design) = fixture(rows);
        let res = wald_test(&norm, &sf, &disp, &design, &WaldParams::default()).unwrap();
        for r in &res.records {
            assert!(r.adjusted_p_value.unwrap() >= r.p_value.unwrap());
        }
        assert!(res.get("gene41").unwrap().log2_fold_change.unwrap() < 0.0);
    }

    #[test]
    fn test_lfc_threshold_and_t() {
        let mut rows = background();
        rows.push(vec![9, 10, 11, 38, 40, 42]);
        let (norm, sf, disp, design) = fixture(rows);

        let base = wald_test(&norm, &sf, &disp, &design, &WaldParams::default()).unwrap();
        let thresholded = wald_test(
            &norm,
            &sf,
            &disp,
            &design,
            &WaldParams {
                lfc_threshold: 1.0,
                ..WaldParams::default()
            },
        )
        .unwrap();
        let t_test = wald_test(
            &norm,
            &sf,
            &disp,
            &design,
            &WaldParams {
                use_t: true,
                ..WaldParams::default()
            },
        )
        .unwrap();

        let p = |r: &DeResults| r.get("gene40").unwrap().p_value.unwrap();
        assert!(p(&thresholded) > p(&base));
        assert!(p(&t_test) > p(&base));
        // a near-null gene is pinned at p = 1 under the threshold
        assert_eq!(thresholded.get("gene0").unwrap().p_value, Some(1.0));
    }
}
