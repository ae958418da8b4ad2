//! Empirical Bayes shrinkage of gene-wise dispersions toward the trend
//!
//! On the log scale the gene-wise estimate is treated as normal around the
//! true log dispersion with sampling variance `trigamma(df / 2)`, and the true
//! value as normal around the trend with a prior variance estimated from the
//! spread of the residuals. The posterior mode is the precision-weighted
//! average of the two.

use crate::stats::{mad_squared, trigamma};

/// Lower bound on the prior variance of log dispersions
const MIN_PRIOR_VAR: f64 = 0.25;

/// Spread of log-dispersion residuals around the trend
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorVariance {
    /// Variance of the true log dispersions around the trend
    pub prior_var: f64,
    /// Robust variance of the observed log residuals (MAD^2)
    pub var_log_disp_ests: f64,
    /// Expected sampling variance of a gene-wise log estimate
    pub sampling_var: f64,
}

/// Estimate the prior variance from the estimable genes.
pub fn estimate_prior_variance(gene_wise: &[Option<f64>], trended: &[f64], residual_df: usize) -> PriorVariance {
    let sampling_var = if residual_df > 0 {
        trigamma(residual_df as f64 / 2.0)
    } else {
        f64::INFINITY
    };

    let mut residuals: Vec<f64> = gene_wise
        .iter()
        .zip(trended)
        .filter_map(|(g, &t)| match g {
            Some(g) if *g > 0.0 && t > 0.0 => Some(g.ln() - t.ln()),
            _ => None,
        })
        .collect();

    if residuals.len() < 3 {
        return PriorVariance {
            prior_var: MIN_PRIOR_VAR,
            var_log_disp_ests: MIN_PRIOR_VAR,
            sampling_var,
        };
    }

    let var_log_disp_ests = mad_squared(&mut residuals);
    let prior_var = (var_log_disp_ests - sampling_var).max(MIN_PRIOR_VAR);

    log::debug!(
        "Dispersion prior: df={}, varLogDispEsts={:.4}, sampling={:.4}, prior={:.4}",
        residual_df,
        var_log_disp_ests,
        sampling_var,
        prior_var
    );

    PriorVariance {
        prior_var,
        var_log_disp_ests,
        sampling_var,
    }
}

/// Outcome of shrinking one gene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShrunkDispersion {
    pub value: f64,
    /// Gene-wise estimate far above the trend, kept unshrunk
    pub outlier: bool,
}

/// Posterior log-scale shrinkage of one gene's dispersion.
///
/// Genes without an estimable gene-wise value take the trend. Upper
/// outliers (log residual above `outlier_sd` robust SDs) keep their own value.
pub fn shrink_dispersion(
    gene_wise: Option<f64>,
    trend: f64,
    prior: &PriorVariance,
    outlier_sd: f64,
    min_disp: f64,
    max_disp: f64,
) -> ShrunkDispersion {
    let clamp = |x: f64| x.clamp(min_disp, max_disp);
    let trend = clamp(trend);

    let Some(gene_wise) = gene_wise else {
        return ShrunkDispersion {
            value: trend,
            outlier: false,
        };
    };

    let log_g = gene_wise.ln();
    let log_t = trend.ln();

    if log_g - log_t > outlier_sd * prior.var_log_disp_ests.sqrt() {
        return ShrunkDispersion {
            value: clamp(gene_wise),
            outlier: true,
        };
    }

    let w_gene = 1.0 / prior.sampling_var;
    let w_prior = 1.0 / prior.prior_var;
    let log_post = (w_gene * log_g + w_prior * log_t) / (w_gene + w_prior);

    ShrunkDispersion {
        value: clamp(log_post.exp()),
        outlier: false,
    }
}
