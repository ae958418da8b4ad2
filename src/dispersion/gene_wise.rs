//! Gene-wise method-of-moments dispersion estimates

use ndarray::ArrayView1;

use crate::data::{ComparisonDesign, Group};

/// Per-gene moments from normalized counts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeneMoments {
    /// Mean normalized count over all samples
    pub mean: f64,
    /// Pooled within-group variance (residuals from each group mean)
    pub variance: f64,
}

/// Mean over all samples and pooled within-group variance of one gene.
///
/// The variance uses `n - 2` degrees of freedom so the group difference
/// under test does not inflate the dispersion.
pub fn gene_moments(row: ArrayView1<f64>, design: &ComparisonDesign) -> GeneMoments {
    let n = row.len();
    let mean = row.sum() / n as f64;

    let mut group_sum = [0.0_f64; 2];
    let mut group_n = [0usize; 2];
    for (&x, &g) in row.iter().zip(design.assignments()) {
        let k = group_slot(g);
        group_sum[k] += x;
        group_n[k] += 1;
    }
    let group_mean = [
        group_sum[0] / group_n[0].max(1) as f64,
        group_sum[1] / group_n[1].max(1) as f64,
    ];

    let df = design.residual_df();
    let variance = if df == 0 {
        f64::NAN
    } else {
        let ss: f64 = row
            .iter()
            .zip(design.assignments())
            .map(|(&x, &g)| (x - group_mean[group_slot(g)]).powi(2))
            .sum();
        ss / df as f64
    };

    GeneMoments { mean, variance }
}

fn group_slot(g: Group) -> usize {
    match g {
        Group::A => 0,
        Group::B => 1,
    }
}

/// Moments dispersion `(v - mean * xim) / mean^2`, with `xim` the mean of
/// the reciprocal size factors (the Poisson part of the variance).
///
/// Returns `None` when the variance does not exceed the Poisson level (for
/// example identical replicates) or cannot be computed; the estimate is then
/// not informative and the trend value is used instead.
pub fn moments_dispersion(moments: GeneMoments, xim: f64, min_disp: f64, max_disp: f64) -> Option<f64> {
    let GeneMoments { mean, variance } = moments;
    if !(mean > 0.0) || !variance.is_finite() {
        return None;
    }
    let disp = (variance - mean * xim) / (mean * mean);
    if disp > min_disp {
        Some(disp.min(max_disp))
    } else {
        None
    }
}
