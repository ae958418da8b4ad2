//! P-value adjustment methods for multiple testing correction
//!
//! `None` entries are NA: they keep their position, stay `None`, and are not
//! counted among the tests.

/// Apply Benjamini-Hochberg FDR correction to p-values
///
/// Returns adjusted p-values that control the false discovery rate.
pub fn benjamini_hochberg(pvalues: &[Option<f64>]) -> Vec<Option<f64>> {
    let n = pvalues.len();
    let mut padj = vec![None; n];

    // Indices of testable p-values sorted ascending
    let mut indices: Vec<usize> = (0..n).filter(|&i| is_valid(pvalues[i])).collect();
    let m = indices.len();
    if m == 0 {
        return padj;
    }
    indices.sort_by(|&a, &b| {
        let pa = pvalues[a].unwrap_or(f64::NAN);
        let pb = pvalues[b].unwrap_or(f64::NAN);
        pa.total_cmp(&pb).then(a.cmp(&b))
    });

    let mut cummin = f64::INFINITY;
    for (rank0, &i) in indices.iter().enumerate().rev() {
        if let Some(p) = pvalues[i] {
            // p_adj = p * m / rank, then a running minimum from the largest p down
            let adj = (p * m as f64 / (rank0 + 1) as f64).min(1.0);
            cummin = cummin.min(adj);
            padj[i] = Some(cummin);
        }
    }

    padj
}

/// Apply Bonferroni correction to p-values
///
/// Multiplies each p-value by the number of tests. Controls the
/// family-wise error rate rather than the FDR.
pub fn bonferroni(pvalues: &[Option<f64>]) -> Vec<Option<f64>> {
    let m = pvalues.iter().filter(|p| is_valid(**p)).count();
    pvalues
        .iter()
        .map(|&p| match p {
            Some(p) if is_valid(Some(p)) => Some((p * m as f64).min(1.0)),
            _ => None,
        })
        .collect()
}

fn is_valid(p: Option<f64>) -> bool {
    matches!(p, Some(p) if p.is_finite())
}
