//! Size-factor normalized count views

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use super::SizeFactors;
use crate::data::{ComparisonDesign, CountMatrix, Group};
use crate::error::{DegseaError, Result};

/// Raw counts divided column-wise by the sample size factors
#[derive(Debug, Clone)]
pub struct NormalizedCounts {
    values: Array2<f64>,
    gene_ids: Vec<String>,
    sample_ids: Vec<String>,
}

/// Normalize raw counts: `normalized[i, j] = counts[i, j] / size_factor[j]`
pub fn normalize(counts: &CountMatrix, size_factors: &SizeFactors) -> Result<NormalizedCounts> {
    if size_factors.sample_ids() != counts.sample_ids() {
        return Err(DegseaError::DimensionMismatch {
            expected: format!("size factors for samples {:?}", counts.sample_ids()),
            got: format!("{:?}", size_factors.sample_ids()),
        });
    }

    let mut values = counts.counts().to_owned();
    for (mut col, &sf) in values.axis_iter_mut(Axis(1)).zip(size_factors.values()) {
        col.mapv_inplace(|x| x / sf);
    }

    Ok(NormalizedCounts {
        values,
        gene_ids: counts.gene_ids().to_vec(),
        sample_ids: counts.sample_ids().to_vec(),
    })
}

impl NormalizedCounts {
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn n_genes(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.values.ncols()
    }

    pub fn gene_row(&self, gene_idx: usize) -> ArrayView1<'_, f64> {
        self.values.row(gene_idx)
    }

    /// Mean normalized count per gene (base mean)
    pub fn row_means(&self) -> Vec<f64> {
        let n = self.n_samples() as f64;
        self.values.axis_iter(Axis(0)).map(|row| row.sum() / n).collect()
    }

    /// Mean normalized count per gene within one side of the comparison
    pub fn group_means(&self, design: &ComparisonDesign, group: Group) -> Vec<f64> {
        let idx = design.indices(group);
        let n = idx.len() as f64;
        self.values
            .axis_iter(Axis(0))
            .map(|row| idx.iter().map(|&j| row[j]).sum::<f64>() / n)
            .collect()
    }

    /// `log2(normalized + pseudocount)`, the usual transform for clustering and plotting
    pub fn log2_transformed(&self, pseudocount: f64) -> Array2<f64> {
        self.values.mapv(|x| (x + pseudocount).log2())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn setup() -> (CountMatrix, SizeFactors) {
        let counts = CountMatrix::new(
            array![[10.0, 20.0, 40.0], [5.0, 10.0, 20.0]],
            vec!["g1".to_string(), "g2".to_string()],
            vec!["s1".to_string(), "s2".to_string(), "s3".to_string()],
        )
        .unwrap();
        let sf = SizeFactors::new(counts.sample_ids().to_vec(), vec![0.5, 1.0, 2.0]).unwrap();
        (counts, sf)
    }

    #[test]
    fn test_normalize_divides_by_size_factor() {
        let (counts, sf) = setup();
        let norm = normalize(&counts, &sf).unwrap();
        assert_eq!(norm.values(), array![[20.0, 20.0, 20.0], [10.0, 10.0, 10.0]]);
        assert_eq!(norm.row_means(), vec![20.0, 10.0]);
    }

    #[test]
    fn test_log2_transform() {
        let (counts, sf) = setup();
        let norm = normalize(&counts, &sf).unwrap();
        let logged = norm.log2_transformed(1.0);
        assert!((logged[[1, 0]] - 11.0_f64.log2()).abs() < 1e-12);
    }

    #[test]
    fn test_sample_mismatch_rejected() {
        let (counts, _) = setup();
        let sf = SizeFactors::new(
            vec!["s1".to_string(), "s3".to_string(), "s2".to_string()],
            vec![1.0, 1.0, 1.0],
        )
        .unwrap();
        assert!(normalize(&counts, &sf).is_err());
    }
}
