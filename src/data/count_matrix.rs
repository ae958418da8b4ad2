//! Count matrix representation for RNA-seq data

use std::collections::{HashMap, HashSet};

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{DegseaError, Result};

/// Rename repeated gene ids by appending _1, _2, ... to later occurrences,
/// skipping suffixes that are already taken by another id
fn deduplicate_names(names: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    if names.iter().all(|n| taken.insert(n.clone())) {
        return names;
    }

    let mut kept: HashSet<String> = HashSet::with_capacity(names.len());
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    names
        .into_iter()
        .map(|name| {
            if kept.insert(name.clone()) {
                return name;
            }
            let suffix = next_suffix.entry(name.clone()).or_insert(1);
            let mut renamed = format!("{}_{}", name, suffix);
            while taken.contains(&renamed) {
                *suffix += 1;
                renamed = format!("{}_{}", name, suffix);
            }
            *suffix += 1;
            taken.insert(renamed.clone());
            kept.insert(renamed.clone());
            log::warn!("Duplicate gene id '{}' renamed to '{}'", name, renamed);
            renamed
        })
        .collect()
}

/// Gene x sample table of non-negative integer read counts
#[derive(Debug, Clone)]
pub struct CountMatrix {
    /// Raw counts (genes x samples)
    counts: Array2<f64>,
    gene_ids: Vec<String>,
    sample_ids: Vec<String>,
}

impl CountMatrix {
    /// Create a count matrix from a dense array of whole-number counts
    pub fn new(counts: Array2<f64>, gene_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (n_genes, n_samples) = counts.dim();

        if gene_ids.len() != n_genes {
            return Err(DegseaError::DimensionMismatch {
                expected: format!("{} gene IDs", n_genes),
                got: format!("{} gene IDs", gene_ids.len()),
            });
        }
        if sample_ids.len() != n_samples {
            return Err(DegseaError::DimensionMismatch {
                expected: format!("{} sample IDs", n_samples),
                got: format!("{} sample IDs", sample_ids.len()),
            });
        }

        if let Some(((i, j), &x)) = counts
            .indexed_iter()
            .find(|(_, &x)| x < 0.0 || !x.is_finite() || x != x.round())
        {
            return Err(DegseaError::InvalidCountMatrix {
                reason: format!(
                    "count {} for gene '{}' in sample '{}' is not a non-negative integer",
                    x, gene_ids[i], sample_ids[j]
                ),
            });
        }

        let mut seen_samples = HashSet::new();
        if let Some(dup) = sample_ids.iter().find(|id| !seen_samples.insert(id.as_str())) {
            return Err(DegseaError::DegenerateInput {
                reason: format!("sample id '{}' appears more than once", dup),
            });
        }

        let gene_ids = deduplicate_names(gene_ids);

        Ok(Self {
            counts,
            gene_ids,
            sample_ids,
        })
    }

    /// Create from integer counts
    pub fn from_integers(
        counts: Array2<u32>,
        gene_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        Self::new(counts.mapv(f64::from), gene_ids, sample_ids)
    }

    /// Create from one row of counts per gene, rejecting ragged input
    pub fn from_rows(rows: Vec<Vec<u64>>, gene_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let n_samples = sample_ids.len();
        if rows.len() != gene_ids.len() {
            return Err(DegseaError::DegenerateInput {
                reason: format!("{} count rows for {} gene IDs", rows.len(), gene_ids.len()),
            });
        }

        let mut flat = Vec::with_capacity(rows.len() * n_samples);
        for (row, gene) in rows.iter().zip(gene_ids.iter()) {
            if row.len() != n_samples {
                return Err(DegseaError::DegenerateInput {
                    reason: format!(
                        "non-rectangular matrix: gene '{}' has {} counts, expected {}",
                        gene,
                        row.len(),
                        n_samples
                    ),
                });
            }
            flat.extend(row.iter().map(|&c| c as f64));
        }

        let counts = Array2::from_shape_vec((rows.len(), n_samples), flat).map_err(|e| {
            DegseaError::DegenerateInput {
                reason: format!("could not shape count matrix: {}", e),
            }
        })?;
        Self::new(counts, gene_ids, sample_ids)
    }

    pub fn n_genes(&self) -> usize {
        self.counts.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.ncols()
    }

    /// Raw counts as a view
    pub fn counts(&self) -> ArrayView2<'_, f64> {
        self.counts.view()
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Counts for a single gene across samples
    pub fn gene_counts(&self, gene_idx: usize) -> ArrayView1<'_, f64> {
        self.counts.row(gene_idx)
    }

    /// Counts for a single sample across genes
    pub fn sample_counts(&self, sample_idx: usize) -> ArrayView1<'_, f64> {
        self.counts.column(sample_idx)
    }

    pub fn gene_index(&self, gene_id: &str) -> Option<usize> {
        self.gene_ids.iter().position(|id| id == gene_id)
    }

    pub fn sample_index(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|id| id == sample_id)
    }

    /// Sum of counts per sample (library size)
    pub fn library_sizes(&self) -> Vec<f64> {
        self.counts.axis_iter(Axis(1)).map(|col| col.sum()).collect()
    }

    /// Sum of counts per gene across all samples
    pub fn gene_totals(&self) -> Vec<f64> {
        self.counts.axis_iter(Axis(0)).map(|row| row.sum()).collect()
    }

    /// Drop genes whose total count across all samples is `<= threshold`
    pub fn filter_low_counts(&self, threshold: f64) -> Result<Self> {
        let keep: Vec<usize> = self
            .gene_totals()
            .iter()
            .enumerate()
            .filter(|(_, &total)| total > threshold)
            .map(|(i, _)| i)
            .collect();

        if keep.is_empty() {
            return Err(DegseaError::EmptyData {
                reason: format!("no gene has a total count above {}", threshold),
            });
        }

        let dropped = self.n_genes() - keep.len();
        log::info!(
            "Low-count filter (total <= {}): kept {} genes, dropped {}",
            threshold,
            keep.len(),
            dropped
        );

        self.subset_genes(&keep)
    }

    /// Subset to specific samples
    pub fn subset_samples(&self, sample_indices: &[usize]) -> Result<Self> {
        let counts = self.counts.select(Axis(1), sample_indices);
        let sample_ids = sample_indices.iter().map(|&i| self.sample_ids[i].clone()).collect();
        Self::new(counts, self.gene_ids.clone(), sample_ids)
    }

    /// Subset to specific genes
    pub fn subset_genes(&self, gene_indices: &[usize]) -> Result<Self> {
        let counts = self.counts.select(Axis(0), gene_indices);
        let gene_ids = gene_indices.iter().map(|&i| self.gene_ids[i].clone()).collect();
        Self::new(counts, gene_ids, self.sample_ids.clone())
    }
}
