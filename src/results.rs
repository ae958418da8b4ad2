//! Differential expression result table

use serde::{Deserialize, Serialize};

use crate::error::AnalysisWarning;

/// Whether a gene's statistics were computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneStatus {
    Tested,
    /// Zero normalized counts in both groups; every statistic is NA
    AllZero,
}

/// One row of the differential expression table.
/// `None` marks an NA value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeRecord {
    pub gene_id: String,
    /// Mean normalized count over all samples
    pub base_mean: f64,
    /// log2(group B / group A), positive when higher in group B
    pub log2_fold_change: Option<f64>,
    pub lfc_se: Option<f64>,
    /// Signed Wald statistic
    pub test_statistic: Option<f64>,
    pub p_value: Option<f64>,
    pub adjusted_p_value: Option<f64>,
    /// Dispersion used for the test
    pub dispersion: Option<f64>,
    pub status: GeneStatus,
}

impl DeRecord {
    pub(crate) fn untestable(gene_id: String, base_mean: f64) -> Self {
        Self {
            gene_id,
            base_mean,
            log2_fold_change: None,
            lfc_se: None,
            test_statistic: None,
            p_value: None,
            adjusted_p_value: None,
            dispersion: None,
            status: GeneStatus::AllZero,
        }
    }

    fn is_significant(&self, alpha: f64) -> bool {
        matches!(self.adjusted_p_value, Some(p) if p < alpha)
    }
}

/// Results of a two-group comparison, one record per gene in input order
#[derive(Debug, Clone, Serialize)]
pub struct DeResults {
    /// Reference group (denominator of the fold change)
    pub group_a: String,
    /// Comparison group (numerator of the fold change)
    pub group_b: String,
    pub records: Vec<DeRecord>,
    #[serde(skip)]
    pub warnings: Vec<AnalysisWarning>,
}

impl DeResults {
    pub fn n_genes(&self) -> usize {
        self.records.len()
    }

    pub fn get(&self, gene_id: &str) -> Option<&DeRecord> {
        self.records.iter().find(|r| r.gene_id == gene_id)
    }

    /// Genes with adjusted p-value below `alpha`
    pub fn significant_genes(&self, alpha: f64) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.is_significant(alpha))
            .map(|r| r.gene_id.as_str())
            .collect()
    }

    /// Significant genes higher in group B by at least `min_lfc`
    pub fn upregulated_genes(&self, alpha: f64, min_lfc: f64) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.is_significant(alpha) && matches!(r.log2_fold_change, Some(l) if l > 0.0 && l >= min_lfc))
            .map(|r| r.gene_id.as_str())
            .collect()
    }

    /// Significant genes lower in group B by at least `min_lfc`
    pub fn downregulated_genes(&self, alpha: f64, min_lfc: f64) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.is_significant(alpha) && matches!(r.log2_fold_change, Some(l) if l < 0.0 && l <= -min_lfc))
            .map(|r| r.gene_id.as_str())
            .collect()
    }

    pub fn untestable_genes(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.status == GeneStatus::AllZero)
            .map(|r| r.gene_id.as_str())
            .collect()
    }

    pub fn summary(&self, alpha: f64) -> ResultsSummary {
        ResultsSummary {
            group_a: self.group_a.clone(),
            group_b: self.group_b.clone(),
            total_genes: self.n_genes(),
            genes_tested: self.records.iter().filter(|r| r.p_value.is_some()).count(),
            significant: self.significant_genes(alpha).len(),
            upregulated: self.upregulated_genes(alpha, 0.0).len(),
            downregulated: self.downregulated_genes(alpha, 0.0).len(),
            alpha,
        }
    }
}

/// Counts of tested and significant genes at a threshold
#[derive(Debug, Clone)]
pub struct ResultsSummary {
    pub group_a: String,
    pub group_b: String,
    pub total_genes: usize,
    pub genes_tested: usize,
    pub significant: usize,
    pub upregulated: usize,
    pub downregulated: usize,
    pub alpha: f64,
}

impl std::fmt::Display for ResultsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Differential expression: {} vs {}", self.group_b, self.group_a)?;
        writeln!(f, "Total genes: {}", self.total_genes)?;
        writeln!(f, "Genes tested: {}", self.genes_tested)?;
        writeln!(f, "Significant (padj < {}): {}", self.alpha, self.significant)?;
        writeln!(f, "  Up in {}: {}", self.group_b, self.upregulated)?;
        writeln!(f, "  Down in {}: {}", self.group_b, self.downregulated)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, lfc: f64, padj: Option<f64>) -> DeRecord {
        DeRecord {
            gene_id: id.to_string(),
            base_mean: 10.0,
            log2_fold_change: Some(lfc),
            lfc_se: Some(0.2),
            test_statistic: Some(lfc / 0.2),
            p_value: padj,
            adjusted_p_value: padj,
            dispersion: Some(0.1),
            status: GeneStatus::Tested,
        }
    }

    fn results() -> DeResults {
        DeResults {
            group_a: "ctrl".to_string(),
            group_b: "treated".to_string(),
            records: vec![
                record("up", 2.0, Some(0.001)),
                record("down", -1.5, Some(0.01)),
                record("flat", 0.1, Some(0.8)),
                DeRecord::untestable("zero".to_string(), 0.0),
            ],
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_gene_queries() {
        let res = results();
        assert_eq!(res.significant_genes(0.05), vec!["up", "down"]);
        assert_eq!(res.upregulated_genes(0.05, 0.0), vec!["up"]);
        assert_eq!(res.downregulated_genes(0.05, 0.0), vec!["down"]);
        assert_eq!(res.downregulated_genes(0.05, 2.0), Vec::<&str>::new());
        assert_eq!(res.untestable_genes(), vec!["zero"]);
        assert!(res.get("zero").unwrap().p_value.is_none());
    }

    #[test]
    fn test_summary() {
        let summary = results().summary(0.05);
        assert_eq!(summary.total_genes, 4);
        assert_eq!(summary.genes_tested, 3);
        assert_eq!(summary.significant, 2);
        let text = summary.to_string();
        assert!(text.contains("treated vs ctrl"));
        assert!(text.contains("Up in treated: 1"));
    }

    #[test]
    fn test_record_serializes_na_as_null() {
        let json = serde_json::to_value(DeRecord::untestable("g".to_string(), 0.0)).unwrap();
        assert!(json["p_value"].is_null());
        assert_eq!(json["status"], "all_zero");
    }
}
