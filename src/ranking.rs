//! Genes ranked by their signed differential expression statistic

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{DegseaError, Result};
use crate::results::DeResults;

/// Genes sorted by statistic, largest first, ties broken by gene ID
#[derive(Debug, Clone, Serialize)]
pub struct RankedGeneList {
    genes: Vec<String>,
    statistics: Vec<f64>,
    #[serde(skip)]
    positions: HashMap<String, usize>,
}

impl RankedGeneList {
    /// Rank a preranked `(gene, statistic)` list.
    /// Rejects NaN or infinite statistics and duplicate gene IDs.
    pub fn new(entries: Vec<(String, f64)>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(entries.len());
        for (gene, stat) in &entries {
            if !stat.is_finite() {
                return Err(DegseaError::InvalidInput {
                    reason: format!("statistic for gene '{}' is not finite: {}", gene, stat),
                });
            }
            if !seen.insert(gene.as_str()) {
                return Err(DegseaError::InvalidInput {
                    reason: format!("gene '{}' appears more than once in the ranking", gene),
                });
            }
        }
        Ok(Self::sorted(entries))
    }

    /// Rank genes by Wald statistic, dropping genes whose statistic is NA or
    /// not finite
    pub fn from_results(results: &DeResults) -> Self {
        let entries: Vec<(String, f64)> = results
            .records
            .iter()
            .filter_map(|r| match r.test_statistic {
                Some(s) if s.is_finite() => Some((r.gene_id.clone(), s)),
                _ => None,
            })
            .collect();

        let dropped = results.records.len() - entries.len();
        if dropped > 0 {
            log::info!("Ranking: dropped {} genes without a test statistic", dropped);
        }
        Self::sorted(entries)
    }

    fn sorted(mut entries: Vec<(String, f64)>) -> Self {
        entries.sort_by(|(ga, sa), (gb, sb)| sb.total_cmp(sa).then_with(|| ga.cmp(gb)));
        let positions = entries
            .iter()
            .enumerate()
            .map(|(i, (g, _))| (g.clone(), i))
            .collect();
        let (genes, statistics) = entries.into_iter().unzip();
        Self {
            genes,
            statistics,
            positions,
        }
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Gene IDs in rank order
    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    /// Statistics in rank order (non-increasing)
    pub fn statistics(&self) -> &[f64] {
        &self.statistics
    }

    /// Zero-based rank of a gene
    pub fn position(&self, gene_id: &str) -> Option<usize> {
        self.positions.get(gene_id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.genes.iter().map(String::as_str).zip(self.statistics.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{DeRecord, GeneStatus};

    fn entry(g: &str, s: f64) -> (String, f64) {
        (g.to_string(), s)
    }

    #[test]
    fn test_sorted_descending_with_tie_break() {
        let ranked = RankedGeneList::new(vec![
            entry("b", 1.0),
            entry("c", -2.0),
            entry("a", 1.0),
            entry("d", 3.5),
        ])
        .unwrap();
        assert_eq!(ranked.genes(), &["d", "a", "b", "c"]);
        assert_eq!(ranked.statistics(), &[3.5, 1.0, 1.0, -2.0]);
        assert_eq!(ranked.position("b"), Some(2));
        assert_eq!(ranked.position("zzz"), None);
    }

    #[test]
    fn test_rejects_non_finite_and_duplicates() {
        assert!(RankedGeneList::new(vec![entry("a", f64::NAN)]).is_err());
        let with_inf = RankedGeneList::new(vec![entry("a", 2.0), entry("ginf", f64::INFINITY)]);
        assert!(matches!(with_inf, Err(DegseaError::InvalidInput { .. })));
        assert!(RankedGeneList::new(vec![entry("a", f64::NEG_INFINITY)]).is_err());
        assert!(RankedGeneList::new(vec![entry("a", 1.0), entry("a", 2.0)]).is_err());
    }

    #[test]
    fn test_from_results_drops_na() {
        let record = |id: &str, stat: Option<f64>| DeRecord {
            gene_id: id.to_string(),
            base_mean: 1.0,
            log2_fold_change: stat,
            lfc_se: stat.map(|_| 1.0),
            test_statistic: stat,
            p_value: stat.map(|_| 0.5),
            adjusted_p_value: stat.map(|_| 0.5),
            dispersion: Some(0.1),
            status: if stat.is_some() { GeneStatus::Tested } else { GeneStatus::AllZero },
        };
        let results = DeResults {
            group_a: "A".to_string(),
            group_b: "B".to_string(),
            records: vec![record("x", Some(-1.0)), record("y", None), record("z", Some(4.0))],
            warnings: Vec::new(),
        };
        let ranked = RankedGeneList::from_results(&results);
        assert_eq!(ranked.genes(), &["z", "x"]);
        assert_eq!(ranked.iter().next(), Some(("z", 4.0)));
    }
}
