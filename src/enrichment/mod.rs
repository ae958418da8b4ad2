//! Preranked gene-set enrichment with a permutation null
//!
//! Each set is scored by a weighted running sum down the ranked list and
//! compared against scores of random gene subsets of the same size.

mod gene_set;
mod permutation;
mod score;

pub use gene_set::{map_gene_sets, GeneSet, MappedGeneSets};
pub use permutation::{normalized_score, null_distributions, permutation_pvalue};
pub use score::{leading_edge, member_positions, running_sum, score_positions, step_weights, Extreme, RunningSum};

use std::collections::BTreeSet;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisWarning, DegseaError, Result};
use crate::ranking::RankedGeneList;
use crate::testing::{adjust_pvalues, FdrMethod};

/// Options of the enrichment test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentParams {
    /// Smallest matched set size tested
    pub min_size: usize,
    /// Largest matched set size tested
    pub max_size: usize,
    pub permutation_count: usize,
    pub random_seed: u64,
    /// Exponent on |statistic| for hit steps; 0 gives the classic KS walk
    pub weight: f64,
    pub fdr_method: FdrMethod,
}

impl EnrichmentParams {
    pub fn new(random_seed: u64) -> Self {
        Self {
            min_size: 15,
            max_size: 500,
            permutation_count: 2000,
            random_seed,
            weight: 1.0,
            fdr_method: FdrMethod::BenjaminiHochberg,
        }
    }
}

/// Whether a set was scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Tested,
    /// Matched size outside `[min_size, max_size]`
    SkippedSize { min_size: usize, max_size: usize },
}

/// One row of the enrichment table. `None` marks NA.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentRecord {
    pub name: String,
    /// Declared size of the set
    pub set_size: usize,
    /// Members present in the ranking
    pub matched_size: usize,
    pub enrichment_score: Option<f64>,
    pub normalized_enrichment_score: Option<f64>,
    pub p_value: Option<f64>,
    pub adjusted_p_value: Option<f64>,
    pub leading_edge: Vec<String>,
    pub status: EnrichmentStatus,
}

/// Enrichment results, one record per input set in input order
#[derive(Debug, Clone, Serialize)]
pub struct EnrichmentResults {
    pub records: Vec<EnrichmentRecord>,
    #[serde(skip)]
    pub warnings: Vec<AnalysisWarning>,
}

impl EnrichmentResults {
    pub fn get(&self, name: &str) -> Option<&EnrichmentRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Tested sets with adjusted p-value below `alpha`, most significant first
    pub fn significant(&self, alpha: f64) -> Vec<&EnrichmentRecord> {
        let mut hits: Vec<&EnrichmentRecord> = self
            .records
            .iter()
            .filter(|r| matches!(r.adjusted_p_value, Some(p) if p < alpha))
            .collect();
        hits.sort_by(|a, b| {
            let pa = a.adjusted_p_value.unwrap_or(f64::INFINITY);
            let pb = b.adjusted_p_value.unwrap_or(f64::INFINITY);
            pa.total_cmp(&pb).then_with(|| a.name.cmp(&b.name))
        });
        hits
    }

    pub fn n_tested(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == EnrichmentStatus::Tested)
            .count()
    }
}

fn validate(ranked: &RankedGeneList, gene_sets: &[GeneSet], params: &EnrichmentParams) -> Result<()> {
    if ranked.is_empty() {
        return Err(DegseaError::EmptyData {
            reason: "ranked gene list is empty".to_string(),
        });
    }
    if gene_sets.is_empty() {
        return Err(DegseaError::InvalidInput {
            reason: "no gene sets supplied".to_string(),
        });
    }
    if params.permutation_count == 0 {
        return Err(DegseaError::InvalidInput {
            reason: "permutation_count must be > 0".to_string(),
        });
    }
    if params.min_size > params.max_size {
        return Err(DegseaError::InvalidInput {
            reason: format!(
                "min_size ({}) is larger than max_size ({})",
                params.min_size, params.max_size
            ),
        });
    }
    if !(params.weight >= 0.0) {
        return Err(DegseaError::InvalidInput {
            reason: format!("weight must be non-negative, got {}", params.weight),
        });
    }
    Ok(())
}

/// Test every gene set for enrichment at either end of the ranking.
pub fn run_enrichment(
    ranked: &RankedGeneList,
    gene_sets: &[GeneSet],
    params: &EnrichmentParams,
) -> Result<EnrichmentResults> {
    validate(ranked, gene_sets, params)?;

    let n = ranked.len();
    let weights = step_weights(ranked, params.weight);
    let positions: Vec<Vec<usize>> = gene_sets.iter().map(|s| member_positions(ranked, s)).collect();

    let mut warnings = Vec::new();
    let total: usize = gene_sets.iter().map(GeneSet::len).sum();
    let matched: usize = positions.iter().map(Vec::len).sum();
    if matched == 0 {
        return Err(DegseaError::IdentifierMismatch {
            reason: format!(
                "none of the {} gene set identifiers occur among the {} ranked genes",
                total, n
            ),
        });
    }
    if matched < total {
        let warning = AnalysisWarning::UnmatchedIdentifiers {
            context: "gene sets vs ranked list".to_string(),
            unmatched: total - matched,
            total,
        };
        log::warn!("{}", warning);
        warnings.push(warning);
    }

    let in_range = |k: usize| k > 0 && k >= params.min_size && k <= params.max_size;
    for (set, pos) in gene_sets.iter().zip(&positions) {
        if pos.len() < set.len() {
            log::debug!(
                "Gene set '{}': {} of {} members not in ranking",
                set.name(),
                set.len() - pos.len(),
                set.len()
            );
        }
        if !in_range(pos.len()) {
            let warning = AnalysisWarning::GeneSetSizeOutOfRange {
                set_name: set.name().to_string(),
                matched_size: pos.len(),
                min_size: params.min_size,
                max_size: params.max_size,
            };
            log::warn!("{}", warning);
            warnings.push(warning);
        }
    }

    let sizes: BTreeSet<usize> = positions.iter().map(Vec::len).filter(|&k| in_range(k)).collect();
    let nulls = null_distributions(&weights, &sizes, params.permutation_count, params.random_seed);

    let mut records: Vec<EnrichmentRecord> = gene_sets
        .par_iter()
        .zip(positions.par_iter())
        .map(|(set, pos)| {
            let skipped = || EnrichmentRecord {
                name: set.name().to_string(),
                set_size: set.len(),
                matched_size: pos.len(),
                enrichment_score: None,
                normalized_enrichment_score: None,
                p_value: None,
                adjusted_p_value: None,
                leading_edge: Vec::new(),
                status: EnrichmentStatus::SkippedSize {
                    min_size: params.min_size,
                    max_size: params.max_size,
                },
            };
            let Some(null) = nulls.get(&pos.len()) else {
                return skipped();
            };

            let extreme = score_positions(pos, &weights, n);
            let edge = leading_edge(pos, extreme);
            EnrichmentRecord {
                name: set.name().to_string(),
                set_size: set.len(),
                matched_size: pos.len(),
                enrichment_score: Some(extreme.score),
                normalized_enrichment_score: normalized_score(extreme.score, null),
                p_value: Some(permutation_pvalue(extreme.score, null)),
                adjusted_p_value: None,
                leading_edge: edge.iter().map(|&p| ranked.genes()[p].clone()).collect(),
                status: EnrichmentStatus::Tested,
            }
        })
        .collect();

    let pvalues: Vec<Option<f64>> = records.iter().map(|r| r.p_value).collect();
    for (record, padj) in records.iter_mut().zip(adjust_pvalues(&pvalues, params.fdr_method)) {
        record.adjusted_p_value = padj;
    }

    let results = EnrichmentResults { records, warnings };
    log::info!(
        "Enrichment: {} gene sets tested, {} skipped, {} permutations per size",
        results.n_tested(),
        gene_sets.len() - results.n_tested(),
        params.permutation_count
    );
    Ok(results)
}
