//! Named gene collections and identifier mapping

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::AnalysisWarning;

/// A named, immutable set of gene identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneSet {
    name: String,
    genes: BTreeSet<String>,
}

impl GeneSet {
    pub fn new<I, S>(name: impl Into<String>, genes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            genes: genes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn genes(&self) -> &BTreeSet<String> {
        &self.genes
    }

    /// Declared size, before matching against any ranking
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn contains(&self, gene_id: &str) -> bool {
        self.genes.contains(gene_id)
    }
}

/// Gene sets translated into another identifier namespace
#[derive(Debug, Clone)]
pub struct MappedGeneSets {
    pub sets: Vec<GeneSet>,
    /// Member identifiers with no entry in the mapping table
    pub unmatched: usize,
    /// Member identifiers looked up, summed over sets
    pub total: usize,
    pub warnings: Vec<AnalysisWarning>,
}

/// Translate every member of every set through `mapping`.
///
/// Members missing from the table are dropped and counted, per set and in
/// total, so the loss is visible to the caller.
pub fn map_gene_sets(sets: &[GeneSet], mapping: &HashMap<String, String>) -> MappedGeneSets {
    let mut unmatched = 0;
    let mut total = 0;
    let mut warnings = Vec::new();

    let mapped = sets
        .iter()
        .map(|set| {
            let translated: BTreeSet<String> = set
                .genes
                .iter()
                .filter_map(|g| mapping.get(g).cloned())
                .collect();
            let missing = set.genes.iter().filter(|g| !mapping.contains_key(*g)).count();
            if missing > 0 {
                log::debug!(
                    "Gene set '{}': {} of {} identifiers not in mapping table",
                    set.name,
                    missing,
                    set.len()
                );
            }
            unmatched += missing;
            total += set.len();
            GeneSet {
                name: set.name.clone(),
                genes: translated,
            }
        })
        .collect();

    if unmatched > 0 {
        let warning = AnalysisWarning::UnmatchedIdentifiers {
            context: "gene set identifier mapping".to_string(),
            unmatched,
            total,
        };
        log::warn!("{}", warning);
        warnings.push(warning);
    }

    MappedGeneSets {
        sets: mapped,
        unmatched,
        total,
        warnings,
    }
}
