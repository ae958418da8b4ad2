//! rust_degsea: two-group differential expression and preranked gene-set
//! enrichment for RNA-seq counts
//!
//! Counts are normalized by median-of-ratios size factors, dispersions are
//! shrunk toward a mean-dispersion trend, every gene gets a Wald test, and the
//! resulting signed statistics drive a permutation-based enrichment test.
//!
//! # Example
//!
//! ```ignore
//! use rust_degsea::prelude::*;
//!
//! let counts = CountMatrix::from_rows(rows, gene_ids, sample_ids)?;
//! let metadata = SampleMetadata::from_pairs("treatment", pairs)?;
//! let config = AnalysisConfig::new(42);
//!
//! let output = run_pipeline(&counts, &metadata, "treatment", "control", "treated", &gene_sets, &config)?;
//! println!("{}", output.de_results.summary(0.05));
//! for set in output.enrichment.significant(0.05) {
//!     println!("{} NES={:?}", set.name, set.normalized_enrichment_score);
//! }
//! ```

pub mod config;
pub mod data;
pub mod dispersion;
pub mod enrichment;
pub mod error;
pub mod normalization;
pub mod ranking;
pub mod results;
pub mod rng;
pub mod stats;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::AnalysisConfig;
    pub use crate::data::{ComparisonDesign, CountMatrix, Group, SampleMetadata};
    pub use crate::dispersion::{estimate_dispersions, DispersionParams, GeneDispersion, TrendFitMethod};
    pub use crate::enrichment::{
        map_gene_sets, run_enrichment, running_sum, EnrichmentParams, EnrichmentRecord, EnrichmentResults,
        EnrichmentStatus, GeneSet,
    };
    pub use crate::error::{AnalysisWarning, DegseaError, Result};
    pub use crate::normalization::{
        estimate_size_factors, estimate_size_factors_with, normalize, NormalizedCounts, SizeFactorMethod, SizeFactors,
    };
    pub use crate::ranking::RankedGeneList;
    pub use crate::results::{DeRecord, DeResults, GeneStatus};
    pub use crate::testing::{benjamini_hochberg, wald_test, FdrMethod, WaldParams};
    pub use crate::{run_pipeline, PipelineOutput};
}

use prelude::*;

/// Every stage's output of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Counts after the low-count filter
    pub counts: CountMatrix,
    /// Genes removed by the low-count filter
    pub genes_filtered: usize,
    pub design: ComparisonDesign,
    pub size_factors: SizeFactors,
    pub normalized: NormalizedCounts,
    pub dispersions: GeneDispersion,
    pub de_results: DeResults,
    pub ranking: RankedGeneList,
    pub enrichment: EnrichmentResults,
    /// Recoverable problems from every stage
    pub warnings: Vec<AnalysisWarning>,
}

/// Run the complete analysis: filter, normalize, estimate dispersions, test,
/// rank and test gene sets for enrichment.
///
/// `group_a` is the reference: positive fold changes mean higher in `group_b`.
pub fn run_pipeline(
    counts: &CountMatrix,
    metadata: &SampleMetadata,
    variable: &str,
    group_a: &str,
    group_b: &str,
    gene_sets: &[GeneSet],
    config: &AnalysisConfig,
) -> Result<PipelineOutput> {
    config.validate()?;

    // Step 1: Validate the grouping and drop low-count genes
    let design = ComparisonDesign::new(
        counts,
        metadata,
        variable,
        group_a,
        group_b,
        config.min_replicates_per_group,
    )?;
    let filtered = counts.filter_low_counts(config.low_count_filter_threshold)?;
    let genes_filtered = counts.n_genes() - filtered.n_genes();

    // Step 2: Size factors and normalized counts
    let size_factors = estimate_size_factors_with(&filtered, config.size_factor_method)?;
    let normalized = normalize(&filtered, &size_factors)?;

    // Step 3: Dispersions
    let dispersions = estimate_dispersions(&normalized, &size_factors, &design, &config.dispersion_params())?;

    // Step 4: Wald test
    let de_results = wald_test(&normalized, &size_factors, &dispersions, &design, &config.wald_params())?;

    // Step 5: Ranking and enrichment
    let ranking = RankedGeneList::from_results(&de_results);
    let enrichment = run_enrichment(&ranking, gene_sets, &config.enrichment_params())?;

    let warnings = de_results
        .warnings
        .iter()
        .chain(&enrichment.warnings)
        .cloned()
        .collect();

    Ok(PipelineOutput {
        counts: filtered,
        genes_filtered,
        design,
        size_factors,
        normalized,
        dispersions,
        de_results,
        ranking,
        enrichment,
        warnings,
    })
}
