//! Error types for rust_degsea

use thiserror::Error;

/// Main error type for differential expression and enrichment operations
#[derive(Error, Debug)]
pub enum DegseaError {
    #[error("Degenerate input: {reason}")]
    DegenerateInput { reason: String },

    #[error("Invalid count matrix: {reason}")]
    InvalidCountMatrix { reason: String },

    #[error("Invalid metadata: {reason}")]
    InvalidMetadata { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Identifier mismatch: {reason}")]
    IdentifierMismatch { reason: String },

    #[error("Size factor estimation failed: {reason}")]
    SizeFactorFailed { reason: String },

    #[error("Trend fitting failed: {reason}")]
    TrendFittingFailed { reason: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },
}

/// Result type alias for rust_degsea operations
pub type Result<T> = std::result::Result<T, DegseaError>;

/// Recoverable conditions recorded alongside results instead of aborting the run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisWarning {
    /// Gene has zero normalized counts in both groups; its statistics are NA
    #[error("gene '{gene_id}' is zero in both groups and was not tested")]
    UntestableGene { gene_id: String },
    /// Gene set overlap with the ranked list fell outside the configured bounds
    #[error("gene set '{set_name}' has {matched_size} genes in the ranked list, outside [{min_size}, {max_size}]; skipped")]
    GeneSetSizeOutOfRange {
        set_name: String,
        matched_size: usize,
        min_size: usize,
        max_size: usize,
    },
    /// Identifiers that could not be matched to the ranked list or mapping table
    #[error("{context}: {unmatched} of {total} identifiers unmatched")]
    UnmatchedIdentifiers { context: String, unmatched: usize, total: usize },
}
