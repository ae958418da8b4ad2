//! Sequencing-depth normalization

mod counts;
mod size_factors;

pub use counts::{normalize, NormalizedCounts};
pub use size_factors::{estimate_size_factors, estimate_size_factors_with, SizeFactorMethod, SizeFactors};
