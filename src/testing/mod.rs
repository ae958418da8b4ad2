//! Statistical testing for differential expression

mod fdr;
mod pvalue;
mod wald;

pub use fdr::{benjamini_hochberg, bonferroni};
pub use pvalue::{calculate_pvalue, calculate_pvalue_t};
pub use wald::{wald_statistic, wald_test, WaldStatistic};

use serde::{Deserialize, Serialize};

/// Multiple-testing correction applied to raw p-values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FdrMethod {
    #[default]
    BenjaminiHochberg,
    Bonferroni,
}

/// Adjust p-values with the chosen method, leaving NA entries as `None`
pub fn adjust_pvalues(pvalues: &[Option<f64>], method: FdrMethod) -> Vec<Option<f64>> {
    match method {
        FdrMethod::BenjaminiHochberg => benjamini_hochberg(pvalues),
        FdrMethod::Bonferroni => bonferroni(pvalues),
    }
}

/// Options of the Wald test
#[derive(Debug, Clone)]
pub struct WaldParams {
    /// Student t tail with n - 2 degrees of freedom instead of the normal
    pub use_t: bool,
    /// Test |log2FC| > threshold instead of log2FC != 0
    pub lfc_threshold: f64,
    pub fdr_method: FdrMethod,
}

impl Default for WaldParams {
    fn default() -> Self {
        Self {
            use_t: false,
            lfc_threshold: 0.0,
            fdr_method: FdrMethod::BenjaminiHochberg,
        }
    }
}
