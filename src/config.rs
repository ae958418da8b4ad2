//! Analysis configuration

use serde::{Deserialize, Serialize};

use crate::dispersion::{DispersionParams, TrendFitMethod};
use crate::enrichment::EnrichmentParams;
use crate::error::{DegseaError, Result};
use crate::normalization::SizeFactorMethod;
use crate::testing::{FdrMethod, WaldParams};

/// Parameters of a full differential expression and enrichment run.
///
/// Every field except `random_seed` has a default, so a configuration can be
/// deserialized from a document naming only the seed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "defaults::min_replicates")]
    pub min_replicates_per_group: usize,
    /// Genes whose total count is at or below this are dropped
    #[serde(default = "defaults::low_count_threshold")]
    pub low_count_filter_threshold: f64,
    #[serde(default = "defaults::enrichment_min_size")]
    pub enrichment_min_size: usize,
    #[serde(default = "defaults::enrichment_max_size")]
    pub enrichment_max_size: usize,
    #[serde(default = "defaults::permutation_count")]
    pub permutation_count: usize,
    pub random_seed: u64,
    #[serde(default)]
    pub fdr_method: FdrMethod,
    #[serde(default = "defaults::enrichment_weight")]
    pub enrichment_weight: f64,
    #[serde(default)]
    pub size_factor_method: SizeFactorMethod,
    #[serde(default)]
    pub trend_fit: TrendFitMethod,
    #[serde(default)]
    pub use_t: bool,
    #[serde(default)]
    pub lfc_threshold: f64,
}

mod defaults {
    pub fn min_replicates() -> usize {
        2
    }

    pub fn low_count_threshold() -> f64 {
        1.0
    }

    pub fn enrichment_min_size() -> usize {
        15
    }

    pub fn enrichment_max_size() -> usize {
        500
    }

    pub fn permutation_count() -> usize {
        2000
    }

    pub fn enrichment_weight() -> f64 {
        1.0
    }
}

impl AnalysisConfig {
    pub fn new(random_seed: u64) -> Self {
        Self {
            min_replicates_per_group: defaults::min_replicates(),
            low_count_filter_threshold: defaults::low_count_threshold(),
            enrichment_min_size: defaults::enrichment_min_size(),
            enrichment_max_size: defaults::enrichment_max_size(),
            permutation_count: defaults::permutation_count(),
            random_seed,
            fdr_method: FdrMethod::BenjaminiHochberg,
            enrichment_weight: defaults::enrichment_weight(),
            size_factor_method: SizeFactorMethod::Ratio,
            trend_fit: TrendFitMethod::Parametric,
            use_t: false,
            lfc_threshold: 0.0,
        }
    }

    /// Reject settings no stage can run with
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(DegseaError::InvalidInput { reason });

        if self.permutation_count == 0 {
            return invalid("permutation_count must be > 0".to_string());
        }
        if self.enrichment_min_size > self.enrichment_max_size {
            return invalid(format!(
                "enrichment_min_size ({}) is larger than enrichment_max_size ({})",
                self.enrichment_min_size, self.enrichment_max_size
            ));
        }
        if self.min_replicates_per_group < 2 {
            return invalid(format!(
                "min_replicates_per_group must be at least 2, got {}",
                self.min_replicates_per_group
            ));
        }
        for (name, value) in [
            ("low_count_filter_threshold", self.low_count_filter_threshold),
            ("enrichment_weight", self.enrichment_weight),
            ("lfc_threshold", self.lfc_threshold),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return invalid(format!("{} must be a non-negative number, got {}", name, value));
            }
        }
        Ok(())
    }

    pub fn dispersion_params(&self) -> DispersionParams {
        DispersionParams {
            trend_fit: self.trend_fit,
            ..DispersionParams::default()
        }
    }

    pub fn wald_params(&self) -> WaldParams {
        WaldParams {
            use_t: self.use_t,
            lfc_threshold: self.lfc_threshold,
            fdr_method: self.fdr_method,
        }
    }

    pub fn enrichment_params(&self) -> EnrichmentParams {
        EnrichmentParams {
            min_size: self.enrichment_min_size,
            max_size: self.enrichment_max_size,
            permutation_count: self.permutation_count,
            random_seed: self.random_seed,
            weight: self.enrichment_weight,
            fdr_method: self.fdr_method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::new(7);
        assert_eq!(config.random_seed, 7);
        assert_eq!(config.min_replicates_per_group, 2);
        assert_eq!(config.enrichment_min_size, 15);
        assert_eq!(config.enrichment_max_size, 500);
        assert_eq!(config.permutation_count, 2000);
        assert_eq!(config.fdr_method, FdrMethod::BenjaminiHochberg);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: AnalysisConfig =
            serde_json::from_str(r#"{"random_seed": 99, "fdr_method": "bonferroni", "trend_fit": "local"}"#).unwrap();
        assert_eq!(config.random_seed, 99);
        assert_eq!(config.fdr_method, FdrMethod::Bonferroni);
        assert_eq!(config.trend_fit, TrendFitMethod::Local);
        assert_eq!(config.permutation_count, 2000);
        assert_eq!(config.size_factor_method, SizeFactorMethod::Ratio);
    }

    #[test]
    fn test_enum_names_are_snake_case() {
        let json = serde_json::to_value(AnalysisConfig::new(3)).unwrap();
        assert_eq!(json["fdr_method"], "benjamini_hochberg");
        assert_eq!(json["size_factor_method"], "ratio");
        assert_eq!(json["trend_fit"], "parametric");
        assert!(serde_json::from_str::<AnalysisConfig>(r#"{"random_seed": 1, "fdr_method": "Bonferroni"}"#).is_err());
    }

    #[test]
    fn test_seed_is_required() {
        let err = serde_json::from_str::<AnalysisConfig>(r#"{"permutation_count": 100}"#).unwrap_err();
        assert!(err.to_string().contains("random_seed"));
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut config = AnalysisConfig::new(5);
        config.use_t = true;
        let json = serde_json::to_string(&config).unwrap();
        let back: AnalysisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn test_validate_rejects() {
        let mut c = AnalysisConfig::new(1);
        c.permutation_count = 0;
        assert!(c.validate().is_err());

        let mut c = AnalysisConfig::new(1);
        c.enrichment_min_size = 600;
        assert!(c.validate().is_err());

        let mut c = AnalysisConfig::new(1);
        c.min_replicates_per_group = 1;
        assert!(c.validate().is_err());

        let mut c = AnalysisConfig::new(1);
        c.lfc_threshold = -0.5;
        assert!(c.validate().is_err());

        let mut c = AnalysisConfig::new(1);
        c.enrichment_weight = f64::NAN;
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_params_follow_config() {
        let mut c = AnalysisConfig::new(11);
        c.enrichment_weight = 0.0;
        c.use_t = true;
        assert_eq!(c.enrichment_params().random_seed, 11);
        assert_eq!(c.enrichment_params().weight, 0.0);
        assert!(c.wald_params().use_t);
        assert_eq!(c.dispersion_params().trend_fit, TrendFitMethod::Parametric);
    }
}
