//! P-value calculation from test statistics

use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::function::erf::erfc;

/// Two-sided p-value from a z-statistic, `2 * P(Z > |z|)`
pub fn calculate_pvalue(z: f64) -> Option<f64> {
    if !z.is_finite() {
        return None;
    }
    Some(erfc(z.abs() / std::f64::consts::SQRT_2).min(1.0))
}

/// Two-sided p-value from a t-statistic with `df` degrees of freedom
pub fn calculate_pvalue_t(stat: f64, df: f64) -> Option<f64> {
    if !stat.is_finite() || df <= 0.0 {
        return None;
    }
    let t_dist = StudentsT::new(0.0, 1.0, df).ok()?;
    Some((2.0 * t_dist.cdf(-stat.abs())).min(1.0))
}
