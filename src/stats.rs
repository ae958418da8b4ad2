//! Statistical utility functions shared across modules

use std::cmp::Ordering;

/// Consistency constant making the MAD an estimator of the normal SD
const MAD_SCALE: f64 = 1.4826;

/// Median of the finite values, reordering the slice in place.
/// Returns `None` for an empty input.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = values.len();
    Some(if n % 2 == 0 {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    } else {
        values[n / 2]
    })
}

/// Squared median absolute deviation, scaled for normal consistency.
/// Robust variance estimate of the log-dispersion residuals.
pub fn mad_squared(values: &mut [f64]) -> f64 {
    let Some(center) = median(values) else {
        return 0.0;
    };
    let mut abs_devs: Vec<f64> = values.iter().map(|&x| (x - center).abs()).collect();
    let mad = median(&mut abs_devs).unwrap_or(0.0) * MAD_SCALE;
    mad * mad
}

/// Mean after dropping `trim` of the observations from each end
pub fn trimmed_mean(values: &mut [f64], trim: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = values.len();
    let cut = ((n as f64) * trim).floor() as usize;
    let kept = if 2 * cut < n { &values[cut..n - cut] } else { &values[..] };
    Some(kept.iter().sum::<f64>() / kept.len() as f64)
}

/// Trigamma function: second derivative of ln Γ(x)
pub fn trigamma(x: f64) -> f64 {
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).powi(2) - trigamma(1.0 - x);
    }

    // Shift upward with the recurrence, then use the asymptotic series
    let mut acc = 0.0;
    let mut z = x;
    while z < 8.0 {
        acc += 1.0 / (z * z);
        z += 1.0;
    }
    let z2 = z * z;
    acc + 1.0 / z + 0.5 / z2 + 1.0 / (6.0 * z2 * z) - 1.0 / (30.0 * z2 * z2 * z) + 1.0 / (42.0 * z2 * z2 * z2 * z)
}
