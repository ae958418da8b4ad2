//! Permutation null distributions and the statistics derived from them

use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;

use super::score::score_positions;
use crate::rng::{sorted_sample, stream_rng};

/// Null enrichment scores for every matched set size.
///
/// Each size draws `permutation_count` random gene subsets of that size from
/// the ranking. Sizes run in parallel, each on its own stream keyed by
/// `(seed, size)`, so the output does not depend on scheduling.
pub fn null_distributions(
    weights: &[f64],
    sizes: &BTreeSet<usize>,
    permutation_count: usize,
    seed: u64,
) -> HashMap<usize, Vec<f64>> {
    let n = weights.len();
    let sizes: Vec<usize> = sizes.iter().copied().collect();

    sizes
        .par_iter()
        .map(|&size| {
            let mut rng = stream_rng(seed, size as u64);
            let null: Vec<f64> = (0..permutation_count)
                .map(|_| {
                    let positions = sorted_sample(&mut rng, n, size);
                    score_positions(&positions, weights, n).score
                })
                .collect();
            log::debug!("Null distribution for set size {}: {} permutations", size, null.len());
            (size, null)
        })
        .collect()
}

/// Permutation p-value, computed against null scores of the same sign
pub fn permutation_pvalue(es: f64, null: &[f64]) -> f64 {
    let (extreme, same_sign) = if es >= 0.0 {
        (
            null.iter().filter(|&&x| x >= es).count(),
            null.iter().filter(|&&x| x >= 0.0).count(),
        )
    } else {
        (
            null.iter().filter(|&&x| x <= es).count(),
            null.iter().filter(|&&x| x < 0.0).count(),
        )
    };
    ((1 + extreme) as f64 / (1 + same_sign) as f64).min(1.0)
}

/// ES divided by the mean magnitude of same-sign null scores.
/// `None` when the null has no score of that sign.
pub fn normalized_score(es: f64, null: &[f64]) -> Option<f64> {
    let same: Vec<f64> = if es >= 0.0 {
        null.iter().copied().filter(|&x| x >= 0.0).collect()
    } else {
        null.iter().copied().filter(|&x| x < 0.0).map(f64::abs).collect()
    };
    if same.is_empty() {
        return None;
    }
    let mean = same.iter().sum::<f64>() / same.len() as f64;
    if mean > 0.0 {
        Some(es / mean)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pvalue_sign_split() {
        let null = [-0.5, -0.3, 0.1, 0.2, 0.4, 0.6];
        // ES 0.5: one null >= 0.5 among four non-negative
        assert!((permutation_pvalue(0.5, &null) - 2.0 / 5.0).abs() < 1e-12);
        // ES -0.4: one null <= -0.4 among two negative
        assert!((permutation_pvalue(-0.4, &null) - 2.0 / 3.0).abs() < 1e-12);
        // Nothing as extreme still gives a positive p-value
        assert!((permutation_pvalue(0.9, &null) - 1.0 / 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalized_score() {
        let null = [-0.5, -0.3, 0.1, 0.2, 0.3, 0.6];
        assert!((normalized_score(0.6, &null).unwrap() - 2.0).abs() < 1e-12);
        assert!((normalized_score(-0.8, &null).unwrap() + 2.0).abs() < 1e-12);
        assert_eq!(normalized_score(-0.8, &[0.1, 0.2]), None);
    }

    #[test]
    fn test_null_is_deterministic() {
        let weights: Vec<f64> = (0..200).map(|i| (100.0 - i as f64).abs()).collect();
        let sizes: BTreeSet<usize> = [5, 20].into_iter().collect();
        let a = null_distributions(&weights, &sizes, 100, 42);
        let b = null_distributions(&weights, &sizes, 100, 42);
        let c = null_distributions(&weights, &sizes, 100, 43);
        assert_eq!(a, b);
        assert_ne!(a[&5], c[&5]);
        assert_eq!(a[&20].len(), 100);
        assert!(a[&20].iter().all(|x| x.abs() <= 1.0 + 1e-9));
    }
}
