//! Weighted Kolmogorov-Smirnov running sum over a ranked list

use serde::Serialize;

use super::GeneSet;
use crate::ranking::RankedGeneList;

/// Most extreme point of a running sum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extreme {
    /// Signed maximum deviation from zero
    pub score: f64,
    /// Rank position where it is reached
    pub index: usize,
}

/// Full walk of one gene set down a ranking
#[derive(Debug, Clone, Serialize)]
pub struct RunningSum {
    /// Running-sum value after each rank position
    pub values: Vec<f64>,
    pub enrichment_score: f64,
    /// Position of the peak (positive score) or trough (negative score)
    pub extreme_index: usize,
    /// Members driving the score, in rank order
    pub leading_edge: Vec<String>,
}

/// `|stat|^weight` for every rank position
pub fn step_weights(ranked: &RankedGeneList, weight: f64) -> Vec<f64> {
    ranked.statistics().iter().map(|s| s.abs().powf(weight)).collect()
}

/// Hit increments for members at `positions`, plus the miss decrement.
fn steps(positions: &[usize], weights: &[f64], n: usize) -> (Vec<f64>, f64) {
    let k = positions.len();
    let n_r: f64 = positions.iter().map(|&p| weights[p]).sum();
    let hits = positions
        .iter()
        .map(|&p| if n_r > 0.0 { weights[p] / n_r } else { 1.0 / k as f64 })
        .collect();
    let miss = if n > k { 1.0 / (n - k) as f64 } else { 0.0 };
    (hits, miss)
}

fn pick(max: Extreme, min: Extreme) -> Extreme {
    if max.score >= -min.score {
        max
    } else {
        min
    }
}

/// Enrichment score of the members at sorted rank `positions`.
///
/// Only the values just before and just after each hit can be extreme, so
/// the walk is evaluated at those points alone.
pub fn score_positions(positions: &[usize], weights: &[f64], n: usize) -> Extreme {
    let (hits, miss) = steps(positions, weights, n);
    let mut max = Extreme {
        score: f64::NEG_INFINITY,
        index: 0,
    };
    let mut min = Extreme {
        score: f64::INFINITY,
        index: 0,
    };

    let mut hit_sum = 0.0;
    for (i, (&p, &h)) in positions.iter().zip(&hits).enumerate() {
        let misses = (p - i) as f64 * miss;
        if p > 0 {
            let before = hit_sum - misses;
            if before < min.score {
                min = Extreme {
                    score: before,
                    index: p - 1,
                };
            }
        }
        hit_sum += h;
        let after = hit_sum - misses;
        if after > max.score {
            max = Extreme { score: after, index: p };
        }
    }

    pick(max, min)
}

/// Rank positions of the set members present in the ranking, ascending
pub fn member_positions(ranked: &RankedGeneList, set: &GeneSet) -> Vec<usize> {
    let mut positions: Vec<usize> = set.genes().iter().filter_map(|g| ranked.position(g)).collect();
    positions.sort_unstable();
    positions
}

/// Walk the ranking for one set. `None` when no member is ranked.
pub fn running_sum(ranked: &RankedGeneList, set: &GeneSet, weight: f64) -> Option<RunningSum> {
    let positions = member_positions(ranked, set);
    if positions.is_empty() {
        return None;
    }
    let n = ranked.len();
    let weights = step_weights(ranked, weight);
    let (hits, miss) = steps(&positions, &weights, n);

    let mut values = Vec::with_capacity(n);
    let mut max = Extreme {
        score: f64::NEG_INFINITY,
        index: 0,
    };
    let mut min = Extreme {
        score: f64::INFINITY,
        index: 0,
    };
    let mut acc = 0.0;
    let mut next_hit = 0;
    for i in 0..n {
        if next_hit < positions.len() && positions[next_hit] == i {
            acc += hits[next_hit];
            next_hit += 1;
        } else {
            acc -= miss;
        }
        if acc > max.score {
            max = Extreme { score: acc, index: i };
        }
        if acc < min.score {
            min = Extreme { score: acc, index: i };
        }
        values.push(acc);
    }

    let extreme = pick(max, min);
    let edge = leading_edge(&positions, extreme);
    Some(RunningSum {
        values,
        enrichment_score: extreme.score,
        extreme_index: extreme.index,
        leading_edge: edge.iter().map(|&p| ranked.genes()[p].clone()).collect(),
    })
}

/// Members at or before the peak for a positive score, at or after the
/// trough for a negative one.
pub fn leading_edge(positions: &[usize], extreme: Extreme) -> Vec<usize> {
    positions
        .iter()
        .copied()
        .filter(|&p| {
            if extreme.score >= 0.0 {
                p <= extreme.index
            } else {
                p >= extreme.index
            }
        })
        .collect()
}
