//! Mean-dispersion trend fitting

use serde::{Deserialize, Serialize};

use crate::error::{DegseaError, Result};
use crate::stats::trimmed_mean;

/// Method for fitting the dispersion-mean trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrendFitMethod {
    /// `dispersion = a0 + a1 / mean`, falling back to `Local` when the fit fails
    #[default]
    Parametric,
    /// Local quadratic regression of log dispersion on log mean
    Local,
    /// Trimmed mean of the gene-wise estimates (no dependence on the mean)
    Mean,
}

/// The trend that was actually fitted, after any fallback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DispersionTrend {
    Parametric { asympt_disp: f64, extra_pois: f64 },
    Local,
    Constant { value: f64 },
}

/// Trend kind plus its prediction for every gene
#[derive(Debug, Clone)]
pub struct FittedTrend {
    pub trend: DispersionTrend,
    pub values: Vec<f64>,
}

/// Only estimates clearly above the floor inform the trend
const FIT_THRESHOLD_FACTOR: f64 = 100.0;

/// Fit a trend to estimable gene-wise dispersions as a function of base mean.
///
/// `dispersions[i]` is `None` when gene `i` had no estimable dispersion. If no
/// gene is estimable the trend is the constant `min_disp`.
pub fn fit_dispersion_trend(
    means: &[f64],
    dispersions: &[Option<f64>],
    method: TrendFitMethod,
    min_disp: f64,
) -> Result<FittedTrend> {
    if means.len() != dispersions.len() {
        return Err(DegseaError::DimensionMismatch {
            expected: format!("{} dispersions", means.len()),
            got: format!("{} dispersions", dispersions.len()),
        });
    }

    let usable: Vec<(f64, f64)> = means
        .iter()
        .zip(dispersions)
        .filter_map(|(&m, d)| match d {
            Some(d) if m > 0.0 && d.is_finite() && *d > FIT_THRESHOLD_FACTOR * min_disp => Some((m, *d)),
            _ => None,
        })
        .collect();

    if usable.is_empty() {
        log::warn!("No gene has an estimable dispersion; using constant trend {:e}", min_disp);
        return Ok(constant(means.len(), min_disp));
    }

    let fitted = match method {
        TrendFitMethod::Parametric => match fit_parametric(&usable) {
            Ok((a0, a1)) => Ok(FittedTrend {
                trend: DispersionTrend::Parametric {
                    asympt_disp: a0,
                    extra_pois: a1,
                },
                values: means.iter().map(|&m| if m > 0.0 { a0 + a1 / m } else { a0 }).collect(),
            }),
            Err(e) => {
                log::info!("Parametric dispersion fit failed ({}), using local regression", e);
                fit_local(means, &usable)
            }
        },
        TrendFitMethod::Local => fit_local(means, &usable),
        TrendFitMethod::Mean => Ok(mean_trend(means.len(), &usable)),
    };

    let fitted = fitted.or_else(|e| {
        log::info!("Local dispersion fit failed ({}), using mean dispersion", e);
        Ok::<_, DegseaError>(mean_trend(means.len(), &usable))
    })?;

    log::info!("Dispersion trend: {:?}", fitted.trend);
    Ok(fitted)
}

fn constant(n: usize, value: f64) -> FittedTrend {
    FittedTrend {
        trend: DispersionTrend::Constant { value },
        values: vec![value; n],
    }
}

fn mean_trend(n: usize, usable: &[(f64, f64)]) -> FittedTrend {
    let mut disps: Vec<f64> = usable.iter().map(|&(_, d)| d).collect();
    let value = trimmed_mean(&mut disps, 0.001).unwrap_or(0.1);
    constant(n, value)
}

/// Iteratively reweighted Gamma fit of `disp ~ a0 + a1 / mean`, refitting
/// after dropping points whose residual ratio leaves (1e-4, 15).
fn fit_parametric(data: &[(f64, f64)]) -> Result<(f64, f64)> {
    const MAX_ROUNDS: usize = 11;
    let mut coefs = (0.1_f64, 1.0_f64);

    for round in 0..MAX_ROUNDS {
        let kept: Vec<(f64, f64)> = data
            .iter()
            .copied()
            .filter(|&(mean, disp)| {
                let fitted = coefs.0 + coefs.1 / mean;
                fitted > 0.0 && {
                    let resid = disp / fitted;
                    resid > 1e-4 && resid < 15.0
                }
            })
            .collect();

        if kept.len() < 3 {
            return Err(DegseaError::TrendFittingFailed {
                reason: format!("only {} points left after residual filtering", kept.len()),
            });
        }

        let (next, converged) = gamma_identity_glm(&kept, coefs);
        log::debug!(
            "Parametric round {}: {} points, a0={:.6}, a1={:.6}, converged={}",
            round + 1,
            kept.len(),
            next.0,
            next.1,
            converged
        );

        if next.0 <= 0.0 || next.1 <= 0.0 {
            return Err(DegseaError::TrendFittingFailed {
                reason: format!("coefficients not positive (a0={:.4}, a1={:.4})", next.0, next.1),
            });
        }

        let change = (next.0 / coefs.0).ln().powi(2) + (next.1 / coefs.1).ln().powi(2);
        coefs = next;
        if change < 1e-6 && converged {
            return Ok(coefs);
        }
    }

    Err(DegseaError::TrendFittingFailed {
        reason: "parametric fit did not converge".to_string(),
    })
}

/// Gamma-family GLM with identity link on predictor `1 / mean`.
/// Returns the coefficients and whether the deviance converged.
fn gamma_identity_glm(data: &[(f64, f64)], start: (f64, f64)) -> ((f64, f64), bool) {
    const MAX_ITER: usize = 25;
    const TOL: f64 = 1e-8;

    let deviance = |a0: f64, a1: f64| -> f64 {
        data.iter()
            .map(|&(mean, disp)| {
                let mu = (a0 + a1 / mean).max(1e-8);
                2.0 * (-(disp / mu).ln() + (disp - mu) / mu)
            })
            .sum()
    };

    let (mut a0, mut a1) = start;
    let mut dev_old = deviance(a0, a1);

    for _ in 0..MAX_ITER {
        // Weighted least squares with Gamma weights 1/mu^2
        let (mut sw, mut swx, mut swy, mut swxx, mut swxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for &(mean, disp) in data {
            let x = 1.0 / mean;
            let mu = (a0 + a1 * x).max(1e-8);
            let w = 1.0 / (mu * mu);
            sw += w;
            swx += w * x;
            swy += w * disp;
            swxx += w * x * x;
            swxy += w * x * disp;
        }

        let det = sw * swxx - swx * swx;
        if det.abs() < 1e-10 {
            return ((a0, a1), false);
        }
        a0 = (swxx * swy - swx * swxy) / det;
        a1 = (sw * swxy - swx * swy) / det;

        let dev = deviance(a0, a1);
        if (dev_old - dev).abs() / (0.1 + dev.abs()) < TOL {
            return ((a0, a1), true);
        }
        dev_old = dev;
    }

    ((a0, a1), false)
}

/// Local quadratic fit of log dispersion on log mean (weights = mean),
/// evaluated on an adaptive grid and interpolated with cubic Hermite splines.
fn fit_local(means: &[f64], usable: &[(f64, f64)]) -> Result<FittedTrend> {
    if usable.len() < 5 {
        return Err(DegseaError::TrendFittingFailed {
            reason: format!("local fit needs at least 5 points, got {}", usable.len()),
        });
    }

    let mut points: Vec<(f64, f64, f64)> = usable.iter().map(|&(m, d)| (m.ln(), d.ln(), m)).collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));

    let smoother = LocalSmoother::build(points, 0.7, 0.8);
    let fallback = smoother.predict(smoother.x_min()).exp();

    let values = means
        .iter()
        .map(|&m| if m > 0.0 { smoother.predict(m.ln()).exp() } else { fallback })
        .collect();

    Ok(FittedTrend {
        trend: DispersionTrend::Local,
        values,
    })
}

/// Fitted value and slope at one grid location
#[derive(Debug, Clone, Copy)]
struct Knot {
    x: f64,
    value: f64,
    slope: f64,
    bandwidth: f64,
}

/// Nearest-neighbour local quadratic regression with tricube kernel
struct LocalSmoother {
    /// (x, y, weight) sorted by x
    points: Vec<(f64, f64, f64)>,
    neighbours: usize,
    knots: Vec<Knot>,
}

impl LocalSmoother {
    fn build(points: Vec<(f64, f64, f64)>, span: f64, cut: f64) -> Self {
        let n = points.len();
        let neighbours = ((n as f64 * span) as usize).clamp(3, n);
        let mut smoother = Self {
            points,
            neighbours,
            knots: Vec::new(),
        };

        let lo = smoother.fit_at(smoother.points[0].0);
        let hi = smoother.fit_at(smoother.points[n - 1].0);
        smoother.knots.push(lo);
        smoother.refine(lo, hi, cut);
        smoother.knots.push(hi);
        smoother
    }

    fn x_min(&self) -> f64 {
        self.points[0].0
    }

    /// Bisect the interval until it is narrow relative to the local bandwidth.
    /// Knots are pushed in increasing x order.
    fn refine(&mut self, left: Knot, right: Knot, cut: f64) {
        let width = right.x - left.x;
        if width < 1e-10 || width / left.bandwidth.min(right.bandwidth) <= cut {
            return;
        }
        let mid = self.fit_at((left.x + right.x) / 2.0);
        self.refine(left, mid, cut);
        self.knots.push(mid);
        self.refine(mid, right, cut);
    }

    /// Bandwidth = distance to the furthest of the `neighbours` nearest points
    fn bandwidth_at(&self, x: f64) -> f64 {
        let n = self.points.len();
        let start = self.points.partition_point(|p| p.0 < x);
        let (mut l, mut r) = (start, start);
        while r - l < self.neighbours {
            let take_left = match (l > 0, r < n) {
                (true, true) => x - self.points[l - 1].0 <= self.points[r].0 - x,
                (true, false) => true,
                (false, true) => false,
                (false, false) => break,
            };
            if take_left {
                l -= 1;
            } else {
                r += 1;
            }
        }
        let left = (x - self.points[l].0).abs();
        let right = (self.points[r - 1].0 - x).abs();
        left.max(right).max(1e-10)
    }

    fn fit_at(&self, x: f64) -> Knot {
        let h = self.bandwidth_at(x);

        // Normal equations for basis [1, d, d^2/2]
        let mut m = [[0.0_f64; 3]; 3];
        let mut b = [0.0_f64; 3];
        for &(xi, yi, wi) in &self.points {
            let d = xi - x;
            let u = d.abs() / h;
            if u >= 1.0 {
                continue;
            }
            let tricube = (1.0 - u * u * u).powi(3);
            let w = tricube * wi;
            let basis = [1.0, d, d * d / 2.0];
            for r in 0..3 {
                b[r] += w * basis[r] * yi;
                for c in 0..3 {
                    m[r][c] += w * basis[r] * basis[c];
                }
            }
        }

        let (value, slope) = solve_value_and_slope(&m, &b);
        Knot {
            x,
            value,
            slope,
            bandwidth: h,
        }
    }

    fn predict(&self, x: f64) -> f64 {
        let first = self.knots[0];
        let last = self.knots[self.knots.len() - 1];
        if x <= first.x {
            return first.value + first.slope * (x - first.x);
        }
        if x >= last.x {
            return last.value + last.slope * (x - last.x);
        }

        let right_idx = self.knots.partition_point(|k| k.x <= x).min(self.knots.len() - 1);
        let (left, right) = (self.knots[right_idx - 1], self.knots[right_idx]);
        let width = right.x - left.x;
        if width < 1e-15 {
            return left.value;
        }

        let t = (x - left.x) / width;
        let h10 = t * (1.0 - t) * (1.0 - t);
        let h01 = t * t * (3.0 - 2.0 * t);
        let h11 = t * t * (t - 1.0);
        (1.0 - h01) * left.value + h01 * right.value + width * (h10 * left.slope + h11 * right.slope)
    }
}

/// Solve the symmetric 3x3 system by Cramer's rule, returning the first two
/// coefficients. Near-singular systems fall back to the weighted mean.
fn solve_value_and_slope(m: &[[f64; 3]; 3], b: &[f64; 3]) -> (f64, f64) {
    let det3 = |a: [[f64; 3]; 3]| -> f64 {
        a[0][0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1]) - a[0][1] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
            + a[0][2] * (a[1][0] * a[2][1] - a[1][1] * a[2][0])
    };

    let det = det3(*m);
    let scale = m[0][0].max(1.0) * m[1][1].max(1.0) * m[2][2].max(1.0);
    if det.abs() < 1e-15 * scale {
        return if m[0][0] > 1e-10 { (b[0] / m[0][0], 0.0) } else { (0.0, 0.0) };
    }

    let replace = |col: usize| {
        let mut a = *m;
        for r in 0..3 {
            a[r][col] = b[r];
        }
        det3(a)
    };
    (replace(0) / det, replace(1) / det)
}
