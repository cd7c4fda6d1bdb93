// Simulation-based prediction intervals.
//
// Future trend changes follow a Poisson process with as many expected changes
// per unit time as the history had, each a Laplace draw scaled by the mean
// fitted |delta|. Observation noise is added on top of trend + seasonality.

use crate::core::trend::{changepoint_matrix, piecewise_linear};
use rand::Rng;
use rand_distr::{Distribution, Normal, Poisson};
use rayon::prelude::*;

/// Fitted trend in scaled units, the input to the simulation.
#[derive(Debug, Clone)]
pub struct TrendState<'a> {
    pub k: f64,
    pub m: f64,
    pub delta: &'a [f64],
    pub t_change: &'a [f64],
}

/// Interval bounds in scaled units.
#[derive(Debug, Clone, PartialEq)]
pub struct Intervals {
    pub yhat_lower: Vec<f64>,
    pub yhat_upper: Vec<f64>,
    pub trend_lower: Vec<f64>,
    pub trend_upper: Vec<f64>,
}

impl Intervals {
    /// Degenerate bounds, used when no samples are drawn.
    pub fn collapsed(yhat: &[f64], trend: &[f64]) -> Self {
        Self {
            yhat_lower: yhat.to_vec(),
            yhat_upper: yhat.to_vec(),
            trend_lower: trend.to_vec(),
            trend_upper: trend.to_vec(),
        }
    }
}

/// Draw `n_samples` trajectories over `t` and reduce them to the
/// `(1 ± width) / 2` quantiles.
///
/// `seasonal` is the fitted seasonal component at `t`, `sigma_obs` the fitted
/// noise level. Times beyond 1.0 are in the future.
pub fn simulate(
    trend: &TrendState<'_>,
    t: &[f64],
    seasonal: &[f64],
    sigma_obs: f64,
    n_samples: usize,
    interval_width: f64,
) -> Intervals {
    if n_samples == 0 {
        let point = piecewise_linear(
            trend.k,
            trend.m,
            trend.delta,
            t,
            &changepoint_matrix(t, trend.t_change),
            trend.t_change,
        );
        let yhat: Vec<f64> = point.iter().zip(seasonal).map(|(a, b)| a + b).collect();
        return Intervals::collapsed(&yhat, &point);
    }

    let samples: Vec<(Vec<f64>, Vec<f64>)> = (0..n_samples)
        .into_par_iter()
        .map(|_| {
            let mut rng = rand::thread_rng();
            let trend_sample = sample_trend(&mut rng, trend, t);
            let yhat_sample = add_noise(&mut rng, &trend_sample, seasonal, sigma_obs);
            (trend_sample, yhat_sample)
        })
        .collect();

    let lower_q = (1.0 - interval_width) / 2.0;
    let upper_q = (1.0 + interval_width) / 2.0;
    let mut out = Intervals {
        yhat_lower: Vec::with_capacity(t.len()),
        yhat_upper: Vec::with_capacity(t.len()),
        trend_lower: Vec::with_capacity(t.len()),
        trend_upper: Vec::with_capacity(t.len()),
    };
    let mut trend_col = vec![0.0; n_samples];
    let mut yhat_col = vec![0.0; n_samples];
    for i in 0..t.len() {
        for (s, (tr, yh)) in samples.iter().enumerate() {
            trend_col[s] = tr[i];
            yhat_col[s] = yh[i];
        }
        trend_col.sort_by(|a, b| a.total_cmp(b));
        yhat_col.sort_by(|a, b| a.total_cmp(b));
        out.trend_lower.push(quantile(&trend_col, lower_q));
        out.trend_upper.push(quantile(&trend_col, upper_q));
        out.yhat_lower.push(quantile(&yhat_col, lower_q));
        out.yhat_upper.push(quantile(&yhat_col, upper_q));
    }
    out
}

/// One trend trajectory with freshly drawn changepoints after the history.
pub fn sample_trend<R: Rng + ?Sized>(rng: &mut R, trend: &TrendState<'_>, t: &[f64]) -> Vec<f64> {
    let t_max = t.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut t_change = trend.t_change.to_vec();
    let mut delta = trend.delta.to_vec();

    if t_max > 1.0 && !trend.t_change.is_empty() {
        let rate = trend.t_change.len() as f64 * (t_max - 1.0);
        let n_changes = Poisson::new(rate)
            .map(|p| p.sample(rng) as usize)
            .unwrap_or(0);
        if n_changes > 0 {
            let scale = trend.delta.iter().map(|d| d.abs()).sum::<f64>()
                / trend.delta.len() as f64
                + 1e-8;
            let mut new_points: Vec<f64> = (0..n_changes).map(|_| rng.gen_range(1.0..t_max)).collect();
            new_points.sort_by(|a, b| a.total_cmp(b));
            for point in new_points {
                t_change.push(point);
                delta.push(sample_laplace(rng, scale));
            }
        }
    }

    let a = changepoint_matrix(t, &t_change);
    piecewise_linear(trend.k, trend.m, &delta, t, &a, &t_change)
}

fn add_noise<R: Rng + ?Sized>(rng: &mut R, trend: &[f64], seasonal: &[f64], sigma_obs: f64) -> Vec<f64> {
    match Normal::new(0.0, sigma_obs) {
        Ok(noise) => trend
            .iter()
            .zip(seasonal)
            .map(|(tr, s)| tr + s + noise.sample(rng))
            .collect(),
        Err(_) => trend.iter().zip(seasonal).map(|(tr, s)| tr + s).collect(),
    }
}

/// Laplace(0, scale) by inverse CDF.
fn sample_laplace<R: Rng + ?Sized>(rng: &mut R, scale: f64) -> f64 {
    let u: f64 = rng.gen_range(-0.5..0.5);
    let tail = (1.0 - 2.0 * u.abs()).max(f64::MIN_POSITIVE);
    -scale * u.signum() * tail.ln()
}

/// Quantile of sorted data with linear interpolation between order statistics.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(n - 1);
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}
