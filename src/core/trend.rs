use chrono::{Duration, NaiveDateTime};

/// Given history timestamps, return (t values normalized to [0,1], t_scale seconds, start time).
///
/// `history` must be sorted and non-empty.
pub fn time_scale(history: &[NaiveDateTime]) -> (Vec<f64>, f64, NaiveDateTime) {
    let t0 = history[0];
    let t_last = history[history.len() - 1];
    let span_s = seconds_between(t0, t_last);
    let t_scale = span_s.max(1e-12);
    (scale_time(history, t0, t_scale), t_scale, t0)
}

/// Express timestamps in model units relative to `t0`.
pub fn scale_time(ts: &[NaiveDateTime], t0: NaiveDateTime, t_scale: f64) -> Vec<f64> {
    ts.iter()
        .map(|ts| seconds_between(t0, *ts) / t_scale)
        .collect()
}

fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_milliseconds() as f64 / 1_000.0
}

/// Place `n` potential changepoints uniformly by row index within the first
/// `changepoint_range` share of history.
///
/// Short histories get fewer changepoints: at most `floor(len * range) - 1`.
pub fn select_changepoints(t: &[f64], n: usize, changepoint_range: f64) -> Vec<f64> {
    let hist_size = (t.len() as f64 * changepoint_range).floor() as usize;
    let n = n.min(hist_size.saturating_sub(1));
    if n == 0 {
        return Vec::new();
    }
    let last = (hist_size - 1) as f64;
    let mut cps: Vec<f64> = (1..=n)
        .map(|i| {
            let idx = (i as f64 * last / n as f64).round() as usize;
            t[idx]
        })
        .collect();
    cps.sort_by(|a, b| a.total_cmp(b));
    cps.dedup_by(|a, b| (*a - *b).abs() < 1e-12);
    cps
}

/// Build changepoint indicator matrix A (T x S), where A[i,j] = 1 if t[i] >= t_change[j]
pub fn changepoint_matrix(t: &[f64], t_change: &[f64]) -> Vec<Vec<f64>> {
    t.iter()
        .map(|&ti| {
            t_change
                .iter()
                .map(|&c| if ti >= c { 1.0 } else { 0.0 })
                .collect()
        })
        .collect()
}

/// Piecewise linear trend with changepoints
pub fn piecewise_linear(
    k: f64,
    m: f64,
    delta: &[f64],
    t: &[f64],
    a: &[Vec<f64>],
    t_change: &[f64],
) -> Vec<f64> {
    // trend = (k + A*delta) * t + (m + A*(-t_change .* delta))
    let s = t_change.len();
    let mut out = Vec::with_capacity(t.len());
    for (i, &ti) in t.iter().enumerate() {
        let ai = &a[i];
        let mut a_delta = 0.0;
        let mut a_tc_delta = 0.0;
        for j in 0..s {
            a_delta += ai[j] * delta[j];
            a_tc_delta += ai[j] * (-t_change[j] * delta[j]);
        }
        out.push((k + a_delta) * ti + (m + a_tc_delta));
    }
    out
}

/// `periods` daily timestamps following `last`, or `None` when a step
/// leaves the representable date range.
pub fn future_dates(last: NaiveDateTime, periods: usize) -> Option<Vec<NaiveDateTime>> {
    (1..=periods)
        .map(|i| {
            let days = i64::try_from(i).ok()?;
            last.checked_add_signed(Duration::try_days(days)?)
        })
        .collect()
}
