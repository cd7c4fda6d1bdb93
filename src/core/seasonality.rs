use chrono::{NaiveDate, NaiveDateTime};
use std::f64::consts::PI;

/// A Fourier seasonality component.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonalityConfig {
    pub name: &'static str,
    pub period: f64,
    pub fourier_order: usize,
    pub prior_scale: f64,
}

impl SeasonalityConfig {
    pub fn new(name: &'static str, period: f64, fourier_order: usize) -> Self {
        Self {
            name,
            period,
            fourier_order,
            prior_scale: 10.0,
        }
    }

    pub fn yearly() -> Self {
        Self::new("yearly", 365.25, 10)
    }

    pub fn weekly() -> Self {
        Self::new("weekly", 7.0, 3)
    }

    pub fn daily() -> Self {
        Self::new("daily", 1.0, 4)
    }

    pub fn n_features(&self) -> usize {
        2 * self.fourier_order
    }
}

/// Pick the default seasonalities a history supports.
///
/// Yearly needs two years of data; weekly needs two weeks sampled more often
/// than weekly; daily needs two days sampled more often than daily. `ds` must be
/// sorted.
pub fn auto_seasonalities(ds: &[NaiveDateTime]) -> Vec<SeasonalityConfig> {
    let mut out = Vec::new();
    if ds.len() < 2 {
        return out;
    }
    let span_days = (ds[ds.len() - 1] - ds[0]).num_seconds() as f64 / 86_400.0;
    let min_spacing_days = ds
        .windows(2)
        .map(|w| (w[1] - w[0]).num_seconds() as f64 / 86_400.0)
        .filter(|d| *d > 0.0)
        .fold(f64::INFINITY, f64::min);

    if span_days >= 730.0 {
        out.push(SeasonalityConfig::yearly());
    }
    if span_days >= 14.0 && min_spacing_days < 7.0 {
        out.push(SeasonalityConfig::weekly());
    }
    if span_days >= 2.0 && min_spacing_days < 1.0 {
        out.push(SeasonalityConfig::daily());
    }
    out
}

/// Days since the Unix epoch, the time axis for Fourier terms.
pub fn epoch_days(ts: &[NaiveDateTime]) -> Vec<f64> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    ts.iter()
        .map(|t| (*t - epoch).num_seconds() as f64 / 86_400.0)
        .collect()
}

/// Generate Fourier series features for given times (in days) and period (in days)
pub fn fourier_series(t: &[f64], period: f64, order: usize) -> Vec<Vec<f64>> {
    let cols = 2 * order;
    let mut x = vec![vec![0.0; cols]; t.len()];
    for (i, &ti) in t.iter().enumerate() {
        for k in 1..=order {
            let c = 2.0 * PI * (k as f64) * ti / period;
            x[i][2 * (k - 1)] = c.sin();
            x[i][2 * (k - 1) + 1] = c.cos();
        }
    }
    x
}

/// Combine multiple seasonality blocks column-wise
pub fn hstack(blocks: &[Vec<Vec<f64>>]) -> Vec<Vec<f64>> {
    if blocks.is_empty() {
        return Vec::new();
    }
    let rows = blocks[0].len();
    let total_cols: usize = blocks
        .iter()
        .map(|b| if b.is_empty() { 0 } else { b[0].len() })
        .sum();
    let mut out = vec![vec![0.0; total_cols]; rows];
    for (i, row) in out.iter_mut().enumerate() {
        let mut col = 0;
        for block in blocks {
            if block.is_empty() {
                continue;
            }
            for &v in &block[i] {
                row[col] = v;
                col += 1;
            }
        }
    }
    out
}

/// Feature matrix for `configs` evaluated at `ts`, `ts.len()` rows.
pub fn seasonal_features(ts: &[NaiveDateTime], configs: &[SeasonalityConfig]) -> Vec<Vec<f64>> {
    let days = epoch_days(ts);
    let blocks: Vec<Vec<Vec<f64>>> = configs
        .iter()
        .map(|c| fourier_series(&days, c.period, c.fourier_order))
        .collect();
    if blocks.is_empty() {
        vec![vec![]; ts.len()]
    } else {
        hstack(&blocks)
    }
}
