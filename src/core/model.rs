use crate::core::data::{CleanedSeries, ForecastResult, TimeSeriesData};
use crate::core::objective::{ProphetModel, ProphetParams};
use crate::core::optimizer::{fit_map, OptimizationConfig};
use crate::core::seasonality::{auto_seasonalities, seasonal_features, SeasonalityConfig};
use crate::core::trend::{
    changepoint_matrix, future_dates, piecewise_linear, scale_time, select_changepoints,
    time_scale,
};
use crate::core::uncertainty::{simulate, TrendState};
use crate::{PipelineError, Result};
use chrono::NaiveDateTime;
use ndarray::{Array1, Array2};
use tracing::{debug, info};

/// Metadata for a seasonality feature block in the design matrix
#[derive(Debug, Clone)]
struct SeasonBlock {
    name: &'static str,
    period: f64,
    order: usize,
    start: usize,
    end: usize, // exclusive
}

/// Everything `predict` needs, captured at the end of `fit`.
#[derive(Debug, Clone)]
struct FittedState {
    history: TimeSeriesData,
    // Time scaling and changepoints
    t0: NaiveDateTime,
    t_scale: f64,
    t_change: Vec<f64>,
    // Y scaling (absmax)
    y_scale: f64,
    seasonalities: Vec<SeasonalityConfig>,
    season_blocks: Vec<SeasonBlock>,
    params: ProphetParams,
    neg_log_prob: f64,
    refined: bool,
}

/// Additive trend + seasonality forecaster with Prophet's default settings.
///
/// ```no_run
/// # use prevision::{Forecaster, TimeSeriesData};
/// # fn run(data: TimeSeriesData) -> prevision::Result<()> {
/// let mut model = Forecaster::new().with_interval_width(0.8);
/// model.fit(&data)?;
/// let future = model.make_future_dates(30)?;
/// let forecast = model.predict(&future)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Forecaster {
    n_changepoints: usize,
    changepoint_range: f64,
    changepoint_prior_scale: f64,
    interval_width: f64,
    uncertainty_samples: usize,
    optimization: OptimizationConfig,
    fitted: Option<FittedState>,
}

impl Forecaster {
    pub fn new() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            interval_width: 0.80,
            uncertainty_samples: 1000,
            optimization: OptimizationConfig::default(),
            fitted: None,
        }
    }

    /// Width of the prediction interval, clamped to [0, 1].
    pub fn with_interval_width(mut self, width: f64) -> Self {
        self.interval_width = if width.is_nan() { 0.8 } else { width.clamp(0.0, 1.0) };
        self
    }

    /// Number of simulated trajectories; 0 collapses the interval onto `yhat`.
    pub fn with_uncertainty_samples(mut self, samples: usize) -> Self {
        self.uncertainty_samples = samples;
        self
    }

    pub fn interval_width(&self) -> f64 {
        self.interval_width
    }

    pub fn uncertainty_samples(&self) -> usize {
        self.uncertainty_samples
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn history(&self) -> Option<&TimeSeriesData> {
        self.fitted.as_ref().map(|f| &f.history)
    }

    pub fn fit(&mut self, data: &TimeSeriesData) -> Result<()> {
        let mut rows: Vec<(NaiveDateTime, f64)> =
            data.ds.iter().copied().zip(data.y.iter().copied()).collect();
        rows.sort_by_key(|(d, _)| *d);
        let (ds, y): (Vec<NaiveDateTime>, Vec<f64>) = rows.into_iter().unzip();
        check_fittable(&ds, &y)?;

        let (t_hist, t_scale, t0) = time_scale(&ds);
        let t_change = select_changepoints(&t_hist, self.n_changepoints, self.changepoint_range);

        let y_scale = y.iter().map(|v| v.abs()).fold(0.0_f64, f64::max);
        let y_scaled: Vec<f64> = y.iter().map(|v| v / y_scale).collect();

        let seasonalities = auto_seasonalities(&ds);
        let features = seasonal_features(&ds, &seasonalities);
        let mut season_blocks = Vec::with_capacity(seasonalities.len());
        let mut col_start = 0usize;
        for config in &seasonalities {
            let col_end = col_start + config.n_features();
            season_blocks.push(SeasonBlock {
                name: config.name,
                period: config.period,
                order: config.fourier_order,
                start: col_start,
                end: col_end,
            });
            col_start = col_end;
        }
        let total_features = col_start;

        let mut sigmas = vec![10.0; total_features];
        for (block, config) in season_blocks.iter().zip(&seasonalities) {
            sigmas[block.start..block.end].fill(config.prior_scale);
        }

        let n = ds.len();
        let mut x = Array2::zeros((n, total_features));
        for (i, row) in features.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                x[[i, j]] = *v;
            }
        }

        let model = ProphetModel {
            n,
            k: total_features,
            s: t_change.len(),
            t: Array1::from_vec(t_hist),
            y: Array1::from_vec(y_scaled),
            x,
            t_change: Array1::from_vec(t_change.clone()),
            sigmas: Array1::from_vec(sigmas),
            tau: self.changepoint_prior_scale,
        };

        let result = fit_map(&model, &self.optimization).map_err(PipelineError::ModelFit)?;
        let params = result.params;
        let all_finite = params.k.is_finite()
            && params.m.is_finite()
            && params.sigma_obs.is_finite()
            && params.delta.iter().chain(params.beta.iter()).all(|v| v.is_finite());
        if !all_finite {
            return Err(PipelineError::ModelFit(
                "the optimizer produced non-finite parameters".to_string(),
            ));
        }

        info!(
            observations = n,
            changepoints = t_change.len(),
            seasonalities = ?seasonalities.iter().map(|s| s.name).collect::<Vec<_>>(),
            refined = result.refined,
            iterations = result.iterations,
            "model fitted"
        );

        self.fitted = Some(FittedState {
            history: TimeSeriesData::new(ds, y)?,
            t0,
            t_scale,
            t_change,
            y_scale,
            seasonalities,
            season_blocks,
            params,
            neg_log_prob: result.neg_log_prob,
            refined: result.refined,
        });
        debug!(params = %self.params(), "fitted parameters");
        Ok(())
    }

    /// Distinct historical dates followed by `periods` daily steps.
    pub fn make_future_dates(&self, periods: usize) -> Result<Vec<NaiveDateTime>> {
        let fitted = self.fitted_state()?;
        let mut out = fitted.history.ds.clone();
        out.dedup();
        let last = *out
            .last()
            .ok_or_else(|| PipelineError::Unexpected("fitted history is empty".to_string()))?;
        out.extend(horizon_after(last, periods)?);
        Ok(out)
    }

    pub fn predict(&self, ds: &[NaiveDateTime]) -> Result<ForecastResult> {
        let fitted = self.fitted_state()?;
        let params = &fitted.params;

        let t = scale_time(ds, fitted.t0, fitted.t_scale);
        let a = changepoint_matrix(&t, &fitted.t_change);
        let delta = params.delta.to_vec();
        let trend = piecewise_linear(params.k, params.m, &delta, &t, &a, &fitted.t_change);

        let features = seasonal_features(ds, &fitted.seasonalities);
        let beta = params.beta.to_vec();
        let component = |block: &SeasonBlock| -> Vec<f64> {
            features
                .iter()
                .map(|row| {
                    (block.start..block.end)
                        .map(|j| row[j] * beta[j])
                        .sum::<f64>()
                })
                .collect()
        };

        let mut seasonal = vec![0.0; ds.len()];
        let mut yearly = None;
        let mut weekly = None;
        let mut daily = None;
        for block in &fitted.season_blocks {
            let values = component(block);
            for (acc, v) in seasonal.iter_mut().zip(&values) {
                *acc += v;
            }
            let unscaled: Vec<f64> = values.iter().map(|v| v * fitted.y_scale).collect();
            match block.name {
                "yearly" => yearly = Some(unscaled),
                "weekly" => weekly = Some(unscaled),
                "daily" => daily = Some(unscaled),
                _ => {}
            }
        }

        let intervals = simulate(
            &TrendState {
                k: params.k,
                m: params.m,
                delta: &delta,
                t_change: &fitted.t_change,
            },
            &t,
            &seasonal,
            params.sigma_obs,
            self.uncertainty_samples,
            self.interval_width,
        );

        let unscale = |v: &[f64]| -> Vec<f64> { v.iter().map(|x| x * fitted.y_scale).collect() };
        let yhat: Vec<f64> = trend
            .iter()
            .zip(&seasonal)
            .map(|(tr, s)| (tr + s) * fitted.y_scale)
            .collect();

        Ok(ForecastResult {
            ds: ds.to_vec(),
            trend: unscale(&trend),
            trend_lower: unscale(&intervals.trend_lower),
            trend_upper: unscale(&intervals.trend_upper),
            additive_terms: unscale(&seasonal),
            yearly,
            weekly,
            daily,
            yhat,
            yhat_lower: unscale(&intervals.yhat_lower),
            yhat_upper: unscale(&intervals.yhat_upper),
        })
    }

    /// Fit on the observed rows of `series` and predict every distinct
    /// historical date plus `horizon` days after the last one.
    pub fn forecast(&mut self, series: &CleanedSeries, horizon: usize) -> Result<ForecastResult> {
        self.fit(&series.to_model_input()?)?;
        let mut ds = series.history_dates();
        let last = *ds
            .last()
            .ok_or_else(|| PipelineError::ModelFit("the series has no rows".to_string()))?;
        ds.extend(horizon_after(last, horizon)?);
        self.predict(&ds)
    }

    pub fn params(&self) -> serde_json::Value {
        let fitted = self.fitted.as_ref();
        serde_json::json!({
            "fitted": fitted.is_some(),

            "growth": "linear",
            "n_changepoints": self.n_changepoints,
            "changepoint_range": self.changepoint_range,
            "changepoint_prior_scale": self.changepoint_prior_scale,
            "interval_width": self.interval_width,
            "uncertainty_samples": self.uncertainty_samples,

            "t0": fitted.map(|f| f.t0.format("%Y-%m-%d %H:%M:%S").to_string()),
            "t_scale": fitted.map(|f| f.t_scale),
            "y_scale": fitted.map(|f| f.y_scale),
            "t_change": fitted.map(|f| f.t_change.clone()),
            "k": fitted.map(|f| f.params.k),
            "m": fitted.map(|f| f.params.m),
            "delta": fitted.map(|f| f.params.delta.to_vec()),
            "beta": fitted.map(|f| f.params.beta.to_vec()),
            "sigma_obs": fitted.map(|f| f.params.sigma_obs),
            "neg_log_prob": fitted.map(|f| f.neg_log_prob),
            "refined": fitted.map(|f| f.refined),

            "season_blocks": fitted.map(|f| f.season_blocks.iter().map(|b| serde_json::json!({
                "name": b.name,
                "period": b.period,
                "order": b.order,
                "start": b.start,
                "end": b.end,
            })).collect::<Vec<_>>()),
        })
    }

    fn fitted_state(&self) -> Result<&FittedState> {
        self.fitted.as_ref().ok_or_else(|| {
            PipelineError::Unexpected("model must be fitted before prediction".to_string())
        })
    }
}

impl Default for Forecaster {
    fn default() -> Self {
        Self::new()
    }
}

fn horizon_after(last: NaiveDateTime, periods: usize) -> Result<Vec<NaiveDateTime>> {
    future_dates(last, periods).ok_or_else(|| {
        PipelineError::ModelFit(format!(
            "a {}-day horizon after {} runs past the supported date range",
            periods, last
        ))
    })
}

/// Reject histories the model cannot decompose. `ds` must be sorted.
fn check_fittable(ds: &[NaiveDateTime], y: &[f64]) -> Result<()> {
    if ds.len() < 2 {
        return Err(PipelineError::ModelFit(format!(
            "at least 2 rows with sales values are required, found {}",
            ds.len()
        )));
    }
    if ds.first() == ds.last() {
        return Err(PipelineError::ModelFit(
            "at least 2 distinct dates are required".to_string(),
        ));
    }
    let first = y[0];
    if y.iter().all(|v| *v == first) {
        return Err(PipelineError::ModelFit(format!(
            "all sales values are identical ({}), nothing to decompose",
            first
        )));
    }
    Ok(())
}
