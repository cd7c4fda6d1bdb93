use chrono::{Duration, NaiveDate, NaiveDateTime};
use prevision::core::{self, CleanedSeries, Forecaster, TimeSeriesData};

fn make_ds(start: &str, n: usize) -> Vec<NaiveDateTime> {
    let start_date = NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap();
    (0..n)
        .map(|i| (start_date + Duration::days(i as i64)).and_hms_opt(0, 0, 0).unwrap())
        .collect()
}

#[test]
fn time_scale_and_changepoints() {
    let ts = make_ds("2020-01-01", 10);
    let (t, _scale, _t0) = core::trend::time_scale(&ts);
    assert_eq!(t.len(), 10);
    assert!((t[0] - 0.0).abs() < 1e-12);
    assert!((t[9] - 1.0).abs() < 1e-12);

    let cps = core::trend::select_changepoints(&t, 3, 0.8);
    assert!(cps.len() <= 3);
    let a = core::trend::changepoint_matrix(&t, &cps);
    assert_eq!(a.len(), t.len());
    for row in &a {
        assert_eq!(row.len(), cps.len());
    }
}

#[test]
fn piecewise_linear_reduces_to_linear_when_no_delta() {
    let ts = make_ds("2020-01-01", 5);
    let (t, _, _) = core::trend::time_scale(&ts);
    let cps: Vec<f64> = vec![];
    let a = core::trend::changepoint_matrix(&t, &cps);
    let k = 2.0;
    let m = 1.0;
    let trend = core::trend::piecewise_linear(k, m, &[], &t, &a, &cps);
    for (i, &ti) in t.iter().enumerate() {
        let expected = k * ti + m;
        assert!((trend[i] - expected).abs() < 1e-9);
    }
}

#[test]
fn fourier_series_uses_epoch_days() {
    let ts = make_ds("2020-01-01", 7);
    let x = core::seasonality::seasonal_features(&ts, &[core::seasonality::SeasonalityConfig::weekly()]);
    assert_eq!(x.len(), 7);
    assert_eq!(x[0].len(), 6);

    // Same weekday one week apart gives the same features.
    let later = make_ds("2020-01-08", 1);
    let y = core::seasonality::seasonal_features(&later, &[core::seasonality::SeasonalityConfig::weekly()]);
    for (a, b) in x[0].iter().zip(&y[0]) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn model_fit_with_yearly_seasonality() {
    let n = 800;
    let ds = make_ds("2020-01-01", n);
    let y: Vec<f64> = (0..n)
        .map(|i| {
            let day = i as f64;
            500.0 + 0.2 * day + 40.0 * (2.0 * std::f64::consts::PI * day / 365.25).sin()
        })
        .collect();
    let data = TimeSeriesData::new(ds, y.clone()).unwrap();
    let mut m = Forecaster::new().with_uncertainty_samples(0);
    m.fit(&data).unwrap();

    let fut = m.make_future_dates(30).unwrap();
    let fcst = m.predict(&fut).unwrap();
    assert_eq!(fcst.len(), n + 30);
    assert!(fcst.yearly.is_some());
    assert!(fcst.weekly.is_some());
    assert!(fcst.daily.is_none());

    let mae: f64 = y
        .iter()
        .zip(&fcst.yhat)
        .map(|(a, b)| (a - b).abs())
        .sum::<f64>()
        / n as f64;
    assert!(mae < 10.0, "in-sample MAE too large: {}", mae);
}

#[test]
fn future_dates_daily_len_and_contiguity() {
    let ds = make_ds("2020-01-01", 10);
    let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
    let data = TimeSeriesData::new(ds.clone(), y).unwrap();
    let mut m = Forecaster::new();
    m.fit(&data).unwrap();
    let fut = m.make_future_dates(5).unwrap();
    assert_eq!(fut.len(), 15);
    assert_eq!(*fut.last().unwrap(), *ds.last().unwrap() + Duration::days(5));
    assert!(fut.windows(2).all(|w| w[1] - w[0] == Duration::days(1)));
}

#[test]
fn unsorted_input_is_fitted_in_order() {
    let mut ds = make_ds("2021-03-01", 30);
    let mut y: Vec<f64> = (0..30).map(|i| 10.0 + i as f64).collect();
    ds.reverse();
    y.reverse();
    let data = TimeSeriesData::new(ds, y).unwrap();
    let mut m = Forecaster::new().with_uncertainty_samples(0);
    m.fit(&data).unwrap();

    let history = m.history().unwrap();
    assert!(history.ds.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(history.y[0], 10.0);
}

#[test]
fn uncertainty_intervals_scale_with_noise() {
    let n = 60;
    let ds = make_ds("2020-01-01", n);
    let quiet: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 + ((i * 7) % 3) as f64 * 0.1).collect();
    let noisy: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 + ((i * 7) % 3) as f64 * 10.0).collect();

    let width = |y: Vec<f64>| {
        let data = TimeSeriesData::new(ds.clone(), y).unwrap();
        let mut m = Forecaster::new().with_uncertainty_samples(300);
        m.fit(&data).unwrap();
        let fcst = m.predict(&ds).unwrap();
        fcst.yhat_upper
            .iter()
            .zip(&fcst.yhat_lower)
            .map(|(u, l)| u - l)
            .sum::<f64>()
            / n as f64
    };

    let w_quiet = width(quiet);
    let w_noisy = width(noisy);
    assert!(w_noisy > w_quiet * 5.0, "quiet {} vs noisy {}", w_quiet, w_noisy);
}

#[test]
fn interval_width_controls_spread() {
    let n = 40;
    let ds = make_ds("2022-06-01", n);
    let y: Vec<f64> = (0..n).map(|i| 50.0 + 0.5 * i as f64 + ((i * 5) % 4) as f64 * 3.0).collect();
    let data = TimeSeriesData::new(ds.clone(), y).unwrap();

    let spread = |width: f64| {
        let mut m = Forecaster::new()
            .with_interval_width(width)
            .with_uncertainty_samples(500);
        m.fit(&data).unwrap();
        let fcst = m.predict(&ds).unwrap();
        fcst.yhat_upper[20] - fcst.yhat_lower[20]
    };
    assert!(spread(0.95) > spread(0.5));
}

#[test]
fn forecast_from_cleaned_series() {
    let ds = make_ds("2023-01-01", 45);
    let sales: Vec<String> = (0..45)
        .map(|i| if i % 10 == 3 { String::new() } else { (200 + 3 * i).to_string() })
        .collect();
    let series = CleanedSeries::new(ds.clone(), &sales).unwrap();
    let mut m = Forecaster::new().with_uncertainty_samples(200);
    let fcst = m.forecast(&series, 30).unwrap();

    assert_eq!(fcst.len(), 75);
    assert_eq!(fcst.ds[..45], ds[..]);
    assert_eq!(fcst.ds[45], ds[44] + Duration::days(1));
    for row in fcst.rows() {
        assert!(row.yhat.is_finite());
        assert!(row.yhat_lower <= row.yhat_upper);
    }
    // Gap rows still get a prediction on the fitted trend.
    assert!((fcst.yhat[3] - 209.0).abs() < 5.0, "yhat[3] = {}", fcst.yhat[3]);
}

#[test]
fn params_includes_complete_state() {
    let ds = make_ds("2020-01-01", 30);
    let y: Vec<f64> = (0..30).map(|i| 5.0 + (i % 7) as f64).collect();
    let data = TimeSeriesData::new(ds, y).unwrap();
    let mut m = Forecaster::new().with_uncertainty_samples(0);
    m.fit(&data).unwrap();

    let params = m.params();
    for key in [
        "k",
        "m",
        "delta",
        "beta",
        "sigma_obs",
        "t0",
        "t_scale",
        "y_scale",
        "t_change",
        "season_blocks",
        "neg_log_prob",
    ] {
        assert!(!params[key].is_null(), "missing {}", key);
    }
    assert_eq!(params["t0"], "2020-01-01 00:00:00");
    assert_eq!(params["beta"].as_array().unwrap().len(), 6);
    assert_eq!(
        params["delta"].as_array().unwrap().len(),
        params["t_change"].as_array().unwrap().len()
    );
}

#[test]
fn set_interval_width() {
    let m = Forecaster::new().with_interval_width(0.95);
    assert_eq!(m.interval_width(), 0.95);
    assert_eq!(m.params()["interval_width"], 0.95);
}
