use crate::PipelineError;
use chrono::NaiveDateTime;

/// A validated series: every row dated, `sales` numeric or missing.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedSeries {
    pub dates: Vec<NaiveDateTime>,
    pub sales: Vec<Option<f64>>,
}

impl CleanedSeries {
    /// Pair coerced dates with the raw `sales` cells, converting them to numbers.
    ///
    /// Empty cells become gaps. Anything else that is not a finite number is a
    /// fit error: the model cannot use it and nothing is substituted for it.
    pub fn new(dates: Vec<NaiveDateTime>, sales: &[String]) -> crate::Result<Self> {
        if dates.len() != sales.len() {
            return Err(PipelineError::Unexpected(
                "date and sales columns must have the same length".to_string(),
            ));
        }

        let sales = sales
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let cell = cell.trim();
                if cell.is_empty() {
                    return Ok(None);
                }
                match cell.parse::<f64>() {
                    Ok(v) if v.is_finite() => Ok(Some(v)),
                    _ => Err(PipelineError::ModelFit(format!(
                        "sales value '{}' at row {} is not a number",
                        cell,
                        i + 1
                    ))),
                }
            })
            .collect::<crate::Result<Vec<_>>>()?;

        Ok(Self { dates, sales })
    }

    /// Rename to the model's `ds`/`y`, sort chronologically and drop gaps.
    pub fn to_model_input(&self) -> crate::Result<TimeSeriesData> {
        let mut rows: Vec<(NaiveDateTime, f64)> = self
            .dates
            .iter()
            .zip(&self.sales)
            .filter_map(|(d, s)| s.map(|v| (*d, v)))
            .collect();
        rows.sort_by_key(|(d, _)| *d);
        let (ds, y) = rows.into_iter().unzip();
        TimeSeriesData::new(ds, y)
    }

    /// Distinct dates in ascending order, gaps included.
    pub fn history_dates(&self) -> Vec<NaiveDateTime> {
        let mut dates = self.dates.clone();
        dates.sort();
        dates.dedup();
        dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TimeSeriesData {
    pub ds: Vec<NaiveDateTime>,
    pub y: Vec<f64>,
}

impl TimeSeriesData {
    pub fn new(ds: Vec<NaiveDateTime>, y: Vec<f64>) -> crate::Result<Self> {
        if ds.len() != y.len() {
            return Err(PipelineError::Unexpected(
                "ds and y must have same length".to_string(),
            ));
        }
        Ok(Self { ds, y })
    }

    pub fn len(&self) -> usize {
        self.ds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ds.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastRow {
    pub timestamp: NaiveDateTime,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
}

/// Predictions for history plus horizon, one entry per timestamp, ascending.
#[derive(Debug, Clone)]
pub struct ForecastResult {
    pub ds: Vec<NaiveDateTime>,
    pub trend: Vec<f64>,
    pub trend_lower: Vec<f64>,
    pub trend_upper: Vec<f64>,
    pub additive_terms: Vec<f64>,
    pub yearly: Option<Vec<f64>>,
    pub weekly: Option<Vec<f64>>,
    pub daily: Option<Vec<f64>>,
    pub yhat: Vec<f64>,
    pub yhat_lower: Vec<f64>,
    pub yhat_upper: Vec<f64>,
}

impl ForecastResult {
    pub fn len(&self) -> usize {
        self.ds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ds.is_empty()
    }

    pub fn row(&self, i: usize) -> ForecastRow {
        ForecastRow {
            timestamp: self.ds[i],
            yhat: self.yhat[i],
            yhat_lower: self.yhat_lower[i],
            yhat_upper: self.yhat_upper[i],
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = ForecastRow> + '_ {
        (0..self.len()).map(move |i| self.row(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn cells(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cleaned_series_numeric() {
        let series = CleanedSeries::new(vec![day(1), day(2)], &cells(&["120", " 135.5 "])).unwrap();
        assert_eq!(series.sales, vec![Some(120.0), Some(135.5)]);
    }

    #[test]
    fn test_cleaned_series_gap() {
        let series = CleanedSeries::new(vec![day(1), day(2)], &cells(&["120", ""])).unwrap();
        assert_eq!(series.sales, vec![Some(120.0), None]);
    }

    #[test]
    fn test_cleaned_series_rejects_text() {
        let err = CleanedSeries::new(vec![day(1)], &cells(&["abc"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelFitError);
        assert!(err.to_string().contains("'abc'"));
    }

    #[test]
    fn test_cleaned_series_rejects_nan() {
        let err = CleanedSeries::new(vec![day(1)], &cells(&["NaN"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelFitError);
    }

    #[test]
    fn test_cleaned_series_length_mismatch() {
        assert!(CleanedSeries::new(vec![day(1)], &cells(&["1", "2"])).is_err());
    }

    #[test]
    fn test_model_input_sorted_without_gaps() {
        let series = CleanedSeries::new(
            vec![day(3), day(1), day(2)],
            &cells(&["30", "10", ""]),
        )
        .unwrap();
        let data = series.to_model_input().unwrap();
        assert_eq!(data.ds, vec![day(1), day(3)]);
        assert_eq!(data.y, vec![10.0, 30.0]);
    }

    #[test]
    fn test_history_dates_distinct() {
        let series = CleanedSeries::new(
            vec![day(2), day(1), day(2)],
            &cells(&["1", "2", "3"]),
        )
        .unwrap();
        assert_eq!(series.history_dates(), vec![day(1), day(2)]);
    }

    #[test]
    fn test_timeseries_data_length_mismatch() {
        assert!(TimeSeriesData::new(vec![day(1), day(2)], vec![1.0]).is_err());
    }

    #[test]
    fn test_timeseries_data_empty() {
        let data = TimeSeriesData::new(vec![], vec![]).unwrap();
        assert!(data.is_empty());
        assert_eq!(data.len(), 0);
    }
}
