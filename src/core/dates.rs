use crate::PipelineError;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

const DATETIME_FORMATS: [&str; 7] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: [&str; 10] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%Y%m%d",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%b %d %Y",
];

/// Timestamps outside these years are rejected so later date arithmetic
/// cannot overflow.
const YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

/// How `dd/mm/yyyy`-shaped cells are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlashOrder {
    MonthFirst,
    DayFirst,
}

impl SlashOrder {
    fn datetime_format(self) -> &'static str {
        match self {
            SlashOrder::MonthFirst => "%m/%d/%Y %H:%M:%S",
            SlashOrder::DayFirst => "%d/%m/%Y %H:%M:%S",
        }
    }

    fn date_format(self) -> &'static str {
        match self {
            SlashOrder::MonthFirst => "%m/%d/%Y",
            SlashOrder::DayFirst => "%d/%m/%Y",
        }
    }
}

/// Parse one date cell into a naive timestamp.
///
/// Accepts ISO dates and datetimes (with `T` or a space), RFC 3339 with an
/// offset (the wall-clock time is kept), slash/dash/dot separated day-month
/// orders, compact `YYYYMMDD` and English month names. A lone slash date is
/// read month-first, then day-first. On failure the error is the one
/// reported for the ISO `%Y-%m-%d` attempt.
pub fn parse_ds(ds: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    parse_with(ds, SlashOrder::MonthFirst)
        .or_else(|e| parse_with(ds, SlashOrder::DayFirst).map_err(|_| e))
}

/// Parse one cell, reading slash dates in the given order only.
fn parse_with(ds: &str, order: SlashOrder) -> Result<NaiveDateTime, chrono::ParseError> {
    let s = ds.trim();

    for fmt in DATETIME_FORMATS.iter().copied().chain([order.datetime_format()]) {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local());
    }
    for fmt in DATE_FORMATS.iter().skip(1).copied().chain([order.date_format()]) {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d.and_time(NaiveTime::MIN));
        }
    }
    NaiveDate::parse_from_str(s, DATE_FORMATS[0]).map(|d| d.and_time(NaiveTime::MIN))
}

/// Parse a whole `date` column. A single bad cell fails the column.
///
/// Slash dates get one reading for the whole column: month-first when every
/// cell parses that way, otherwise day-first. A column that fits neither
/// reports the first cell the month-first reading rejected.
pub fn coerce_dates(column: &[String]) -> crate::Result<Vec<NaiveDateTime>> {
    if let Some(i) = column.iter().position(|cell| cell.trim().is_empty()) {
        return Err(PipelineError::DateFormat(format!(
            "row {} has an empty date; every row needs a date such as 2023-01-31",
            i + 1
        )));
    }

    let parsed = match coerce_with(column, SlashOrder::MonthFirst) {
        Ok(parsed) => parsed,
        Err(month_first) => {
            if !column.iter().any(|cell| cell.contains('/')) {
                return Err(month_first);
            }
            match coerce_with(column, SlashOrder::DayFirst) {
                Ok(parsed) => {
                    debug!("reading slash dates day-first");
                    parsed
                }
                Err(_) => return Err(month_first),
            }
        }
    };

    for (i, (cell, ts)) in column.iter().zip(&parsed).enumerate() {
        if !YEARS.contains(&ts.year()) {
            return Err(PipelineError::DateFormat(format!(
                "'{}' at row {} is outside years {}..={}; use a date such as 2023-01-31",
                cell.trim(),
                i + 1,
                YEARS.start(),
                YEARS.end()
            )));
        }
    }
    Ok(parsed)
}

fn coerce_with(column: &[String], order: SlashOrder) -> crate::Result<Vec<NaiveDateTime>> {
    column
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            parse_with(cell, order).map_err(|e| {
                PipelineError::DateFormat(format!(
                    "unable to parse '{}' at row {} ({}); use a date such as 2023-01-31",
                    cell,
                    i + 1,
                    e
                ))
            })
        })
        .collect()
}

/// Render timestamps the way they were most likely written: date only when
/// every value sits at midnight.
pub fn format_ds(ts: &[NaiveDateTime]) -> Vec<String> {
    let date_only = ts.iter().all(|t| t.time() == NaiveTime::MIN);
    let fmt = if date_only {
        "%Y-%m-%d"
    } else {
        "%Y-%m-%d %H:%M:%S"
    };
    ts.iter().map(|t| t.format(fmt).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_ds_date() {
        assert_eq!(parse_ds("2020-01-15").unwrap(), ymd(2020, 1, 15));
        assert_eq!(parse_ds(" 2020-01-15 ").unwrap(), ymd(2020, 1, 15));
    }

    #[test]
    fn test_parse_ds_datetime() {
        let dt = parse_ds("2020-01-15 12:30:45").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2020-01-15 12:30:45");
        let dt = parse_ds("2020-01-15T12:30:45.250").unwrap();
        assert_eq!(dt.format("%H:%M:%S%.3f").to_string(), "12:30:45.250");
    }

    #[test]
    fn test_parse_ds_rfc3339_keeps_wall_clock() {
        let dt = parse_ds("2020-01-15T08:00:00+02:00").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2020-01-15 08:00");
    }

    #[test]
    fn test_parse_ds_locale_variants() {
        assert_eq!(parse_ds("2020/01/15").unwrap(), ymd(2020, 1, 15));
        assert_eq!(parse_ds("01/02/2020").unwrap(), ymd(2020, 1, 2));
        assert_eq!(parse_ds("31/01/2020").unwrap(), ymd(2020, 1, 31));
        assert_eq!(parse_ds("31-01-2020").unwrap(), ymd(2020, 1, 31));
        assert_eq!(parse_ds("31.01.2020").unwrap(), ymd(2020, 1, 31));
        assert_eq!(parse_ds("20200131").unwrap(), ymd(2020, 1, 31));
        assert_eq!(parse_ds("Jan 31, 2020").unwrap(), ymd(2020, 1, 31));
        assert_eq!(parse_ds("31 January 2020").unwrap(), ymd(2020, 1, 31));
    }

    #[test]
    fn test_parse_ds_invalid() {
        assert!(parse_ds("invalid").is_err());
        assert!(parse_ds("2020-13-45").is_err());
        assert!(parse_ds("").is_err());
    }

    #[test]
    fn test_coerce_all_valid() {
        let col = vec!["2023-01-01".to_string(), "2023-01-03".to_string()];
        let parsed = coerce_dates(&col).unwrap();
        assert_eq!(parsed, vec![ymd(2023, 1, 1), ymd(2023, 1, 3)]);
    }

    #[test]
    fn test_coerce_single_bad_cell_fails_everything() {
        let mut col: Vec<String> = (1..=9).map(|d| format!("2023-01-0{}", d)).collect();
        col.push("not a date".to_string());
        let err = coerce_dates(&col).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DateFormatError);
        let msg = err.to_string();
        assert!(msg.contains("not a date"), "{}", msg);
        assert!(msg.contains("row 10"), "{}", msg);
    }

    #[test]
    fn test_coerce_empty_cell_fails() {
        let col = vec!["2023-01-01".to_string(), "  ".to_string()];
        let err = coerce_dates(&col).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DateFormatError);
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn test_coerce_day_first_column() {
        let col: Vec<String> = (1..=28).map(|d| format!("{:02}/02/2023", d)).collect();
        let parsed = coerce_dates(&col).unwrap();
        let expected: Vec<NaiveDateTime> = (1..=28).map(|d| ymd(2023, 2, d)).collect();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_coerce_month_first_column() {
        let col = vec!["01/02/2023".to_string(), "01/03/2023".to_string()];
        assert_eq!(
            coerce_dates(&col).unwrap(),
            vec![ymd(2023, 1, 2), ymd(2023, 1, 3)]
        );
    }

    #[test]
    fn test_coerce_mixed_slash_orders_fail() {
        let col = vec!["13/02/2023".to_string(), "02/14/2023".to_string()];
        let err = coerce_dates(&col).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DateFormatError);
        assert!(err.to_string().contains("13/02/2023"), "{}", err);
        assert!(err.to_string().contains("row 1"), "{}", err);
    }

    #[test]
    fn test_coerce_day_first_datetimes() {
        let col = vec![
            "12/02/2023 08:00:00".to_string(),
            "13/02/2023 08:00:00".to_string(),
        ];
        let parsed = coerce_dates(&col).unwrap();
        assert_eq!(parsed[0], ymd(2023, 2, 12) + chrono::Duration::hours(8));
        assert_eq!(parsed[1], ymd(2023, 2, 13) + chrono::Duration::hours(8));
    }

    #[test]
    fn test_coerce_rejects_far_years() {
        let col = vec!["+262142-12-01".to_string(), "+262142-12-02".to_string()];
        let err = coerce_dates(&col).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DateFormatError);
        assert!(err.to_string().contains("row 1"), "{}", err);

        let col = vec!["9999-12-31".to_string()];
        assert_eq!(coerce_dates(&col).unwrap(), vec![ymd(9999, 12, 31)]);
    }

    #[test]
    fn test_format_ds() {
        assert_eq!(format_ds(&[ymd(2023, 3, 2)]), vec!["2023-03-02"]);
        let noon = ymd(2023, 3, 2) + chrono::Duration::hours(12);
        assert_eq!(
            format_ds(&[ymd(2023, 3, 2), noon]),
            vec!["2023-03-02 00:00:00", "2023-03-02 12:00:00"]
        );
    }
}
