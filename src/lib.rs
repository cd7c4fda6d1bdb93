//! Sales forecasting from an uploaded CSV.
//!
//! Raw bytes go through column normalization, schema validation, date coercion,
//! a Prophet-style additive model and a CSV formatter. Every stage returns a
//! classified [`PipelineError`] on failure; see [`pipeline::Pipeline`].

pub mod config;
pub mod core;
pub mod pipeline;

#[cfg(feature = "python")]
mod python;

pub use crate::config::{ConfigError, PipelineConfig};
pub use crate::core::{
    Canonical, CleanedSeries, ColumnAliases, ForecastArtifact, ForecastResult, ForecastRow,
    Forecaster, RawTable, SchemaExample, TimeSeriesData,
};
pub use crate::pipeline::{
    BytesSource, FileSource, ForecastOutput, InputSource, Pipeline, ResultSink, RunReport, Stage,
    DEFAULT_HORIZON,
};

use serde::Serialize;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(
        "The file must contain two columns named `date` and `sales` (or a recognized equivalent). Missing: {}",
        .missing.join(", ")
    )]
    Schema {
        required: Vec<String>,
        missing: Vec<String>,
        example: &'static SchemaExample,
    },

    #[error("Invalid date format: {0}")]
    DateFormat(String),

    #[error("The forecasting model could not be fitted: {0}")]
    ModelFit(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Error classification exposed to the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    SchemaError,
    DateFormatError,
    ModelFitError,
    UnexpectedError,
}

/// Renderable form of a [`PipelineError`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    /// Example of a valid file, only present for schema failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Schema { .. } => ErrorKind::SchemaError,
            PipelineError::DateFormat(_) => ErrorKind::DateFormatError,
            PipelineError::ModelFit(_) => ErrorKind::ModelFitError,
            PipelineError::Unexpected(_) => ErrorKind::UnexpectedError,
        }
    }

    pub fn report(&self) -> ErrorReport {
        let example = match self {
            PipelineError::Schema { example, .. } => Some(example.to_csv()),
            _ => None,
        };
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            example,
        }
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::Unexpected(err.to_string())
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Unexpected(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::EXAMPLE_TABLE;

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(
            PipelineError::DateFormat("x".into()).kind(),
            ErrorKind::DateFormatError
        );
        assert_eq!(
            PipelineError::ModelFit("x".into()).kind(),
            ErrorKind::ModelFitError
        );
        assert_eq!(
            PipelineError::Unexpected("x".into()).kind(),
            ErrorKind::UnexpectedError
        );
    }

    #[test]
    fn test_schema_report_carries_example() {
        let err = PipelineError::Schema {
            required: vec!["date".into(), "sales".into()],
            missing: vec!["sales".into()],
            example: &EXAMPLE_TABLE,
        };
        let report = err.report();
        assert_eq!(report.kind, ErrorKind::SchemaError);
        assert!(report.message.contains("Missing: sales"));
        assert_eq!(
            report.example.as_deref(),
            Some("date,sales\n2023-01-01,120\n2023-01-02,135\n")
        );
    }

    #[test]
    fn test_report_serializes_without_example() {
        let report = PipelineError::ModelFit("too few rows".into()).report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kind"], "ModelFitError");
        assert!(json.get("example").is_none());
    }

    #[test]
    fn test_io_error_is_unexpected() {
        let err: PipelineError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert_eq!(err.kind(), ErrorKind::UnexpectedError);
        assert!(err.to_string().contains("boom"));
    }
}
