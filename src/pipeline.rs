//! The end-to-end run: bytes in, forecast artifact (or a classified error) out.

use crate::config::{ConfigError, PipelineConfig};
use crate::core::columns::ColumnAliases;
use crate::core::data::{CleanedSeries, ForecastResult};
use crate::core::dates::coerce_dates;
use crate::core::format::{to_artifact, ForecastArtifact};
use crate::core::model::Forecaster;
use crate::core::schema;
use crate::core::table::RawTable;
use crate::{PipelineError, Result};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{info, warn};

/// Days forecast past the last historical date.
pub const DEFAULT_HORIZON: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Idle,
    Parsed,
    Normalized,
    Validated,
    DateCoerced,
    Fitted,
    Formatted,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Formatted | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Everything a host needs to present a successful run.
#[derive(Debug, Clone)]
pub struct ForecastOutput {
    pub artifact: ForecastArtifact,
    pub forecast: ForecastResult,
    pub history: CleanedSeries,
}

/// Outcome of one run together with the stages it went through.
#[derive(Debug)]
pub struct RunReport {
    pub transitions: Vec<Stage>,
    pub result: Result<ForecastOutput>,
}

impl RunReport {
    pub fn final_stage(&self) -> Stage {
        self.transitions.last().copied().unwrap_or(Stage::Idle)
    }

    pub fn into_result(self) -> Result<ForecastOutput> {
        self.result
    }
}

/// Where the uploaded bytes come from.
pub trait InputSource {
    fn read(&mut self) -> Result<Vec<u8>>;
}

/// Where the outcome of a run goes.
pub trait ResultSink {
    fn on_success(&mut self, output: &ForecastOutput) -> Result<()>;
    fn on_error(&mut self, error: &PipelineError) -> Result<()>;
}

/// Reads the whole file at `path`.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl InputSource for FileSource {
    fn read(&mut self) -> Result<Vec<u8>> {
        std::fs::read(&self.path).map_err(|e| {
            PipelineError::Unexpected(format!("cannot read {}: {}", self.path.display(), e))
        })
    }
}

/// Bytes already in memory, e.g. an upload.
#[derive(Debug, Clone, Default)]
pub struct BytesSource {
    pub bytes: Vec<u8>,
}

impl BytesSource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl InputSource for BytesSource {
    fn read(&mut self) -> Result<Vec<u8>> {
        Ok(std::mem::take(&mut self.bytes))
    }
}

/// Stateless runner. Immutable after construction, so one instance can be
/// shared between threads.
#[derive(Debug, Clone)]
pub struct Pipeline {
    aliases: ColumnAliases,
    interval_width: f64,
    uncertainty_samples: usize,
    horizon: usize,
}

impl Default for Pipeline {
    fn default() -> Self {
        let config = PipelineConfig::default();
        Self {
            aliases: ColumnAliases::builtin().clone(),
            interval_width: config.interval_width,
            uncertainty_samples: config.uncertainty_samples,
            horizon: DEFAULT_HORIZON,
        }
    }
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            aliases: config.aliases()?,
            interval_width: config.interval_width,
            uncertainty_samples: config.uncertainty_samples,
            horizon: DEFAULT_HORIZON,
        })
    }

    pub fn aliases(&self) -> &ColumnAliases {
        &self.aliases
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Run every stage on `bytes` and record the transitions.
    pub fn run(&self, bytes: &[u8]) -> RunReport {
        let mut transitions = vec![Stage::Idle];
        let result = self.run_stages(bytes, &mut transitions);
        if let Err(e) = &result {
            warn!(
                stage = %transitions.last().copied().unwrap_or(Stage::Idle),
                kind = ?e.kind(),
                error = %e,
                "pipeline failed"
            );
            transitions.push(Stage::Failed);
        }
        RunReport {
            transitions,
            result,
        }
    }

    pub fn forecast(&self, bytes: &[u8]) -> Result<ForecastOutput> {
        self.run(bytes).into_result()
    }

    /// Pull input from `source`, run, and hand the outcome to `sink`.
    ///
    /// A source that cannot be read fails the run before parsing. Only a
    /// failing sink makes this return `Err`.
    pub fn serve(
        &self,
        source: &mut dyn InputSource,
        sink: &mut dyn ResultSink,
    ) -> Result<RunReport> {
        let report = match source.read() {
            Ok(bytes) => self.run(&bytes),
            Err(e) => {
                warn!(error = %e, "input could not be read");
                RunReport {
                    transitions: vec![Stage::Idle, Stage::Failed],
                    result: Err(e),
                }
            }
        };
        match &report.result {
            Ok(output) => sink.on_success(output)?,
            Err(e) => sink.on_error(e)?,
        }
        Ok(report)
    }

    fn run_stages(&self, bytes: &[u8], trace: &mut Vec<Stage>) -> Result<ForecastOutput> {
        let table = RawTable::from_csv_bytes(bytes)?;
        advance(trace, Stage::Parsed);

        let headers = self.aliases.normalize(&table.headers);
        let table = table.with_headers(headers)?;
        advance(trace, Stage::Normalized);

        let columns = schema::validate(&table.headers)?;
        advance(trace, Stage::Validated);

        let dates = coerce_dates(&table.column(columns.date))?;
        advance(trace, Stage::DateCoerced);

        let history = CleanedSeries::new(dates, &table.column(columns.sales))?;
        let mut model = Forecaster::new()
            .with_interval_width(self.interval_width)
            .with_uncertainty_samples(self.uncertainty_samples);
        let forecast = model.forecast(&history, self.horizon)?;
        advance(trace, Stage::Fitted);

        let artifact = to_artifact(&forecast, self.horizon)?;
        advance(trace, Stage::Formatted);

        Ok(ForecastOutput {
            artifact,
            forecast,
            history,
        })
    }
}

fn advance(trace: &mut Vec<Stage>, to: Stage) {
    let from = trace.last().copied().unwrap_or(Stage::Idle);
    info!(%from, %to, "pipeline transition");
    trace.push(to);
}
