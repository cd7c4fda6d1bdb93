use crate::core::data::ForecastResult;
use crate::core::dates::format_ds;
use crate::PipelineError;
use serde::Serialize;

pub const OUTPUT_HEADER: [&str; 4] = ["ds", "yhat", "yhat_lower", "yhat_upper"];

/// Serialized forecast, ready to hand to a download or a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ForecastArtifact {
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

#[derive(Serialize)]
struct OutputRow<'a> {
    ds: &'a str,
    yhat: f64,
    yhat_lower: f64,
    yhat_upper: f64,
}

pub fn file_name(horizon: usize) -> String {
    format!("forecast_{}_days.csv", horizon)
}

/// Row range of the last `horizon` predictions.
pub fn future_segment(result: &ForecastResult, horizon: usize) -> crate::Result<std::ops::Range<usize>> {
    if result.len() < horizon {
        return Err(PipelineError::Unexpected(format!(
            "forecast has {} rows, fewer than the {} day horizon",
            result.len(),
            horizon
        )));
    }
    Ok(result.len() - horizon..result.len())
}

/// Render the future segment as `ds,yhat,yhat_lower,yhat_upper` CSV.
pub fn to_artifact(result: &ForecastResult, horizon: usize) -> crate::Result<ForecastArtifact> {
    let range = future_segment(result, horizon)?;
    let ds = format_ds(&result.ds[range.clone()]);

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(OUTPUT_HEADER)?;
    for (i, ds) in range.zip(&ds) {
        writer.serialize(OutputRow {
            ds,
            yhat: result.yhat[i],
            yhat_lower: result.yhat_lower[i],
            yhat_upper: result.yhat_upper[i],
        })?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| PipelineError::Unexpected(e.to_string()))?;

    Ok(ForecastArtifact {
        file_name: file_name(horizon),
        bytes,
    })
}
