//! # prevision
//!
//! Command-line host: forecast the next 30 days of sales from a CSV file.

use clap::Parser;
use prevision::{
    FileSource, ForecastOutput, Pipeline, PipelineConfig, PipelineError, ResultSink,
    Stage,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "prevision")]
#[command(about = "Forecast 30 days of sales from a date,sales CSV", long_about = None)]
struct Cli {
    /// Input CSV file with a header row
    input: PathBuf,

    /// Directory the forecast file is written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// JSON config (aliases, interval_width, uncertainty_samples)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print errors as a JSON report on stdout
    #[arg(long)]
    json: bool,
}

/// Writes the artifact into a directory and reports errors on the terminal.
struct DirectorySink {
    dir: PathBuf,
    json: bool,
}

impl ResultSink for DirectorySink {
    fn on_success(&mut self, output: &ForecastOutput) -> prevision::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(&output.artifact.file_name);
        std::fs::write(&path, &output.artifact.bytes)?;
        println!("{}", path.display());
        Ok(())
    }

    fn on_error(&mut self, error: &PipelineError) -> prevision::Result<()> {
        let report = error.report();
        if self.json {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| PipelineError::Unexpected(e.to_string()))?;
            println!("{}", json);
        } else {
            eprintln!("{:?}: {}", report.kind, report.message);
            if let Some(example) = &report.example {
                eprintln!("\nExample of a valid file:\n{}", example);
            }
        }
        Ok(())
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prevision=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_path(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::from(2);
            }
        },
        None => PipelineConfig::default(),
    };
    let pipeline = match Pipeline::new(&config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    let mut source = FileSource::new(&cli.input);
    let mut sink = DirectorySink {
        dir: cli.output_dir,
        json: cli.json,
    };
    match pipeline.serve(&mut source, &mut sink) {
        Ok(report) if report.final_stage() == Stage::Formatted => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("failed to write output: {}", e);
            ExitCode::FAILURE
        }
    }
}
