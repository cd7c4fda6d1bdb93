// Python bindings, built with the `python` feature.

use crate::{ErrorKind, Pipeline, PipelineConfig, PipelineError};
use pyo3::create_exception;
use pyo3::exceptions::PyException;
use pyo3::prelude::*;
use pyo3::types::PyBytes;

create_exception!(prevision, PrevisionError, PyException);
create_exception!(prevision, SchemaError, PrevisionError);
create_exception!(prevision, DateFormatError, PrevisionError);
create_exception!(prevision, ModelFitError, PrevisionError);
create_exception!(prevision, UnexpectedError, PrevisionError);

fn to_py_err(err: PipelineError) -> PyErr {
    let report = err.report();
    let message = match &report.example {
        Some(example) => format!("{}\n\nExample:\n{}", report.message, example),
        None => report.message,
    };
    match report.kind {
        ErrorKind::SchemaError => SchemaError::new_err(message),
        ErrorKind::DateFormatError => DateFormatError::new_err(message),
        ErrorKind::ModelFitError => ModelFitError::new_err(message),
        ErrorKind::UnexpectedError => UnexpectedError::new_err(message),
    }
}

/// Forecast the next 30 days from CSV bytes.
///
/// Returns `(file_name, csv_bytes)`. `config` is an optional JSON document
/// with `aliases`, `interval_width` and `uncertainty_samples`.
#[pyfunction]
#[pyo3(signature = (data, config=None))]
fn forecast_csv(py: Python<'_>, data: &[u8], config: Option<&str>) -> PyResult<(String, PyObject)> {
    let config = match config {
        Some(json) => PipelineConfig::from_json_str(json)
            .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))?,
        None => PipelineConfig::default(),
    };
    let pipeline = Pipeline::new(&config)
        .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))?;

    let output = py
        .allow_threads(|| pipeline.forecast(data))
        .map_err(to_py_err)?;
    let bytes = PyBytes::new(py, &output.artifact.bytes).into();
    Ok((output.artifact.file_name, bytes))
}

/// Python module definition
#[pymodule]
fn prevision(py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(forecast_csv, m)?)?;
    m.add("PrevisionError", py.get_type::<PrevisionError>())?;
    m.add("SchemaError", py.get_type::<SchemaError>())?;
    m.add("DateFormatError", py.get_type::<DateFormatError>())?;
    m.add("ModelFitError", py.get_type::<ModelFitError>())?;
    m.add("UnexpectedError", py.get_type::<UnexpectedError>())?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
