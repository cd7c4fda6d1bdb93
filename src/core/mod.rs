pub mod columns;
pub mod data;
pub mod dates;
pub mod format;
pub mod model;
pub mod objective; // posterior + autodiff gradient
pub mod optimizer; // LBFGS via argmin-rs
pub mod schema;
pub mod seasonality;
pub mod table;
pub mod trend;
pub mod uncertainty;

pub use columns::{Canonical, ColumnAliases};
pub use data::{CleanedSeries, ForecastResult, ForecastRow, TimeSeriesData};
pub use format::ForecastArtifact;
pub use model::Forecaster;
pub use schema::{SchemaColumns, SchemaExample};
pub use table::RawTable;
