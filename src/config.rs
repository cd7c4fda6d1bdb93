//! Pipeline settings loaded from JSON.
//!
//! ```json
//! { "aliases": { "Umsatz": "sales", "Datum": "date" }, "interval_width": 0.9 }
//! ```

use crate::core::columns::{Canonical, ColumnAliases};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("alias '{label}' maps to '{target}', expected one of: date, sales")]
    InvalidAlias { label: String, target: String },

    #[error("interval_width must be within [0, 1], got {0}")]
    InvalidIntervalWidth(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Replaces the built-in header alias table when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aliases: Option<BTreeMap<String, String>>,
    pub interval_width: f64,
    pub uncertainty_samples: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            aliases: None,
            interval_width: 0.8,
            uncertainty_samples: 1000,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.interval_width) {
            return Err(ConfigError::InvalidIntervalWidth(self.interval_width));
        }
        self.aliases().map(|_| ())
    }

    /// The alias table in effect: the configured one, or the built-in table.
    pub fn aliases(&self) -> Result<ColumnAliases, ConfigError> {
        let Some(raw) = &self.aliases else {
            return Ok(ColumnAliases::builtin().clone());
        };
        raw.iter()
            .map(|(label, target)| {
                let canonical = Canonical::ALL
                    .into_iter()
                    .find(|c| c.as_str() == target.as_str())
                    .ok_or_else(|| ConfigError::InvalidAlias {
                        label: label.clone(),
                        target: target.clone(),
                    })?;
                Ok((label.clone(), canonical))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()
            .map(ColumnAliases::new)
    }
}
