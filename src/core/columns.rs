use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// The two semantic roles the pipeline works with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Canonical {
    Date,
    Sales,
}

impl Canonical {
    pub const ALL: [Canonical; 2] = [Canonical::Date, Canonical::Sales];

    pub fn as_str(self) -> &'static str {
        match self {
            Canonical::Date => "date",
            Canonical::Sales => "sales",
        }
    }
}

impl fmt::Display for Canonical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const BUILTIN_ALIASES: [(&str, Canonical); 6] = [
    ("Date", Canonical::Date),
    ("DATE", Canonical::Date),
    ("Ventes", Canonical::Sales),
    ("ventes", Canonical::Sales),
    ("total", Canonical::Sales),
    ("Total", Canonical::Sales),
];

static BUILTIN: OnceLock<ColumnAliases> = OnceLock::new();

/// Many-to-one mapping from header spellings to canonical column names.
///
/// Lookups are exact: only the spellings listed in the table are recognized,
/// everything else passes through normalization untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnAliases {
    map: BTreeMap<String, Canonical>,
}

impl ColumnAliases {
    pub fn new(map: BTreeMap<String, Canonical>) -> Self {
        Self { map }
    }

    /// Process-wide built-in table, initialized on first use and never mutated.
    pub fn builtin() -> &'static ColumnAliases {
        BUILTIN.get_or_init(|| {
            ColumnAliases::new(
                BUILTIN_ALIASES
                    .iter()
                    .map(|(label, canonical)| (label.to_string(), *canonical))
                    .collect(),
            )
        })
    }

    pub fn canonical_for(&self, label: &str) -> Option<Canonical> {
        self.map.get(label).copied()
    }

    /// Replace every recognized label by its canonical name, keeping order.
    pub fn normalize(&self, labels: &[String]) -> Vec<String> {
        labels
            .iter()
            .map(|label| match self.canonical_for(label) {
                Some(canonical) => canonical.as_str().to_string(),
                None => label.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self::builtin().clone()
    }
}
