use crate::core::columns::Canonical;
use crate::PipelineError;
use tracing::warn;

/// Fixed reference table shown to the user when the schema check fails.
#[derive(Debug, PartialEq, Eq)]
pub struct SchemaExample {
    pub headers: [&'static str; 2],
    pub rows: [[&'static str; 2]; 2],
}

pub static EXAMPLE_TABLE: SchemaExample = SchemaExample {
    headers: ["date", "sales"],
    rows: [["2023-01-01", "120"], ["2023-01-02", "135"]],
};

impl SchemaExample {
    pub fn to_csv(&self) -> String {
        let mut out = self.headers.join(",");
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.join(","));
            out.push('\n');
        }
        out
    }
}

/// Positions of the canonical columns in a normalized header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaColumns {
    pub date: usize,
    pub sales: usize,
}

/// Succeeds iff both `date` and `sales` appear among `columns`. Extra columns are ignored.
pub fn validate(columns: &[String]) -> crate::Result<SchemaColumns> {
    let position = |canonical: Canonical| {
        let mut matches = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.as_str() == canonical.as_str())
            .map(|(i, _)| i);
        let first = matches.next();
        if first.is_some() && matches.next().is_some() {
            warn!(column = %canonical, "column appears more than once, using the first one");
        }
        first
    };

    match (position(Canonical::Date), position(Canonical::Sales)) {
        (Some(date), Some(sales)) => Ok(SchemaColumns { date, sales }),
        (date, sales) => {
            let mut missing = Vec::new();
            if date.is_none() {
                missing.push(Canonical::Date.to_string());
            }
            if sales.is_none() {
                missing.push(Canonical::Sales.to_string());
            }
            Err(PipelineError::Schema {
                required: Canonical::ALL.iter().map(|c| c.to_string()).collect(),
                missing,
                example: &EXAMPLE_TABLE,
            })
        }
    }
}
