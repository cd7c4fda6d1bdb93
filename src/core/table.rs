use crate::PipelineError;
use csv::ReaderBuilder;

/// Header row plus string cells, exactly as read from the uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> crate::Result<Self> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != headers.len()) {
            return Err(PipelineError::Unexpected(format!(
                "row {} has {} fields, expected {}",
                i + 1,
                row.len(),
                headers.len()
            )));
        }
        Ok(Self { headers, rows })
    }

    /// Parse comma-separated bytes with a mandatory header row.
    pub fn from_csv_bytes(bytes: &[u8]) -> crate::Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(b',')
            .from_reader(bytes);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(PipelineError::Unexpected(
                "no columns to parse from file".to_string(),
            ));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Self::new(headers, rows)
    }

    pub fn with_headers(self, headers: Vec<String>) -> crate::Result<Self> {
        Self::new(headers, self.rows)
    }

    pub fn column(&self, idx: usize) -> Vec<String> {
        self.rows.iter().map(|r| r[idx].clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
