use crate::models::{CanonicalField, CanonicalRecord};

/// A delimited file as read from disk, before any column mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Canonical-header table holding `records`, the inverse of normalization.
    pub fn from_records(records: &[CanonicalRecord]) -> Self {
        Self {
            headers: CanonicalField::ALL
                .iter()
                .map(|f| f.header().to_string())
                .collect(),
            rows: records.iter().map(CanonicalRecord::to_cells).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
