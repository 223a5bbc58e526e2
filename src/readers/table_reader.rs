use crate::error::Result;
use crate::models::RawTable;
use crate::readers::{decode_text, parse_delimited};
use std::path::Path;
use tracing::debug;

/// Reads the CSV export produced by the station table tool.
pub struct TableReader {
    delimiter: u8,
}

impl TableReader {
    pub fn new() -> Self {
        Self { delimiter: b';' }
    }

    pub fn with_delimiter(delimiter: u8) -> Self {
        Self { delimiter }
    }

    pub fn read_table(&self, path: &Path) -> Result<RawTable> {
        let bytes = std::fs::read(path)?;
        let table = self.parse_bytes(&bytes)?;
        debug!(
            path = %path.display(),
            rows = table.len(),
            columns = table.headers.len(),
            "read exported table"
        );
        Ok(table)
    }

    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<RawTable> {
        parse_delimited(&decode_text(bytes), self.delimiter)
    }
}

impl Default for TableReader {
    fn default() -> Self {
        Self::new()
    }
}
