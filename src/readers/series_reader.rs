use crate::error::{Result, SyncError};
use crate::models::{CanonicalRecord, StationSeries};
use std::path::Path;

/// Reads a persisted station series written by `SeriesWriter`.
pub struct SeriesReader;

impl SeriesReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read_series(&self, station: &str, path: &Path) -> Result<StationSeries> {
        if !path.exists() {
            return Err(SyncError::StationNotFound(station.to_string()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let records = reader
            .deserialize::<CanonicalRecord>()
            .collect::<std::result::Result<Vec<_>, csv::Error>>()?;

        Ok(StationSeries::new(station, path, records))
    }
}

impl Default for SeriesReader {
    fn default() -> Self {
        Self::new()
    }
}
