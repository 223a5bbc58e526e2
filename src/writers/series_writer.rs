use crate::error::{Result, SyncError};
use crate::models::{CanonicalField, StationSeries};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Writes a station series as CSV with the canonical header order.
pub struct SeriesWriter;

impl SeriesWriter {
    pub fn new() -> Self {
        Self
    }

    /// Rewrites `series.path`; the previous file is replaced only once the
    /// new one is complete.
    pub fn write_series(&self, series: &StationSeries) -> Result<()> {
        let dir = series
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(tmp.as_file());
            writer.write_record(CanonicalField::ALL.iter().map(|f| f.header()))?;
            for record in &series.records {
                writer.write_record(record.to_cells())?;
            }
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&series.path).map_err(|e| SyncError::Io(e.error))?;

        debug!(
            station = %series.station,
            path = %series.path.display(),
            records = series.len(),
            "station series written"
        );
        Ok(())
    }
}

impl Default for SeriesWriter {
    fn default() -> Self {
        Self::new()
    }
}
