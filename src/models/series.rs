use crate::models::CanonicalRecord;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// The persisted record of one station, ordered by (Date, Hour).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationSeries {
    pub station: String,
    pub path: PathBuf,
    pub records: Vec<CanonicalRecord>,
}

impl StationSeries {
    pub fn new(station: &str, path: &Path, records: Vec<CanonicalRecord>) -> Self {
        Self {
            station: station.to_string(),
            path: path.to_path_buf(),
            records,
        }
    }

    /// Location of a station's series file inside `series_dir`.
    pub fn path_for(series_dir: &Path, station: &str) -> PathBuf {
        series_dir.join(format!("{}.csv", station))
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the records are in non-decreasing (Date, Hour) order.
    pub fn is_ordered(&self) -> bool {
        self.records
            .windows(2)
            .all(|pair| pair[0].timestamp() <= pair[1].timestamp())
    }
}
