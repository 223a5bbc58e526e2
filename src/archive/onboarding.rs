use crate::error::{Result, SyncError};
use crate::models::{StationSeries, SyncState};
use crate::processors::SchemaNormalizer;
use crate::readers::ArchiveReader;
use crate::utils::progress::ProgressSink;
use crate::writers::SeriesWriter;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// The bulk archives downloaded so far, in filename order.
#[derive(Debug, Clone)]
pub struct HistoricalArchives {
    archives: Vec<PathBuf>,
}

impl HistoricalArchives {
    /// Scan `dir` for zip files. A missing directory holds no archives.
    pub fn from_directory(dir: &Path) -> Result<Self> {
        if !dir.exists() {
            return Ok(Self {
                archives: Vec::new(),
            });
        }
        if !dir.is_dir() {
            return Err(SyncError::InvalidFormat(format!(
                "Path is not a directory: {}",
                dir.display()
            )));
        }

        let mut archives = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_zip = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
            if path.is_file() && is_zip {
                archives.push(path);
            }
        }
        archives.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        Ok(Self { archives })
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.archives
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    /// Every station key found in any archive. Unreadable archives are skipped.
    pub fn station_keys(&self) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        for path in &self.archives {
            match ArchiveReader::new(path).station_keys() {
                Ok(found) => keys.extend(found),
                Err(e) => warn!(archive = %path.display(), error = %e, "cannot list archive"),
            }
        }
        keys
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardSummary {
    pub station: String,
    pub archives_read: usize,
    pub records: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// Builds a station's series from the bulk archives and registers it for
/// incremental refresh.
pub struct StationOnboarder<'a> {
    normalizer: &'a SchemaNormalizer,
    writer: SeriesWriter,
}

impl<'a> StationOnboarder<'a> {
    pub fn new(normalizer: &'a SchemaNormalizer) -> Self {
        Self {
            normalizer,
            writer: SeriesWriter::new(),
        }
    }

    pub fn onboard(
        &self,
        station: &str,
        archives: &HistoricalArchives,
        series_dir: &Path,
        state: &mut SyncState,
        today: NaiveDate,
        sink: &dyn ProgressSink,
    ) -> Result<OnboardSummary> {
        let station = station.trim().to_uppercase();
        sink.clear();
        sink.overall_range(archives.paths().len() as u64);
        sink.overall_label(&format!("Onboarding station {}...", station));

        let mut records = Vec::new();
        let mut archives_read = 0;

        for (index, path) in archives.paths().iter().enumerate() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            sink.item_label(&name);

            let tables = ArchiveReader::new(path).read_station(&station)?;
            if !tables.is_empty() {
                archives_read += 1;
            }
            for table in &tables {
                records.extend(self.normalizer.normalize_archive_table(table)?);
            }
            sink.overall_value(index as u64 + 1);
        }

        if records.is_empty() {
            return Err(SyncError::StationNotFound(station));
        }

        // Stable sort keeps source order for equal timestamps.
        records.sort_by_key(|r| r.timestamp());

        let path = StationSeries::path_for(series_dir, &station);
        let series = StationSeries::new(&station, &path, records);
        self.writer.write_series(&series)?;

        let last_date = series.last_date().ok_or_else(|| SyncError::EmptySeries(path.clone()))?;
        state.register_station(&station, last_date, today);

        info!(
            station = %station,
            archives = archives_read,
            records = series.len(),
            last = %last_date,
            "station onboarded"
        );

        Ok(OnboardSummary {
            station,
            archives_read,
            records: series.len(),
            first_date: series.first_date(),
            last_date: Some(last_date),
        })
    }
}
