use crate::error::{Result, SyncError};
use crate::models::{CanonicalRecord, StationSeries, SyncState};
use crate::writers::SeriesWriter;
use chrono::NaiveDate;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub station: String,
    pub appended: usize,
    pub total: usize,
    pub last_date: Option<NaiveDate>,
}

/// Appends freshly normalized records to a station's series.
///
/// Rows are never reordered or deduplicated: the gap window already starts
/// the day after the series' last date, so overlapping timestamps only appear
/// if the source itself returns them, and they are written as received.
pub struct DataMerger {
    writer: SeriesWriter,
}

impl DataMerger {
    pub fn new() -> Self {
        Self {
            writer: SeriesWriter::new(),
        }
    }

    /// Rejects a batch that is out of order or starts before the series ends.
    pub fn check_batch(&self, series: &StationSeries, incoming: &[CanonicalRecord]) -> Result<()> {
        let out_of_order = incoming
            .windows(2)
            .position(|pair| pair[0].timestamp() > pair[1].timestamp());
        if let Some(idx) = out_of_order {
            return Err(SyncError::Merge {
                station: series.station.clone(),
                reason: format!(
                    "incoming rows out of order at {} {}",
                    incoming[idx + 1].date,
                    incoming[idx + 1].hour
                ),
            });
        }

        if let (Some(last), Some(first)) = (series.records.last(), incoming.first()) {
            if first.date < last.date {
                return Err(SyncError::Merge {
                    station: series.station.clone(),
                    reason: format!(
                        "incoming rows start on {} but the series already ends on {}",
                        first.date, last.date
                    ),
                });
            }
        }

        Ok(())
    }

    /// Append `incoming` in memory, preserving the order of existing rows.
    pub fn merge(
        &self,
        series: &mut StationSeries,
        incoming: Vec<CanonicalRecord>,
    ) -> Result<MergeSummary> {
        self.check_batch(series, &incoming)?;
        let appended = incoming.len();
        series.records.extend(incoming);

        Ok(MergeSummary {
            station: series.station.clone(),
            appended,
            total: series.len(),
            last_date: series.last_date(),
        })
    }

    /// Merge, rewrite the series file and record `updated_through` as the
    /// station's last update. The in-memory series is restored if the write
    /// fails.
    pub fn merge_and_persist(
        &self,
        series: &mut StationSeries,
        incoming: Vec<CanonicalRecord>,
        state: &mut SyncState,
        updated_through: NaiveDate,
    ) -> Result<MergeSummary> {
        let previous_len = series.len();
        let summary = self.merge(series, incoming)?;

        if let Err(e) = self.writer.write_series(series) {
            series.records.truncate(previous_len);
            return Err(e);
        }
        state.mark_updated(&series.station, updated_through)?;

        info!(
            station = %summary.station,
            appended = summary.appended,
            total = summary.total,
            "station series merged"
        );
        Ok(summary)
    }
}

impl Default for DataMerger {
    fn default() -> Self {
        Self::new()
    }
}
