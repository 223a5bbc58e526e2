use crate::archive::{
    ArchiveDiscovery, ArchiveDownloader, DiscoveryResult, FetchPolicy, FetchReport,
    HistoricalArchives, ListingSource, OnboardSummary, SerialArchiveFetcher, StationOnboarder,
};
use crate::config::Settings;
use crate::error::{Result, SyncError};
use crate::models::{ArchiveMarker, StateStore, StationMeta, StationSeries, SyncState};
use crate::processors::{compute_gap, yesterday, DataMerger, GapDecision, MergeSummary, SchemaNormalizer};
use crate::readers::SeriesReader;
use crate::session::RemoteTableSession;
use crate::utils::progress::ProgressSink;
use chrono::{Local, NaiveDate};
use futures::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Result of refreshing one station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationOutcome {
    Updated(MergeSummary),
    UpToDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub updated: Vec<String>,
    pub up_to_date: Vec<String>,
    /// Station key and the reason it failed.
    pub failed: Vec<(String, String)>,
}

impl RefreshReport {
    /// Stations that were updated or needed no update.
    pub fn succeeded(&self) -> Vec<String> {
        self.updated
            .iter()
            .chain(self.up_to_date.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationStatus {
    pub station: String,
    pub meta: StationMeta,
    pub records: Option<usize>,
    pub series_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub last_archive_marker: Option<ArchiveMarker>,
    pub stations: Vec<StationStatus>,
}

/// Owns the sync state and runs the bootstrap and refresh procedures.
pub struct SyncEngine {
    settings: Settings,
    store: StateStore,
    state: SyncState,
    sink: Arc<dyn ProgressSink>,
    normalizer: SchemaNormalizer,
    merger: DataMerger,
    series_reader: SeriesReader,
    today: Option<NaiveDate>,
}

impl SyncEngine {
    /// Creates the working folders and loads the persisted state.
    pub fn new(settings: Settings, sink: Arc<dyn ProgressSink>) -> Result<Self> {
        settings.ensure_dirs()?;
        let store = StateStore::new(settings.state_file());
        let state = store.load()?;
        let normalizer = SchemaNormalizer::new(settings.live_dictionary());

        Ok(Self {
            settings,
            store,
            state,
            sink,
            normalizer,
            merger: DataMerger::new(),
            series_reader: SeriesReader::new(),
            today: None,
        })
    }

    /// Pin the date used as "today".
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn sink(&self) -> &dyn ProgressSink {
        self.sink.as_ref()
    }

    pub async fn discover(&self, listing: &dyn ListingSource) -> Result<DiscoveryResult> {
        ArchiveDiscovery::from_config(&self.settings.portal)
            .discover(listing, &self.state)
            .await
    }

    /// Download every listed archive missing from the historical folder.
    pub async fn bootstrap(
        &mut self,
        listing: &dyn ListingSource,
        downloader: &dyn ArchiveDownloader,
    ) -> Result<FetchReport> {
        info!("starting historical bootstrap");

        let discovery = match self.discover(listing).await {
            Ok(discovery) => discovery,
            Err(e) => {
                error!(error = %e, "archive listing unavailable");
                self.sink
                    .log_error(&format!("Could not read the archive listing: {}", e));
                self.sink.processing_finished();
                return Err(e);
            }
        };
        if discovery.entries.is_empty() {
            self.sink.log("The archive listing has no entries.");
        } else if !discovery.has_newer {
            debug!(marker = ?discovery.known, "no archive newer than the stored marker");
        }

        let fetcher = SerialArchiveFetcher::new(&self.settings.historical_dir()).with_policy(
            FetchPolicy::Serial {
                pause_between: self.settings.pause_between(),
            },
        );
        let report = fetcher
            .fetch_all(
                &discovery.entries,
                discovery.newest,
                downloader,
                self.sink.as_ref(),
                &mut self.state,
                &self.store,
            )
            .await?;

        info!(
            downloaded = report.downloaded.len(),
            skipped = report.skipped.len(),
            marker = ?report.marker,
            "historical bootstrap finished"
        );
        Ok(report)
    }

    /// Bootstrap, then run `continuation` whether or not the bootstrap
    /// succeeded.
    pub async fn bootstrap_then<F, T>(
        &mut self,
        listing: &dyn ListingSource,
        downloader: &dyn ArchiveDownloader,
        continuation: F,
    ) -> (Result<FetchReport>, T)
    where
        F: for<'e> FnOnce(&'e mut SyncEngine) -> BoxFuture<'e, T> + Send,
    {
        let result = self.bootstrap(listing, downloader).await;
        let after = continuation(self).await;
        (result, after)
    }

    /// Bring each station up to yesterday. An empty `stations` means every
    /// onboarded station. Failures are per station; the loop always finishes.
    pub async fn refresh(
        &mut self,
        session: &mut RemoteTableSession,
        stations: &[String],
    ) -> RefreshReport {
        let targets: Vec<String> = if stations.is_empty() {
            self.state.station_keys()
        } else {
            stations.iter().map(|s| s.trim().to_uppercase()).collect()
        };

        let sink = Arc::clone(&self.sink);
        sink.clear();
        sink.overall_range(targets.len() as u64);
        sink.overall_label("Updating stations...");

        let mut report = RefreshReport::default();
        for (index, station) in targets.iter().enumerate() {
            sink.item_label(&format!("Updating station {}...", station));

            match self.refresh_station(session, station).await {
                Ok(StationOutcome::Updated(summary)) => {
                    sink.log(&format!(
                        "Station {} updated with {} new rows.",
                        station, summary.appended
                    ));
                    report.updated.push(station.clone());
                }
                Ok(StationOutcome::UpToDate) => {
                    sink.log(&format!("Station {} is already up to date.", station));
                    report.up_to_date.push(station.clone());
                }
                Err(e) => {
                    error!(station = %station, error = %e, "station refresh failed");
                    sink.log_error(&format!("Failed to update station {}: {}", station, e));
                    report.failed.push((station.clone(), e.to_string()));
                }
            }
            sink.overall_value(index as u64 + 1);
        }

        info!(
            updated = report.updated.len(),
            up_to_date = report.up_to_date.len(),
            failed = report.failed.len(),
            "refresh finished"
        );
        sink.processing_finished();
        report
    }

    #[instrument(skip(self, session))]
    async fn refresh_station(
        &mut self,
        session: &mut RemoteTableSession,
        station: &str,
    ) -> Result<StationOutcome> {
        if self.state.station(station).is_none() {
            return Err(SyncError::StationNotFound(station.to_string()));
        }

        let path = StationSeries::path_for(&self.settings.series_dir(), station);
        let mut series = self.series_reader.read_series(station, &path)?;
        let last = series
            .last_date()
            .ok_or_else(|| SyncError::EmptySeries(path.clone()))?;
        let today = self.today();

        let window = match compute_gap(last, today) {
            GapDecision::NoUpdateNeeded => {
                debug!(last = %last, "series is current");
                self.store.save(&self.state)?;
                return Ok(StationOutcome::UpToDate);
            }
            GapDecision::Window(window) => window,
        };

        debug!(window = %window, "requesting missing range");
        let table = match session.fetch(station, &window).await {
            Some(table) => table,
            None => {
                return Err(session
                    .last_failure()
                    .map(|failure| failure.to_error())
                    .unwrap_or_else(|| SyncError::SessionTimeout {
                        step: "table session".to_string(),
                    }))
            }
        };

        let records = self.normalizer.normalize_live_table(&table)?;
        let summary =
            self.merger
                .merge_and_persist(&mut series, records, &mut self.state, yesterday(today))?;
        self.store.save(&self.state)?;
        Ok(StationOutcome::Updated(summary))
    }

    /// Build a station's series from the downloaded bulk archives.
    pub fn onboard(&mut self, station: &str) -> Result<OnboardSummary> {
        let historical = self.settings.historical_dir();
        let archives = HistoricalArchives::from_directory(&historical)?;
        if archives.is_empty() {
            let err = SyncError::NoArchives(historical);
            self.sink.log_error(&err.to_string());
            self.sink.processing_finished();
            return Err(err);
        }

        let today = self.today();
        let series_dir = self.settings.series_dir();
        let result = StationOnboarder::new(&self.normalizer).onboard(
            station,
            &archives,
            &series_dir,
            &mut self.state,
            today,
            self.sink.as_ref(),
        );

        let outcome = result.and_then(|summary| {
            self.store.save(&self.state)?;
            Ok(summary)
        });
        match &outcome {
            Ok(summary) => self.sink.log(&format!(
                "Station {} onboarded with {} records.",
                summary.station, summary.records
            )),
            Err(e) => self
                .sink
                .log_error(&format!("Failed to onboard station {}: {}", station, e)),
        }
        self.sink.processing_finished();
        outcome
    }

    /// Snapshot of the stored marker and every onboarded station.
    pub fn status(&self) -> StatusReport {
        let series_dir = self.settings.series_dir();
        let stations = self
            .state
            .stations
            .iter()
            .map(|(key, meta)| {
                let series = self
                    .series_reader
                    .read_series(key, &StationSeries::path_for(&series_dir, key))
                    .ok();
                StationStatus {
                    station: key.clone(),
                    meta: meta.clone(),
                    records: series.as_ref().map(StationSeries::len),
                    series_end: series.as_ref().and_then(StationSeries::last_date),
                }
            })
            .collect();

        StatusReport {
            last_archive_marker: self.state.last_archive_marker,
            stations,
        }
    }
}
