use crate::archive::{HistoricalArchives, HttpArchiveDownloader, HttpListingSource};
use crate::cli::args::{Cli, Commands};
use crate::config::Settings;
use crate::error::{Result as SyncResult, SyncError};
use crate::session::{DownloadDir, RemoteTableSession, WebDriverClient};
use crate::sync::{RefreshReport, StatusReport, SyncEngine};
use crate::utils::init_logging;
use crate::utils::progress::{ChannelSink, ProgressReporter, ProgressSink};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Run the selected command on a worker task while the main task renders
/// its progress.
pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref()).context("failed to initialise logging")?;
    let settings = Settings::load(cli.config.as_deref()).context("failed to load configuration")?;

    let (sink, receiver) = ChannelSink::new();
    let reporter = ProgressReporter::new(cli.quiet);
    let worker = tokio::spawn(execute(cli.command, settings, Arc::new(sink)));

    reporter.run(receiver).await;
    worker.await.context("worker task failed")?
}

async fn execute(command: Commands, settings: Settings, sink: Arc<dyn ProgressSink>) -> Result<()> {
    let mut engine = SyncEngine::new(settings, sink).context("failed to prepare working folders")?;
    info!(command = ?command, app_dir = %engine.settings().app_dir().display(), "starting");

    match command {
        Commands::Bootstrap => {
            let (listing, downloader) = portal_clients(engine.settings())?;
            let report = engine
                .bootstrap(&listing, &downloader)
                .await
                .context("historical bootstrap failed")?;
            engine.sink().log(&format!(
                "{} archives downloaded, {} already present.",
                report.downloaded.len(),
                report.skipped.len()
            ));
        }

        Commands::Refresh { stations } => {
            let mut session = open_session(engine.settings())
                .await
                .context("failed to start the browser session")?;
            let report = engine.refresh(&mut session, &stations).await;
            close_session(&session).await;
            summarize_refresh(engine.sink(), &report);
        }

        Commands::Sync => {
            let (listing, downloader) = portal_clients(engine.settings())?;
            let (bootstrap, refresh) = engine
                .bootstrap_then(&listing, &downloader, |engine| {
                    Box::pin(async move {
                        let mut session = open_session(engine.settings()).await?;
                        let report = engine.refresh(&mut session, &[]).await;
                        close_session(&session).await;
                        Ok::<_, SyncError>(report)
                    })
                })
                .await;

            match refresh {
                Ok(report) => summarize_refresh(engine.sink(), &report),
                Err(e) => engine
                    .sink()
                    .log_error(&format!("Refresh skipped: {}", e)),
            }
            bootstrap.context("historical bootstrap failed")?;
        }

        Commands::Onboard { station } => {
            engine
                .onboard(&station)
                .with_context(|| format!("failed to onboard station {}", station))?;
        }

        Commands::Status => {
            for line in format_status(&engine.status()) {
                engine.sink().log(&line);
            }
        }

        Commands::Discover => {
            let (listing, _) = portal_clients(engine.settings())?;
            let result = engine.discover(&listing).await.context("archive discovery failed")?;
            let historical = engine.settings().historical_dir();
            let missing = result.missing_in(&historical);

            let sink = engine.sink();
            for entry in &result.entries {
                let present = !missing.iter().any(|m| m.filename == entry.filename);
                sink.log(&format!(
                    "{:<12} {:<40} {}",
                    entry.filename,
                    entry.period.label,
                    if present { "downloaded" } else { "missing" }
                ));
            }
            sink.log(&format!(
                "{} archives listed, {} missing. Newest: {}, stored marker: {}.",
                result.entries.len(),
                missing.len(),
                display_marker(result.newest),
                display_marker(result.known)
            ));

            let keys = HistoricalArchives::from_directory(&historical)?.station_keys();
            if !keys.is_empty() {
                sink.log(&format!(
                    "{} stations available for onboarding in downloaded archives.",
                    keys.len()
                ));
            }
        }
    }

    Ok(())
}

fn portal_clients(settings: &Settings) -> SyncResult<(HttpListingSource, HttpArchiveDownloader)> {
    Ok((
        HttpListingSource::from_config(&settings.portal)?,
        HttpArchiveDownloader::from_config(&settings.portal)?,
    ))
}

async fn open_session(settings: &Settings) -> SyncResult<RemoteTableSession> {
    let downloads = DownloadDir::new(&settings.temp_dir())?;
    let driver = WebDriverClient::connect(
        &settings.session,
        &settings.portal.user_agent,
        downloads.path(),
        settings.request_timeout(),
    )
    .await?;
    Ok(RemoteTableSession::new(Box::new(driver), settings, downloads))
}

async fn close_session(session: &RemoteTableSession) {
    if let Err(e) = session.close().await {
        warn!(error = %e, "browser session did not close cleanly");
    }
}

fn summarize_refresh(sink: &dyn ProgressSink, report: &RefreshReport) {
    sink.log(&format!(
        "{} stations updated, {} already up to date, {} failed.",
        report.updated.len(),
        report.up_to_date.len(),
        report.failed.len()
    ));
    for (station, reason) in &report.failed {
        sink.log_error(&format!("{}: {}", station, reason));
    }
}

fn display_marker(marker: Option<crate::models::ArchiveMarker>) -> String {
    marker
        .map(|m| m.to_string())
        .unwrap_or_else(|| "none".to_string())
}

fn format_status(status: &StatusReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Archive marker: {}",
        display_marker(status.last_archive_marker)
    )];

    if status.stations.is_empty() {
        lines.push("No stations onboarded.".to_string());
        return lines;
    }

    lines.push(format!(
        "{:<8} {:<12} {:<12} {:<12} {:>8}",
        "Station", "Updated", "Onboarded", "Series end", "Rows"
    ));
    for station in &status.stations {
        let day = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
        lines.push(format!(
            "{:<8} {:<12} {:<12} {:<12} {:>8}",
            station.station,
            day(station.meta.last_updated),
            day(station.meta.onboarded_at),
            day(station.series_end),
            station
                .records
                .map(|n| n.to_string())
                .unwrap_or_else(|| "missing".to_string())
        ));
    }
    lines
}
