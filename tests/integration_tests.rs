mod common;

use common::*;
use pretty_assertions::assert_eq;
use station_sync::config::Settings;
use station_sync::models::{ArchiveMarker, StateStore, StationSeries, SyncState};
use station_sync::readers::SeriesReader;
use station_sync::session::{DownloadDir, RemoteTableSession, SessionTimings};
use station_sync::sync::SyncEngine;
use station_sync::utils::progress::{ProgressEvent, RecordingSink};
use station_sync::SyncError;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn fast_timings() -> SessionTimings {
    SessionTimings {
        wait_timeout: Duration::from_millis(150),
        poll_interval: Duration::from_millis(10),
        settle_delay: Duration::ZERO,
    }
}

fn session_with(settings: &Settings, build: impl FnOnce(ScriptedBrowser) -> ScriptedBrowser) -> RemoteTableSession {
    let downloads = DownloadDir::new(&settings.temp_dir()).unwrap();
    let browser = build(ScriptedBrowser::new(downloads.path()));
    RemoteTableSession::new(Box::new(browser), settings, downloads).with_timings(fast_timings())
}

#[tokio::test]
async fn test_refresh_fills_gap_up_to_yesterday() {
    let temp = TempDir::new().unwrap();
    let settings = Settings::with_app_dir(temp.path());
    seed_station(&settings, "A001", day(2024, 4, 28), day(2024, 5, 1));

    let sink = Arc::new(RecordingSink::new());
    let mut engine = SyncEngine::new(settings.clone(), sink.clone())
        .unwrap()
        .with_today(day(2024, 5, 5));
    let mut session = session_with(&settings, |b| {
        b.serve(
            "A001",
            &[
                "05/02/2024;0000;21,5;22,0;80;887,5;;0",
                "05/03/2024;0000;20,8;21,2;84;888,0;;0,2",
            ],
        )
    });

    let report = engine.refresh(&mut session, &[]).await;
    assert_eq!(report.updated, vec!["A001".to_string()]);
    assert!(report.failed.is_empty());

    let series = SeriesReader::new()
        .read_series("A001", &StationSeries::path_for(&settings.series_dir(), "A001"))
        .unwrap();
    assert_eq!(series.last_date(), Some(day(2024, 5, 3)));
    assert_eq!(series.len(), 8 + 2);
    assert_eq!(series.records[8].date, day(2024, 5, 2));
    assert!(series.is_ordered());

    let last = series.records.last().unwrap();
    assert_eq!(last.rain.as_deref(), Some("0.2"));
    assert_eq!(last.temperature.as_deref(), Some("20.8"));
    assert_eq!(last.radiation, None);

    let state = load_state(&settings);
    assert_eq!(state.station("A001").unwrap().last_updated, Some(day(2024, 5, 4)));
    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, ProgressEvent::ProcessingFinished)));
}

#[tokio::test]
async fn test_live_days_past_the_twelfth_are_accepted() {
    let temp = TempDir::new().unwrap();
    let settings = Settings::with_app_dir(temp.path());
    seed_station(&settings, "A001", day(2024, 5, 9), day(2024, 5, 10));

    let mut engine = SyncEngine::new(settings.clone(), Arc::new(RecordingSink::new()))
        .unwrap()
        .with_today(day(2024, 5, 15));
    let mut session = session_with(&settings, |b| {
        b.serve(
            "A001",
            &[
                "05/11/2024;0000;21,5;22,0;80;887,5;;0",
                "05/13/2024;1200;27,1;27,9;55;886,9;2500,3;0",
            ],
        )
    });

    let report = engine.refresh(&mut session, &[]).await;
    assert_eq!(report.updated, vec!["A001".to_string()]);
    assert_eq!(engine.status().stations[0].series_end, Some(day(2024, 5, 13)));
    assert_eq!(
        load_state(&settings).station("A001").unwrap().last_updated,
        Some(day(2024, 5, 14))
    );
}

#[tokio::test]
async fn test_missing_download_link_fails_only_that_station() {
    let temp = TempDir::new().unwrap();
    let settings = Settings::with_app_dir(temp.path());
    seed_station(&settings, "A001", day(2024, 4, 28), day(2024, 5, 1));
    seed_station(&settings, "A002", day(2024, 4, 28), day(2024, 5, 1));

    let sink = Arc::new(RecordingSink::new());
    let mut engine = SyncEngine::new(settings.clone(), sink.clone())
        .unwrap()
        .with_today(day(2024, 5, 5));
    let mut session = session_with(&settings, |b| {
        b.without_link("A001")
            .serve("A002", &["05/02/2024;0000;21,5;22,0;80;887,5;;0"])
    });

    let report = engine.refresh(&mut session, &[]).await;
    assert_eq!(report.updated, vec!["A002".to_string()]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "A001");
    assert_eq!(report.succeeded(), vec!["A002".to_string()]);

    let state = load_state(&settings);
    assert_eq!(state.station("A001").unwrap().last_updated, Some(day(2024, 5, 1)));
    assert_eq!(state.station("A002").unwrap().last_updated, Some(day(2024, 5, 4)));
    assert!(sink.error_logs().iter().any(|line| line.contains("A001")));
}

#[tokio::test]
async fn test_current_station_counts_as_success() {
    let temp = TempDir::new().unwrap();
    let settings = Settings::with_app_dir(temp.path());
    seed_station(&settings, "A003", day(2024, 5, 1), day(2024, 5, 3));

    let mut engine = SyncEngine::new(settings.clone(), Arc::new(RecordingSink::new()))
        .unwrap()
        .with_today(day(2024, 5, 5));
    let mut session = session_with(&settings, |b| b);

    let report = engine.refresh(&mut session, &["a003".to_string()]).await;
    assert_eq!(report.up_to_date, vec!["A003".to_string()]);
    assert_eq!(report.succeeded(), vec!["A003".to_string()]);

    let state = load_state(&settings);
    assert_eq!(state.station("A003").unwrap().last_updated, Some(day(2024, 5, 3)));
}

#[tokio::test]
async fn test_unregistered_station_is_reported_as_failed() {
    let temp = TempDir::new().unwrap();
    let settings = Settings::with_app_dir(temp.path());

    let mut engine = SyncEngine::new(settings.clone(), Arc::new(RecordingSink::new()))
        .unwrap()
        .with_today(day(2024, 5, 5));
    let mut session = session_with(&settings, |b| b);

    let report = engine.refresh(&mut session, &["Z999".to_string()]).await;
    assert!(report.succeeded().is_empty());
    assert_eq!(report.failed[0].0, "Z999");
}

#[tokio::test]
async fn test_bootstrap_skips_existing_archives() {
    let temp = TempDir::new().unwrap();
    let settings = Settings::with_app_dir(temp.path());
    std::fs::create_dir_all(settings.historical_dir()).unwrap();
    std::fs::write(settings.historical_dir().join("2022.zip"), b"PK").unwrap();

    let mut engine = SyncEngine::new(settings.clone(), Arc::new(RecordingSink::new())).unwrap();
    let listing = StaticListing::with_years(&[2022, 2023, 2024]);
    let downloader = FakeDownloader::default();

    let report = engine.bootstrap(&listing, &downloader).await.unwrap();
    assert_eq!(report.skipped, vec!["2022.zip".to_string()]);
    assert_eq!(report.downloaded, vec!["2023.zip".to_string(), "2024.zip".to_string()]);
    assert_eq!(downloader.requested(), vec!["2023.zip".to_string(), "2024.zip".to_string()]);

    assert_eq!(load_state(&settings).last_archive_marker, Some(ArchiveMarker(2024)));
    assert!(settings.historical_dir().join("2024.zip").exists());
}

#[tokio::test]
async fn test_unreachable_listing_fails_bootstrap_and_keeps_marker() {
    let temp = TempDir::new().unwrap();
    let settings = Settings::with_app_dir(temp.path());
    let store = StateStore::new(settings.state_file());
    std::fs::create_dir_all(settings.app_dir()).unwrap();
    store
        .save(&SyncState {
            last_archive_marker: Some(ArchiveMarker(2022)),
            ..Default::default()
        })
        .unwrap();

    let sink = Arc::new(RecordingSink::new());
    let mut engine = SyncEngine::new(settings.clone(), sink.clone()).unwrap();
    let downloader = FakeDownloader::default();

    let err = engine.bootstrap(&UnreachableListing, &downloader).await.unwrap_err();

    assert!(matches!(err, SyncError::InvalidFormat(_)));
    assert!(downloader.requested().is_empty());
    assert_eq!(load_state(&settings).last_archive_marker, Some(ArchiveMarker(2022)));
    assert_eq!(engine.state().last_archive_marker, Some(ArchiveMarker(2022)));
    assert_eq!(sink.error_logs().len(), 1);
    assert_eq!(sink.events().last(), Some(&ProgressEvent::ProcessingFinished));
}

#[tokio::test]
async fn test_aborted_bootstrap_keeps_marker_and_runs_continuation() {
    let temp = TempDir::new().unwrap();
    let settings = Settings::with_app_dir(temp.path());

    let sink = Arc::new(RecordingSink::new());
    let mut engine = SyncEngine::new(settings.clone(), sink.clone()).unwrap();
    let listing = StaticListing::with_years(&[2023, 2024]);
    let downloader = FakeDownloader::failing_on("2024.zip");

    let (bootstrap, ran_after) = engine
        .bootstrap_then(&listing, &downloader, |engine| {
            Box::pin(async move { engine.state().last_archive_marker })
        })
        .await;

    assert!(matches!(bootstrap, Err(SyncError::DownloadFailure { ref filename, .. }) if filename == "2024.zip"));
    assert_eq!(ran_after, None);
    assert_eq!(load_state(&settings).last_archive_marker, None);
    assert!(settings.historical_dir().join("2023.zip").exists());
    assert!(!settings.historical_dir().join("2024.zip").exists());
    assert!(!sink.error_logs().is_empty());
}

#[tokio::test]
async fn test_onboard_then_refresh() {
    let temp = TempDir::new().unwrap();
    let settings = Settings::with_app_dir(temp.path());
    std::fs::create_dir_all(settings.historical_dir()).unwrap();
    write_bulk_archive(
        &settings.historical_dir().join("2024.zip"),
        2024,
        &[
            (
                "A001",
                &[
                    "2024/04/30;0000 UTC;0;887,7;;21,4;78;",
                    "2024/05/01;0000 UTC;0;888,1;;20,9;81;",
                    "2024/05/01;1200 UTC;1,2;887,0;2100;26,3;60;",
                ],
            ),
            ("A002", &["2024/05/01;0000 UTC;0;900,0;;18,0;90;"]),
        ],
    );

    let mut engine = SyncEngine::new(settings.clone(), Arc::new(RecordingSink::new()))
        .unwrap()
        .with_today(day(2024, 5, 5));

    let summary = engine.onboard("a001").unwrap();
    assert_eq!(summary.station, "A001");
    assert_eq!(summary.records, 3);
    assert_eq!(summary.last_date, Some(day(2024, 5, 1)));
    assert_eq!(
        engine.state().station("A001").unwrap().onboarded_at,
        Some(day(2024, 5, 5))
    );

    let status = engine.status();
    assert_eq!(status.stations.len(), 1);
    assert_eq!(status.stations[0].records, Some(3));
    assert_eq!(status.stations[0].series_end, Some(day(2024, 5, 1)));

    let mut session = session_with(&settings, |b| {
        b.serve("A001", &["05/02/2024;0000;21,5;22,0;80;887,5;;0"])
    });
    let report = engine.refresh(&mut session, &[]).await;
    assert_eq!(report.updated, vec!["A001".to_string()]);
    assert_eq!(engine.status().stations[0].records, Some(4));
}

#[tokio::test]
async fn test_onboard_unknown_station_fails() {
    let temp = TempDir::new().unwrap();
    let settings = Settings::with_app_dir(temp.path());
    std::fs::create_dir_all(settings.historical_dir()).unwrap();
    write_bulk_archive(
        &settings.historical_dir().join("2024.zip"),
        2024,
        &[("A002", &["2024/05/01;0000 UTC;0;900,0;;18,0;90;"])],
    );

    let mut engine = SyncEngine::new(settings, Arc::new(RecordingSink::new())).unwrap();
    let err = engine.onboard("A001").unwrap_err();
    assert!(matches!(err, SyncError::StationNotFound(ref s) if s == "A001"));
    assert!(engine.state().station("A001").is_none());
}

#[tokio::test]
async fn test_onboard_without_archives_asks_for_bootstrap() {
    let temp = TempDir::new().unwrap();
    let settings = Settings::with_app_dir(temp.path());

    let sink = Arc::new(RecordingSink::new());
    let mut engine = SyncEngine::new(settings.clone(), sink.clone()).unwrap();
    let err = engine.onboard("A001").unwrap_err();

    assert!(matches!(err, SyncError::NoArchives(ref dir) if *dir == settings.historical_dir()));
    assert!(sink.error_logs()[0].contains("Run the bootstrap first"));
    assert_eq!(sink.events().last(), Some(&ProgressEvent::ProcessingFinished));
}
