#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use station_sync::archive::{ArchiveDownloader, ListingPage, ListingSource};
use station_sync::config::{Locators, Settings};
use station_sync::models::{CanonicalField, CanonicalRecord, StateStore, StationSeries, SyncState};
use station_sync::session::{BrowserDriver, ElementHandle};
use station_sync::utils::progress::ProgressSink;
use station_sync::writers::SeriesWriter;
use station_sync::{Result, SyncError};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use url::Url;
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

pub const LIVE_HEADER: &str = "Data;Hora (UTC);Temp. Ins. (C);Temp. Max. (C);Umi. Ins. (%);Pressao Ins. (hPa);Radiacao (KJ/m²);Chuva (mm)";

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Listing page served from memory.
pub struct StaticListing {
    pub html: String,
}

impl StaticListing {
    pub fn with_years(years: &[i32]) -> Self {
        let articles: String = years
            .iter()
            .map(|y| {
                format!(
                    r#"<article class="post-preview"><a href="/uploads/dadoshistoricos/{y}.zip"><h2>ANO {y} (AUTOMÁTICA)</h2></a></article>"#
                )
            })
            .collect();
        Self {
            html: format!("<html><body>{}</body></html>", articles),
        }
    }
}

#[async_trait]
impl ListingSource for StaticListing {
    async fn fetch_listing(&self) -> Result<ListingPage> {
        Ok(ListingPage {
            url: Url::parse("https://portal.inmet.gov.br/dadoshistoricos").unwrap(),
            html: self.html.clone(),
        })
    }
}

/// Listing that can never be fetched.
pub struct UnreachableListing;

#[async_trait]
impl ListingSource for UnreachableListing {
    async fn fetch_listing(&self) -> Result<ListingPage> {
        Err(SyncError::InvalidFormat(
            "listing page returned no content".to_string(),
        ))
    }
}

/// Writes a small payload for every URL, failing for `fail_on`.
#[derive(Default)]
pub struct FakeDownloader {
    pub fail_on: Option<String>,
    pub requested: Arc<Mutex<Vec<String>>>,
}

impl FakeDownloader {
    pub fn failing_on(name: &str) -> Self {
        Self {
            fail_on: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArchiveDownloader for FakeDownloader {
    async fn download(&self, url: &Url, destination: &Path, sink: &dyn ProgressSink) -> Result<u64> {
        let name = destination.file_name().unwrap().to_string_lossy().to_string();
        self.requested.lock().unwrap().push(name.clone());
        std::fs::write(destination, b"PK")?;
        sink.item_value(2);
        if self.fail_on.as_deref() == Some(name.as_str()) {
            return Err(SyncError::DownloadFailure {
                filename: name,
                reason: format!("connection reset while reading {}", url),
            });
        }
        Ok(2)
    }
}

/// Station table tool stand-in. Serves `exports[station]` when the download
/// link is clicked; stations in `no_link` never show the link.
pub struct ScriptedBrowser {
    locators: Locators,
    download_dir: PathBuf,
    exports: HashMap<String, String>,
    no_link: HashSet<String>,
    current: Mutex<String>,
    pub visited: Arc<Mutex<Vec<String>>>,
    pub closed: Arc<Mutex<bool>>,
}

impl ScriptedBrowser {
    pub fn new(download_dir: &Path) -> Self {
        Self {
            locators: Locators::default(),
            download_dir: download_dir.to_path_buf(),
            exports: HashMap::new(),
            no_link: HashSet::new(),
            current: Mutex::new(String::new()),
            visited: Arc::new(Mutex::new(Vec::new())),
            closed: Arc::new(Mutex::new(false)),
        }
    }

    pub fn serve(mut self, station: &str, rows: &[&str]) -> Self {
        let mut text = String::from(LIVE_HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text.push('\n');
        self.exports.insert(station.to_string(), text);
        self
    }

    pub fn without_link(mut self, station: &str) -> Self {
        self.no_link.insert(station.to_string());
        self
    }

    fn current_station(&self) -> String {
        self.current.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserDriver for ScriptedBrowser {
    async fn navigate(&self, url: &str) -> Result<()> {
        let station = url.rsplit('/').next().unwrap_or_default().to_string();
        self.visited.lock().unwrap().push(station.clone());
        *self.current.lock().unwrap() = station;
        Ok(())
    }

    async fn find(&self, xpath: &str) -> Result<Option<ElementHandle>> {
        if xpath == self.locators.download_link && self.no_link.contains(&self.current_station()) {
            return Ok(None);
        }
        Ok(Some(ElementHandle(xpath.to_string())))
    }

    async fn is_displayed(&self, _element: &ElementHandle) -> Result<bool> {
        Ok(true)
    }

    async fn is_enabled(&self, _element: &ElementHandle) -> Result<bool> {
        Ok(true)
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        if element.0 == self.locators.download_link {
            if let Some(text) = self.exports.get(&self.current_station()) {
                std::fs::write(self.download_dir.join("generatedBy_react-csv.csv"), text)?;
            }
        }
        Ok(())
    }

    async fn send_keys(&self, _element: &ElementHandle, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

/// Hourly records for every day in `[from, to]` at 00:00 and 12:00.
pub fn hourly_records(from: NaiveDate, to: NaiveDate) -> Vec<CanonicalRecord> {
    from.iter_days()
        .take_while(|d| *d <= to)
        .flat_map(|d| {
            [0, 12].into_iter().map(move |h| {
                CanonicalRecord::new(d, NaiveTime::from_hms_opt(h, 0, 0).unwrap())
                    .with_measurement(CanonicalField::Temperature, Some("20.5".to_string()))
            })
        })
        .collect()
}

/// Writes an onboarded station: series file plus its state entry.
pub fn seed_station(settings: &Settings, station: &str, from: NaiveDate, to: NaiveDate) {
    std::fs::create_dir_all(settings.series_dir()).unwrap();
    let path = StationSeries::path_for(&settings.series_dir(), station);
    let series = StationSeries::new(station, &path, hourly_records(from, to));
    SeriesWriter::new().write_series(&series).unwrap();

    let store = StateStore::new(settings.state_file());
    let mut state = store.load().unwrap();
    state.register_station(station, to, from);
    store.save(&state).unwrap();
}

pub fn load_state(settings: &Settings) -> SyncState {
    StateStore::new(settings.state_file()).load().unwrap()
}

/// Yearly bulk archive holding one member per station.
pub fn write_bulk_archive(path: &Path, year: i32, members: &[(&str, &[&str])]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (station, rows) in members {
        zip.start_file(
            format!("INMET_SE_SP_{}_SAO PAULO_01-01-{}_A_31-12-{}.CSV", station, year, year),
            options,
        )
        .unwrap();
        let mut text = format!(
            "REGIAO:;SE\nUF:;SP\nESTACAO:;SAO PAULO\nCODIGO (WMO):;{}\n\
Data;Hora UTC;PRECIPITAÇÃO TOTAL, HORÁRIO (mm);PRESSAO ATMOSFERICA AO NIVEL DA ESTACAO, HORARIA (mB);RADIACAO GLOBAL (Kj/m²);TEMPERATURA DO AR - BULBO SECO, HORARIA (°C);UMIDADE RELATIVA DO AR, HORARIA (%);\n",
            station
        );
        for row in *rows {
            text.push_str(row);
            text.push('\n');
        }
        let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(&text);
        zip.write_all(&bytes).unwrap();
    }
    zip.finish().unwrap();
}
