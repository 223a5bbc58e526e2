use crate::error::{Result, SyncError};
use crate::models::ArchiveMarker;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationMeta {
    /// Last day the station's series was brought up to.
    pub last_updated: Option<NaiveDate>,
    #[serde(default)]
    pub onboarded_at: Option<NaiveDate>,
}

/// Process-wide synchronization state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default)]
    pub last_archive_marker: Option<ArchiveMarker>,
    #[serde(default)]
    pub stations: BTreeMap<String, StationMeta>,
}

impl SyncState {
    pub fn station(&self, key: &str) -> Option<&StationMeta> {
        self.stations.get(key)
    }

    pub fn station_keys(&self) -> Vec<String> {
        self.stations.keys().cloned().collect()
    }

    pub fn register_station(&mut self, key: &str, last_date: NaiveDate, today: NaiveDate) {
        let meta = self.stations.entry(key.to_string()).or_default();
        meta.last_updated = Some(last_date);
        meta.onboarded_at = Some(today);
    }

    pub fn mark_updated(&mut self, key: &str, day: NaiveDate) -> Result<()> {
        let meta = self
            .stations
            .get_mut(key)
            .ok_or_else(|| SyncError::StationNotFound(key.to_string()))?;
        meta.last_updated = Some(day);
        Ok(())
    }

    /// Whether the listing advertises a period newer than the stored marker.
    pub fn has_newer_archives(&self, newest: Option<ArchiveMarker>) -> bool {
        match (self.last_archive_marker, newest) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(known), Some(newest)) => newest > known,
        }
    }
}

/// File-backed persistence for [`SyncState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file yields the empty state.
    pub fn load(&self) -> Result<SyncState> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no sync state on disk, starting empty");
            return Ok(SyncState::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Replaces the state file atomically.
    pub fn save(&self, state: &SyncState) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, state)?;
        tmp.write_all(b"\n")?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| SyncError::Io(e.error))?;

        debug!(path = %self.path.display(), "sync state flushed");
        Ok(())
    }
}
