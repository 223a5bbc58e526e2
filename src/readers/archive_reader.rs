use crate::error::{Result, SyncError};
use crate::models::RawTable;
use crate::readers::{decode_text, parse_delimited};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::ZipArchive;

/// Reads per-station CSVs out of a yearly bulk archive.
///
/// Members are named `INMET_<REGION>_<UF>_<KEY>_<NAME>_<FROM>_A_<TO>.CSV`,
/// possibly inside a year folder, and start with a metadata preamble.
pub struct ArchiveReader {
    path: PathBuf,
}

impl ArchiveReader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Station key encoded in an archive member name.
    pub fn station_key_from_member(name: &str) -> Option<String> {
        let base = name.rsplit(['/', '\\']).next()?;
        let stem = base
            .strip_suffix(".CSV")
            .or_else(|| base.strip_suffix(".csv"))?;
        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() < 5 || !parts[0].eq_ignore_ascii_case("INMET") {
            return None;
        }
        let key = parts[3].trim();
        if key.is_empty() {
            None
        } else {
            Some(key.to_uppercase())
        }
    }

    /// All station keys present in the archive, sorted.
    pub fn station_keys(&self) -> Result<Vec<String>> {
        let archive = ZipArchive::new(File::open(&self.path)?)?;
        let keys: BTreeSet<String> = archive
            .file_names()
            .filter_map(Self::station_key_from_member)
            .collect();
        Ok(keys.into_iter().collect())
    }

    /// Every table the archive holds for `station`, in member order.
    pub fn read_station(&self, station: &str) -> Result<Vec<RawTable>> {
        let mut archive = ZipArchive::new(File::open(&self.path)?)?;
        let station = station.to_uppercase();
        let mut tables = Vec::new();

        for i in 0..archive.len() {
            let mut member = archive.by_index(i)?;
            let name = member.name().to_string();
            if Self::station_key_from_member(&name).as_deref() != Some(station.as_str()) {
                continue;
            }

            let mut bytes = Vec::with_capacity(member.size() as usize);
            member.read_to_end(&mut bytes)?;

            match parse_member(&decode_text(&bytes)) {
                Ok(table) => {
                    debug!(member = %name, rows = table.len(), "read archive member");
                    tables.push(table);
                }
                Err(e) => {
                    warn!(member = %name, error = %e, "skipping unreadable archive member");
                }
            }
        }

        Ok(tables)
    }
}

/// Skip the metadata preamble and parse from the header row on.
fn parse_member(text: &str) -> Result<RawTable> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let first_cell = line.split(';').next().unwrap_or("").trim();
        if first_cell.to_lowercase().starts_with("data") && line.matches(';').count() > 1 {
            return parse_delimited(&text[offset..], b';');
        }
        offset += line.len();
    }
    Err(SyncError::InvalidFormat(
        "no header row found in archive member".to_string(),
    ))
}
