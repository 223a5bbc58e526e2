use crate::error::{Result, SyncError};
use crate::utils::constants::PARTIAL_DOWNLOAD_SUFFIXES;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Folder the browser saves table exports into.
#[derive(Debug, Clone)]
pub struct DownloadDir {
    path: PathBuf,
}

impl DownloadDir {
    pub fn new(path: &Path) -> Result<Self> {
        fs::create_dir_all(path).map_err(|e| {
            SyncError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create download directory {}: {}", path.display(), e),
            ))
        })?;
        // The browser needs an absolute download path.
        let path = fs::canonicalize(path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove every file left by earlier downloads.
    pub fn clear(&self) -> Result<()> {
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.is_file() {
                fs::remove_file(&path)?;
                debug!(file = %path.display(), "removed stale download");
            }
        }
        Ok(())
    }

    /// The exported file once the browser has finished writing it. `None`
    /// while nothing has arrived or a partial download is still present.
    pub fn landed_file(&self, extension: &str) -> Result<Option<PathBuf>> {
        let mut landed = None;
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if PARTIAL_DOWNLOAD_SUFFIXES.iter().any(|s| name.ends_with(s)) {
                return Ok(None);
            }
            let matches = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
            if matches && landed.is_none() {
                landed = Some(path);
            }
        }
        Ok(landed)
    }

    pub fn remove(&self, file: &Path) {
        if let Err(e) = fs::remove_file(file) {
            warn!(file = %file.display(), error = %e, "could not remove downloaded file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clear_removes_files() -> Result<()> {
        let temp = TempDir::new()?;
        let dir = DownloadDir::new(&temp.path().join("downloads"))?;
        fs::write(dir.path().join("old.csv"), "x")?;

        dir.clear()?;
        assert_eq!(fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn test_partial_download_is_not_landed() -> Result<()> {
        let temp = TempDir::new()?;
        let dir = DownloadDir::new(temp.path())?;
        assert_eq!(dir.landed_file("csv")?, None);

        fs::write(dir.path().join("generatedBy_react-csv.csv.crdownload"), "x")?;
        assert_eq!(dir.landed_file("csv")?, None);

        fs::remove_file(dir.path().join("generatedBy_react-csv.csv.crdownload"))?;
        fs::write(dir.path().join("generatedBy_react-csv.csv"), "x")?;
        assert_eq!(
            dir.landed_file("csv")?,
            Some(dir.path().join("generatedBy_react-csv.csv"))
        );
        Ok(())
    }
}
