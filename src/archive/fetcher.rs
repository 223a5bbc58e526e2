use crate::config::PortalConfig;
use crate::error::{Result, SyncError};
use crate::models::{ArchiveEntry, ArchiveMarker, StateStore, SyncState};
use crate::utils::progress::ProgressSink;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};
use url::Url;

/// Downloads a single archive to `destination`, reporting byte progress as
/// item progress. Returns the number of bytes written.
#[async_trait]
pub trait ArchiveDownloader: Send + Sync {
    async fn download(&self, url: &Url, destination: &Path, sink: &dyn ProgressSink) -> Result<u64>;
}

/// Client for archive downloads. Connecting and every read are bounded by
/// the request timeout, but there is no overall deadline: an archive may take
/// as long as it keeps arriving.
pub fn download_client(portal: &PortalConfig) -> Result<reqwest::Client> {
    let timeout = Duration::from_secs(portal.request_timeout_secs);
    reqwest::Client::builder()
        .user_agent(portal.user_agent.as_str())
        .connect_timeout(timeout)
        .read_timeout(timeout)
        .build()
        .map_err(|source| SyncError::Fetch {
            url: portal.listing_url.clone(),
            source,
        })
}

pub struct HttpArchiveDownloader {
    client: reqwest::Client,
}

impl HttpArchiveDownloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_config(portal: &PortalConfig) -> Result<Self> {
        Ok(Self::new(download_client(portal)?))
    }
}

#[async_trait]
impl ArchiveDownloader for HttpArchiveDownloader {
    /// Streams into a hidden temp file next to `destination` and renames it
    /// into place once the body is complete, so an interrupted transfer never
    /// leaves a file under the archive's name.
    async fn download(&self, url: &Url, destination: &Path, sink: &dyn ProgressSink) -> Result<u64> {
        let fetch_err = |source| SyncError::Fetch {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(fetch_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        sink.item_range(response.content_length().unwrap_or(0));
        sink.item_value(0);

        let dir = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let partial = tempfile::Builder::new()
            .prefix(".download-")
            .suffix(".part")
            .tempfile_in(dir)?;
        let mut file = tokio::fs::File::from_std(partial.as_file().try_clone()?);
        let mut written = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(fetch_err)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            sink.item_value(written);
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        partial
            .persist(destination)
            .map_err(|e| SyncError::Io(e.error))?;
        debug!(file = %destination.display(), bytes = written, "archive stored");
        Ok(written)
    }
}

/// How archives are scheduled. Downloads never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum FetchPolicy {
    Serial { pause_between: Duration },
}

impl Default for FetchPolicy {
    fn default() -> Self {
        FetchPolicy::Serial {
            pause_between: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub downloaded: Vec<String>,
    pub skipped: Vec<String>,
    pub marker: Option<ArchiveMarker>,
}

/// Fetches missing archives one at a time, aborting on the first failure.
pub struct SerialArchiveFetcher {
    destination: PathBuf,
    policy: FetchPolicy,
}

impl SerialArchiveFetcher {
    pub fn new(destination: &Path) -> Self {
        Self {
            destination: destination.to_path_buf(),
            policy: FetchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Download every entry not yet on disk. The archive marker is advanced
    /// to `newest` and flushed only when the whole sequence succeeds; it never
    /// moves backwards.
    pub async fn fetch_all(
        &self,
        entries: &[ArchiveEntry],
        newest: Option<ArchiveMarker>,
        downloader: &dyn ArchiveDownloader,
        sink: &dyn ProgressSink,
        state: &mut SyncState,
        store: &StateStore,
    ) -> Result<FetchReport> {
        sink.clear();
        sink.overall_range(entries.len() as u64);
        sink.overall_label("Downloading historical archives...");

        let result = match self.fetch_sequence(entries, downloader, sink).await {
            Ok(mut report) => self.advance_marker(newest, state, store).map(|()| {
                report.marker = state.last_archive_marker;
                sink.log("Historical archives are up to date.");
                report
            }),
            Err(e) => Err(e),
        };

        sink.overall_value(entries.len() as u64);
        sink.processing_finished();
        result
    }

    async fn fetch_sequence(
        &self,
        entries: &[ArchiveEntry],
        downloader: &dyn ArchiveDownloader,
        sink: &dyn ProgressSink,
    ) -> Result<FetchReport> {
        let mut report = FetchReport::default();
        let FetchPolicy::Serial { pause_between } = self.policy;

        for (index, entry) in entries.iter().enumerate() {
            let path = self.destination.join(&entry.filename);
            sink.item_label(&entry.filename);

            if path.exists() {
                debug!(file = %entry.filename, "archive already on disk");
                report.skipped.push(entry.filename.clone());
                sink.overall_value(index as u64 + 1);
                continue;
            }

            if !report.downloaded.is_empty() && !pause_between.is_zero() {
                tokio::time::sleep(pause_between).await;
            }

            match downloader.download(&entry.url, &path, sink).await {
                Ok(bytes) => {
                    info!(file = %entry.filename, bytes, "archive downloaded");
                    sink.log(&format!("Archive {} downloaded.", entry.filename));
                    report.downloaded.push(entry.filename.clone());
                }
                Err(e) => {
                    if path.exists() {
                        if let Err(remove_err) = std::fs::remove_file(&path) {
                            error!(file = %path.display(), error = %remove_err, "could not remove partial archive");
                        }
                    }
                    error!(file = %entry.filename, error = %e, "archive download failed, aborting");
                    sink.log_error(&format!(
                        "Failed to download archive {}. Aborting.",
                        entry.filename
                    ));
                    return Err(SyncError::DownloadFailure {
                        filename: entry.filename.clone(),
                        reason: e.to_string(),
                    });
                }
            }

            sink.overall_value(index as u64 + 1);
        }

        Ok(report)
    }

    fn advance_marker(
        &self,
        newest: Option<ArchiveMarker>,
        state: &mut SyncState,
        store: &StateStore,
    ) -> Result<()> {
        let previous = state.last_archive_marker;
        state.last_archive_marker = previous.max(newest);
        if let Err(e) = store.save(state) {
            state.last_archive_marker = previous;
            return Err(e);
        }
        Ok(())
    }
}
