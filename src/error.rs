use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Could not reach {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} failed with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Download of {filename} failed: {reason}")]
    DownloadFailure { filename: String, reason: String },

    #[error("Timed out waiting for {step}")]
    SessionTimeout { step: String },

    #[error("WebDriver error '{error}': {message}")]
    WebDriver { error: String, message: String },

    #[error("Cannot normalize column '{column}' value '{value}' (row {row})")]
    Normalization {
        column: String,
        value: String,
        row: usize,
    },

    #[error("Required column '{0}' not found in table")]
    MissingColumn(String),

    #[error("Merge rejected for station {station}: {reason}")]
    Merge { station: String, reason: String },

    #[error("Station {0} not found")]
    StationNotFound(String),

    #[error("No historical archives in '{0}'. Run the bootstrap first")]
    NoArchives(PathBuf),

    #[error("Station series '{0}' has no records")]
    EmptySeries(PathBuf),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
