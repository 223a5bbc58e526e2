use crate::error::Result;
use crate::models::ColumnDictionary;
use crate::utils::constants::*;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use validator::Validate;

/// Runtime settings, layered from defaults, an optional TOML file and
/// `STATION_SYNC__*` environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Settings {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    #[validate(nested)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    #[validate(nested)]
    pub session: SessionConfig,
    /// Replaces the built-in live table dictionary when set.
    #[serde(default)]
    pub columns: Option<ColumnDictionary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default)]
    pub app_dir: Option<PathBuf>,
    #[serde(default)]
    pub historical_dir: Option<PathBuf>,
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
    #[serde(default)]
    pub series_dir: Option<PathBuf>,
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PortalConfig {
    #[validate(url)]
    pub listing_url: String,
    #[validate(contains(pattern = "{station}"))]
    pub station_url_template: String,
    #[validate(length(min = 1))]
    pub user_agent: String,
    #[validate(length(min = 1))]
    pub entry_selector: String,
    #[validate(length(min = 1))]
    pub link_selector: String,
    #[validate(range(min = 1, max = 3600))]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub pause_between_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SessionConfig {
    #[validate(url)]
    pub webdriver_url: String,
    pub headless: bool,
    #[validate(length(min = 1))]
    pub window_size: String,
    #[validate(range(min = 1, max = 600))]
    pub wait_timeout_secs: u64,
    #[validate(range(min = 10, max = 60000))]
    pub poll_interval_ms: u64,
    pub settle_delay_ms: u64,
    #[validate(nested)]
    pub locators: Locators,
}

/// XPath expressions for the station table tool's controls.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Locators {
    #[validate(length(min = 1))]
    pub date_range_toggle: String,
    #[validate(length(min = 1))]
    pub start_input: String,
    #[validate(length(min = 1))]
    pub end_input: String,
    #[validate(length(min = 1))]
    pub fetch_button: String,
    #[validate(length(min = 1))]
    pub download_link: String,
}

impl PortalConfig {
    /// Table tool page for `station`.
    pub fn station_url(&self, station: &str) -> String {
        self.station_url_template.replace(STATION_PLACEHOLDER, station)
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            listing_url: DEFAULT_LISTING_URL.to_string(),
            station_url_template: DEFAULT_STATION_URL_TEMPLATE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            entry_selector: DEFAULT_ENTRY_SELECTOR.to_string(),
            link_selector: DEFAULT_LINK_SELECTOR.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            pause_between_ms: DEFAULT_PAUSE_BETWEEN_MS,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            headless: true,
            window_size: "1920,1080".to_string(),
            wait_timeout_secs: DEFAULT_WAIT_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            locators: Locators::default(),
        }
    }
}

impl Default for Locators {
    fn default() -> Self {
        Self {
            date_range_toggle: XPATH_DATE_RANGE_TOGGLE.to_string(),
            start_input: XPATH_START_INPUT.to_string(),
            end_input: XPATH_END_INPUT.to_string(),
            fetch_button: XPATH_FETCH_BUTTON.to_string(),
            download_link: XPATH_DOWNLOAD_LINK.to_string(),
        }
    }
}

pub fn default_app_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

impl Settings {
    /// Load settings. An explicit `config_file` must exist; otherwise
    /// `<app_dir>/station-sync.toml` is read when present.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let (file, required) = match config_file {
            Some(path) => (path.to_path_buf(), true),
            None => (default_app_dir().join(CONFIG_FILE), false),
        };
        debug!(path = %file.display(), required, "loading configuration");

        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from(file).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings.check()?;
        Ok(settings)
    }

    /// Defaults rooted at `app_dir`.
    pub fn with_app_dir(app_dir: &Path) -> Self {
        let mut settings = Self::default();
        settings.paths.app_dir = Some(app_dir.to_path_buf());
        settings
    }

    pub fn check(&self) -> Result<()> {
        self.validate()?;
        if let Some(columns) = &self.columns {
            columns.validate()?;
        }
        Ok(())
    }

    pub fn live_dictionary(&self) -> ColumnDictionary {
        self.columns.clone().unwrap_or_else(ColumnDictionary::live_table)
    }

    pub fn app_dir(&self) -> PathBuf {
        self.paths.app_dir.clone().unwrap_or_else(default_app_dir)
    }

    pub fn historical_dir(&self) -> PathBuf {
        self.paths
            .historical_dir
            .clone()
            .unwrap_or_else(|| self.app_dir().join(HISTORICAL_DIR))
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.paths
            .temp_dir
            .clone()
            .unwrap_or_else(|| self.app_dir().join(TEMP_DIR))
    }

    pub fn series_dir(&self) -> PathBuf {
        self.paths
            .series_dir
            .clone()
            .unwrap_or_else(|| self.app_dir().join(SERIES_DIR))
    }

    pub fn state_file(&self) -> PathBuf {
        self.paths
            .state_file
            .clone()
            .unwrap_or_else(|| self.app_dir().join(STATE_FILE))
    }

    /// Create the working folders if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.historical_dir(), self.temp_dir(), self.series_dir()] {
            std::fs::create_dir_all(&dir)?;
        }
        if let Some(parent) = self.state_file().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.portal.request_timeout_secs)
    }

    pub fn pause_between(&self) -> Duration {
        Duration::from_millis(self.fetch.pause_between_ms)
    }
}

impl SessionConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
