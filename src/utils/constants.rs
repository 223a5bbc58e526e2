/// Portal endpoints
pub const DEFAULT_LISTING_URL: &str = "https://portal.inmet.gov.br/dadoshistoricos";
pub const DEFAULT_STATION_URL_TEMPLATE: &str = "https://tempo.inmet.gov.br/TabelaEstacoes/{station}";
pub const STATION_PLACEHOLDER: &str = "{station}";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.1; WOW64; rv:50.0) Gecko/20100101 Firefox/50.0";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Listing page structure
pub const DEFAULT_ENTRY_SELECTOR: &str = "article.post-preview";
pub const DEFAULT_LINK_SELECTOR: &str = "a[href]";

/// Station table tool locators (XPath)
pub const XPATH_DATE_RANGE_TOGGLE: &str = r#"//*[@id="root"]/div[1]/div[1]/i"#;
pub const XPATH_START_INPUT: &str = r#"//*[@id="root"]/div[2]/div[1]/div[2]/div[4]/input"#;
pub const XPATH_END_INPUT: &str = r#"//*[@id="root"]/div[2]/div[1]/div[2]/div[5]/input"#;
pub const XPATH_FETCH_BUTTON: &str = r#"//*[@id="root"]/div[2]/div[1]/div[2]/button"#;
pub const XPATH_DOWNLOAD_LINK: &str = r#"//*[@id="root"]/div[2]/div[2]/div/div/div/span/a"#;

/// File and directory names
pub const APP_DIR_NAME: &str = "station-sync";
pub const HISTORICAL_DIR: &str = "historical";
pub const TEMP_DIR: &str = "temp";
pub const SERIES_DIR: &str = "stations";
pub const STATE_FILE: &str = "sync_state.json";
pub const CONFIG_FILE: &str = "station-sync.toml";
pub const ENV_PREFIX: &str = "STATION_SYNC";

/// Timing defaults
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_WAIT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;
pub const DEFAULT_PAUSE_BETWEEN_MS: u64 = 0;

/// Date formats
pub const LIVE_DATE_FORMAT: &str = "%m/%d/%Y";
pub const ARCHIVE_DATE_FORMATS: [&str; 2] = ["%Y/%m/%d", "%Y-%m-%d"];

/// Refresh rules
pub const MIN_GAP_DAYS: i64 = 2;

/// Measurement values
pub const MISSING_VALUE_SENTINEL: f64 = -9999.0;

/// Browser download leftovers that mean a file has not fully landed
pub const PARTIAL_DOWNLOAD_SUFFIXES: [&str; 3] = [".crdownload", ".part", ".tmp"];
