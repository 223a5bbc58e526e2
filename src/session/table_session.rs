use crate::config::{Locators, PortalConfig, Settings};
use crate::error::{Result, SyncError};
use crate::models::RawTable;
use crate::processors::DateWindow;
use crate::readers::TableReader;
use crate::session::download_dir::DownloadDir;
use crate::session::webdriver::{BrowserDriver, ElementHandle};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Outcome of one bounded wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    Ready(T),
    /// Present but never became usable before the deadline.
    TimedOut,
    /// Never present before the deadline.
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    Navigate,
    DateRangeToggle,
    StartInput,
    EndInput,
    FetchButton,
    Submit,
    DownloadLink,
    DownloadFile,
}

impl fmt::Display for SessionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStep::Navigate => "station page",
            SessionStep::DateRangeToggle => "date range toggle",
            SessionStep::StartInput => "start date input",
            SessionStep::EndInput => "end date input",
            SessionStep::FetchButton => "fetch button",
            SessionStep::Submit => "date range submission",
            SessionStep::DownloadLink => "download link",
            SessionStep::DownloadFile => "downloaded table",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    TimedOut(SessionStep),
    NotFound(SessionStep),
    Driver { step: SessionStep, message: String },
    Read { message: String },
}

impl SessionFailure {
    fn driver(step: SessionStep, error: &SyncError) -> Self {
        SessionFailure::Driver {
            step,
            message: error.to_string(),
        }
    }

    pub fn to_error(&self) -> SyncError {
        match self {
            SessionFailure::TimedOut(step) | SessionFailure::NotFound(step) => {
                SyncError::SessionTimeout {
                    step: step.to_string(),
                }
            }
            SessionFailure::Driver { step, message } => SyncError::WebDriver {
                error: step.to_string(),
                message: message.clone(),
            },
            SessionFailure::Read { message } => SyncError::InvalidFormat(message.clone()),
        }
    }
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionFailure::TimedOut(step) => write!(f, "timed out waiting for {}", step),
            SessionFailure::NotFound(step) => write!(f, "{} never appeared", step),
            SessionFailure::Driver { step, message } => write!(f, "{} failed: {}", step, message),
            SessionFailure::Read { message } => write!(f, "cannot read downloaded table: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Navigated,
    ControlsReady,
    Submitted,
    DownloadReady,
    Fetched,
    Failed(SessionFailure),
}

#[derive(Debug, Clone, Copy)]
pub struct SessionTimings {
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
    pub settle_delay: Duration,
}

type StepResult<T> = std::result::Result<T, SessionFailure>;

/// Drives the per-station table tool to export a date range as CSV.
pub struct RemoteTableSession {
    driver: Box<dyn BrowserDriver>,
    locators: Locators,
    portal: PortalConfig,
    timings: SessionTimings,
    downloads: DownloadDir,
    reader: TableReader,
    state: SessionState,
}

impl RemoteTableSession {
    pub fn new(driver: Box<dyn BrowserDriver>, settings: &Settings, downloads: DownloadDir) -> Self {
        let session = &settings.session;
        Self {
            driver,
            locators: session.locators.clone(),
            portal: settings.portal.clone(),
            timings: SessionTimings {
                wait_timeout: session.wait_timeout(),
                poll_interval: session.poll_interval(),
                settle_delay: session.settle_delay(),
            },
            downloads,
            reader: TableReader::new(),
            state: SessionState::Idle,
        }
    }

    pub fn with_timings(mut self, timings: SessionTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn last_failure(&self) -> Option<&SessionFailure> {
        match &self.state {
            SessionState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Export `window` for `station`. Every failure collapses to `None`; the
    /// reason is logged and kept in [`SessionState::Failed`].
    pub async fn fetch(&mut self, station: &str, window: &DateWindow) -> Option<RawTable> {
        self.state = SessionState::Idle;
        match self.run(station, window).await {
            Ok(table) => {
                self.state = SessionState::Fetched;
                debug!(station, rows = table.len(), "table fetched");
                Some(table)
            }
            Err(failure) => {
                warn!(station, window = %window, reason = %failure, "table session failed");
                self.state = SessionState::Failed(failure);
                None
            }
        }
    }

    pub async fn close(&self) -> Result<()> {
        self.driver.close().await
    }

    async fn run(&mut self, station: &str, window: &DateWindow) -> StepResult<RawTable> {
        let url = self.portal.station_url(station);
        self.driver
            .navigate(&url)
            .await
            .map_err(|e| SessionFailure::driver(SessionStep::Navigate, &e))?;
        self.state = SessionState::Navigated;

        let toggle = self
            .ready(SessionStep::DateRangeToggle, &self.locators.date_range_toggle)
            .await?;
        self.click(SessionStep::DateRangeToggle, &toggle).await?;

        let start = self.ready(SessionStep::StartInput, &self.locators.start_input).await?;
        let end = self.ready(SessionStep::EndInput, &self.locators.end_input).await?;
        let button = self.ready(SessionStep::FetchButton, &self.locators.fetch_button).await?;
        self.state = SessionState::ControlsReady;

        self.type_into(SessionStep::StartInput, &start, &window.start_param())
            .await?;
        self.type_into(SessionStep::EndInput, &end, &window.end_param())
            .await?;
        self.click(SessionStep::Submit, &button).await?;
        self.state = SessionState::Submitted;

        let link = self
            .ready(SessionStep::DownloadLink, &self.locators.download_link)
            .await?;
        self.state = SessionState::DownloadReady;

        self.downloads
            .clear()
            .map_err(|e| SessionFailure::driver(SessionStep::DownloadFile, &e))?;
        self.click(SessionStep::DownloadLink, &link).await?;
        sleep(self.timings.settle_delay).await;

        let file = match self
            .wait_for_download()
            .await
            .map_err(|e| SessionFailure::driver(SessionStep::DownloadFile, &e))?
        {
            Step::Ready(file) => file,
            Step::TimedOut => return Err(SessionFailure::TimedOut(SessionStep::DownloadFile)),
            Step::NotFound => return Err(SessionFailure::NotFound(SessionStep::DownloadFile)),
        };

        let table = self.reader.read_table(&file);
        self.downloads.remove(&file);
        table.map_err(|e| SessionFailure::Read {
            message: e.to_string(),
        })
    }

    async fn ready(&self, step: SessionStep, xpath: &str) -> StepResult<ElementHandle> {
        match self
            .wait_clickable(xpath)
            .await
            .map_err(|e| SessionFailure::driver(step, &e))?
        {
            Step::Ready(element) => {
                debug!(step = %step, "element ready");
                Ok(element)
            }
            Step::TimedOut => Err(SessionFailure::TimedOut(step)),
            Step::NotFound => Err(SessionFailure::NotFound(step)),
        }
    }

    async fn click(&self, step: SessionStep, element: &ElementHandle) -> StepResult<()> {
        self.driver
            .click(element)
            .await
            .map_err(|e| SessionFailure::driver(step, &e))
    }

    async fn type_into(&self, step: SessionStep, element: &ElementHandle, text: &str) -> StepResult<()> {
        self.driver
            .send_keys(element, text)
            .await
            .map_err(|e| SessionFailure::driver(step, &e))
    }

    /// Poll until the element is displayed and enabled, or the wait expires.
    async fn wait_clickable(&self, xpath: &str) -> Result<Step<ElementHandle>> {
        let deadline = Instant::now() + self.timings.wait_timeout;
        let mut seen = false;

        loop {
            if let Some(element) = self.driver.find(xpath).await? {
                seen = true;
                if self.is_clickable(&element).await? {
                    return Ok(Step::Ready(element));
                }
            }
            if Instant::now() >= deadline {
                return Ok(if seen { Step::TimedOut } else { Step::NotFound });
            }
            sleep(self.timings.poll_interval).await;
        }
    }

    async fn is_clickable(&self, element: &ElementHandle) -> Result<bool> {
        let displayed = match self.driver.is_displayed(element).await {
            Ok(displayed) => displayed,
            Err(SyncError::WebDriver { error, .. }) if error == "stale element reference" => {
                return Ok(false)
            }
            Err(e) => return Err(e),
        };
        Ok(displayed && self.driver.is_enabled(element).await?)
    }

    async fn wait_for_download(&self) -> Result<Step<PathBuf>> {
        let deadline = Instant::now() + self.timings.wait_timeout;
        loop {
            if let Some(file) = self.downloads.landed_file("csv")? {
                return Ok(Step::Ready(file));
            }
            if Instant::now() >= deadline {
                return Ok(Step::TimedOut);
            }
            sleep(self.timings.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const EXPORT: &str = "Data;Hora (UTC);Temp. Ins. (C)\n05/02/2024;0000;21,5\n";

    /// Page where every locator resolves except the ones listed in `missing`.
    struct FakePage {
        download_dir: PathBuf,
        missing: Vec<String>,
        disabled: Vec<String>,
        typed: Arc<Mutex<Vec<String>>>,
        closed: Arc<Mutex<bool>>,
    }

    impl FakePage {
        fn new(download_dir: &Path) -> Self {
            Self {
                download_dir: download_dir.to_path_buf(),
                missing: Vec::new(),
                disabled: Vec::new(),
                typed: Arc::new(Mutex::new(Vec::new())),
                closed: Arc::new(Mutex::new(false)),
            }
        }
    }

    #[async_trait]
    impl BrowserDriver for FakePage {
        async fn navigate(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn find(&self, xpath: &str) -> Result<Option<ElementHandle>> {
            if self.missing.iter().any(|m| m == xpath) {
                Ok(None)
            } else {
                Ok(Some(ElementHandle(xpath.to_string())))
            }
        }

        async fn is_displayed(&self, _element: &ElementHandle) -> Result<bool> {
            Ok(true)
        }

        async fn is_enabled(&self, element: &ElementHandle) -> Result<bool> {
            Ok(!self.disabled.contains(&element.0))
        }

        async fn click(&self, element: &ElementHandle) -> Result<()> {
            if element.0 == Locators::default().download_link {
                std::fs::write(self.download_dir.join("generatedBy_react-csv.csv"), EXPORT)?;
            }
            Ok(())
        }

        async fn send_keys(&self, _element: &ElementHandle, text: &str) -> Result<()> {
            self.typed.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    fn fast() -> SessionTimings {
        SessionTimings {
            wait_timeout: Duration::from_millis(60),
            poll_interval: Duration::from_millis(5),
            settle_delay: Duration::from_millis(1),
        }
    }

    fn window() -> DateWindow {
        DateWindow {
            start: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 5, 4).unwrap(),
        }
    }

    fn session(page: FakePage, dir: &Path) -> RemoteTableSession {
        RemoteTableSession::new(Box::new(page), &Settings::default(), DownloadDir::new(dir).unwrap())
            .with_timings(fast())
    }

    #[tokio::test]
    async fn test_fetch_returns_exported_table() {
        let dir = TempDir::new().unwrap();
        let mut session = session(FakePage::new(dir.path()), dir.path());

        let table = session.fetch("A001", &window()).await.unwrap();
        assert_eq!(table.headers[0], "Data");
        assert_eq!(table.rows.len(), 1);
        assert_eq!(session.state(), &SessionState::Fetched);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_missing_download_link_is_no_data() {
        let dir = TempDir::new().unwrap();
        let mut page = FakePage::new(dir.path());
        page.missing.push(Locators::default().download_link);
        let mut session = session(page, dir.path());

        assert!(session.fetch("A001", &window()).await.is_none());
        assert_eq!(
            session.last_failure(),
            Some(&SessionFailure::NotFound(SessionStep::DownloadLink))
        );
    }

    #[tokio::test]
    async fn test_disabled_control_times_out() {
        let dir = TempDir::new().unwrap();
        let mut page = FakePage::new(dir.path());
        page.disabled.push(Locators::default().fetch_button);
        let mut session = session(page, dir.path());

        assert!(session.fetch("A001", &window()).await.is_none());
        let failure = session.last_failure().unwrap();
        assert_eq!(failure, &SessionFailure::TimedOut(SessionStep::FetchButton));
        assert!(matches!(failure.to_error(), SyncError::SessionTimeout { .. }));
    }

    #[tokio::test]
    async fn test_window_dates_are_typed_in_portal_format() {
        let dir = TempDir::new().unwrap();
        let page = FakePage::new(dir.path());
        let typed = Arc::clone(&page.typed);
        let closed = Arc::clone(&page.closed);
        let mut session = session(page, dir.path());

        session.fetch("A001", &window()).await.unwrap();
        assert_eq!(
            *typed.lock().unwrap(),
            vec!["05/02/2024".to_string(), "05/04/2024".to_string()]
        );

        session.close().await.unwrap();
        assert!(*closed.lock().unwrap());
    }
}
