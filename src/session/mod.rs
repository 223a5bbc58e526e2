pub mod download_dir;
pub mod table_session;
pub mod webdriver;

pub use download_dir::DownloadDir;
pub use table_session::{
    RemoteTableSession, SessionFailure, SessionState, SessionStep, SessionTimings, Step,
};
pub use webdriver::{BrowserDriver, ElementHandle, WebDriverClient};
