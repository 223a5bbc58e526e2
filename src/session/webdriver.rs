use crate::config::SessionConfig;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// W3C key under which element references are returned.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Opaque reference to an element on the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle(pub String);

/// Browser operations the table session needs.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// `None` when no element matches the XPath.
    async fn find(&self, xpath: &str) -> Result<Option<ElementHandle>>;

    async fn is_displayed(&self, element: &ElementHandle) -> Result<bool>;

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool>;

    async fn click(&self, element: &ElementHandle) -> Result<()>;

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

/// Minimal W3C WebDriver client speaking to chromedriver over HTTP.
pub struct WebDriverClient {
    http: reqwest::Client,
    base: Url,
    session_id: String,
}

impl WebDriverClient {
    /// Start a browser session whose downloads land in `download_dir`.
    pub async fn connect(
        config: &SessionConfig,
        user_agent: &str,
        download_dir: &Path,
        request_timeout: Duration,
    ) -> Result<Self> {
        let mut base = Url::parse(&config.webdriver_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|source| SyncError::Fetch {
                url: base.to_string(),
                source,
            })?;

        let capabilities = chrome_capabilities(config, user_agent, download_dir);
        let value = send_command(&http, &base, Method::POST, "session", Some(capabilities)).await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| SyncError::WebDriver {
                error: "session not created".to_string(),
                message: "response carried no sessionId".to_string(),
            })?
            .to_string();

        debug!(session = %session_id, endpoint = %base, "browser session started");
        Ok(Self {
            http,
            base,
            session_id,
        })
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let path = format!("session/{}{}", self.session_id, path);
        send_command(&self.http, &self.base, method, &path, body).await
    }

    async fn element_flag(&self, element: &ElementHandle, flag: &str) -> Result<bool> {
        let value = self
            .command(Method::GET, &format!("/element/{}/{}", element.0, flag), None)
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

fn chrome_capabilities(config: &SessionConfig, user_agent: &str, download_dir: &Path) -> Value {
    let mut args = vec![
        format!("--window-size={}", config.window_size),
        format!("--user-agent={}", user_agent),
        "--disable-gpu".to_string(),
        "--no-sandbox".to_string(),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
    }

    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": {
                    "args": args,
                    "prefs": {
                        "download.default_directory": download_dir.to_string_lossy(),
                        "download.prompt_for_download": false,
                        "download.directory_upgrade": true,
                        "safebrowsing.enabled": true
                    }
                }
            }
        }
    })
}

async fn send_command(
    http: &reqwest::Client,
    base: &Url,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> Result<Value> {
    let url = base.join(path)?;
    let fetch_err = |source| SyncError::Fetch {
        url: url.to_string(),
        source,
    };

    let mut request = http.request(method, url.clone());
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await.map_err(fetch_err)?;
    let status = response.status();
    let wire: WireResponse = response.json().await.map_err(fetch_err)?;

    if status.is_success() {
        return Ok(wire.value);
    }
    match serde_json::from_value::<WireError>(wire.value) {
        Ok(err) => Err(SyncError::WebDriver {
            error: err.error,
            message: err.message,
        }),
        Err(_) => Err(SyncError::HttpStatus {
            url: url.to_string(),
            status,
        }),
    }
}

/// Element reference out of a find-element response.
fn element_from_value(value: &Value) -> Option<ElementHandle> {
    value
        .get(ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(|id| ElementHandle(id.to_string()))
}

#[async_trait]
impl BrowserDriver for WebDriverClient {
    async fn navigate(&self, url: &str) -> Result<()> {
        debug!(url, "navigating");
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn find(&self, xpath: &str) -> Result<Option<ElementHandle>> {
        let body = json!({ "using": "xpath", "value": xpath });
        match self.command(Method::POST, "/element", Some(body)).await {
            Ok(value) => Ok(element_from_value(&value)),
            Err(SyncError::WebDriver { error, .. }) if error == "no such element" => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn is_displayed(&self, element: &ElementHandle) -> Result<bool> {
        self.element_flag(element, "displayed").await
    }

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool> {
        self.element_flag(element, "enabled").await
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        self.command(
            Method::POST,
            &format!("/element/{}/click", element.0),
            Some(json!({})),
        )
        .await
        .map(|_| ())
    }

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<()> {
        self.command(
            Method::POST,
            &format!("/element/{}/value", element.0),
            Some(json!({ "text": text })),
        )
        .await
        .map(|_| ())
    }

    async fn close(&self) -> Result<()> {
        debug!(session = %self.session_id, "closing browser session");
        self.command(Method::DELETE, "", None).await.map(|_| ())
    }
}
