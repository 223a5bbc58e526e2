use crate::config::PortalConfig;
use crate::error::{Result, SyncError};
use crate::models::{newest_marker, ArchiveEntry, ArchiveMarker, SyncState};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

/// Listing page as fetched, with the URL relative links resolve against.
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub url: Url,
    pub html: String,
}

/// Source of the bulk archive listing page.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_listing(&self) -> Result<ListingPage>;
}

/// Client for listing requests, with a total deadline per request.
pub fn http_client(portal: &PortalConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(portal.user_agent.as_str())
        .timeout(std::time::Duration::from_secs(portal.request_timeout_secs))
        .build()
        .map_err(|source| SyncError::Fetch {
            url: portal.listing_url.clone(),
            source,
        })
}

pub struct HttpListingSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpListingSource {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }

    pub fn from_config(portal: &PortalConfig) -> Result<Self> {
        Ok(Self::new(http_client(portal)?, Url::parse(&portal.listing_url)?))
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    async fn fetch_listing(&self) -> Result<ListingPage> {
        debug!(url = %self.url, "fetching archive listing");
        let fetch_err = |source| SyncError::Fetch {
            url: self.url.to_string(),
            source,
        };

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(fetch_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus {
                url: self.url.to_string(),
                status,
            });
        }

        let html = response.text().await.map_err(fetch_err)?;
        Ok(ListingPage {
            url: self.url.clone(),
            html,
        })
    }
}

/// Outcome of one discovery pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryResult {
    pub entries: Vec<ArchiveEntry>,
    pub newest: Option<ArchiveMarker>,
    /// Marker stored by the last complete bootstrap.
    pub known: Option<ArchiveMarker>,
    pub has_newer: bool,
}

impl DiscoveryResult {
    /// Entries whose file is not yet in `dir`.
    pub fn missing_in(&self, dir: &Path) -> Vec<&ArchiveEntry> {
        self.entries
            .iter()
            .filter(|entry| !dir.join(&entry.filename).exists())
            .collect()
    }
}

/// Extracts archive entries from the listing page.
pub struct ArchiveDiscovery {
    entry_selector: String,
    link_selector: String,
}

impl ArchiveDiscovery {
    pub fn new(entry_selector: &str, link_selector: &str) -> Self {
        Self {
            entry_selector: entry_selector.to_string(),
            link_selector: link_selector.to_string(),
        }
    }

    pub fn from_config(portal: &PortalConfig) -> Self {
        Self::new(&portal.entry_selector, &portal.link_selector)
    }

    pub async fn discover(
        &self,
        source: &dyn ListingSource,
        state: &SyncState,
    ) -> Result<DiscoveryResult> {
        let page = source.fetch_listing().await?;
        let entries = self.parse_listing(&page.html, &page.url);
        let newest = newest_marker(&entries);
        let known = state.last_archive_marker;

        info!(
            entries = entries.len(),
            newest = ?newest,
            known = ?known,
            "archive listing parsed"
        );

        Ok(DiscoveryResult {
            has_newer: state.has_newer_archives(newest),
            entries,
            newest,
            known,
        })
    }

    /// Never fails: unmatched selectors give an empty list and unusable links
    /// are skipped.
    pub fn parse_listing(&self, html: &str, base: &Url) -> Vec<ArchiveEntry> {
        let (entry_sel, link_sel) = match (
            Selector::parse(&self.entry_selector),
            Selector::parse(&self.link_selector),
        ) {
            (Ok(entry), Ok(link)) => (entry, link),
            _ => {
                warn!(
                    entry = %self.entry_selector,
                    link = %self.link_selector,
                    "invalid listing selector"
                );
                return Vec::new();
            }
        };

        let document = Html::parse_document(html);
        document
            .select(&entry_sel)
            .filter_map(|element| entry_from_element(element, &link_sel, base))
            .collect()
    }
}

fn entry_from_element(element: ElementRef<'_>, link_sel: &Selector, base: &Url) -> Option<ArchiveEntry> {
    let href = element
        .select(link_sel)
        .find_map(|link| link.value().attr("href"))?;

    let url = match base.join(href.trim()) {
        Ok(url) => url,
        Err(e) => {
            debug!(href, error = %e, "skipping listing entry with unusable link");
            return None;
        }
    };

    let label = element.text().collect::<Vec<_>>().join(" ");
    let label = label.split_whitespace().collect::<Vec<_>>().join(" ");

    let entry = ArchiveEntry::new(url, &label);
    if entry.is_none() {
        debug!(href, "skipping listing entry without a file name");
    }
    entry
}
