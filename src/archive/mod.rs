pub mod discovery;
pub mod fetcher;
pub mod onboarding;

pub use discovery::{
    http_client, ArchiveDiscovery, DiscoveryResult, HttpListingSource, ListingPage, ListingSource,
};
pub use fetcher::{
    download_client, ArchiveDownloader, FetchPolicy, FetchReport, HttpArchiveDownloader,
    SerialArchiveFetcher,
};
pub use onboarding::{HistoricalArchives, OnboardSummary, StationOnboarder};
