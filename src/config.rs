//! Build and client settings

use std::time::Duration;

use crate::archive::ArchiveFormat;

/// Public resources endpoint of the provider API
pub const DEFAULT_API_BASE_URL: &str = "https://cloud-api.yandex.net/v1/disk/public/resources";

/// Maximum simultaneous outbound requests per build
pub const MAX_CONCURRENT_REQUESTS: usize = 4;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Deepest directory level below a selected root that will be walked
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Upper bound on resolved nodes per build
pub const DEFAULT_MAX_NODES: usize = 10_000;

/// `limit` sent with every metadata request so a directory's children arrive in one response
pub const DEFAULT_LISTING_PAGE_SIZE: u32 = 1000;

/// Listing cache lifetime (5 minutes)
pub const DEFAULT_LISTING_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub api_base_url: String,
    pub max_concurrent_requests: usize,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_depth: usize,
    pub max_nodes: usize,
    pub listing_page_size: u32,
    pub format: ArchiveFormat,
    /// Whole-build deadline; `None` means only the caller's cancellation token can stop a build
    pub build_timeout: Option<Duration>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            max_concurrent_requests: MAX_CONCURRENT_REQUESTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_depth: DEFAULT_MAX_DEPTH,
            max_nodes: DEFAULT_MAX_NODES,
            listing_page_size: DEFAULT_LISTING_PAGE_SIZE,
            format: ArchiveFormat::Zip,
            build_timeout: None,
        }
    }
}

impl BuildConfig {
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = limit.max(1);
        self
    }

    pub fn with_format(mut self, format: ArchiveFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_limits(mut self, max_depth: usize, max_nodes: usize) -> Self {
        self.max_depth = max_depth;
        self.max_nodes = max_nodes;
        self
    }

    pub fn with_build_timeout(mut self, timeout: Duration) -> Self {
        self.build_timeout = Some(timeout);
        self
    }
}
