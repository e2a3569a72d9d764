//! Client configuration
//!
//! Plain structs with defaults pulled from named constants. All knobs are
//! public fields; the builder-style setters exist for call-site ergonomics.

use std::time::Duration;

/// Default page size requested by the retrying stream.
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Default first backoff after a 429, in milliseconds.
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1_000;
/// Default backoff ceiling, in milliseconds.
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 30_000;
/// Default attempt ceiling for one page fetch.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default number of sibling namespace listings in flight.
pub const DEFAULT_DISCOVERY_CONCURRENCY: usize = 8;
/// Default minimum spacing between discovery request starts, in milliseconds.
pub const DEFAULT_MIN_REQUEST_INTERVAL_MS: u64 = 50;

/// Rate-limit retry policy for the resilient stream.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Records requested per page.
    pub page_size: u32,
    /// First sleep after a 429; doubles per failed attempt.
    pub initial_backoff: Duration,
    /// Ceiling on the backoff sleep.
    pub max_backoff: Duration,
    /// Failed tries allowed for a single page before giving up.
    pub max_attempts: u32,
    /// When false, the first 429 propagates without any retry.
    pub retry_on_rate_limit: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_on_rate_limit: true,
        }
    }
}

/// Namespace discovery fan-out policy.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Sibling listings in flight at once.
    pub concurrency: usize,
    /// Minimum spacing between request starts.
    pub min_request_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_DISCOVERY_CONCURRENCY,
            min_request_interval: Duration::from_millis(DEFAULT_MIN_REQUEST_INTERVAL_MS),
        }
    }
}

/// Connection settings for one [`crate::ServiceClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Data service root, without a trailing slash.
    pub base_url: String,
    /// Auth service root; the token endpoint lives at `{auth_url}/auth/token`.
    pub auth_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// OAuth scopes requested on each token exchange.
    pub scopes: Vec<String>,
    pub request_timeout: Duration,
    pub retry: RetryConfig,
    pub discovery: DiscoveryConfig,
}

impl ClientConfig {
    pub fn new(
        base_url: impl Into<String>,
        auth_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_url: auth_url.into().trim_end_matches('/').to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes: Vec::new(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            retry: RetryConfig::default(),
            discovery: DiscoveryConfig::default(),
        }
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = discovery;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_trimmed() {
        let config = ClientConfig::new("https://api.example.com/svc/", "https://auth.example.com/", "id", "secret");
        assert_eq!(config.base_url, "https://api.example.com/svc");
        assert_eq!(config.auth_url, "https://auth.example.com");
    }

    #[test]
    fn defaults_match_constants() {
        let retry = RetryConfig::default();
        assert_eq!(retry.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(retry.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(retry.retry_on_rate_limit);

        let discovery = DiscoveryConfig::default();
        assert_eq!(discovery.concurrency, DEFAULT_DISCOVERY_CONCURRENCY);
        assert_eq!(
            discovery.min_request_interval,
            Duration::from_millis(DEFAULT_MIN_REQUEST_INTERVAL_MS)
        );
    }
}
