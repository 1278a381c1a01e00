//! Shared HTTP plumbing for the scraper clients.
//!
//! Every scraper request goes through [`Fetcher::get`]: a bounded retry loop
//! with long sleeps on rate limits and outages, plus an optional on-disk
//! response cache so a season can be re-processed without hammering the APIs.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Attempt cap and backoff schedule for scraper requests
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Sleep after a 429 before retrying
    pub rate_limit_backoff: Duration,
    /// Sleep after any other non-success status
    pub server_error_backoff: Duration,
    /// Sleep after a connection-level failure
    pub offline_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            rate_limit_backoff: Duration::from_secs(300),
            server_error_backoff: Duration::from_secs(300),
            offline_backoff: Duration::from_secs(3600),
        }
    }
}

impl RetryPolicy {
    /// Millisecond-scale backoffs for tests
    pub fn fast() -> Self {
        Self {
            max_attempts: 5,
            rate_limit_backoff: Duration::from_millis(1),
            server_error_backoff: Duration::from_millis(1),
            offline_backoff: Duration::from_millis(1),
        }
    }
}

/// Status code and body of a completed request
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Transport seam so parsers can run against canned responses in tests
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one GET. `Err` means the request never completed.
    async fn get(&self, url: &str) -> Result<HttpResponse>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(HttpResponse { status, body })
    }
}

/// Retrying, optionally caching fetcher shared by every scraper client
pub struct Fetcher {
    transport: Box<dyn Transport>,
    policy: RetryPolicy,
    cache_dir: Option<PathBuf>,
}

impl Fetcher {
    pub fn new() -> Self {
        Self::with_transport(Box::new(HttpTransport::new()))
    }

    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
            cache_dir: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Stores every successful body under `dir`, keyed by sanitized URL
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        if let Some(cached) = self.read_cache(url) {
            debug!(%url, "response cache hit");
            return Ok(cached);
        }
        let body = self.fetch_with_retry(url).await?;
        self.write_cache(url, &body);
        Ok(body)
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String> {
        for attempt in 1..=self.policy.max_attempts {
            match self.transport.get(url).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    return Ok(response.body);
                }
                Ok(response) if response.status == 429 => {
                    warn!(%url, attempt, "rate limited, backing off");
                    tokio::time::sleep(self.policy.rate_limit_backoff).await;
                }
                Ok(response) => {
                    warn!(%url, attempt, status = response.status, "request failed");
                    tokio::time::sleep(self.policy.server_error_backoff).await;
                }
                Err(error) => {
                    warn!(%url, attempt, %error, "connection failed");
                    tokio::time::sleep(self.policy.offline_backoff).await;
                }
            }
        }
        anyhow::bail!(
            "Giving up on {} after {} attempts",
            url,
            self.policy.max_attempts
        )
    }

    fn cache_path(&self, url: &str) -> Option<PathBuf> {
        Some(self.cache_dir.as_ref()?.join(cache_key(url)))
    }

    fn read_cache(&self, url: &str) -> Option<String> {
        std::fs::read_to_string(self.cache_path(url)?).ok()
    }

    fn write_cache(&self, url: &str, body: &str) {
        let Some(path) = self.cache_path(url) else {
            return;
        };
        if let Some(dir) = path.parent() {
            if std::fs::create_dir_all(dir).is_err() {
                return;
            }
        }
        if let Err(error) = std::fs::write(&path, body) {
            warn!(path = %path.display(), %error, "failed to cache response");
        }
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache file name for a URL
fn cache_key(url: &str) -> String {
    url.replace(':', "-").replace('/', "-")
}
