//! HTTP fetching for storefront pages.

mod origin;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use storelens_core::AppConfig;

use crate::error::FetchError;
use crate::rate_limit::{retry_with_backoff, HostThrottle};

pub use origin::normalize_target;
pub(crate) use origin::extract_domain;

/// A fetched page, handed to extractors unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub body: String,
    /// Raw `Link` header, used for catalog pagination.
    pub link_header: Option<String>,
}

impl RawPage {
    /// Convenience constructor for a successful HTML/JSON response.
    #[must_use]
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            body: body.into(),
            link_header: None,
        }
    }
}

/// Capability to GET a page within a timeout.
///
/// `timeout` bounds the whole call, retries and backoff included.
///
/// Any non-2xx answer is an error: a 404 becomes [`FetchError::NotFound`], a
/// 429 [`FetchError::RateLimited`], everything else
/// [`FetchError::HttpStatus`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<RawPage, FetchError>;
}

/// `reqwest`-backed [`PageFetcher`] with retries and per-host politeness.
///
/// Transient errors (429, timeouts, connection resets) are retried with
/// jittered exponential backoff up to `max_retries` additional attempts.
/// Requests to the same host are spaced by the politeness delay across all
/// concurrent callers sharing this client.
pub struct FetchClient {
    client: Client,
    max_retries: u32,
    backoff_base_ms: u64,
    throttle: HostThrottle,
}

impl FetchClient {
    /// # Errors
    ///
    /// Returns [`FetchError::Client`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
        politeness_delay: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            max_retries,
            backoff_base_ms,
            throttle: HostThrottle::new(politeness_delay),
        })
    }

    /// # Errors
    ///
    /// See [`FetchClient::new`].
    pub fn from_app_config(config: &AppConfig) -> Result<Self, FetchError> {
        Self::new(
            &config.user_agent,
            config.fetch_max_retries,
            config.fetch_backoff_base_ms,
            Duration::from_millis(config.politeness_delay_ms),
        )
    }

    async fn fetch_once(&self, url: &str, timeout: Duration) -> Result<RawPage, FetchError> {
        let host = extract_domain(url);
        self.throttle.wait(&host).await;

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .header(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(0);
            return Err(FetchError::RateLimited {
                domain: host,
                retry_after_secs,
            });
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound {
                url: url.to_owned(),
            });
        }

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        // Capture headers before the body consumes the response.
        let final_url = response.url().to_string();
        let link_header = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        Ok(RawPage {
            url: final_url,
            status: status.as_u16(),
            body,
            link_header,
        })
    }
}

#[async_trait]
impl PageFetcher for FetchClient {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<RawPage, FetchError> {
        let attempts = retry_with_backoff(self.max_retries, self.backoff_base_ms, move || {
            self.fetch_once(url, timeout)
        });
        let result = tokio::time::timeout(timeout, attempts)
            .await
            .unwrap_or_else(|_| {
                Err(FetchError::Timeout {
                    url: url.to_owned(),
                })
            });

        match &result {
            Ok(page) => {
                tracing::debug!(url, status = page.status, bytes = page.body.len(), "fetched page");
            }
            Err(e) => tracing::debug!(url, error = %e, "fetch failed"),
        }
        result
    }
}
