//! HTTP fetching for the externally hosted plan pages.
//!
//! All fetch failures surface as a single [`FetchError`]; a failed fetch
//! aborts the current ingestion run without touching data committed for
//! weeks that were already processed.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

/// Default User-Agent sent to the plan host.
pub const USER_AGENT: &str = concat!("vplan/", env!("CARGO_PKG_VERSION"));

/// Errors raised while fetching a plan page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Source of raw plan markup.
///
/// The production implementation is [`HttpClient`]; tests substitute
/// canned pages. Failures of any kind surface as [`FetchError`] and abort
/// the current ingestion run.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;
}

/// Thin HTTP client for the plan host.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Create a client with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch a page and return its body as text.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        // Validate early so template mistakes show up as such, not as
        // opaque transport errors.
        Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        response.text().await.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })
    }
}

#[async_trait]
impl PageSource for HttpClient {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        self.get_text(url).await
    }
}
