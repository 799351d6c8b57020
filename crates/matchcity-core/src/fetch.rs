//! HTTP feed source.
//!
//! Handles:
//! - Endpoint URL validation
//! - GET with a request timeout and a `matchcity/<version>` user agent
//! - Handing back the status so the sync job decides what a failure means

use std::future::Future;
use std::time::Duration;

use reqwest::Url;

use crate::error::{MatchCityError, Result};
use crate::VERSION;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Status and body of a completed GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Where feed payloads come from.
pub trait FeedSource: Send + Sync {
    /// GET `url`.
    ///
    /// # Errors
    ///
    /// Returns `MatchCityError::InvalidUrl` if the URL does not parse and
    /// `MatchCityError::Http` if the request could not complete. A response
    /// with a non-success status is not an error.
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchResponse>> + Send;
}

/// Parse an endpoint URL, accepting only http and https.
pub fn parse_endpoint(url: &str) -> Result<Url> {
    let parsed =
        Url::parse(url).map_err(|e| MatchCityError::InvalidUrl(format!("{}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(MatchCityError::InvalidUrl(format!(
            "{}: unsupported scheme {}",
            url, other
        ))),
    }
}

/// Feed source backed by `reqwest`.
#[derive(Clone)]
pub struct HttpFeedSource {
    http: reqwest::Client,
}

impl HttpFeedSource {
    /// Create a source with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("matchcity/{}", VERSION))
            .build()?;
        Ok(Self { http })
    }
}

impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        let url = parse_endpoint(url)?;
        let response = self.http.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(FetchResponse { status, body })
    }
}
