//! HTTP discovery client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use super::dto::{CountResponse, ErrorResponse, ListingEntry};
use super::range_search::find_upper_bound;
use crate::domain::entities::{ImageRange, ImageRecord};
use crate::domain::errors::DiscoveryError;
use crate::domain::ports::{DiscoveryPort, DiscoveryResult};
use crate::infrastructure::config::DiscoveryConfig;

const USER_AGENT: &str = concat!("lazygallery/", env!("CARGO_PKG_VERSION"));

/// Discovery service reached over HTTP.
///
/// Listings come from `GET {base}/images?limit=n`, the estimate from
/// `GET {base}/images/count`, and population index `i` lives at
/// `{base}/images/{i}.{ext}`.
pub struct HttpDiscoveryClient {
    client: Client,
    base_url: String,
    image_extension: String,
    range_ceiling: u64,
    probe_timeout: Duration,
}

impl std::fmt::Debug for HttpDiscoveryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDiscoveryClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpDiscoveryClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn new(config: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DiscoveryError::unexpected(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            image_extension: config.image_extension.trim_start_matches('.').to_string(),
            range_ceiling: config.range_ceiling,
            probe_timeout: Duration::from_millis(config.probe_timeout_ms),
        })
    }

    /// Returns the service base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_listing(&self, n: usize) -> DiscoveryResult<Vec<ImageRecord>> {
        let url = format!("{}/images", self.base_url);
        debug!(limit = n, "Requesting image listing");

        let response = self
            .client
            .get(&url)
            .query(&[("limit", n)])
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }

        let entries: Vec<ListingEntry> = response.json().await.map_err(|e| {
            warn!(error = %e, "Failed to parse listing");
            DiscoveryError::invalid_response(format!("failed to parse listing: {e}"))
        })?;

        Ok(entries
            .into_iter()
            .take(n)
            .map(|entry| entry.into_record(&self.base_url))
            .collect())
    }
}

#[async_trait]
impl DiscoveryPort for HttpDiscoveryClient {
    async fn list_initial(&self, n: usize) -> DiscoveryResult<Vec<ImageRecord>> {
        self.fetch_listing(n).await
    }

    async fn list_up_to(&self, n: usize) -> DiscoveryResult<Vec<ImageRecord>> {
        self.fetch_listing(n).await
    }

    async fn estimate_count(&self) -> DiscoveryResult<u64> {
        let url = format!("{}/images/count", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_from_response(status, response).await);
        }

        let body: CountResponse = response.json().await.map_err(|e| {
            DiscoveryError::invalid_response(format!("failed to parse count: {e}"))
        })?;
        Ok(body.count)
    }

    async fn list_all_via_range_detection(&self) -> DiscoveryResult<Vec<ImageRecord>> {
        let range = self.detect_range().await?;
        Ok((1..=range.max)
            .map(|index| ImageRecord::for_population_index(index, self.path_for(index)))
            .collect())
    }

    async fn detect_range(&self) -> DiscoveryResult<ImageRange> {
        let timeout = self.probe_timeout;
        let max = find_upper_bound(|index| self.probe_exists(index, timeout), self.range_ceiling)
            .await?
            .ok_or_else(|| DiscoveryError::range_unavailable("first image does not exist"))?;

        info!(max, "Population range detected");
        ImageRange::new(max).ok_or_else(|| DiscoveryError::range_unavailable("empty population"))
    }

    async fn probe_exists(&self, index: u64, timeout: Duration) -> DiscoveryResult<bool> {
        let url = self.path_for(index);
        let request = self.client.head(&url).timeout(timeout).send();

        let response = match tokio::time::timeout(timeout, request).await {
            Ok(result) => result.map_err(map_request_error)?,
            Err(_) => {
                return Err(DiscoveryError::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
        };

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(false),
            status => Err(DiscoveryError::network(format!(
                "probe for {index} returned {status}"
            ))),
        }
    }

    fn path_for(&self, index: u64) -> String {
        format!("{}/images/{index}.{}", self.base_url, self.image_extension)
    }
}

fn map_request_error(e: reqwest::Error) -> DiscoveryError {
    if e.is_timeout() {
        DiscoveryError::Timeout { timeout_ms: 0 }
    } else if e.is_connect() {
        DiscoveryError::network("failed to connect to discovery service")
    } else {
        DiscoveryError::network(e.to_string())
    }
}

async fn error_from_response(status: StatusCode, response: reqwest::Response) -> DiscoveryError {
    let message = match response.json::<ErrorResponse>().await {
        Ok(error) => error.message,
        Err(_) => format!("HTTP {status}"),
    };

    match status {
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            DiscoveryError::network(format!("discovery service unavailable: {message}"))
        }
        _ => DiscoveryError::invalid_response(format!("{status}: {message}")),
    }
}
