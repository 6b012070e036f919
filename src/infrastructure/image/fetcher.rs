//! HTTP image fetcher backing the preloader.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, watch};
use tracing::{debug, trace};

use super::memory_cache::{CacheStats, DEFAULT_CACHE_SIZE, WarmCache};
use crate::domain::errors::DiscoveryError;
use crate::domain::ports::ImageFetchPort;

/// Configuration for the image fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Maximum bodies kept in the warm cache.
    pub cache_size: usize,
    /// Maximum concurrent downloads.
    pub max_concurrent_downloads: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_CACHE_SIZE,
            max_concurrent_downloads: 4,
            timeout_secs: 30,
        }
    }
}

/// Downloads images into a bounded in-memory cache.
///
/// Concurrent requests for the same address collapse into one download and
/// all resolve when it does; later requests for a cached address never touch
/// the network.
pub struct HttpImageFetcher {
    client: reqwest::Client,
    cache: Arc<WarmCache>,
    in_flight: Mutex<HashMap<String, watch::Receiver<Option<bool>>>>,
    permits: Semaphore,
    config: FetcherConfig,
}

impl std::fmt::Debug for HttpImageFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpImageFetcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpImageFetcher {
    /// Creates a fetcher.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: FetcherConfig) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DiscoveryError::unexpected(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            cache: Arc::new(WarmCache::new(config.cache_size)),
            in_flight: Mutex::new(HashMap::new()),
            permits: Semaphore::new(config.max_concurrent_downloads.max(1)),
            config,
        })
    }

    /// Returns the cached body for `src`, if warmed.
    pub async fn cached(&self, src: &str) -> Option<Bytes> {
        self.cache.get(src).await
    }

    /// Shared handle to the warm cache.
    #[must_use]
    pub fn cache(&self) -> Arc<WarmCache> {
        self.cache.clone()
    }

    /// Returns warm cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Number of downloads currently running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    async fn download(&self, url: &str) -> Result<Bytes, DiscoveryError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| DiscoveryError::unexpected(format!("download permits closed: {e}")))?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DiscoveryError::Timeout {
                    timeout_ms: self.config.timeout_secs.saturating_mul(1000),
                }
            } else {
                DiscoveryError::network(format!("request failed: {e}"))
            }
        })?;

        if !response.status().is_success() {
            return Err(DiscoveryError::network(format!(
                "HTTP {}: {}",
                response.status(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| DiscoveryError::network(format!("failed to read body: {e}")))
    }
}

enum Role {
    Leader(watch::Sender<Option<bool>>),
    Follower(watch::Receiver<Option<bool>>),
}

/// Removes the in-flight entry when the leading download ends or is dropped.
struct InFlightEntry<'a> {
    in_flight: &'a Mutex<HashMap<String, watch::Receiver<Option<bool>>>>,
    src: &'a str,
}

impl Drop for InFlightEntry<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(self.src);
    }
}

#[async_trait]
impl ImageFetchPort for HttpImageFetcher {
    async fn warm(&self, src: &str) -> Result<(), DiscoveryError> {
        if self.cache.contains(src).await {
            trace!(src = %src, "Already warm");
            return Ok(());
        }

        let role = {
            let mut in_flight = self.in_flight.lock();
            if let Some(done) = in_flight.get(src) {
                Role::Follower(done.clone())
            } else {
                let (tx, rx) = watch::channel(None);
                in_flight.insert(src.to_string(), rx);
                Role::Leader(tx)
            }
        };

        let done = match role {
            Role::Follower(mut done) => {
                trace!(src = %src, "Joining in-flight download");
                let succeeded = done
                    .wait_for(Option::is_some)
                    .await
                    .is_ok_and(|outcome| *outcome == Some(true));
                return if succeeded {
                    Ok(())
                } else {
                    Err(DiscoveryError::network(format!("shared download of {src} failed")))
                };
            }
            Role::Leader(done) => done,
        };

        let _entry = InFlightEntry {
            in_flight: &self.in_flight,
            src,
        };
        let result = self.download(src).await;
        if let Ok(body) = &result {
            debug!(src = %src, bytes = body.len(), "Warmed image");
            self.cache.put(src, body.clone()).await;
        }
        done.send_replace(Some(result.is_ok()));
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn fetcher() -> HttpImageFetcher {
        HttpImageFetcher::new(FetcherConfig {
            timeout_secs: 2,
            ..FetcherConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_cached_address_skips_network() {
        let fetcher = fetcher();
        let src = "http://127.0.0.1:9/images/1.jpg";
        fetcher.cache().put(src, Bytes::from_static(b"jpeg")).await;

        tokio_test::assert_ok!(fetcher.warm(src).await);
        assert_eq!(fetcher.cached(src).await, Some(Bytes::from_static(b"jpeg")));
        assert_eq!(fetcher.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_failed_download_is_not_cached() {
        let fetcher = fetcher();
        let src = "http://127.0.0.1:9/images/2.jpg";

        tokio_test::assert_err!(fetcher.warm(src).await);
        assert!(!fetcher.cache().contains(src).await);
        assert_eq!(fetcher.in_flight(), 0);
    }

    async fn serve_slowly(body: &'static [u8], delay: Duration) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let mut buf = [0_u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    tokio::time::sleep(delay).await;
                    let head = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(body).await;
                });
            }
        });
        (format!("http://{addr}"), requests)
    }

    #[tokio::test]
    async fn test_concurrent_warm_waits_for_shared_download() {
        let fetcher = fetcher();
        let (base, requests) = serve_slowly(b"jpeg", Duration::from_millis(300)).await;
        let src = format!("{base}/images/7.jpg");

        let (first, second) = tokio::join!(fetcher.warm(&src), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let result = fetcher.warm(&src).await;
            (result, fetcher.cache().contains(&src).await)
        });

        tokio_test::assert_ok!(first);
        tokio_test::assert_ok!(second.0);
        assert!(second.1, "second caller returned before the body was cached");
        assert_eq!(requests.load(Ordering::SeqCst), 1);
        assert_eq!(fetcher.in_flight(), 0);
    }

    #[test]
    fn test_config_defaults_from_partial_toml() {
        let config: FetcherConfig = toml::from_str("cache_size = 10").unwrap();
        assert_eq!(config.cache_size, 10);
        assert_eq!(config.max_concurrent_downloads, 4);
        assert_eq!(config.timeout_secs, 30);
    }
}
