//! Port definition for warming image resources.

use async_trait::async_trait;

use crate::domain::errors::DiscoveryError;

/// Port for best-effort image fetches that warm a resource cache.
#[async_trait]
pub trait ImageFetchPort: Send + Sync {
    /// Fetches `src` so later loads are served from cache.
    async fn warm(&self, src: &str) -> Result<(), DiscoveryError>;
}
