//! Port definition for the image discovery service.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::entities::{ImageRange, ImageRecord};
use crate::domain::errors::DiscoveryError;

/// Result type for discovery operations.
pub type DiscoveryResult<T> = std::result::Result<T, DiscoveryError>;

/// Port for the service that lists and addresses gallery images.
/// Every call is fallible and may be slow.
#[async_trait]
pub trait DiscoveryPort: Send + Sync {
    /// Lists a small first batch of at most `n` records.
    async fn list_initial(&self, n: usize) -> DiscoveryResult<Vec<ImageRecord>>;

    /// Lists up to `n` records.
    async fn list_up_to(&self, n: usize) -> DiscoveryResult<Vec<ImageRecord>>;

    /// Returns an estimate of the population size.
    async fn estimate_count(&self) -> DiscoveryResult<u64>;

    /// Lists the whole population by detecting its range first.
    async fn list_all_via_range_detection(&self) -> DiscoveryResult<Vec<ImageRecord>>;

    /// Detects the exact population bound.
    async fn detect_range(&self) -> DiscoveryResult<ImageRange>;

    /// Checks, within `timeout`, whether a population address resolves.
    async fn probe_exists(&self, index: u64, timeout: Duration) -> DiscoveryResult<bool>;

    /// Returns the address of a population index.
    fn path_for(&self, index: u64) -> String;
}
