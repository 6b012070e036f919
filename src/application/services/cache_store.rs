//! TTL-bounded cache for the image listing and the population range.
//!
//! Payloads are wrapped in a versioned JSON envelope. Anything that fails to
//! parse, or carries another schema version, is cleared and reported as a
//! miss. Store failures are logged and swallowed.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::domain::entities::{ImageRange, ImageRecord};
use crate::domain::errors::StoreError;
use crate::domain::ports::{Clock, SessionStorePort};

/// Key holding the serialized image listing.
pub const IMAGES_KEY: &str = "gallery-images";
/// Key holding the listing's write time in epoch milliseconds.
pub const TIMESTAMP_KEY: &str = "gallery-cache-timestamp";
/// Key holding the serialized population range.
pub const RANGE_KEY: &str = "imagekit_range";

/// Schema version written into every envelope.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u32,
    data: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    version: u32,
    data: T,
}

/// Typed view over a [`SessionStorePort`].
#[derive(Clone)]
pub struct CacheStore {
    store: Arc<dyn SessionStorePort>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Creates a cache over `store` using `clock` for listing ages.
    #[must_use]
    pub fn new(store: Arc<dyn SessionStorePort>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    /// Returns the listing TTL.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached listing if it is younger than the TTL.
    ///
    /// A stale, corrupt, or incompatible listing is deleted together with
    /// its timestamp.
    pub fn get_images(&self) -> Option<Vec<ImageRecord>> {
        let Some(raw) = self.read_raw(IMAGES_KEY) else {
            self.remove(TIMESTAMP_KEY);
            return None;
        };

        let Some(age) = self.image_cache_age() else {
            debug!("Cached listing has no valid timestamp, discarding");
            self.clear_images();
            return None;
        };

        if age >= self.ttl {
            debug!(
                age_ms = age.as_millis(),
                ttl_ms = self.ttl.as_millis(),
                "Cached listing expired"
            );
            self.clear_images();
            return None;
        }

        match decode::<Vec<ImageRecord>>(&raw) {
            Some(images) => {
                trace!(count = images.len(), "Listing cache hit");
                Some(images)
            }
            None => {
                warn!("Cached listing is corrupt, discarding");
                self.clear_images();
                None
            }
        }
    }

    /// Stores the listing and refreshes its timestamp.
    pub fn set_images(&self, images: &[ImageRecord]) {
        let images = images.to_vec();
        if !self.write(IMAGES_KEY, &images) {
            return;
        }
        let now = self.clock.now_millis().to_string();
        if let Err(e) = self.store.set(TIMESTAMP_KEY, &now) {
            warn!(error = %e, "Failed to store listing timestamp, dropping listing");
            self.remove(IMAGES_KEY);
            return;
        }
        debug!(count = images.len(), "Cached image listing");
    }

    /// Deletes the listing and its timestamp.
    pub fn clear_images(&self) {
        self.remove(IMAGES_KEY);
        self.remove(TIMESTAMP_KEY);
    }

    /// Age of the cached listing, if a readable timestamp exists.
    #[must_use]
    pub fn image_cache_age(&self) -> Option<Duration> {
        let stored_at: i64 = self.read_raw(TIMESTAMP_KEY)?.trim().parse().ok()?;
        let age = self.clock.now_millis().saturating_sub(stored_at).max(0);
        u64::try_from(age).ok().map(Duration::from_millis)
    }

    /// Returns the cached population range. Range entries have no TTL.
    pub fn get_range(&self) -> Option<ImageRange> {
        let raw = self.read_raw(RANGE_KEY)?;
        match decode::<ImageRange>(&raw) {
            Some(range) if range.max >= 1 => Some(range),
            _ => {
                warn!("Cached range is corrupt, discarding");
                self.clear_range();
                None
            }
        }
    }

    /// Stores the population range.
    pub fn set_range(&self, range: ImageRange) {
        if self.write(RANGE_KEY, &range) {
            debug!(max = range.max, "Cached population range");
        }
    }

    /// Deletes the population range.
    pub fn clear_range(&self) {
        self.remove(RANGE_KEY);
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Session store read failed");
                None
            }
        }
    }

    fn write<T: Serialize>(&self, key: &str, data: &T) -> bool {
        match self.try_write(key, data) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Session store write failed");
                false
            }
        }
    }

    fn try_write<T: Serialize>(&self, key: &str, data: &T) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&EnvelopeRef {
            version: SCHEMA_VERSION,
            data,
        })?;
        self.store.set(key, &payload)
    }

    fn remove(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!(key, error = %e, "Session store delete failed");
        }
    }
}

fn decode<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let envelope: Envelope<T> = serde_json::from_str(raw).ok()?;
    (envelope.version == SCHEMA_VERSION).then_some(envelope.data)
}
