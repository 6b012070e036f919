//! Gallery tunables.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A tunable combination the loader or selector cannot run with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TunableError {
    /// A count that must address at least one item is zero.
    #[error("{0} must be at least 1")]
    Zero(&'static str),

    /// Later stages would request fewer images than earlier ones and be discarded.
    #[error("batch sizes must not shrink across stages ({initial}, {second}, {last})")]
    ShrinkingBatches {
        /// Immediate stage size.
        initial: usize,
        /// Expand stage size.
        second: usize,
        /// Finalize stage size.
        last: usize,
    },

    /// The finalize stage would fire before the expand stage.
    #[error("final_stage_delay_ms ({last}) is earlier than second_stage_delay_ms ({second})")]
    StageOrder {
        /// Expand stage delay.
        second: u64,
        /// Finalize stage delay.
        last: u64,
    },
}

/// Static tunables for loading, caching, preloading, and random selection.
///
/// Durations are stored in milliseconds so the TOML stays readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GalleryConfig {
    /// Size of the immediate first batch.
    pub initial_batch_size: usize,
    /// Size of the expand batch.
    pub second_batch_size: usize,
    /// Size of the finalize batch.
    pub final_batch_size: usize,
    /// Delay from activation to the expand stage.
    pub second_stage_delay_ms: u64,
    /// Delay from activation to the finalize stage.
    pub final_stage_delay_ms: u64,
    /// Neighbour offsets considered by the preload window.
    pub preload_window: usize,
    /// How many of the window's indices are fetched.
    pub preload_fetch_count: usize,
    /// Debounce before warming the immediate neighbours.
    pub preload_neighbor_delay_ms: u64,
    /// Maximum age of the cached listing.
    pub cache_ttl_ms: u64,
    /// Draw budget per selection, also the probe retry budget.
    pub max_random_attempts: u32,
    /// Bound on a single existence probe.
    pub probe_timeout_ms: u64,
    /// Pause between selection completion and accepting the next draw.
    pub shuffle_completion_delay_ms: u64,
    /// Upper bound on waiting for the selected image to preload.
    pub shuffle_preload_timeout_ms: u64,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            initial_batch_size: 5,
            second_batch_size: 25,
            final_batch_size: 100,
            second_stage_delay_ms: 1000,
            final_stage_delay_ms: 3000,
            preload_window: 3,
            preload_fetch_count: 3,
            preload_neighbor_delay_ms: 200,
            cache_ttl_ms: 300_000,
            max_random_attempts: 20,
            probe_timeout_ms: 2000,
            shuffle_completion_delay_ms: 100,
            shuffle_preload_timeout_ms: 1000,
        }
    }
}

impl GalleryConfig {
    /// Checks that the stages grow monotonically and every budget is usable.
    ///
    /// # Errors
    ///
    /// Returns the first offending tunable.
    pub fn validate(&self) -> Result<(), TunableError> {
        for (name, value) in [
            ("initial_batch_size", self.initial_batch_size),
            ("preload_fetch_count", self.preload_fetch_count),
        ] {
            if value == 0 {
                return Err(TunableError::Zero(name));
            }
        }
        if self.max_random_attempts == 0 {
            return Err(TunableError::Zero("max_random_attempts"));
        }
        if self.initial_batch_size > self.second_batch_size
            || self.second_batch_size > self.final_batch_size
        {
            return Err(TunableError::ShrinkingBatches {
                initial: self.initial_batch_size,
                second: self.second_batch_size,
                last: self.final_batch_size,
            });
        }
        if self.final_stage_delay_ms < self.second_stage_delay_ms {
            return Err(TunableError::StageOrder {
                second: self.second_stage_delay_ms,
                last: self.final_stage_delay_ms,
            });
        }
        Ok(())
    }

    /// Delay before the expand stage.
    #[must_use]
    pub const fn second_stage_delay(&self) -> Duration {
        Duration::from_millis(self.second_stage_delay_ms)
    }

    /// Delay before the finalize stage.
    #[must_use]
    pub const fn final_stage_delay(&self) -> Duration {
        Duration::from_millis(self.final_stage_delay_ms)
    }

    /// Neighbour warm debounce.
    #[must_use]
    pub const fn preload_neighbor_delay(&self) -> Duration {
        Duration::from_millis(self.preload_neighbor_delay_ms)
    }

    /// Listing TTL.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Existence probe bound.
    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Post-completion pause.
    #[must_use]
    pub const fn shuffle_completion_delay(&self) -> Duration {
        Duration::from_millis(self.shuffle_completion_delay_ms)
    }

    /// Selected-image preload bound.
    #[must_use]
    pub const fn shuffle_preload_timeout(&self) -> Duration {
        Duration::from_millis(self.shuffle_preload_timeout_ms)
    }
}
