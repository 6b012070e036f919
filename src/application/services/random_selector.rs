//! Uniform random selection over the whole image population.
//!
//! The population bound comes from the cached range, the range detector, or
//! a heuristic. A drawn address must pass an existence probe before it is
//! materialised; misses retry the whole operation within a fixed budget and
//! exhaustion falls back to an already-loaded image.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::application::config::GalleryConfig;
use crate::application::services::cache_store::CacheStore;
use crate::domain::entities::{ImageRecord, insert_dedup};
use crate::domain::errors::DiscoveryError;
use crate::domain::ports::DiscoveryPort;

/// Outcome of the population path of one selection.
enum PopulationDraw {
    Selected(Selection),
    /// Draw or probe budget spent; the loaded list may still serve.
    Exhausted,
    /// The bound cannot address any image; nothing is selected.
    Rejected,
}

/// Minimum heuristic bound used when the range cannot be detected.
pub const HEURISTIC_MIN_BOUND: u64 = 100;

/// Where a selection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOrigin {
    /// A verified draw from the population.
    Population {
        /// The drawn 1-based population index.
        population_index: u64,
        /// Operations spent, including the successful one.
        attempts: u32,
    },
    /// A random pick among already-loaded images.
    LoadedFallback,
}

/// Result of a random selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Index of the selected image inside `images`.
    pub index: usize,
    /// The image list, extended by the selected record if it was new.
    pub images: Vec<ImageRecord>,
    /// How the index was obtained.
    pub origin: SelectionOrigin,
}

impl Selection {
    /// The selected record.
    #[must_use]
    pub fn record(&self) -> Option<&ImageRecord> {
        self.images.get(self.index)
    }
}

/// Outcome of one draw loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Draw {
    /// The drawn value, if one differed from the excluded value.
    pub value: Option<u64>,
    /// Samples taken.
    pub samples: u32,
}

/// Samples uniformly from `[1, bound]` until the value differs from
/// `excluded`, taking at most `max_attempts` samples.
pub fn draw_excluding<R: Rng + ?Sized>(
    rng: &mut R,
    bound: u64,
    excluded: Option<u64>,
    max_attempts: u32,
) -> Draw {
    let mut samples = 0;
    while samples < max_attempts {
        samples += 1;
        let value = rng.random_range(1..=bound);
        if Some(value) != excluded {
            return Draw {
                value: Some(value),
                samples,
            };
        }
    }
    Draw {
        value: None,
        samples,
    }
}

/// Picks a uniformly random index in `0..len` other than `current`.
/// Returns `None` when there is no other index.
pub fn pick_other_index<R: Rng + ?Sized>(rng: &mut R, len: usize, current: usize) -> Option<usize> {
    if len <= 1 {
        return None;
    }
    if current >= len {
        return Some(rng.random_range(0..len));
    }
    let pick = rng.random_range(0..len - 1);
    Some(if pick >= current { pick + 1 } else { pick })
}

/// Heuristic population bound for `loaded` materialised images.
#[must_use]
pub fn heuristic_bound(loaded: usize) -> u64 {
    HEURISTIC_MIN_BOUND.max(2 * loaded as u64)
}

/// Draws random images from the population. Holds no gallery state; the
/// caller owns the in-flight flag and the list.
pub struct RandomSelector {
    discovery: Arc<dyn DiscoveryPort>,
    cache: CacheStore,
    config: GalleryConfig,
    rng: Mutex<StdRng>,
    detection_failed: AtomicBool,
}

impl std::fmt::Debug for RandomSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomSelector")
            .field("max_random_attempts", &self.config.max_random_attempts)
            .finish_non_exhaustive()
    }
}

impl RandomSelector {
    /// Creates a selector seeded from the OS.
    #[must_use]
    pub fn new(discovery: Arc<dyn DiscoveryPort>, cache: CacheStore, config: GalleryConfig) -> Self {
        Self::with_rng(discovery, cache, config, StdRng::from_os_rng())
    }

    /// Creates a selector with an explicit generator.
    #[must_use]
    pub fn with_rng(
        discovery: Arc<dyn DiscoveryPort>,
        cache: CacheStore,
        config: GalleryConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            discovery,
            cache,
            config,
            rng: Mutex::new(rng),
            detection_failed: AtomicBool::new(false),
        }
    }

    /// Resolves the population bound: cached range, then one detection
    /// (cached on success), then the heuristic.
    pub async fn resolve_bound(&self, loaded: usize) -> u64 {
        if let Some(range) = self.cache.get_range() {
            return range.max;
        }

        if self.detection_failed.load(Ordering::SeqCst) {
            return heuristic_bound(loaded);
        }

        match self.discovery.detect_range().await {
            Ok(range) => {
                info!(max = range.max, "Detected population range");
                if range.max >= 1 {
                    self.cache.set_range(range);
                }
                range.max
            }
            Err(e) => {
                self.detection_failed.store(true, Ordering::SeqCst);
                let bound = heuristic_bound(loaded);
                warn!(error = %e, bound, "Range detection failed, using heuristic bound");
                bound
            }
        }
    }

    /// Selects a random image other than the one at `current_index`.
    ///
    /// Returns `None` if `images` is empty or nothing else can be selected.
    pub async fn select(&self, images: &[ImageRecord], current_index: usize) -> Option<Selection> {
        if images.is_empty() {
            debug!("No images loaded, random selection unavailable");
            return None;
        }

        match self.select_from_population(images, current_index).await {
            Ok(PopulationDraw::Selected(selection)) => Some(selection),
            Ok(PopulationDraw::Rejected) => None,
            Ok(PopulationDraw::Exhausted) => {
                info!("Random draw exhausted, falling back to loaded images");
                self.fallback(images, current_index)
            }
            Err(e) => {
                warn!(error = %e, "Random selection failed, falling back to loaded images");
                self.fallback(images, current_index)
            }
        }
    }

    /// Uniform pick among loaded images other than `current_index`.
    #[must_use]
    pub fn fallback(&self, images: &[ImageRecord], current_index: usize) -> Option<Selection> {
        let index = pick_other_index(&mut *self.rng.lock(), images.len(), current_index)?;
        Some(Selection {
            index,
            images: images.to_vec(),
            origin: SelectionOrigin::LoadedFallback,
        })
    }

    async fn select_from_population(
        &self,
        images: &[ImageRecord],
        current_index: usize,
    ) -> Result<PopulationDraw, DiscoveryError> {
        let budget = self.config.max_random_attempts.max(1);
        let excluded = images
            .get(current_index)
            .and_then(ImageRecord::population_index);

        for attempt in 1..=budget {
            let bound = self.resolve_bound(images.len()).await;
            if bound < 1 {
                debug!(bound, "Population bound below 1, rejecting");
                return Ok(PopulationDraw::Rejected);
            }

            let draw = {
                let mut rng = self.rng.lock();
                draw_excluding(&mut *rng, bound, excluded, self.config.max_random_attempts)
            };
            let Some(target) = draw.value else {
                debug!(samples = draw.samples, "Draw loop exhausted");
                return Ok(PopulationDraw::Exhausted);
            };

            if !self.exists(target).await? {
                debug!(target, attempt, "Drawn image does not exist, retrying");
                continue;
            }

            let record = ImageRecord::for_population_index(target, self.discovery.path_for(target));
            let mut updated = images.to_vec();
            let index = insert_dedup(&mut updated, record);
            if index == current_index {
                debug!(target, attempt, "Drawn image is the current one, retrying");
                continue;
            }

            debug!(target, index, attempt, "Random image selected");
            return Ok(PopulationDraw::Selected(Selection {
                index,
                images: updated,
                origin: SelectionOrigin::Population {
                    population_index: target,
                    attempts: attempt,
                },
            }));
        }

        Ok(PopulationDraw::Exhausted)
    }

    async fn exists(&self, target: u64) -> Result<bool, DiscoveryError> {
        let timeout = self.config.probe_timeout();
        match tokio::time::timeout(timeout, self.discovery.probe_exists(target, timeout)).await {
            Ok(Ok(exists)) => Ok(exists),
            Ok(Err(e)) if e.is_transient() || matches!(e, DiscoveryError::NotFound { .. }) => {
                debug!(target, error = %e, "Existence probe failed, treating as missing");
                Ok(false)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                debug!(target, "Existence probe timed out");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::domain::entities::AspectRatio;
    use crate::domain::ports::mocks::{ManualClock, MockDiscovery};
    use crate::infrastructure::session::MemorySessionStore;

    fn rec(src: &str) -> ImageRecord {
        ImageRecord::new(src, src, None, AspectRatio::default())
    }

    fn cache() -> CacheStore {
        CacheStore::new(
            Arc::new(MemorySessionStore::new()),
            Arc::new(ManualClock::at(0)),
            Duration::from_millis(300_000),
        )
    }

    fn selector(discovery: Arc<MockDiscovery>, seed: u64) -> RandomSelector {
        RandomSelector::with_rng(
            discovery,
            cache(),
            GalleryConfig::default(),
            StdRng::seed_from_u64(seed),
        )
    }

    #[test]
    fn test_draw_never_returns_excluded_value() {
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let bound = 2 + seed % 9;
            let excluded = 1 + seed % bound;
            let draw = draw_excluding(&mut rng, bound, Some(excluded), 20);
            if let Some(value) = draw.value {
                assert_ne!(value, excluded);
                assert!((1..=bound).contains(&value));
            }
        }
    }

    #[test]
    fn test_draw_respects_attempt_bound() {
        let mut rng = StdRng::seed_from_u64(7);
        let draw = draw_excluding(&mut rng, 1, Some(1), 20);
        assert_eq!(draw, Draw { value: None, samples: 20 });
    }

    #[test]
    fn test_pick_other_index() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(pick_other_index(&mut rng, 0, 0), None);
        assert_eq!(pick_other_index(&mut rng, 1, 0), None);
        assert_eq!(pick_other_index(&mut rng, 2, 0), Some(1));
        assert_eq!(pick_other_index(&mut rng, 2, 1), Some(0));
        for _ in 0..100 {
            let pick = pick_other_index(&mut rng, 5, 2).unwrap();
            assert_ne!(pick, 2);
            assert!(pick < 5);
        }
    }

    #[test]
    fn test_heuristic_bound() {
        assert_eq!(heuristic_bound(0), 100);
        assert_eq!(heuristic_bound(50), 100);
        assert_eq!(heuristic_bound(60), 120);
    }

    #[tokio::test]
    async fn test_missing_target_exhausts_to_loaded_fallback() {
        let discovery = Arc::new(MockDiscovery::new(2).with_range(2).with_missing(2));
        let selector = selector(discovery.clone(), 1);
        let images = vec![rec("/1.jpg"), rec("/2.jpg")];

        let selection = selector.select(&images, 0).await.unwrap();

        assert_eq!(selection.index, 1);
        assert_eq!(selection.origin, SelectionOrigin::LoadedFallback);
        assert_eq!(selection.images, images);
        let probes = discovery.probe_calls();
        assert_eq!(probes.len(), 20);
        assert!(probes.iter().all(|&p| p == 2));
    }

    #[tokio::test]
    async fn test_verified_draw_is_appended() {
        let discovery = Arc::new(MockDiscovery::new(10));
        let selector = selector(discovery.clone(), 42);
        let images = vec![rec("/images/1.jpg"), rec("/images/2.jpg")];

        let selection = selector.select(&images, 0).await.unwrap();
        let SelectionOrigin::Population {
            population_index, ..
        } = selection.origin
        else {
            panic!("expected a population draw");
        };

        assert_ne!(population_index, 1);
        assert!((2..=10).contains(&population_index));
        let record = selection.record().unwrap();
        assert_eq!(record.src(), format!("/images/{population_index}.jpg"));
        if population_index == 2 {
            assert_eq!(selection.index, 1);
            assert_eq!(selection.images.len(), 2);
        } else {
            assert_eq!(selection.index, 2);
            assert_eq!(selection.images.len(), 3);
        }
    }

    #[tokio::test]
    async fn test_existing_record_is_reused() {
        let discovery = Arc::new(MockDiscovery::new(2).with_range(2));
        let selector = selector(discovery, 5);
        let images = vec![rec("/images/1.jpg"), rec("/images/2.jpg"), rec("/x.jpg")];

        let selection = selector.select(&images, 0).await.unwrap();
        assert_eq!(selection.index, 1);
        assert_eq!(selection.images, images);
    }

    #[tokio::test]
    async fn test_range_detected_once_and_cached() {
        let discovery = Arc::new(MockDiscovery::new(50));
        let selector = selector(discovery.clone(), 9);
        let images = vec![rec("/images/1.jpg"), rec("/images/2.jpg")];

        selector.select(&images, 0).await.unwrap();
        selector.select(&images, 1).await.unwrap();

        assert_eq!(discovery.detect_calls(), 1);
        assert_eq!(selector.cache.get_range().map(|r| r.max), Some(50));
    }

    #[tokio::test]
    async fn test_detector_failure_uses_heuristic_bound() {
        let discovery = Arc::new(MockDiscovery::new(500).with_failing_range());
        let selector = selector(discovery.clone(), 11);
        let images: Vec<_> = (1..=60).map(|i| rec(&format!("/images/{i}.jpg"))).collect();

        assert_eq!(selector.resolve_bound(images.len()).await, 120);
        for current in 0..10 {
            selector.select(&images, current).await.unwrap();
        }

        assert!(discovery.probe_calls().iter().all(|&p| (1..=120).contains(&p)));
        assert_eq!(discovery.detect_calls(), 1);
        assert!(selector.cache.get_range().is_none());
    }

    #[tokio::test]
    async fn test_empty_list_is_rejected() {
        let discovery = Arc::new(MockDiscovery::new(10));
        let selector = selector(discovery.clone(), 0);
        assert!(selector.select(&[], 0).await.is_none());
        assert!(discovery.probe_calls().is_empty());
    }

    #[tokio::test]
    async fn test_zero_bound_is_rejected_without_fallback() {
        let discovery = Arc::new(MockDiscovery::new(10).with_empty_range());
        let selector = selector(discovery.clone(), 0);
        let images = vec![rec("/images/1.jpg"), rec("/images/2.jpg"), rec("/images/3.jpg")];

        assert!(selector.select(&images, 0).await.is_none());
        assert!(discovery.probe_calls().is_empty());
    }

    #[tokio::test]
    async fn test_single_image_without_population_is_absent() {
        let discovery = Arc::new(MockDiscovery::new(10).with_everything_missing());
        let selector = selector(discovery, 0);
        assert!(selector.select(&[rec("/images/1.jpg")], 0).await.is_none());
    }

    #[tokio::test]
    async fn test_never_selects_current_when_index_unknown() {
        let discovery = Arc::new(MockDiscovery::new(1).with_range(1));
        let selector = selector(discovery, 0);
        let current = ImageRecord::new(
            "cover",
            "/images/1.jpg",
            Some("cover.png".into()),
            AspectRatio::default(),
        );
        let images = vec![current, rec("/other.jpg")];

        let selection = selector.select(&images, 0).await.unwrap();
        assert_eq!(selection.index, 1);
        assert_eq!(selection.origin, SelectionOrigin::LoadedFallback);
    }
}
