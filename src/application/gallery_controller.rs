//! Gallery controller: the single owner of gallery state.
//!
//! Composes the cache, progressive loader, random selector, and preloader,
//! and publishes every state change to subscribers through a watch channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::application::config::GalleryConfig;
use crate::application::services::{
    BatchSink, CacheStore, LoadStage, LoaderHandle, Preloader, ProgressiveLoader, RandomSelector,
    Selection,
};
use crate::domain::entities::{GallerySnapshot, GalleryState, ImageRecord};
use crate::domain::ports::{Clock, DiscoveryPort, ImageFetchPort, SessionStorePort};

/// Single-fire latch; the first caller of [`try_fire`](Self::try_fire) wins.
#[derive(Debug, Default)]
pub struct CompletionLatch {
    fired: AtomicBool,
}

impl CompletionLatch {
    /// Returns true for exactly one caller.
    pub fn try_fire(&self) -> bool {
        !self.fired.swap(true, Ordering::SeqCst)
    }

    /// Returns true once fired.
    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

struct GalleryCore {
    state: Mutex<GalleryState>,
    snapshot_tx: watch::Sender<GallerySnapshot>,
}

impl GalleryCore {
    fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(GallerySnapshot::default());
        Self {
            state: Mutex::new(GalleryState::new()),
            snapshot_tx,
        }
    }

    fn read<R>(&self, f: impl FnOnce(&GalleryState) -> R) -> R {
        f(&self.state.lock())
    }

    fn update<R>(&self, f: impl FnOnce(&mut GalleryState) -> R) -> R {
        let mut state = self.state.lock();
        let result = f(&mut state);
        let snapshot = state.snapshot();
        drop(state);
        self.snapshot_tx.send_replace(snapshot);
        result
    }
}

impl BatchSink for GalleryCore {
    fn offer(&self, stage: LoadStage, batch: Vec<ImageRecord>) -> bool {
        self.update(|state| {
            let before = state.len();
            let published = state.offer_batch(batch);
            if published {
                debug!(%stage, before, after = state.len(), "Gallery list grew");
            }
            published
        })
    }

    fn publish_cached(&self, images: Vec<ImageRecord>) {
        self.update(|state| {
            state.merge(images);
            state.set_loading(false);
        });
    }

    fn set_loading(&self, loading: bool) {
        self.update(|state| state.set_loading(loading));
    }

    fn has_loaded(&self) -> bool {
        self.read(GalleryState::has_loaded)
    }
}

/// Collaborators a controller is built from.
pub struct GalleryDeps {
    /// Discovery service.
    pub discovery: Arc<dyn DiscoveryPort>,
    /// Session store shared by controllers of one session.
    pub store: Arc<dyn SessionStorePort>,
    /// Image fetcher used for preloading.
    pub fetcher: Arc<dyn ImageFetchPort>,
    /// Wall clock for cache ages.
    pub clock: Arc<dyn Clock>,
}

/// Stateful gallery consumed by the rendering layer.
pub struct GalleryController {
    core: Arc<GalleryCore>,
    discovery: Arc<dyn DiscoveryPort>,
    cache: CacheStore,
    loader: ProgressiveLoader,
    loader_handle: Mutex<Option<LoaderHandle>>,
    selector: RandomSelector,
    preloader: Arc<Preloader>,
    config: GalleryConfig,
}

impl std::fmt::Debug for GalleryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GalleryController")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl GalleryController {
    /// Creates a controller with an OS-seeded random selector.
    #[must_use]
    pub fn new(deps: GalleryDeps, config: GalleryConfig) -> Self {
        let cache = CacheStore::new(deps.store.clone(), deps.clock.clone(), config.cache_ttl());
        let selector = RandomSelector::new(deps.discovery.clone(), cache.clone(), config.clone());
        Self::with_selector(deps, config, selector)
    }

    /// Creates a controller around an explicit selector.
    #[must_use]
    pub fn with_selector(deps: GalleryDeps, config: GalleryConfig, selector: RandomSelector) -> Self {
        let cache = CacheStore::new(deps.store, deps.clock, config.cache_ttl());
        let loader = ProgressiveLoader::new(deps.discovery.clone(), cache.clone(), config.clone());
        let preloader = Arc::new(Preloader::new(deps.fetcher, config.clone()));
        Self {
            core: Arc::new(GalleryCore::new()),
            discovery: deps.discovery,
            cache,
            loader,
            loader_handle: Mutex::new(None),
            selector,
            preloader,
            config,
        }
    }

    /// Starts loading. Returns false if the gallery is already loaded or a
    /// previous activation is still running.
    pub fn activate(&self) -> bool {
        let mut handle = self.loader_handle.lock();
        if self.core.has_loaded() {
            debug!("Activation skipped, gallery already loaded");
            return false;
        }
        if let Some(existing) = handle.as_ref()
            && existing.is_staged()
            && !existing.is_disposed()
        {
            debug!("Activation skipped, loader already running");
            return false;
        }

        let sink: Arc<dyn BatchSink> = self.core.clone();
        *handle = Some(self.loader.activate(sink));
        true
    }

    /// Cancels pending loader stages and the pending neighbour warm.
    pub fn dispose(&self) {
        if let Some(handle) = self.loader_handle.lock().as_ref() {
            handle.dispose();
        }
        self.preloader.cancel_pending();
    }

    /// Subscribes to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GallerySnapshot> {
        self.core.snapshot_tx.subscribe()
    }

    /// Returns a copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> GallerySnapshot {
        self.core.read(GalleryState::snapshot)
    }

    /// Number of images materialised so far.
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.core.read(GalleryState::len)
    }

    /// The current cursor.
    #[must_use]
    pub fn current_index(&self) -> usize {
        self.core.read(GalleryState::current_index)
    }

    /// Record under the cursor.
    #[must_use]
    pub fn current(&self) -> Option<ImageRecord> {
        self.core.read(|state| state.current().cloned())
    }

    /// Returns whether batches are still loading.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.core.read(GalleryState::is_loading)
    }

    /// Returns whether a random selection is in flight.
    #[must_use]
    pub fn is_shuffle_loading(&self) -> bool {
        self.core.read(GalleryState::is_shuffle_loading)
    }

    /// Moves to the next image. Returns the new cursor, or `None` while a
    /// transition or shuffle is in flight.
    pub fn next(&self) -> Option<usize> {
        let index = self.core.update(GalleryState::step_forward)?;
        self.after_cursor_change(index);
        Some(index)
    }

    /// Moves to the previous image.
    pub fn prev(&self) -> Option<usize> {
        let index = self.core.update(GalleryState::step_backward)?;
        self.after_cursor_change(index);
        Some(index)
    }

    /// Opens the image at `index`.
    pub fn open(&self, index: usize) -> bool {
        let moved = self.core.update(|state| {
            !state.is_shuffle_loading() && state.set_current_index(index)
        });
        if moved {
            self.after_cursor_change(index);
        }
        moved
    }

    /// Marks a rendering transition as started.
    pub fn begin_transition(&self) {
        self.core.update(|state| state.set_transitioning(true));
    }

    /// Marks a rendering transition as finished.
    pub fn end_transition(&self) {
        self.core.update(|state| state.set_transitioning(false));
    }

    /// Jumps to a random image from the whole population.
    ///
    /// Returns the new cursor, or `None` if a selection is already in flight,
    /// nothing is loaded, or no other image could be found.
    pub async fn select_random(&self) -> Option<usize> {
        let Some(claim) = ShuffleClaim::acquire(&self.core) else {
            debug!("Random selection rejected");
            return None;
        };
        let (images, current) = self
            .core
            .read(|state| (state.images().to_vec(), state.current_index()));

        let selection = self.selector.select(&images, current).await?;

        let Some((index, src)) = self.apply_selection(&selection) else {
            warn!("Selection did not resolve to a record");
            return None;
        };

        info!(index, src = %src, origin = ?selection.origin, "Random image selected");
        claim.hand_off();
        self.finish_shuffle(src);
        self.after_cursor_change(index);
        Some(index)
    }

    fn apply_selection(&self, selection: &Selection) -> Option<(usize, String)> {
        let record = selection.record()?.clone();
        let src = record.src().to_string();
        let index = self.core.update(|state| {
            let index = state.insert(record);
            state.set_current_index(index);
            index
        });
        Some((index, src))
    }

    fn finish_shuffle(&self, src: String) {
        let latch = Arc::new(CompletionLatch::default());
        let delay = self.config.shuffle_completion_delay();

        let preloader = self.preloader.clone();
        let core = self.core.clone();
        let preload_latch = latch.clone();
        tokio::spawn(async move {
            preloader.warm_one(&src).await;
            complete_shuffle(&core, &preload_latch, delay, "preload").await;
        });

        let core = self.core.clone();
        let timeout = self.config.shuffle_preload_timeout();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            complete_shuffle(&core, &latch, delay, "timer").await;
        });
    }

    fn after_cursor_change(&self, index: usize) {
        let images = self.core.read(|state| state.images().to_vec());
        self.preloader.on_cursor_change(&images, index);
    }

    /// Detected population bound, if known.
    #[must_use]
    pub fn population_bound(&self) -> Option<u64> {
        self.cache.get_range().map(|range| range.max)
    }

    /// Total available images: the detected bound, else the service's
    /// estimate, else the materialised count.
    pub async fn total_available(&self) -> u64 {
        if let Some(max) = self.population_bound() {
            return max;
        }
        match self.discovery.estimate_count().await {
            Ok(count) => count,
            Err(e) => {
                debug!(error = %e, "Count estimate unavailable");
                self.image_count() as u64
            }
        }
    }

    /// Materialises the whole population. Returns how many records were added.
    pub async fn load_all(&self) -> usize {
        let all = match self.discovery.list_all_via_range_detection().await {
            Ok(all) => all,
            Err(e) => {
                warn!(error = %e, "Full listing failed");
                return 0;
            }
        };

        let (added, images) = self.core.update(|state| {
            let added = state.merge(all);
            (added, state.images().to_vec())
        });
        if added > 0 {
            self.cache.set_images(&images);
            info!(added, total = images.len(), "Loaded full population");
        }
        added
    }

    /// The tunables in use.
    #[must_use]
    pub const fn config(&self) -> &GalleryConfig {
        &self.config
    }
}

/// Holds `shuffle_loading` for one selection and releases it when dropped,
/// including when the selecting future is dropped mid-flight.
struct ShuffleClaim<'a> {
    core: &'a GalleryCore,
    armed: bool,
}

impl<'a> ShuffleClaim<'a> {
    fn acquire(core: &'a GalleryCore) -> Option<Self> {
        let claimed = core.update(|state| !state.is_empty() && state.try_begin_shuffle());
        claimed.then_some(Self { core, armed: true })
    }

    /// Leaves the flag set; the completion latch clears it.
    fn hand_off(mut self) {
        self.armed = false;
    }
}

impl Drop for ShuffleClaim<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.core.update(GalleryState::end_shuffle);
        }
    }
}

async fn complete_shuffle(
    core: &GalleryCore,
    latch: &CompletionLatch,
    delay: Duration,
    source: &'static str,
) {
    if !latch.try_fire() {
        return;
    }
    debug!(source, "Shuffle completed");
    tokio::time::sleep(delay).await;
    core.update(GalleryState::end_shuffle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::domain::ports::mocks::{ManualClock, MockDiscovery, RecordingFetcher};
    use crate::infrastructure::session::MemorySessionStore;

    struct Fixture {
        controller: GalleryController,
        discovery: Arc<MockDiscovery>,
        store: Arc<MemorySessionStore>,
        fetcher: Arc<RecordingFetcher>,
    }

    fn fixture(discovery: MockDiscovery) -> Fixture {
        let discovery = Arc::new(discovery);
        let store = Arc::new(MemorySessionStore::new());
        let fetcher = Arc::new(RecordingFetcher::default());
        let clock = Arc::new(ManualClock::at(1_000));
        let config = GalleryConfig::default();
        let selector = RandomSelector::with_rng(
            discovery.clone(),
            CacheStore::new(store.clone(), clock.clone(), config.cache_ttl()),
            config.clone(),
            StdRng::seed_from_u64(17),
        );
        let deps = GalleryDeps {
            discovery: discovery.clone(),
            store: store.clone(),
            fetcher: fetcher.clone(),
            clock,
        };
        Fixture {
            controller: GalleryController::with_selector(deps, config, selector),
            discovery,
            store,
            fetcher,
        }
    }

    async fn loaded(discovery: MockDiscovery) -> Fixture {
        let fx = fixture(discovery);
        assert!(fx.controller.activate());
        tokio::time::sleep(Duration::from_millis(3100)).await;
        fx
    }

    #[test]
    fn test_latch_fires_once() {
        let latch = CompletionLatch::default();
        assert!(!latch.is_fired());
        assert!(latch.try_fire());
        assert!(!latch.try_fire());
        assert!(latch.is_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activation_publishes_growing_snapshots() {
        let fx = fixture(MockDiscovery::new(500));
        let mut rx = fx.controller.subscribe();

        assert!(fx.controller.activate());
        assert!(!fx.controller.activate());

        let mut lengths = Vec::new();
        while lengths.last() != Some(&100) {
            rx.changed().await.unwrap();
            let len = rx.borrow_and_update().images.len();
            if len > 0 && lengths.last() != Some(&len) {
                lengths.push(len);
            }
        }
        assert_eq!(lengths, vec![5, 25, 100]);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!fx.controller.is_loading());
        assert!(!fx.controller.activate());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_controller_reuses_cache() {
        let first = loaded(MockDiscovery::new(500)).await;
        assert_eq!(first.controller.image_count(), 100);

        let discovery = Arc::new(MockDiscovery::new(500));
        let deps = GalleryDeps {
            discovery: discovery.clone(),
            store: first.store.clone(),
            fetcher: Arc::new(RecordingFetcher::default()),
            clock: Arc::new(ManualClock::at(1_000)),
        };
        let second = GalleryController::new(deps, GalleryConfig::default());
        assert!(second.activate());
        assert_eq!(second.image_count(), 100);
        assert!(!second.is_loading());
        assert!(discovery.list_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_wraps_and_preloads() {
        let fx = loaded(MockDiscovery::new(3)).await;
        assert_eq!(fx.controller.image_count(), 3);

        assert_eq!(fx.controller.prev(), Some(2));
        assert_eq!(fx.controller.next(), Some(0));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(fx.fetcher.warmed().contains(&"/images/1.jpg".to_string()));

        fx.controller.begin_transition();
        assert_eq!(fx.controller.next(), None);
        fx.controller.end_transition();
        assert_eq!(fx.controller.next(), Some(1));
        assert!(fx.controller.open(2));
        assert!(!fx.controller.open(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_random_moves_cursor_and_releases_flag() {
        let fx = loaded(MockDiscovery::new(5).with_range(40)).await;

        let index = fx.controller.select_random().await.unwrap();
        assert_eq!(fx.controller.current_index(), index);
        assert_ne!(index, 0);
        assert!(fx.controller.is_shuffle_loading());

        assert_eq!(fx.controller.select_random().await, None);
        assert_eq!(fx.controller.next(), None);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!fx.controller.is_shuffle_loading());
        assert_eq!(fx.controller.population_bound(), Some(40));
        assert_eq!(fx.controller.total_available().await, 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_random_keeps_src_unique() {
        let fx = loaded(MockDiscovery::new(5).with_range(8)).await;

        for _ in 0..12 {
            fx.controller.select_random().await;
            tokio::time::sleep(Duration::from_millis(200)).await;
        }

        let snapshot = fx.controller.snapshot();
        let mut srcs: Vec<_> = snapshot.images.iter().map(ImageRecord::src).collect();
        let total = srcs.len();
        srcs.sort_unstable();
        srcs.dedup();
        assert_eq!(srcs.len(), total);
        assert!(total <= 8);
        assert!(snapshot.current_index < total);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_selection_releases_flag() {
        let fx = loaded(
            MockDiscovery::new(5)
                .with_range(40)
                .with_probe_delay(Duration::from_millis(1500)),
        )
        .await;

        let abandoned =
            tokio::time::timeout(Duration::from_millis(500), fx.controller.select_random()).await;
        assert!(abandoned.is_err());
        assert!(!fx.controller.is_shuffle_loading());
        assert_eq!(fx.controller.next(), Some(1));

        let index = fx.controller.select_random().await;
        assert!(index.is_some());
        assert!(fx.controller.is_shuffle_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_selection_releases_flag() {
        let fx = loaded(MockDiscovery::new(5).with_empty_range()).await;

        assert_eq!(fx.controller.select_random().await, None);
        assert!(!fx.controller.is_shuffle_loading());
        assert_eq!(fx.controller.current_index(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_random_absent_clears_flag() {
        let fx = loaded(MockDiscovery::new(1).with_everything_missing()).await;

        assert_eq!(fx.controller.select_random().await, None);
        assert!(!fx.controller.is_shuffle_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_random_before_load_is_rejected() {
        let fx = fixture(MockDiscovery::new(10));
        assert_eq!(fx.controller.select_random().await, None);
        assert!(fx.discovery.probe_calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_all_merges_population() {
        let fx = loaded(MockDiscovery::new(5).with_range(30)).await;
        assert_eq!(fx.controller.load_all().await, 25);
        assert_eq!(fx.controller.image_count(), 30);
        assert_eq!(fx.controller.load_all().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_pending_stages() {
        let fx = fixture(MockDiscovery::new(500));
        fx.controller.activate();
        tokio::time::sleep(Duration::from_millis(10)).await;
        fx.controller.dispose();

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(fx.controller.image_count(), 5);
        assert!(!fx.controller.is_loading());
        assert_eq!(fx.discovery.list_calls(), vec![5]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_available_falls_back_to_estimate() {
        let fx = loaded(MockDiscovery::new(7)).await;
        assert_eq!(fx.controller.population_bound(), None);
        assert_eq!(fx.controller.total_available().await, 7);
    }
}
