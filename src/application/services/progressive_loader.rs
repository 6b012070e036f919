//! Progressive batch loader.
//!
//! Publishes a small batch immediately, then a medium and a large batch at
//! fixed offsets from activation. Later batches only land when they are
//! strictly longer than what the sink already holds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::config::GalleryConfig;
use crate::application::services::cache_store::CacheStore;
use crate::domain::entities::ImageRecord;
use crate::domain::ports::DiscoveryPort;

/// Loading stage of one activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStage {
    /// First paint.
    Immediate,
    /// Medium follow-up batch.
    Expand,
    /// Large final batch.
    Finalize,
}

impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate => write!(f, "immediate"),
            Self::Expand => write!(f, "expand"),
            Self::Finalize => write!(f, "finalize"),
        }
    }
}

/// Receiver of loaded batches. Implemented by the gallery controller, which
/// owns the list and applies the growth guard.
pub trait BatchSink: Send + Sync {
    /// Offers a freshly fetched batch. Returns true if it was published.
    fn offer(&self, stage: LoadStage, batch: Vec<ImageRecord>) -> bool;

    /// Publishes a listing restored from cache and clears `loading`.
    fn publish_cached(&self, images: Vec<ImageRecord>);

    /// Updates the `loading` flag.
    fn set_loading(&self, loading: bool);

    /// Returns true once a non-empty list has been published.
    fn has_loaded(&self) -> bool;
}

#[derive(Debug, Default)]
struct CancelSignal {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Disposer returned by [`ProgressiveLoader::activate`].
///
/// Dropping the handle does not cancel anything; call [`dispose`](Self::dispose).
#[derive(Debug, Clone)]
pub struct LoaderHandle {
    signal: Arc<CancelSignal>,
    staged: bool,
}

impl LoaderHandle {
    fn inert() -> Self {
        Self {
            signal: Arc::new(CancelSignal::default()),
            staged: false,
        }
    }

    /// Prevents stages that have not fired yet from running. Stages already
    /// fetching complete normally.
    pub fn dispose(&self) {
        if !self.signal.is_cancelled() {
            debug!("Disposing progressive loader");
        }
        self.signal.cancel();
    }

    /// Returns true if [`dispose`](Self::dispose) was called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Returns true if this activation scheduled network stages, false if it
    /// was served from cache or skipped.
    #[must_use]
    pub const fn is_staged(&self) -> bool {
        self.staged
    }
}

/// Schedules progressive batch fetches.
#[derive(Clone)]
pub struct ProgressiveLoader {
    discovery: Arc<dyn DiscoveryPort>,
    cache: CacheStore,
    config: GalleryConfig,
}

impl std::fmt::Debug for ProgressiveLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressiveLoader")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct StageContext {
    discovery: Arc<dyn DiscoveryPort>,
    cache: CacheStore,
    sink: Arc<dyn BatchSink>,
    signal: Arc<CancelSignal>,
}

impl ProgressiveLoader {
    /// Creates a loader.
    #[must_use]
    pub fn new(discovery: Arc<dyn DiscoveryPort>, cache: CacheStore, config: GalleryConfig) -> Self {
        Self {
            discovery,
            cache,
            config,
        }
    }

    /// Starts one loading activation against `sink`.
    ///
    /// Must be called from within a tokio runtime. If the sink already holds
    /// a list this is a no-op; if the cache holds a fresh listing it is
    /// published at once and no stage is scheduled.
    pub fn activate(&self, sink: Arc<dyn BatchSink>) -> LoaderHandle {
        if sink.has_loaded() {
            debug!("Gallery already loaded, skipping activation");
            return LoaderHandle::inert();
        }

        if let Some(images) = self.cache.get_images().filter(|images| !images.is_empty()) {
            info!(count = images.len(), "Serving gallery from cache");
            sink.publish_cached(images);
            return LoaderHandle::inert();
        }

        sink.set_loading(true);
        let start = Instant::now();
        let signal = Arc::new(CancelSignal::default());
        let ctx = Arc::new(StageContext {
            discovery: self.discovery.clone(),
            cache: self.cache.clone(),
            sink,
            signal: signal.clone(),
        });

        debug!(
            initial = self.config.initial_batch_size,
            second = self.config.second_batch_size,
            last = self.config.final_batch_size,
            "Activating progressive loader"
        );

        let immediate = ctx.clone();
        let size = self.config.initial_batch_size;
        tokio::spawn(async move {
            immediate.run(LoadStage::Immediate, size).await;
        });

        Self::schedule(
            ctx.clone(),
            LoadStage::Expand,
            self.config.second_batch_size,
            start + self.config.second_stage_delay(),
        );
        Self::schedule(
            ctx,
            LoadStage::Finalize,
            self.config.final_batch_size,
            start + self.config.final_stage_delay(),
        );

        LoaderHandle {
            signal,
            staged: true,
        }
    }

    fn schedule(ctx: Arc<StageContext>, stage: LoadStage, size: usize, at: Instant) {
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep_until(at) => {}
                () = ctx.signal.wait() => {
                    debug!(%stage, "Stage cancelled before firing");
                    if stage == LoadStage::Finalize {
                        ctx.sink.set_loading(false);
                    }
                    return;
                }
            }
            ctx.run(stage, size).await;
            if stage == LoadStage::Finalize {
                ctx.sink.set_loading(false);
            }
        });
    }
}

impl StageContext {
    async fn run(&self, stage: LoadStage, size: usize) {
        let result = match stage {
            LoadStage::Immediate => self.discovery.list_initial(size).await,
            LoadStage::Expand | LoadStage::Finalize => self.discovery.list_up_to(size).await,
        };

        let batch = match result {
            Ok(batch) => batch,
            Err(e) => {
                warn!(%stage, error = %e, "Batch fetch failed, keeping earlier results");
                return;
            }
        };

        let count = batch.len();
        let snapshot = batch.clone();
        if self.sink.offer(stage, batch) {
            info!(%stage, count, "Published image batch");
            self.cache.set_images(&snapshot);
        } else {
            debug!(%stage, count, "Batch not larger than current list, skipped");
        }
    }
}
