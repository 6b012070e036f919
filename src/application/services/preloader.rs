//! Neighbour preloading around the cursor.

use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::application::config::GalleryConfig;
use crate::domain::entities::ImageRecord;
use crate::domain::ports::ImageFetchPort;

/// Priority-ordered indices to warm around `current`.
///
/// Current, next, and previous come first, then symmetric pairs at offsets
/// `2..=window` (forward before backward). Indices wrap modulo `len` and
/// appear once.
#[must_use]
pub fn preload_order(current: usize, len: usize, window: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let current = current % len;
    let forward = |offset: usize| (current + offset) % len;
    let backward = |offset: usize| (current + len - offset % len) % len;

    let mut order = Vec::with_capacity(2 * window.max(1) + 1);
    let mut push = |index: usize| {
        if !order.contains(&index) {
            order.push(index);
        }
    };

    push(current);
    push(forward(1));
    push(backward(1));
    for offset in 2..=window {
        push(forward(offset));
        push(backward(offset));
    }
    order
}

/// Best-effort cache warming for images near the cursor.
pub struct Preloader {
    fetcher: Arc<dyn ImageFetchPort>,
    config: GalleryConfig,
    neighbor_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Preloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preloader")
            .field("window", &self.config.preload_window)
            .finish_non_exhaustive()
    }
}

impl Preloader {
    /// Creates a preloader.
    #[must_use]
    pub fn new(fetcher: Arc<dyn ImageFetchPort>, config: GalleryConfig) -> Self {
        Self {
            fetcher,
            config,
            neighbor_task: Mutex::new(None),
        }
    }

    /// Warms the highest-priority window entries concurrently.
    /// Returns how many fetches succeeded.
    pub async fn warm_window(&self, images: &[ImageRecord], current: usize) -> usize {
        let srcs: Vec<String> = preload_order(current, images.len(), self.config.preload_window)
            .into_iter()
            .take(self.config.preload_fetch_count)
            .filter_map(|index| images.get(index).map(|img| img.src().to_string()))
            .collect();
        warm_all(&self.fetcher, srcs).await
    }

    /// Warms a single address, ignoring failures.
    pub async fn warm_one(&self, src: &str) -> bool {
        warm_all(&self.fetcher, vec![src.to_string()]).await == 1
    }

    /// Reacts to a cursor move: warms the window now and, after the
    /// configured delay, the immediate neighbours. A pending neighbour warm
    /// from an earlier move is cancelled.
    pub fn on_cursor_change(&self, images: &[ImageRecord], current: usize) {
        let len = images.len();
        if len == 0 {
            return;
        }

        let window: Vec<String> = preload_order(current, len, self.config.preload_window)
            .into_iter()
            .take(self.config.preload_fetch_count)
            .filter_map(|index| images.get(index).map(|img| img.src().to_string()))
            .collect();
        let fetcher = self.fetcher.clone();
        tokio::spawn(async move {
            warm_all(&fetcher, window).await;
        });

        let current = current % len;
        let neighbors = vec![
            images[(current + 1) % len].src().to_string(),
            images[(current + len - 1) % len].src().to_string(),
        ];
        let fetcher = self.fetcher.clone();
        let delay = self.config.preload_neighbor_delay();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(async move {
                warm_all(&fetcher, neighbors).await;
            });
        });

        if let Some(previous) = self.neighbor_task.lock().replace(task) {
            previous.abort();
            trace!("Rescheduled neighbour warm");
        }
    }

    /// Cancels a pending neighbour warm, if any.
    pub fn cancel_pending(&self) {
        if let Some(task) = self.neighbor_task.lock().take() {
            task.abort();
            debug!("Cancelled pending neighbour warm");
        }
    }
}

impl Drop for Preloader {
    fn drop(&mut self) {
        if let Some(task) = self.neighbor_task.get_mut().take() {
            task.abort();
        }
    }
}

async fn warm_all(fetcher: &Arc<dyn ImageFetchPort>, srcs: Vec<String>) -> usize {
    let results = join_all(srcs.iter().map(|src| fetcher.warm(src))).await;
    results
        .into_iter()
        .zip(&srcs)
        .filter(|(result, src)| match result {
            Ok(()) => true,
            Err(e) => {
                trace!(src = %src, error = %e, "Preload failed");
                false
            }
        })
        .count()
}
