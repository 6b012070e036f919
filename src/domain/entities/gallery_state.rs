//! Controller-owned gallery state.

use serde::Serialize;

use super::image::ImageRecord;

/// Inserts `record` unless an element with the same `src` already exists.
///
/// Returns the index of the record inside `images`; existing elements are
/// never duplicated or reordered.
pub fn insert_dedup(images: &mut Vec<ImageRecord>, record: ImageRecord) -> usize {
    if let Some(existing) = images.iter().position(|img| img.src() == record.src()) {
        return existing;
    }
    images.push(record);
    images.len() - 1
}

/// Appends every record of `incoming` not already present, preserving order.
/// Returns how many were appended.
pub fn merge_dedup(images: &mut Vec<ImageRecord>, incoming: Vec<ImageRecord>) -> usize {
    let before = images.len();
    for record in incoming {
        insert_dedup(images, record);
    }
    images.len() - before
}

/// Collapses duplicate `src` values, keeping the first occurrence.
#[must_use]
pub fn dedup_by_src(incoming: Vec<ImageRecord>) -> Vec<ImageRecord> {
    let mut out = Vec::with_capacity(incoming.len());
    merge_dedup(&mut out, incoming);
    out
}

/// Authoritative gallery state.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Default)]
pub struct GalleryState {
    images: Vec<ImageRecord>,
    current_index: usize,
    loading: bool,
    shuffle_loading: bool,
    has_loaded: bool,
    transitioning: bool,
}

impl GalleryState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ordered image list.
    #[must_use]
    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    /// Number of materialised images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    /// Returns true when nothing has been materialised yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Returns the cursor.
    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    /// Returns the record under the cursor.
    #[must_use]
    pub fn current(&self) -> Option<&ImageRecord> {
        self.images.get(self.current_index)
    }

    /// Returns whether a batch load is running.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Returns whether a random selection is in flight.
    #[must_use]
    pub const fn is_shuffle_loading(&self) -> bool {
        self.shuffle_loading
    }

    /// Returns whether a non-empty list has ever been published.
    #[must_use]
    pub const fn has_loaded(&self) -> bool {
        self.has_loaded
    }

    /// Returns whether a rendering transition is in flight.
    #[must_use]
    pub const fn is_transitioning(&self) -> bool {
        self.transitioning
    }

    /// Returns true when cursor moves are currently allowed.
    #[must_use]
    pub const fn can_navigate(&self) -> bool {
        !self.transitioning && !self.shuffle_loading && !self.images.is_empty()
    }

    /// Sets the loading flag.
    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Sets the transition flag.
    pub fn set_transitioning(&mut self, transitioning: bool) {
        self.transitioning = transitioning;
    }

    /// Claims the shuffle flag. Returns false if it was already held.
    pub fn try_begin_shuffle(&mut self) -> bool {
        if self.shuffle_loading {
            return false;
        }
        self.shuffle_loading = true;
        true
    }

    /// Releases the shuffle flag.
    pub fn end_shuffle(&mut self) {
        self.shuffle_loading = false;
    }

    /// Publishes a batch if it is strictly longer than the held list.
    ///
    /// Records already held keep their position; the batch only contributes
    /// new `src` values, so the list never shrinks or reorders.
    pub fn offer_batch(&mut self, batch: Vec<ImageRecord>) -> bool {
        let batch = dedup_by_src(batch);
        if batch.len() <= self.images.len() {
            return false;
        }
        merge_dedup(&mut self.images, batch);
        self.has_loaded = true;
        true
    }

    /// Merges records into the list without the growth guard.
    pub fn merge(&mut self, incoming: Vec<ImageRecord>) -> usize {
        let added = merge_dedup(&mut self.images, incoming);
        if !self.images.is_empty() {
            self.has_loaded = true;
        }
        added
    }

    /// Inserts a single record with dedup by `src`, returning its index.
    pub fn insert(&mut self, record: ImageRecord) -> usize {
        let index = insert_dedup(&mut self.images, record);
        self.has_loaded = true;
        index
    }

    /// Moves the cursor to `index` if it is valid.
    pub fn set_current_index(&mut self, index: usize) -> bool {
        if index < self.images.len() {
            self.current_index = index;
            true
        } else {
            false
        }
    }

    /// Advances the cursor, wrapping at the end.
    pub fn step_forward(&mut self) -> Option<usize> {
        if !self.can_navigate() {
            return None;
        }
        self.current_index = (self.current_index + 1) % self.images.len();
        Some(self.current_index)
    }

    /// Retreats the cursor, wrapping at the start.
    pub fn step_backward(&mut self) -> Option<usize> {
        if !self.can_navigate() {
            return None;
        }
        let len = self.images.len();
        self.current_index = (self.current_index + len - 1) % len;
        Some(self.current_index)
    }

    /// Takes a read-only copy for the rendering layer.
    #[must_use]
    pub fn snapshot(&self) -> GallerySnapshot {
        GallerySnapshot {
            images: self.images.clone(),
            current_index: self.current_index,
            loading: self.loading,
            shuffle_loading: self.shuffle_loading,
        }
    }
}

/// Immutable view of the gallery handed to the rendering layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GallerySnapshot {
    /// Ordered image list.
    pub images: Vec<ImageRecord>,
    /// Cursor into `images`.
    pub current_index: usize,
    /// Batch load in progress.
    pub loading: bool,
    /// Random selection in progress.
    pub shuffle_loading: bool,
}
