//! Domain entity definitions.

mod gallery_state;
mod image;

pub use gallery_state::{GallerySnapshot, GalleryState, dedup_by_src, insert_dedup, merge_dedup};
pub use image::{AspectRatio, ImageRange, ImageRecord};
