//! Domain layer with core entities, errors, and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{AspectRatio, GallerySnapshot, GalleryState, ImageRange, ImageRecord};
pub use errors::{DiscoveryError, StoreError};
pub use ports::{Clock, DiscoveryPort, ImageFetchPort, SessionStorePort};
