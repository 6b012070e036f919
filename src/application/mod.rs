//! Application layer: gallery services and the controller composing them.

/// Gallery tunables.
pub mod config;
/// The stateful gallery controller.
pub mod gallery_controller;
/// Cache, loader, selector, and preloader services.
pub mod services;

pub use config::{GalleryConfig, TunableError};
pub use gallery_controller::{CompletionLatch, GalleryController, GalleryDeps};
