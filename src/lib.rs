//! Lazygallery - progressive image gallery core.
//!
//! This crate loads an image gallery in growing stages, caches the listing
//! for a session with a TTL, preloads neighbours of the cursor, and selects
//! random images from the whole discoverable population.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Application layer containing the controller, services, and tunables.
pub mod application;
/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;

/// Current version of the application.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name.
pub const NAME: &str = "lazygallery";
