//! Domain error types.

mod discovery_error;
mod store_error;

pub use discovery_error::DiscoveryError;
pub use store_error::StoreError;
