mod clock_port;
mod discovery_port;
mod image_fetch_port;
mod session_store_port;

pub use clock_port::Clock;
pub use discovery_port::{DiscoveryPort, DiscoveryResult};
pub use image_fetch_port::ImageFetchPort;
pub use session_store_port::SessionStorePort;

#[cfg(test)]
pub mod mocks {
    pub use super::clock_port::mock::ManualClock;
    pub use super::discovery_port::mock::MockDiscovery;
    pub use super::image_fetch_port::mock::RecordingFetcher;
    pub use super::session_store_port::mock::FailingStore;
}
