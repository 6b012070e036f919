//! Session-scoped storage adapters.

pub mod clock;
pub mod memory_store;

pub use clock::SystemClock;
pub use memory_store::MemorySessionStore;
