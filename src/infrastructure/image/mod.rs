//! Image warming infrastructure.
//!
//! This module provides:
//! - Memory caching with LRU eviction
//! - HTTP fetching with in-flight deduplication

pub mod fetcher;
pub mod memory_cache;

pub use fetcher::{FetcherConfig, HttpImageFetcher};
pub use memory_cache::{CacheStats, WarmCache};
