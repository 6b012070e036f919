//! Session store error types.

use thiserror::Error;

/// Session store error variants.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The write would exceed the store's byte budget.
    #[error("session store quota exceeded: {used} of {limit} bytes")]
    QuotaExceeded {
        /// Bytes that the write would have occupied.
        used: usize,
        /// Configured byte limit.
        limit: usize,
    },

    /// The backing store cannot be reached.
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    /// A payload could not be encoded for storage.
    #[error("failed to serialize cache payload: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
