//! Port definition for the session-scoped key/value store.

use crate::domain::errors::StoreError;

/// Ephemeral string key/value store scoped to one session.
/// Implementations must be thread-safe.
pub trait SessionStorePort: Send + Sync {
    /// Reads the raw value under `key`.
    ///
    /// # Errors
    /// Returns error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes `value` under `key`.
    ///
    /// # Errors
    /// Returns error if the value cannot be stored (e.g. quota).
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Deletes `key`.
    ///
    /// # Errors
    /// Returns error if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}
