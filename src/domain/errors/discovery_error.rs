//! Discovery service error types.

use thiserror::Error;

/// Failures reported by the discovery/transport service.
#[derive(Debug, Clone, Error)]
#[allow(missing_docs)]
pub enum DiscoveryError {
    #[error("network error during discovery: {message}")]
    Network { message: String },

    #[error("discovery request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("image {index} not found")]
    NotFound { index: u64 },

    #[error("invalid discovery response: {message}")]
    InvalidResponse { message: String },

    #[error("population range could not be determined: {message}")]
    RangeUnavailable { message: String },

    #[error("unexpected discovery error: {message}")]
    Unexpected { message: String },
}

impl DiscoveryError {
    /// Creates network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates invalid response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Creates range unavailable error.
    #[must_use]
    pub fn range_unavailable(message: impl Into<String>) -> Self {
        Self::RangeUnavailable {
            message: message.into(),
        }
    }

    /// Creates unexpected error.
    #[must_use]
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
        }
    }

    /// Returns whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}
