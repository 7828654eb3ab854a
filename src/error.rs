//! Error types for the price synchronization engine

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when fetching data from a market-data provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network request failed
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Invalid response from provider
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Provider API error
    #[error("Provider API error: {0}")]
    ApiError(String),
}

/// Errors raised by an asset catalog backend
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// A write would break one of the catalog's uniqueness keys
    #[error("Duplicate {field}: {value}")]
    Conflict { field: &'static str, value: String },

    /// The backing store could not be reached
    #[error("Catalog unavailable: {0}")]
    Unavailable(String),

    /// Internal error
    #[error("Internal catalog error: {0}")]
    Internal(String),
}

impl CatalogError {
    /// Creates a Conflict error
    pub fn conflict(field: &'static str, value: impl Into<String>) -> Self {
        Self::Conflict {
            field,
            value: value.into(),
        }
    }
}

/// Errors that can occur while synchronizing or reading prices
#[derive(Debug, Error, Clone)]
pub enum SyncError {
    /// Catalog read or write failed
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// A chunk worker panicked or was cancelled before finishing
    #[error("Chunk {chunk} aborted: {reason}")]
    ChunkAborted { chunk: usize, reason: String },

    /// The caller-level deadline elapsed before the synchronization finished
    #[error("Synchronization exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),
}

/// Errors raised while loading configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A setting had an unparsable or out-of-range value
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

impl ConfigError {
    /// Creates an InvalidValue error
    pub fn invalid(key: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            key,
            value: value.into(),
        }
    }
}
