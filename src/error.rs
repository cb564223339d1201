//! Error types for providers, stores and the optimizer surface.

use thiserror::Error;

/// Failure talking to an external mapping provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The provider answered but reported a non-OK status.
    #[error("provider returned status {status}: {message}")]
    Status { status: String, message: String },
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("{requested} points exceed the provider limit of {limit}")]
    TooManyPoints { requested: usize, limit: usize },
}

impl ProviderError {
    pub fn status(status: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Status {
            status: status.into(),
            message: message.into(),
        }
    }
}

/// Failure of a persistence backend behind a repository trait.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage lock poisoned")]
    Poisoned,
    #[error("storage backend failed: {0}")]
    Backend(String),
    #[error("malformed stored data: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Geocoding failure, distinguishable from a plain "no match".
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding provider failed for {address:?}: {source}")]
    Provider {
        address: String,
        #[source]
        source: ProviderError,
    },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors that reach callers of the optimizer. Provider failures never do.
#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("driver {driver_id} has no picked-up orders to optimize")]
    NoOrders { driver_id: String },
    #[error("driver {driver_id} not found")]
    DriverNotFound { driver_id: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

