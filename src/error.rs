//! Error taxonomy for the orchestration core.
//!
//! Three layers, matching who may observe the failure:
//! - StartupError: aborts the process before any window exists
//! - StoreError: a persistence primitive rejected
//! - DispatchError: surfaced to the single window that issued a command

use thiserror::Error;

use crate::commands::Collection;

/// Fatal startup failures. Nothing is retried; the process exits
/// without creating a window or touching the stores.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Another live process already holds the instance lock.
    #[error("another instance is already running")]
    AlreadyRunning,
    /// The startup settings documents could not be read.
    #[error("failed to read startup settings: {0}")]
    Settings(#[source] StoreError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of an underlying persistence primitive.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Backend-specific rejection carried as its own description.
    #[error("{0}")]
    Backend(String),
}

/// Failure of a single bus dispatch. Local to the requesting window;
/// never crashes the process or reaches other windows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The wire envelope named an action the collection does not support,
    /// or its payload was missing a required field. Protocol misuse,
    /// distinct from a genuine store failure.
    #[error("invalid {collection} db action: {detail}")]
    MalformedRequest {
        collection: Collection,
        detail: String,
    },
    /// The store rejected the operation. Normalized to a string
    /// description so the requester sees one stable shape.
    #[error("{0}")]
    Store(String),
}

impl DispatchError {
    pub fn malformed(collection: Collection, detail: impl Into<String>) -> Self {
        Self::MalformedRequest {
            collection,
            detail: detail.into(),
        }
    }
}

impl From<StoreError> for DispatchError {
    fn from(value: StoreError) -> Self {
        Self::Store(value.to_string())
    }
}
