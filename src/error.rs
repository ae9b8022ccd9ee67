//! Typed errors returned by persistence collaborators.

use thiserror::Error;

/// Failure reading or writing persisted summaries or message metadata.
///
/// The compaction engine never propagates these: read failures are treated
/// as "nothing persisted" and write failures are logged.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend-specific failure (remote database, lock poisoning, ...).
    #[error("Store error: {0}")]
    Backend(String),
}
