//! Error types for Sunshine file operations.

/// Errors produced while writing Sunshine's `apps.json`.
#[derive(Debug, thiserror::Error)]
pub enum SunshineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
