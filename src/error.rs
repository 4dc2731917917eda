//! Error taxonomy for the fetch/load/report pipeline.
//!
//! Every failure is surfaced directly to the caller of the top-level
//! operation; there is no retry or partial-results policy anywhere in the
//! pipeline. `exit_code` maps each class to the process exit status used by
//! `main.rs`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid user input: bad table name, empty date token, etc.
    #[error("invalid query: {0}")]
    Query(String),

    /// A page request could not be sent or timed out.
    #[error("page {page} request failed: {message}")]
    Transport { page: u32, message: String },

    /// A page request completed with a non-success HTTP status.
    #[error("page {page} request returned status {status}")]
    TransportStatus { page: u32, status: u16 },

    /// The response body was not the expected `[metadata, records]` pair.
    #[error("malformed response for page {page}: {message}")]
    MalformedResponse { page: u32, message: String },

    /// The storage connection could not be acquired or used.
    #[error("storage error: {0}")]
    Storage(String),
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Query(_) => 2,
            AppError::Transport { .. } | AppError::TransportStatus { .. } => 3,
            AppError::MalformedResponse { .. } => 4,
            AppError::Storage(_) => 5,
        }
    }
}
