// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types for the floodgate sync engine.
//!
//! Errors are categorized by where they surface and whether a retry can help.
//! A remote lookup that returns "not found" is **not** an error: it is recorded
//! as [`RemoteStatus::NotFound`](crate::project::RemoteStatus::NotFound).
//!
//! # Error Categories
//!
//! | Error Type | Retryable | Description |
//! |------------|-----------|-------------|
//! | `InvalidInput` | No | Missing or malformed identifying parameters |
//! | `RemoteStatus` | 429/5xx only | A required remote value came back non-success |
//! | `RemoteOperation` | No | A long-running remote operation (copy) reported failure |
//! | `Transport` | Yes | Network errors, timeouts, connection failures |
//! | `DataModelMismatch` | No | Reference coordinate does not resolve (index out of sync) |
//! | `Decode` | No | Malformed response body |
//! | `Config` | No | Configuration invalid |
//! | `Internal` | No | Unexpected internal error |
//!
//! # Where Errors Stop
//!
//! Bulk operations (replication, crawling, batch lookups) catch `Transport`
//! and `RemoteStatus` errors at the per-document or per-batch boundary and
//! turn them into report entries. `InvalidInput` and `DataModelMismatch`
//! always abort the operation.

use thiserror::Error;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while syncing documents or routing requests.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Required identifying parameters are missing or malformed.
    ///
    /// Raised before any remote call is issued.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A remote endpoint answered with a non-success status where a value
    /// was required.
    #[error("Remote error ({operation}): HTTP {status}")]
    RemoteStatus { operation: String, status: u16 },

    /// A remote long-running operation reported failure.
    #[error("Remote operation failed ({operation}): {message}")]
    RemoteOperation { operation: String, message: String },

    /// Network or timeout failure talking to a remote endpoint.
    #[error("Transport error ({operation}): {message}")]
    Transport {
        operation: String,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// A reference coordinate could not be resolved against the project graph.
    ///
    /// Means index construction and reconciliation disagree about the data
    /// model. Never swallowed.
    #[error("Reference path {path} does not resolve at segment {segment}")]
    DataModelMismatch { path: String, segment: String },

    /// A response body could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Create a transport error from a reqwest error.
    pub fn transport(operation: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Create a transport error without source.
    pub fn transport_msg(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a remote status error.
    pub fn remote_status(operation: impl Into<String>, status: u16) -> Self {
        Self::RemoteStatus {
            operation: operation.into(),
            status,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::RemoteStatus { status, .. } => *status == 429 || *status >= 500,
            Self::RemoteOperation { .. } => false,
            Self::InvalidInput(_) => false,
            Self::DataModelMismatch { .. } => false,
            Self::Decode(_) => false,
            Self::Config(_) => false,
            Self::Internal(_) => false,
        }
    }

    /// Short label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::RemoteStatus { .. } => "remote_status",
            Self::RemoteOperation { .. } => "remote_operation",
            Self::Transport { .. } => "transport",
            Self::DataModelMismatch { .. } => "data_model_mismatch",
            Self::Decode(_) => "decode",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
