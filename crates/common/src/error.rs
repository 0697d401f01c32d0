//! Error types for blobhub.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Size and quota ===
    /// File or chunk over its size cap
    #[error("Too large: {0}")]
    TooLarge(String),

    /// Reservation would pass the per-user cap
    #[error("Quota exceeded: {used} of {limit} bytes in use, {requested} more requested")]
    QuotaExceeded {
        /// Bytes already counted
        used: u64,
        /// Bytes asked for
        requested: u64,
        /// Per-user cap
        limit: u64,
    },

    // === Lookup and lifecycle ===
    /// Missing document
    #[error("Not found: {0}")]
    NotFound(String),

    /// Blob was soft-deleted
    #[error("Blob is deleted: {0}")]
    Deleted(String),

    /// Deleted blob whose chunks are gone
    #[error("No recovery data for blob {0}")]
    NoRecoveryData(String),

    /// Operation not allowed in the blob's current state
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    // === Access ===
    /// No caller identity
    #[error("Unauthorized")]
    Unauthorized,

    /// Caller may not see or change the blob
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Follow toggle aimed at the caller
    #[error("Cannot follow yourself")]
    SelfFollowDenied,

    // === Chunk integrity ===
    /// Chunk index past the declared count
    #[error("Chunk index {index} outside declared range 0..{chunk_count}")]
    SequenceError {
        /// Index sent
        index: u32,
        /// Declared number of chunks
        chunk_count: u32,
    },

    /// Commit before every chunk was stored
    #[error("Incomplete upload: {stored} of {expected} chunks stored")]
    IncompleteUpload {
        /// Chunks present
        stored: u32,
        /// Chunks declared
        expected: u32,
    },

    /// Stored chunks of an active blob have a gap
    #[error("Incomplete data: chunk {missing} of {expected} is missing")]
    IncompleteData {
        /// First missing index
        missing: u32,
        /// Chunks declared
        expected: u32,
    },

    /// Stored chunk failed to decode
    #[error("Corrupt data: {0}")]
    CorruptData(String),

    /// Malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    // === Concurrency ===
    /// Optimistic transaction ran out of retries
    #[error("Transaction conflict after {attempts} attempts")]
    TransactionConflict {
        /// Attempts made
        attempts: u32,
    },

    // === Server Errors ===
    /// Backend failure
    #[error("Database error: {0}")]
    Database(String),

    /// Bad or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::QuotaExceeded { .. } | Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Deleted(_) | Self::NoRecoveryData(_) => StatusCode::GONE,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::SelfFollowDenied
            | Self::SequenceError { .. }
            | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidTransition(_)
            | Self::IncompleteUpload { .. }
            | Self::TransactionConflict { .. } => StatusCode::CONFLICT,

            // 5xx Server Errors
            Self::IncompleteData { .. }
            | Self::CorruptData(_)
            | Self::Database(_)
            | Self::Config(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::TooLarge(_) => "TOO_LARGE",
            Self::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Deleted(_) => "DELETED",
            Self::NoRecoveryData(_) => "NO_RECOVERY_DATA",
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::SelfFollowDenied => "SELF_FOLLOW_DENIED",
            Self::SequenceError { .. } => "SEQUENCE_ERROR",
            Self::IncompleteUpload { .. } => "INCOMPLETE_UPLOAD",
            Self::IncompleteData { .. } => "INCOMPLETE_DATA",
            Self::CorruptData(_) => "CORRUPT_DATA",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::TransactionConflict { .. } => "TRANSACTION_CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Log server errors
        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("document encoding: {err}"))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
