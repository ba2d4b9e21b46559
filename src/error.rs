//! Unified error types for the sensor relay.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Unified error type for the relay process.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reading store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by a [`ReadingStore`](crate::store::ReadingStore) backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite rejected the statement or could not be opened.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The blocking task running the query panicked or was cancelled.
    #[error("store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// A persisted row could not be turned back into a reading.
    #[error("corrupt row {id}: {reason}")]
    Corrupt {
        /// Row identifier.
        id: i64,
        /// What was wrong with it.
        reason: String,
    },

    /// The store was closed and can no longer serve requests.
    #[error("store is closed")]
    Closed,

    /// The backend is unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures surfaced at the HTTP edge.
///
/// Each variant maps to one status code and a short plain-text body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The shared secret did not match.
    #[error("Forbidden: Invalid API key")]
    Unauthorized,

    /// Nothing has been stored yet.
    #[error("No data available")]
    NotFound,

    /// The payload could not be parsed or a value could not be coerced.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The store failed while serving the request.
    #[error("{0}")]
    Internal(&'static str),
}

impl ApiError {
    /// HTTP status for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "unauthorized",
            ApiError::NotFound => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, RelayError>;
