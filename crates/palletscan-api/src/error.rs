//! API error taxonomy and HTTP status mapping.

use hyper::StatusCode;
use palletscan_queue::QueueError;
use palletscan_store::StoreError;

/// Errors surfaced to HTTP clients.
///
/// `InProgress` is not an error to the caller, but it travels this path so
/// the router maps it to 202 uniformly.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad content type, extension or size class. Never reaches a worker.
    #[error("{0}")]
    Validation(String),

    /// Body exceeded the upload limit.
    #[error("{0}")]
    TooLarge(String),

    /// Task id unknown.
    #[error("{0}")]
    NotFound(String),

    /// Task exists but is non-terminal.
    #[error("{0}")]
    InProgress(String),

    #[error("Erro interno: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InProgress(_) => StatusCode::ACCEPTED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<QueueError> for ApiError {
    fn from(err: QueueError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
