//! Error types for the intake portal.

use thiserror::Error;

/// Result type alias using the portal's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for portal operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(uuid::Uuid),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Blob storage read or write failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Text could not be extracted from an uploaded file
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Generation failed for a reason other than transport or output shape
    #[error("Inference error: {0}")]
    Inference(String),

    /// The language model could not be reached or rejected the credentials
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The structuring response could not be parsed into QA blocks
    #[error("Malformed model output: {0}")]
    MalformedModelOutput(String),

    /// State precondition failed (e.g. a run is already in flight)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A run exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Outbound email could not be delivered
    #[error("Notification error: {0}")]
    Notification(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Authentication failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (authenticated but not authorized)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short category label persisted alongside a failed run.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Database(_) => "database",
            Error::NotFound(_) | Error::DocumentNotFound(_) => "not_found",
            Error::InvalidInput(_) => "invalid_input",
            Error::Storage(_) | Error::Io(_) => "storage",
            Error::Extraction(_) => "extraction",
            Error::Inference(_) | Error::ModelUnavailable(_) => "model",
            Error::MalformedModelOutput(_) => "model_output",
            Error::Conflict(_) => "conflict",
            Error::Timeout(_) => "timeout",
            Error::Notification(_) => "notification",
            Error::Serialization(_) => "serialization",
            Error::Config(_) => "config",
            Error::Request(_) => "request",
            Error::Unauthorized(_) | Error::Forbidden(_) => "auth",
            Error::Internal(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}
