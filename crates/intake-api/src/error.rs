//! HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

/// Error returned by every handler, rendered as `{"error": ..., "code": ...}`.
#[derive(Debug)]
pub enum ApiError {
    MissingInput(String),
    InvalidInput(String),
    PayloadTooLarge(String),
    UnsupportedFileType(String),
    ClientLookupFailed(String),
    StorageUploadFailed(String),
    DbInsertFailed(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    AnalysisFailed(String),
    NotificationFailed(String),
    Internal(intake_core::Error),
}

impl ApiError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingInput(_) => "missing_input",
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::UnsupportedFileType(_) => "unsupported_file_type",
            ApiError::ClientLookupFailed(_) => "client_lookup_failed",
            ApiError::StorageUploadFailed(_) => "storage_upload_failed",
            ApiError::DbInsertFailed(_) => "db_insert_failed",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::AnalysisFailed(_) => "analysis_failed",
            ApiError::NotificationFailed(_) => "notification_failed",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingInput(_) | ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ClientLookupFailed(_)
            | ApiError::StorageUploadFailed(_)
            | ApiError::DbInsertFailed(_)
            | ApiError::AnalysisFailed(_)
            | ApiError::NotificationFailed(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a failed lifecycle run. The run's own failure path has already
    /// recorded the reason on the document.
    pub fn from_run(err: intake_core::Error) -> Self {
        use intake_core::Error;
        match err {
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::DocumentNotFound(id) => ApiError::NotFound(format!("Document {} not found", id)),
            e @ (Error::Extraction(_)
            | Error::Inference(_)
            | Error::ModelUnavailable(_)
            | Error::MalformedModelOutput(_)
            | Error::Timeout(_)
            | Error::Storage(_)) => ApiError::AnalysisFailed(e.to_string()),
            other => ApiError::from(other),
        }
    }
}

impl From<intake_core::Error> for ApiError {
    fn from(err: intake_core::Error) -> Self {
        use intake_core::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::DocumentNotFound(id) => ApiError::NotFound(format!("Document {} not found", id)),
            Error::InvalidInput(msg) => ApiError::InvalidInput(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            Error::Notification(msg) => ApiError::NotificationFailed(msg),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let message = match self {
            ApiError::Internal(err) => {
                error!(subsystem = "api", error = %err, "Request failed");
                err.to_string()
            }
            ApiError::MissingInput(msg)
            | ApiError::InvalidInput(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::UnsupportedFileType(msg)
            | ApiError::ClientLookupFailed(msg)
            | ApiError::StorageUploadFailed(msg)
            | ApiError::DbInsertFailed(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::AnalysisFailed(msg)
            | ApiError::NotificationFailed(msg) => msg,
        };

        let body = Json(serde_json::json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
