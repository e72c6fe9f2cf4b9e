//! Document intake, lifecycle trigger and reads.

use std::time::Instant;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use intake_core::defaults::{CLIENT_NAME_MAX_LEN, UNKNOWN_CLIENT};
use intake_core::file_safety::{
    detect_content_type, display_file_name, storage_path, validate_upload, UploadCheck,
};
use intake_core::{
    Analysis, Client, CreateDocumentRequest, Document, DocumentSummary, DocumentWithAnalyses,
    FileType,
};
use intake_jobs::failure_message;

use crate::{ApiError, AppState, RequireUser};

/// Multipart field carrying the client display name.
pub const CLIENT_NAME_FIELD: &str = "clientName";
/// Multipart field carrying the file.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub document: Document,
    pub client: Client,
}

#[derive(Debug, Serialize)]
pub struct AnalyseResponse {
    pub success: bool,
    pub analysis: Analysis,
}

struct UploadedFile {
    file_name: String,
    content_type: String,
    data: Vec<u8>,
}

async fn read_upload(mut multipart: Multipart) -> Result<(String, UploadedFile), ApiError> {
    let mut client_name = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::MissingInput(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            CLIENT_NAME_FIELD => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::MissingInput(format!("Failed to read client name: {}", e)))?;
                client_name = Some(text.trim().to_string());
            }
            FILE_FIELD => {
                let file_name = display_file_name(field.file_name().unwrap_or(""));
                let content_type = field.content_type().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::MissingInput(format!("Failed to read file: {}", e)))?;
                file = Some(UploadedFile {
                    file_name,
                    content_type,
                    data: data.to_vec(),
                });
            }
            _ => {}
        }
    }

    match (client_name.filter(|n| !n.is_empty()), file.filter(|f| !f.data.is_empty())) {
        (Some(name), Some(file)) => Ok((name, file)),
        _ => Err(ApiError::MissingInput(
            "Client name and file are required".to_string(),
        )),
    }
}

/// Accept a client name and one file, store it, and queue its analysis.
///
/// Multipart fields: `clientName` (text) and `file`.
///
/// # Returns
/// - 201 Created with `{document, client}`; the document is `uploading`
/// - 400 Bad Request (`missing_input`) when either field is missing or empty
/// - 413 Payload Too Large when the file exceeds the upload limit
/// - 415 (`unsupported_file_type`) for executable payloads
/// - 500 (`client_lookup_failed`, `db_insert_failed`, `storage_upload_failed`)
pub async fn upload_document(
    State(state): State<AppState>,
    user: RequireUser,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let start = Instant::now();
    let (client_name, file) = read_upload(multipart).await?;

    if client_name.chars().count() > CLIENT_NAME_MAX_LEN {
        return Err(ApiError::InvalidInput(format!(
            "Client name must be at most {} characters",
            CLIENT_NAME_MAX_LEN
        )));
    }

    match validate_upload(&file.file_name, &file.data, state.max_upload_bytes) {
        UploadCheck::Allowed => {}
        UploadCheck::TooLarge { limit } => {
            return Err(ApiError::PayloadTooLarge(format!(
                "File exceeds the {} byte upload limit",
                limit
            )))
        }
        UploadCheck::Blocked { reason } => return Err(ApiError::UnsupportedFileType(reason)),
    }

    let client = state
        .stores
        .clients
        .find_or_create(user.id, &client_name)
        .await
        .map_err(|e| {
            error!(subsystem = "api", op = "upload", user_id = %user.id, error = %e, "Client lookup failed");
            ApiError::ClientLookupFailed(e.to_string())
        })?;

    let file_path = storage_path(
        user.id,
        client.id,
        Utc::now().timestamp_millis(),
        &file.file_name,
    );
    let document = state
        .stores
        .documents
        .insert(CreateDocumentRequest {
            client_id: client.id,
            user_id: user.id,
            file_name: file.file_name.clone(),
            file_path: file_path.clone(),
            file_type: FileType::from_file_name(&file.file_name),
        })
        .await
        .map_err(|e| {
            error!(subsystem = "api", op = "upload", client_id = %client.id, error = %e, "Document insert failed");
            ApiError::DbInsertFailed(e.to_string())
        })?;

    let content_type = detect_content_type(&file.file_name, &file.data, &file.content_type);
    if let Err(e) = state
        .stores
        .blobs
        .put_new(&file_path, &file.data, &content_type)
        .await
    {
        error!(
            subsystem = "api",
            op = "upload",
            document_id = %document.id,
            error = %e,
            "Blob upload failed"
        );
        if let Err(flip) = state
            .stores
            .documents
            .mark_error(document.id, &failure_message(&e))
            .await
        {
            warn!(
                subsystem = "api",
                document_id = %document.id,
                error = %flip,
                "Could not mark document failed after storage error"
            );
        }
        return Err(ApiError::StorageUploadFailed(e.to_string()));
    }

    state.queue.submit(document.id);

    info!(
        subsystem = "api",
        op = "upload",
        document_id = %document.id,
        client_id = %client.id,
        file_type = %document.file_type,
        byte_len = file.data.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Document uploaded"
    );

    Ok((StatusCode::CREATED, Json(UploadResponse { document, client })))
}

/// Run one analysis for a document and wait for it.
///
/// # Returns
/// - 200 OK with `{success: true, analysis}` for the new version
/// - 404 Not Found when the document is not the caller's
/// - 409 Conflict when a run already holds the document
/// - 500 (`analysis_failed`) when the run ended in `error`
pub async fn analyse_document(
    State(state): State<AppState>,
    user: RequireUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AnalyseResponse>, ApiError> {
    if state
        .stores
        .documents
        .get_for_user(id, user.id)
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound(format!("Document {} not found", id)));
    }

    let analysis = state.controller.run(id).await.map_err(ApiError::from_run)?;
    Ok(Json(AnalyseResponse {
        success: true,
        analysis,
    }))
}

/// List the caller's documents, newest first.
///
/// # Returns
/// - 200 OK with document summaries including client name and latest version
pub async fn list_documents(
    State(state): State<AppState>,
    user: RequireUser,
) -> Result<Json<Vec<DocumentSummary>>, ApiError> {
    let documents = state.stores.documents.list_for_user(user.id).await?;
    Ok(Json(documents))
}

/// Get one document with its full analysis history.
///
/// # Returns
/// - 200 OK with the document, `client_name`, `analyses` (newest first) and `latest_analysis`
/// - 404 Not Found when the document is not the caller's
pub async fn get_document(
    State(state): State<AppState>,
    user: RequireUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DocumentWithAnalyses>, ApiError> {
    let document = state
        .stores
        .documents
        .get_for_user(id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Document {} not found", id)))?;

    let analyses = state.stores.analyses.list_for_document(id).await?;
    let client_name = state
        .stores
        .clients
        .get(document.client_id)
        .await?
        .map(|c| c.name)
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    Ok(Json(DocumentWithAnalyses {
        latest_analysis: analyses.first().cloned(),
        document,
        client_name,
        analyses,
    }))
}
