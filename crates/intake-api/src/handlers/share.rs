//! Sharing a report by email and reading it by share token.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use intake_core::defaults::UNKNOWN_CLIENT;
use intake_core::{Analysis, DocumentStatus, FileType};

use crate::{ApiError, AppState, RequireUser};

#[derive(Debug, Deserialize)]
pub struct ShareEmailRequest {
    pub document_id: Uuid,
    pub email: String,
}

/// Public view of a ready report. Owner ids and storage paths stay private.
#[derive(Debug, Serialize)]
pub struct SharedReport {
    pub document_id: Uuid,
    pub file_name: String,
    pub file_type: FileType,
    pub client_name: String,
    pub created_at: DateTime<Utc>,
    pub analysis: Analysis,
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Email the report's summary and share link to any address.
///
/// # Returns
/// - 200 OK with `{success: true}`
/// - 400 Bad Request for an invalid recipient
/// - 404 Not Found when the document is not the caller's
/// - 500 (`notification_failed`) when the provider rejects the message
pub async fn share_email(
    State(state): State<AppState>,
    user: RequireUser,
    Json(req): Json<ShareEmailRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let recipient = req.email.trim();
    if !looks_like_email(recipient) {
        return Err(ApiError::InvalidInput(
            "A valid recipient email is required".to_string(),
        ));
    }

    let document = state
        .stores
        .documents
        .get_for_user(req.document_id, user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Document {} not found", req.document_id)))?;

    let client_name = state
        .stores
        .clients
        .get(document.client_id)
        .await?
        .map(|c| c.name)
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
    let latest = state.stores.analyses.latest(document.id).await?;

    let message = state.emails.share(
        recipient,
        &client_name,
        document.share_token,
        latest.as_ref().map(|a| a.summary.as_str()),
    )?;

    state.notifier.send(&message).await.map_err(|e| {
        warn!(
            subsystem = "api",
            op = "share_email",
            document_id = %document.id,
            error = %e,
            "Share email failed"
        );
        ApiError::NotificationFailed(e.to_string())
    })?;

    info!(
        subsystem = "api",
        op = "share_email",
        document_id = %document.id,
        "Report shared by email"
    );
    Ok(Json(serde_json::json!({ "success": true })))
}

/// Read a ready report by share token. No authentication.
///
/// # Returns
/// - 200 OK with the report and its current analysis
/// - 404 Not Found for an unknown token or a document that is not `ready`
pub async fn shared_report(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<SharedReport>, ApiError> {
    let not_found = || ApiError::NotFound("Report not found".to_string());

    let token = token.parse::<Uuid>().map_err(|_| not_found())?;
    let document = state
        .stores
        .documents
        .get_by_share_token(token)
        .await?
        .filter(|d| d.status == DocumentStatus::Ready)
        .ok_or_else(not_found)?;
    let analysis = state
        .stores
        .analyses
        .latest(document.id)
        .await?
        .ok_or_else(not_found)?;
    let client_name = state
        .stores
        .clients
        .get(document.client_id)
        .await?
        .map(|c| c.name)
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

    Ok(Json(SharedReport {
        document_id: document.id,
        file_name: document.file_name,
        file_type: document.file_type,
        client_name,
        created_at: document.created_at,
        analysis,
    }))
}
