//! Document repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info};
use uuid::Uuid;

use intake_core::uuid_utils::{new_share_token, new_v7};
use intake_core::{
    CreateDocumentRequest, Document, DocumentRepository, DocumentStatus, DocumentSummary, Error,
    FileType, Result,
};

pub(crate) const DOCUMENT_COLUMNS: &str = "id, client_id, user_id, file_name, file_path, file_type, \
     status, share_token, error_message, created_at, status_changed_at";

/// PostgreSQL implementation of DocumentRepository.
#[derive(Clone)]
pub struct PgDocumentRepository {
    pool: Pool<Postgres>,
}

impl PgDocumentRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Parse a document row into a Document struct.
    pub(crate) fn parse_document_row(row: &sqlx::postgres::PgRow) -> Result<Document> {
        let file_type: String = row.get("file_type");
        let status: String = row.get("status");
        Ok(Document {
            id: row.get("id"),
            client_id: row.get("client_id"),
            user_id: row.get("user_id"),
            file_name: row.get("file_name"),
            file_path: row.get("file_path"),
            file_type: file_type.parse::<FileType>().map_err(Error::Internal)?,
            status: status.parse::<DocumentStatus>().map_err(Error::Internal)?,
            share_token: row.get("share_token"),
            error_message: row.get("error_message"),
            created_at: row.get("created_at"),
            status_changed_at: row.get("status_changed_at"),
        })
    }

    async fn fetch_one_where(&self, clause: &str, id: Uuid) -> Result<Option<Document>> {
        let sql = format!("SELECT {} FROM documents WHERE {}", DOCUMENT_COLUMNS, clause);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(Self::parse_document_row).transpose()
    }
}

#[async_trait]
impl DocumentRepository for PgDocumentRepository {
    async fn insert(&self, req: CreateDocumentRequest) -> Result<Document> {
        let sql = format!(
            "INSERT INTO documents (id, client_id, user_id, file_name, file_path, file_type,
                                    status, share_token, created_at, status_changed_at)
             VALUES ($1, $2, $3, $4, $5, $6, 'uploading', $7, $8, $8)
             RETURNING {}",
            DOCUMENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(new_v7())
            .bind(req.client_id)
            .bind(req.user_id)
            .bind(&req.file_name)
            .bind(&req.file_path)
            .bind(req.file_type.as_str())
            .bind(new_share_token())
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        let doc = Self::parse_document_row(&row)?;
        debug!(
            subsystem = "db",
            component = "documents",
            op = "insert",
            document_id = %doc.id,
            file_type = %doc.file_type,
            "Document row created"
        );
        Ok(doc)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>> {
        self.fetch_one_where("id = $1", id).await
    }

    async fn get_for_user(&self, id: Uuid, user_id: Uuid) -> Result<Option<Document>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE id = $1 AND user_id = $2",
            DOCUMENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(Self::parse_document_row).transpose()
    }

    async fn get_by_share_token(&self, token: Uuid) -> Result<Option<Document>> {
        self.fetch_one_where("share_token = $1", token).await
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<DocumentSummary>> {
        let rows = sqlx::query(
            "SELECT d.id, d.client_id, c.name AS client_name, d.file_name, d.file_type,
                    d.status, d.created_at,
                    (SELECT MAX(a.version) FROM analyses a WHERE a.document_id = d.id)
                        AS latest_version
             FROM documents d
             JOIN clients c ON c.id = d.client_id
             WHERE d.user_id = $1
             ORDER BY d.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter()
            .map(|row| {
                let file_type: String = row.get("file_type");
                let status: String = row.get("status");
                Ok(DocumentSummary {
                    id: row.get("id"),
                    client_id: row.get("client_id"),
                    client_name: row.get("client_name"),
                    file_name: row.get("file_name"),
                    file_type: file_type.parse().map_err(Error::Internal)?,
                    status: status.parse().map_err(Error::Internal)?,
                    latest_version: row.get("latest_version"),
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }

    async fn claim_for_analysis(&self, id: Uuid) -> Result<Option<Document>> {
        // Compare-and-swap: only one caller can move a given row into 'analysing'
        let sql = format!(
            "UPDATE documents
             SET status = 'analysing', error_message = NULL, status_changed_at = $2
             WHERE id = $1 AND status IN ('uploading', 'ready', 'error')
             RETURNING {}",
            DOCUMENT_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(Self::parse_document_row).transpose()
    }

    async fn mark_error(&self, id: Uuid, message: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE documents
             SET status = 'error', error_message = $2, status_changed_at = $3
             WHERE id = $1 AND status IN ('uploading', 'analysing')",
        )
        .bind(id)
        .bind(message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn fail_stale_analyses(
        &self,
        cutoff: DateTime<Utc>,
        message: &str,
    ) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "UPDATE documents
             SET status = 'error', error_message = $2, status_changed_at = $3
             WHERE status = 'analysing' AND status_changed_at < $1
             RETURNING id",
        )
        .bind(cutoff)
        .bind(message)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        if !ids.is_empty() {
            info!(
                subsystem = "db",
                component = "documents",
                op = "fail_stale_analyses",
                count = ids.len(),
                "Failed orphaned analysis runs"
            );
        }
        Ok(ids)
    }
}
