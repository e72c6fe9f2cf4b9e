//! Analysis repository implementation.
//!
//! Analyses are append-only. Each committed run gets the next version for its
//! document, and the document only becomes `ready` in the same transaction
//! that makes the new row visible.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{Pool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use intake_core::uuid_utils::new_v7;
use intake_core::{
    Analysis, AnalysisOutcome, AnalysisRepository, DocumentStatus, Error, QaBlock, Result,
};

const ANALYSIS_COLUMNS: &str = "id, document_id, version, structured_result, summary, created_at";

/// PostgreSQL implementation of AnalysisRepository.
#[derive(Clone)]
pub struct PgAnalysisRepository {
    pool: Pool<Postgres>,
}

impl PgAnalysisRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_analysis_row(row: &sqlx::postgres::PgRow) -> Result<Analysis> {
        let structured: Json<Vec<QaBlock>> = row
            .try_get("structured_result")
            .map_err(|e| Error::Serialization(format!("structured_result: {}", e)))?;
        Ok(Analysis {
            id: row.get("id"),
            document_id: row.get("document_id"),
            version: row.get("version"),
            structured_result: structured.0,
            summary: row.get("summary"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl AnalysisRepository for PgAnalysisRepository {
    async fn commit_run(&self, document_id: Uuid, outcome: &AnalysisOutcome) -> Result<Analysis> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Row lock serializes concurrent commits for the same document
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM documents WHERE id = $1 FOR UPDATE")
                .bind(document_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?;

        let status = match status {
            Some(s) => s.parse::<DocumentStatus>().map_err(Error::Internal)?,
            None => return Err(Error::DocumentNotFound(document_id)),
        };
        if status != DocumentStatus::Analysing {
            return Err(Error::Conflict(format!(
                "document {} is {}, not analysing",
                document_id, status
            )));
        }

        let version: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM analyses WHERE document_id = $1",
        )
        .bind(document_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let now = Utc::now();
        let sql = format!(
            "INSERT INTO analyses (id, document_id, version, structured_result, summary, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {}",
            ANALYSIS_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(new_v7())
            .bind(document_id)
            .bind(version)
            .bind(Json(&outcome.structured_result))
            .bind(&outcome.summary)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;
        let analysis = Self::parse_analysis_row(&row)?;

        sqlx::query(
            "UPDATE documents
             SET status = 'ready', error_message = NULL, status_changed_at = $2
             WHERE id = $1 AND status = 'analysing'",
        )
        .bind(document_id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "analyses",
            op = "commit_run",
            document_id = %document_id,
            version = analysis.version,
            block_count = analysis.structured_result.len(),
            "Analysis committed, document ready"
        );
        Ok(analysis)
    }

    async fn list_for_document(&self, document_id: Uuid) -> Result<Vec<Analysis>> {
        let sql = format!(
            "SELECT {} FROM analyses WHERE document_id = $1 ORDER BY version DESC",
            ANALYSIS_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(document_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;
        rows.iter().map(Self::parse_analysis_row).collect()
    }

    async fn latest(&self, document_id: Uuid) -> Result<Option<Analysis>> {
        let sql = format!(
            "SELECT {} FROM analyses WHERE document_id = $1 ORDER BY version DESC LIMIT 1",
            ANALYSIS_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.as_ref().map(Self::parse_analysis_row).transpose()
    }
}
