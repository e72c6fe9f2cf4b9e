//! Recovery for runs that died without reaching a terminal state.
//!
//! A process crash between claim and commit leaves a document `analysing`
//! forever. The sweep fails anything that has been `analysing` for longer
//! than a run could possibly take.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use uuid::Uuid;

use intake_core::{DocumentRepository, Error, Result};

use crate::lifecycle::failure_message;

/// Fail every document that has been `analysing` for longer than `max_age`.
pub async fn sweep_stale(documents: &dyn DocumentRepository, max_age: Duration) -> Result<Vec<Uuid>> {
    let age = chrono::Duration::from_std(max_age)
        .map_err(|e| Error::Config(format!("invalid stale age: {}", e)))?;
    let cutoff = Utc::now() - age;
    let message = failure_message(&Error::Timeout(format!(
        "analysis did not finish within {}s",
        max_age.as_secs()
    )));

    let failed = documents.fail_stale_analyses(cutoff, &message).await?;
    if !failed.is_empty() {
        warn!(
            subsystem = "jobs",
            component = "sweep",
            op = "fail_stale",
            count = failed.len(),
            "Failed stale analyses"
        );
    }
    Ok(failed)
}

/// Run [`sweep_stale`] every `interval` until the task is aborted.
pub fn spawn_stale_sweep(
    documents: Arc<dyn DocumentRepository>,
    interval: Duration,
    max_age: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match sweep_stale(documents.as_ref(), max_age).await {
                Ok(failed) => debug!(
                    subsystem = "jobs",
                    component = "sweep",
                    count = failed.len(),
                    "Stale sweep finished"
                ),
                Err(e) => error!(
                    subsystem = "jobs",
                    component = "sweep",
                    error = %e,
                    "Stale sweep failed"
                ),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::{CreateDocumentRequest, DocumentStatus, FileType};
    use intake_db::MemoryDatabase;

    async fn analysing_document(db: &MemoryDatabase) -> Uuid {
        let doc = db
            .documents()
            .insert(CreateDocumentRequest {
                client_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                file_name: "form.pdf".to_string(),
                file_path: format!("{}/form.pdf", Uuid::new_v4()),
                file_type: FileType::Pdf,
            })
            .await
            .unwrap();
        db.documents().claim_for_analysis(doc.id).await.unwrap();
        doc.id
    }

    #[tokio::test]
    async fn test_sweep_fails_only_old_runs() {
        let db = MemoryDatabase::new();
        let old = analysing_document(&db).await;
        let fresh = analysing_document(&db).await;
        db.force_status(
            old,
            DocumentStatus::Analysing,
            Utc::now() - chrono::Duration::minutes(10),
        )
        .await;

        let failed = sweep_stale(&db.documents(), Duration::from_secs(120))
            .await
            .unwrap();

        assert_eq!(failed, vec![old]);
        let old_doc = db.documents().get(old).await.unwrap().unwrap();
        assert_eq!(old_doc.status, DocumentStatus::Error);
        assert!(old_doc.error_message.unwrap().starts_with("timeout: "));
        let fresh_doc = db.documents().get(fresh).await.unwrap().unwrap();
        assert_eq!(fresh_doc.status, DocumentStatus::Analysing);
    }
}
