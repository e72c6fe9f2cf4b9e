//! Document lifecycle: `uploading -> analysing -> ready | error`.
//!
//! One [`LifecycleController::run`] claims the document, downloads its blob,
//! extracts text, runs the two-call analysis, and commits a new analysis
//! version together with the flip to `ready`. Any failure before the commit
//! moves the document to `error` with the reason recorded. Reaching `ready`
//! triggers one best-effort completion email in the background.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use intake_core::defaults::ANALYSIS_TIMEOUT_SECS;
use intake_core::{Analysis, AnalysisOutcome, Document, Error, NotificationSink, Result};
use intake_db::Stores;
use intake_inference::{clean_summary, AnalysisClient};

use crate::extraction::TextExtractor;
use crate::notification::EmailComposer;

/// Text persisted on a document whose run failed.
pub fn failure_message(err: &Error) -> String {
    format!("{}: {}", err.category(), err)
}

/// Advances documents through analysis. Cheap to clone.
#[derive(Clone)]
pub struct LifecycleController {
    stores: Stores,
    extractor: Arc<TextExtractor>,
    analysis: AnalysisClient,
    notifier: Arc<dyn NotificationSink>,
    emails: EmailComposer,
    run_timeout: Duration,
}

impl LifecycleController {
    pub fn new(
        stores: Stores,
        analysis: AnalysisClient,
        notifier: Arc<dyn NotificationSink>,
        emails: EmailComposer,
    ) -> Self {
        Self {
            stores,
            extractor: Arc::new(TextExtractor::default()),
            analysis,
            notifier,
            emails,
            run_timeout: Duration::from_secs(ANALYSIS_TIMEOUT_SECS),
        }
    }

    pub fn with_extractor(mut self, extractor: TextExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Budget for download, extraction, both model calls and the commit.
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    pub fn run_timeout(&self) -> Duration {
        self.run_timeout
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Run one analysis for a document and return the committed version.
    ///
    /// Rejects with `Conflict` (and changes nothing) when the document is
    /// already `analysing`. Failures after the claim leave the document in
    /// `error` and are returned to the caller.
    pub async fn run(&self, document_id: Uuid) -> Result<Analysis> {
        let start = Instant::now();
        let document = self.claim(document_id).await?;

        info!(
            subsystem = "jobs",
            component = "lifecycle",
            op = "claim",
            document_id = %document.id,
            file_type = %document.file_type,
            "Document analysing"
        );

        let result = match tokio::time::timeout(self.run_timeout, self.process(&document)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "analysis exceeded {}s",
                self.run_timeout.as_secs()
            ))),
        };

        match result {
            Ok(analysis) => {
                info!(
                    subsystem = "jobs",
                    component = "lifecycle",
                    op = "commit",
                    document_id = %document.id,
                    version = analysis.version,
                    block_count = analysis.structured_result.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Document ready"
                );
                self.spawn_notify_ready(document, analysis.clone());
                Ok(analysis)
            }
            Err(e) => {
                self.record_failure(document.id, &e).await;
                Err(e)
            }
        }
    }

    async fn claim(&self, document_id: Uuid) -> Result<Document> {
        if let Some(document) = self.stores.documents.claim_for_analysis(document_id).await? {
            return Ok(document);
        }
        match self.stores.documents.get(document_id).await? {
            None => Err(Error::DocumentNotFound(document_id)),
            Some(current) => {
                debug!(
                    subsystem = "jobs",
                    component = "lifecycle",
                    document_id = %document_id,
                    status = %current.status,
                    "Claim rejected"
                );
                Err(Error::Conflict(format!(
                    "document {} is already {}",
                    document_id, current.status
                )))
            }
        }
    }

    /// Download, extract, analyse, commit. Strictly sequential.
    async fn process(&self, document: &Document) -> Result<Analysis> {
        let bytes = self.stores.blobs.get(&document.file_path).await?;
        debug!(
            subsystem = "jobs",
            component = "lifecycle",
            op = "download",
            document_id = %document.id,
            byte_len = bytes.len(),
            "Blob downloaded"
        );

        let text = self.extract(bytes, document).await?;
        debug!(
            subsystem = "jobs",
            component = "lifecycle",
            op = "extract",
            document_id = %document.id,
            text_len = text.len(),
            "Text extracted"
        );

        let outcome = self.analysis.analyse(&text).await?;
        let outcome = AnalysisOutcome {
            summary: clean_summary(&outcome.summary),
            structured_result: outcome.structured_result,
        };

        self.stores.analyses.commit_run(document.id, &outcome).await
    }

    async fn extract(&self, bytes: Vec<u8>, document: &Document) -> Result<String> {
        let extractor = self.extractor.clone();
        let file_type = document.file_type;
        // PDF parsing is CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || extractor.extract(&bytes, file_type))
            .await
            .map_err(|e| Error::Internal(format!("extraction task failed: {}", e)))?
            .map_err(Error::from)
    }

    /// Move a failed run to `error`. Never fails; an unrecordable failure is
    /// logged at ERROR because the document is left `analysing`.
    pub async fn record_failure(&self, document_id: Uuid, err: &Error) {
        // A conflicting commit means another writer owns the document now.
        if matches!(err, Error::Conflict(_)) {
            warn!(
                subsystem = "jobs",
                component = "lifecycle",
                document_id = %document_id,
                error = %err,
                "Run lost ownership of document"
            );
            return;
        }

        let message = failure_message(err);
        match self.stores.documents.mark_error(document_id, &message).await {
            Ok(true) => warn!(
                subsystem = "jobs",
                component = "lifecycle",
                op = "fail",
                document_id = %document_id,
                error_category = err.category(),
                error = %err,
                "Analysis failed"
            ),
            Ok(false) => warn!(
                subsystem = "jobs",
                component = "lifecycle",
                op = "fail",
                document_id = %document_id,
                error = %err,
                "Analysis failed after document left analysing"
            ),
            Err(flip_err) => error!(
                subsystem = "jobs",
                component = "lifecycle",
                op = "fail",
                document_id = %document_id,
                error = %err,
                flip_error = %flip_err,
                "Could not record failure; document left analysing"
            ),
        }
    }

    /// One detached attempt; the caller never waits on delivery.
    fn spawn_notify_ready(&self, document: Document, analysis: Analysis) {
        let controller = self.clone();
        tokio::spawn(async move {
            if let Err(e) = controller.send_completion(&document, &analysis).await {
                warn!(
                    subsystem = "jobs",
                    component = "lifecycle",
                    op = "notify",
                    document_id = %document.id,
                    sink = controller.notifier.name(),
                    error = %e,
                    "Completion email failed"
                );
            }
        });
    }

    async fn send_completion(&self, document: &Document, analysis: &Analysis) -> Result<()> {
        let profile = self
            .stores
            .profiles
            .get(document.user_id)
            .await?
            .filter(|p| !p.email.trim().is_empty())
            .ok_or_else(|| Error::Notification("document owner has no email".to_string()))?;
        let client_name = self
            .stores
            .clients
            .get(document.client_id)
            .await?
            .map(|c| c.name)
            .unwrap_or_else(|| intake_core::defaults::UNKNOWN_CLIENT.to_string());

        let message = self.emails.completion(
            &profile.email,
            &client_name,
            &document.file_name,
            document.id,
            &analysis.summary,
        )?;
        self.notifier.send(&message).await?;

        debug!(
            subsystem = "jobs",
            component = "lifecycle",
            op = "notify",
            document_id = %document.id,
            sink = self.notifier.name(),
            "Completion email sent"
        );
        Ok(())
    }
}
