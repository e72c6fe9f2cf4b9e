//! In-memory repositories and blob store.
//!
//! Same contracts as the PostgreSQL implementations, backed by one shared
//! state behind an async mutex. Used by local development without a database
//! and by tests that drive the lifecycle end to end. Every status write is
//! appended to a per-document history so tests can assert on the sequence a
//! reader could have observed.
//!
//! Failure injection (`FaultPlan`) lets tests force the persistence failures
//! the lifecycle has to survive.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use intake_core::uuid_utils::{new_share_token, new_v7};

use crate::Stores;
use intake_core::{
    Analysis, AnalysisOutcome, AnalysisRepository, BlobStore, Client, ClientRepository,
    CreateDocumentRequest, Document, DocumentRepository, DocumentStatus, DocumentSummary, Error,
    Profile, ProfileRepository, Result,
};

/// Persistence failures to inject.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    pub fail_document_insert: bool,
    pub fail_client_lookup: bool,
    pub fail_commit: bool,
    pub fail_mark_error: bool,
    pub fail_blob_writes: bool,
    pub fail_blob_reads: bool,
}

#[derive(Default)]
struct MemoryState {
    profiles: HashMap<Uuid, Profile>,
    clients: Vec<Client>,
    documents: HashMap<Uuid, Document>,
    analyses: Vec<Analysis>,
    blobs: HashMap<String, (Vec<u8>, String)>,
    history: HashMap<Uuid, Vec<DocumentStatus>>,
    faults: FaultPlan,
}

impl MemoryState {
    fn set_status(&mut self, id: Uuid, status: DocumentStatus, error_message: Option<String>) {
        if let Some(doc) = self.documents.get_mut(&id) {
            doc.status = status;
            doc.error_message = error_message;
            doc.status_changed_at = Utc::now();
            self.history.entry(id).or_default().push(status);
        }
    }
}

fn injected(what: &str) -> Error {
    Error::Database(sqlx::Error::Protocol(format!("injected failure: {}", what)))
}

/// Shared handle to in-memory state; hands out one repository per trait.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> MemoryDocumentRepository {
        MemoryDocumentRepository {
            state: self.state.clone(),
        }
    }

    pub fn analyses(&self) -> MemoryAnalysisRepository {
        MemoryAnalysisRepository {
            state: self.state.clone(),
        }
    }

    pub fn clients(&self) -> MemoryClientRepository {
        MemoryClientRepository {
            state: self.state.clone(),
        }
    }

    pub fn profiles(&self) -> MemoryProfileRepository {
        MemoryProfileRepository {
            state: self.state.clone(),
        }
    }

    pub fn blobs(&self) -> MemoryBlobStore {
        MemoryBlobStore {
            state: self.state.clone(),
        }
    }

    /// Trait-object handles over this state, blobs included.
    pub fn stores(&self) -> Stores {
        Stores {
            documents: Arc::new(self.documents()),
            analyses: Arc::new(self.analyses()),
            clients: Arc::new(self.clients()),
            profiles: Arc::new(self.profiles()),
            blobs: Arc::new(self.blobs()),
        }
    }

    /// Replace the active failure plan.
    pub async fn set_faults(&self, faults: FaultPlan) {
        self.state.lock().await.faults = faults;
    }

    /// Every status written for a document, in order, starting with `uploading`.
    pub async fn status_history(&self, document_id: Uuid) -> Vec<DocumentStatus> {
        self.state
            .lock()
            .await
            .history
            .get(&document_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of analysis rows across all documents.
    pub async fn analysis_count(&self) -> usize {
        self.state.lock().await.analyses.len()
    }

    /// Force a document's status and timestamp, bypassing lifecycle rules.
    pub async fn force_status(
        &self,
        document_id: Uuid,
        status: DocumentStatus,
        changed_at: DateTime<Utc>,
    ) {
        let mut state = self.state.lock().await;
        state.set_status(document_id, status, None);
        if let Some(doc) = state.documents.get_mut(&document_id) {
            doc.status_changed_at = changed_at;
        }
    }
}

// =============================================================================
// DOCUMENTS
// =============================================================================

#[derive(Clone)]
pub struct MemoryDocumentRepository {
    state: Arc<Mutex<MemoryState>>,
}

#[async_trait]
impl DocumentRepository for MemoryDocumentRepository {
    async fn insert(&self, req: CreateDocumentRequest) -> Result<Document> {
        let mut state = self.state.lock().await;
        if state.faults.fail_document_insert {
            return Err(injected("document insert"));
        }
        let now = Utc::now();
        let doc = Document {
            id: new_v7(),
            client_id: req.client_id,
            user_id: req.user_id,
            file_name: req.file_name,
            file_path: req.file_path,
            file_type: req.file_type,
            status: DocumentStatus::Uploading,
            share_token: new_share_token(),
            error_message: None,
            created_at: now,
            status_changed_at: now,
        };
        state
            .history
            .insert(doc.id, vec![DocumentStatus::Uploading]);
        state.documents.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.state.lock().await.documents.get(&id).cloned())
    }

    async fn get_for_user(&self, id: Uuid, user_id: Uuid) -> Result<Option<Document>> {
        Ok(self
            .state
            .lock()
            .await
            .documents
            .get(&id)
            .filter(|d| d.user_id == user_id)
            .cloned())
    }

    async fn get_by_share_token(&self, token: Uuid) -> Result<Option<Document>> {
        Ok(self
            .state
            .lock()
            .await
            .documents
            .values()
            .find(|d| d.share_token == token)
            .cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<DocumentSummary>> {
        let state = self.state.lock().await;
        let mut out: Vec<DocumentSummary> = state
            .documents
            .values()
            .filter(|d| d.user_id == user_id)
            .map(|d| DocumentSummary {
                id: d.id,
                client_id: d.client_id,
                client_name: state
                    .clients
                    .iter()
                    .find(|c| c.id == d.client_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                file_name: d.file_name.clone(),
                file_type: d.file_type,
                status: d.status,
                latest_version: state
                    .analyses
                    .iter()
                    .filter(|a| a.document_id == d.id)
                    .map(|a| a.version)
                    .max(),
                created_at: d.created_at,
            })
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(out)
    }

    async fn claim_for_analysis(&self, id: Uuid) -> Result<Option<Document>> {
        let mut state = self.state.lock().await;
        let claimable = state
            .documents
            .get(&id)
            .map(|d| d.status.is_claimable())
            .unwrap_or(false);
        if !claimable {
            return Ok(None);
        }
        state.set_status(id, DocumentStatus::Analysing, None);
        Ok(state.documents.get(&id).cloned())
    }

    async fn mark_error(&self, id: Uuid, message: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.faults.fail_mark_error {
            return Err(injected("mark error"));
        }
        let flippable = matches!(
            state.documents.get(&id).map(|d| d.status),
            Some(DocumentStatus::Uploading | DocumentStatus::Analysing)
        );
        if flippable {
            state.set_status(id, DocumentStatus::Error, Some(message.to_string()));
        }
        Ok(flippable)
    }

    async fn fail_stale_analyses(
        &self,
        cutoff: DateTime<Utc>,
        message: &str,
    ) -> Result<Vec<Uuid>> {
        let mut state = self.state.lock().await;
        let stale: Vec<Uuid> = state
            .documents
            .values()
            .filter(|d| d.status == DocumentStatus::Analysing && d.status_changed_at < cutoff)
            .map(|d| d.id)
            .collect();
        for id in &stale {
            state.set_status(*id, DocumentStatus::Error, Some(message.to_string()));
        }
        Ok(stale)
    }
}

// =============================================================================
// ANALYSES
// =============================================================================

#[derive(Clone)]
pub struct MemoryAnalysisRepository {
    state: Arc<Mutex<MemoryState>>,
}

#[async_trait]
impl AnalysisRepository for MemoryAnalysisRepository {
    async fn commit_run(&self, document_id: Uuid, outcome: &AnalysisOutcome) -> Result<Analysis> {
        let mut state = self.state.lock().await;
        if state.faults.fail_commit {
            return Err(injected("analysis commit"));
        }
        let status = state
            .documents
            .get(&document_id)
            .map(|d| d.status)
            .ok_or(Error::DocumentNotFound(document_id))?;
        if status != DocumentStatus::Analysing {
            return Err(Error::Conflict(format!(
                "document {} is {}, not analysing",
                document_id, status
            )));
        }

        let version = state
            .analyses
            .iter()
            .filter(|a| a.document_id == document_id)
            .map(|a| a.version)
            .max()
            .unwrap_or(0)
            + 1;
        let analysis = Analysis {
            id: new_v7(),
            document_id,
            version,
            structured_result: outcome.structured_result.clone(),
            summary: outcome.summary.clone(),
            created_at: Utc::now(),
        };
        state.analyses.push(analysis.clone());
        state.set_status(document_id, DocumentStatus::Ready, None);
        Ok(analysis)
    }

    async fn list_for_document(&self, document_id: Uuid) -> Result<Vec<Analysis>> {
        let state = self.state.lock().await;
        let mut out: Vec<Analysis> = state
            .analyses
            .iter()
            .filter(|a| a.document_id == document_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(out)
    }

    async fn latest(&self, document_id: Uuid) -> Result<Option<Analysis>> {
        Ok(self
            .list_for_document(document_id)
            .await?
            .into_iter()
            .next())
    }
}

// =============================================================================
// CLIENTS & PROFILES
// =============================================================================

fn find_client(state: &MemoryState, user_id: Uuid, name: &str) -> Option<Client> {
    let wanted = name.to_lowercase();
    state
        .clients
        .iter()
        .find(|c| c.user_id == user_id && c.name.to_lowercase() == wanted)
        .cloned()
}

fn insert_client(state: &mut MemoryState, user_id: Uuid, name: &str) -> Client {
    let client = Client {
        id: new_v7(),
        user_id,
        name: name.to_string(),
        created_at: Utc::now(),
    };
    state.clients.push(client.clone());
    client
}

#[derive(Clone)]
pub struct MemoryClientRepository {
    state: Arc<Mutex<MemoryState>>,
}

#[async_trait]
impl ClientRepository for MemoryClientRepository {
    async fn find_by_name(&self, user_id: Uuid, name: &str) -> Result<Option<Client>> {
        let state = self.state.lock().await;
        if state.faults.fail_client_lookup {
            return Err(injected("client lookup"));
        }
        Ok(find_client(&state, user_id, name))
    }

    async fn create(&self, user_id: Uuid, name: &str) -> Result<Client> {
        let mut state = self.state.lock().await;
        if find_client(&state, user_id, name).is_some() {
            return Err(Error::Conflict(format!("client '{}' already exists", name)));
        }
        Ok(insert_client(&mut state, user_id, name))
    }

    async fn find_or_create(&self, user_id: Uuid, name: &str) -> Result<Client> {
        // One lock for lookup and insert, matching the unique (user_id, lower(name)) index
        let mut state = self.state.lock().await;
        if state.faults.fail_client_lookup {
            return Err(injected("client lookup"));
        }
        if let Some(existing) = find_client(&state, user_id, name) {
            return Ok(existing);
        }
        Ok(insert_client(&mut state, user_id, name))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Client>> {
        Ok(self
            .state
            .lock()
            .await
            .clients
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Client>> {
        let state = self.state.lock().await;
        let mut out: Vec<Client> = state
            .clients
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by_key(|c| c.name.to_lowercase());
        Ok(out)
    }
}

#[derive(Clone)]
pub struct MemoryProfileRepository {
    state: Arc<Mutex<MemoryState>>,
}

#[async_trait]
impl ProfileRepository for MemoryProfileRepository {
    async fn upsert(&self, id: Uuid, email: &str) -> Result<Profile> {
        let mut state = self.state.lock().await;
        let profile = state.profiles.entry(id).or_insert_with(|| Profile {
            id,
            email: email.to_string(),
            full_name: None,
            agency_name: None,
            created_at: Utc::now(),
        });
        profile.email = email.to_string();
        Ok(profile.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Profile>> {
        Ok(self.state.lock().await.profiles.get(&id).cloned())
    }
}

// =============================================================================
// BLOBS
// =============================================================================

#[derive(Clone)]
pub struct MemoryBlobStore {
    state: Arc<Mutex<MemoryState>>,
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_new(&self, path: &str, data: &[u8], content_type: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.faults.fail_blob_writes {
            return Err(Error::Storage("injected failure: blob write".to_string()));
        }
        if state.blobs.contains_key(path) {
            return Err(Error::Storage(format!("object already exists: {}", path)));
        }
        state
            .blobs
            .insert(path.to_string(), (data.to_vec(), content_type.to_string()));
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let state = self.state.lock().await;
        if state.faults.fail_blob_reads {
            return Err(Error::Storage("injected failure: blob read".to_string()));
        }
        state
            .blobs
            .get(path)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| Error::Storage(format!("object not found: {}", path)))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.state.lock().await.blobs.contains_key(path))
    }
}
