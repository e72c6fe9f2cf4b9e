//! Core traits for the intake portal's abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// DOCUMENT REPOSITORY
// =============================================================================

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Insert a new document in `uploading` with a fresh share token.
    async fn insert(&self, req: CreateDocumentRequest) -> Result<Document>;

    /// Fetch a document by id.
    async fn get(&self, id: Uuid) -> Result<Option<Document>>;

    /// Fetch a document by id, only if owned by `user_id`.
    async fn get_for_user(&self, id: Uuid, user_id: Uuid) -> Result<Option<Document>>;

    /// Fetch a document by its share token.
    async fn get_by_share_token(&self, token: Uuid) -> Result<Option<Document>>;

    /// List a user's documents, newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<DocumentSummary>>;

    /// Atomically move a document to `analysing` if its status is claimable.
    ///
    /// Returns `None` when the document does not exist or a run already holds it.
    /// Clears any previous `error_message`.
    async fn claim_for_analysis(&self, id: Uuid) -> Result<Option<Document>>;

    /// Move an `uploading` or `analysing` document to `error`, recording the reason.
    ///
    /// Returns `false` when the document was in neither state, so a late
    /// failure never overwrites a terminal `ready`.
    async fn mark_error(&self, id: Uuid, message: &str) -> Result<bool>;

    /// Move documents that have been `analysing` since before `cutoff` to `error`.
    ///
    /// Returns the ids that were failed.
    async fn fail_stale_analyses(&self, cutoff: DateTime<Utc>, message: &str)
        -> Result<Vec<Uuid>>;
}

// =============================================================================
// ANALYSIS REPOSITORY
// =============================================================================

#[async_trait]
pub trait AnalysisRepository: Send + Sync {
    /// Persist a completed run and flip the document to `ready`, all-or-nothing.
    ///
    /// The new row gets `version = max(version) + 1` for the document. Fails with
    /// `Error::Conflict` (and writes nothing) if the document is no longer `analysing`.
    async fn commit_run(&self, document_id: Uuid, outcome: &AnalysisOutcome) -> Result<Analysis>;

    /// All analyses for a document, highest version first.
    async fn list_for_document(&self, document_id: Uuid) -> Result<Vec<Analysis>>;

    /// The current (highest version) analysis, if any.
    async fn latest(&self, document_id: Uuid) -> Result<Option<Analysis>>;
}

// =============================================================================
// CLIENT & PROFILE REPOSITORIES
// =============================================================================

#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Case-insensitive exact name lookup within one owner's clients.
    async fn find_by_name(&self, user_id: Uuid, name: &str) -> Result<Option<Client>>;

    /// Create a client for `user_id`. A name already taken (case-insensitively)
    /// is a `Conflict`.
    async fn create(&self, user_id: Uuid, name: &str) -> Result<Client>;

    /// Fetch a client by id.
    async fn get(&self, id: Uuid) -> Result<Option<Client>>;

    /// List a user's clients by name.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Client>>;

    /// Resolve an existing client by name or create one.
    ///
    /// Stores shared between requests override this so that concurrent calls
    /// for the same new name resolve to one client.
    async fn find_or_create(&self, user_id: Uuid, name: &str) -> Result<Client> {
        match self.find_by_name(user_id, name).await? {
            Some(client) => Ok(client),
            None => self.create(user_id, name).await,
        }
    }
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Insert or refresh a profile's email.
    async fn upsert(&self, id: Uuid, email: &str) -> Result<Profile>;

    /// Fetch a profile by user id.
    async fn get(&self, id: Uuid) -> Result<Option<Profile>>;
}

// =============================================================================
// BLOB STORAGE
// =============================================================================

/// Opaque blob store keyed by a path string.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` at `path`. Fails with `Error::Storage` if an object already exists there.
    async fn put_new(&self, path: &str, data: &[u8], content_type: &str) -> Result<()>;

    /// Read the object at `path`.
    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    /// Check if an object exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool>;
}

// =============================================================================
// INFERENCE
// =============================================================================

/// Sampling options for a single generation call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerationOptions {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
        }
    }
}

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text with a system prompt and sampling options.
    ///
    /// Transport and authentication failures surface as `Error::ModelUnavailable`.
    async fn generate_with_system(
        &self,
        system: &str,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// A rendered outbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Outbound email delivery.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}
