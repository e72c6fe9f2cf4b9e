//! # intake-db
//!
//! Persistence for the client intake portal.
//!
//! This crate provides:
//! - Connection pool management
//! - PostgreSQL repositories for documents, analyses, clients and profiles
//! - Filesystem blob storage for uploaded files
//! - In-memory implementations of every repository and the blob store
//!
//! ## Example
//!
//! ```rust,ignore
//! use intake_db::Database;
//!
//! let db = Database::connect("postgres://localhost/intake").await?;
//! db.migrate().await?;
//! let doc = db.documents.get(document_id).await?;
//! ```

pub mod analyses;
pub mod blob_storage;
pub mod clients;
pub mod documents;
pub mod memory;
pub mod pool;

// Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

use std::sync::Arc;

pub use intake_core::*;

pub use analyses::PgAnalysisRepository;
pub use blob_storage::FilesystemBlobStore;
pub use clients::{PgClientRepository, PgProfileRepository};
pub use documents::PgDocumentRepository;
pub use memory::{FaultPlan, MemoryBlobStore, MemoryDatabase};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Trait-object handles for every store.
///
/// This is what the lifecycle controller and the HTTP layer hold, so either
/// backing (PostgreSQL or in-memory) can sit behind them.
#[derive(Clone)]
pub struct Stores {
    pub documents: Arc<dyn DocumentRepository>,
    pub analyses: Arc<dyn AnalysisRepository>,
    pub clients: Arc<dyn ClientRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub blobs: Arc<dyn BlobStore>,
}

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub documents: PgDocumentRepository,
    pub analyses: PgAnalysisRepository,
    pub clients: PgClientRepository,
    pub profiles: PgProfileRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            documents: PgDocumentRepository::new(pool.clone()),
            analyses: PgAnalysisRepository::new(pool.clone()),
            clients: PgClientRepository::new(pool.clone()),
            profiles: PgProfileRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Trait-object handles over this pool plus the given blob store.
    pub fn stores(&self, blobs: Arc<dyn BlobStore>) -> Stores {
        Stores {
            documents: Arc::new(self.documents.clone()),
            analyses: Arc::new(self.analyses.clone()),
            clients: Arc::new(self.clients.clone()),
            profiles: Arc::new(self.profiles.clone()),
            blobs,
        }
    }

    /// Cheap reachability check for health endpoints.
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like_wildcards() {
        assert_eq!(escape_like("100%_done"), "100\\%\\_done");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("Acme Ltd"), "Acme Ltd");
    }
}
