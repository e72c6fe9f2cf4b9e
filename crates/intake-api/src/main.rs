//! intake-api - HTTP API server for the client intake portal

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use intake_api::{router, ApiConfig, AppState};
use intake_db::{Database, FilesystemBlobStore, MemoryDatabase, Stores};
use intake_inference::{backend_from_env, AnalysisClient};
use intake_jobs::{
    sink_from_env, spawn_stale_sweep, AnalysisWorker, EmailComposer, LifecycleController,
    WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "intake_api=debug,intake_jobs=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "intake_api=debug,intake_jobs=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("intake-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = ApiConfig::from_env();

    // Persistence: PostgreSQL + filesystem blobs, or everything in memory
    let (stores, db): (Stores, Option<Database>) = match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            let db = Database::connect(url).await?;
            info!("Running database migrations...");
            db.migrate().await?;
            info!("Database migrations complete");

            let blobs = FilesystemBlobStore::new(&config.blob_storage_path);
            if let Err(e) = blobs.validate().await {
                anyhow::bail!(
                    "Blob storage at {} is not usable: {}",
                    config.blob_storage_path,
                    e
                );
            }
            info!(path = %config.blob_storage_path, "Blob storage ready");
            (db.stores(Arc::new(blobs)), Some(db))
        }
        None => {
            warn!("DATABASE_URL not set; using in-memory stores (data is lost on exit)");
            (MemoryDatabase::new().stores(), None)
        }
    };

    // Collaborators
    let backend = backend_from_env()?;
    info!(model = backend.model_name(), "Generation backend ready");
    let notifier = sink_from_env()?;
    info!(sink = notifier.name(), "Notification sink ready");
    let emails = EmailComposer::new(config.app_url.clone());

    let worker_config = WorkerConfig::from_env();
    let controller = LifecycleController::new(
        stores.clone(),
        AnalysisClient::new(backend),
        notifier.clone(),
        emails.clone(),
    )
    .with_run_timeout(worker_config.timeout());

    let stale_age = config.stale_age_for(worker_config.timeout());
    if !worker_config.enabled {
        warn!("ANALYSIS_WORKER_ENABLED=false; uploads are only analysed via the analyse endpoint");
    }
    let (queue, worker) = AnalysisWorker::new(controller.clone(), worker_config).start();

    let sweep = config.stale_sweep_interval().map(|interval| {
        info!(
            interval_secs = interval.as_secs(),
            stale_age_secs = stale_age.as_secs(),
            "Stale analysis sweep enabled"
        );
        spawn_stale_sweep(stores.documents.clone(), interval, stale_age)
    });

    let state = AppState {
        stores,
        controller,
        queue,
        notifier,
        emails,
        max_upload_bytes: config.max_upload_bytes,
        db,
    };
    let app = router(state, config.allowed_origins.clone());

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped; draining analysis worker");
    if let Some(sweep) = sweep {
        sweep.abort();
    }
    worker.shutdown().await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
