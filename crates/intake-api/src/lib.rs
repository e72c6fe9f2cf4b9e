//! # intake-api
//!
//! HTTP surface of the client intake portal: upload intake, the lifecycle
//! trigger, read endpoints, share email, the unauthenticated shared report,
//! and health.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use intake_core::NotificationSink;
use intake_db::{Database, Stores};
use intake_jobs::{AnalysisQueue, EmailComposer, LifecycleController};

pub use auth::RequireUser;
pub use config::{parse_allowed_origins, ApiConfig};
pub use error::ApiError;

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub controller: LifecycleController,
    /// Fire-and-forget hand-off from intake to the analysis worker.
    pub queue: AnalysisQueue,
    pub notifier: Arc<dyn NotificationSink>,
    pub emails: EmailComposer,
    pub max_upload_bytes: usize,
    /// Present when running on PostgreSQL; used by the health check.
    pub db: Option<Database>,
}

// =============================================================================
// ROUTER
// =============================================================================

/// Build the full application router with middleware.
pub fn router(state: AppState, allowed_origins: Vec<axum::http::HeaderValue>) -> Router {
    let body_limit = state.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/v1/documents/upload",
            post(handlers::documents::upload_document)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/api/v1/documents", get(handlers::documents::list_documents))
        .route("/api/v1/documents/:id", get(handlers::documents::get_document))
        .route(
            "/api/v1/documents/:id/analyse",
            post(handlers::documents::analyse_document),
        )
        .route("/api/v1/clients", get(handlers::clients::list_clients))
        .route("/api/v1/share/email", post(handlers::share::share_email))
        .route("/api/v1/shared/:token", get(handlers::share::shared_report))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    HeaderName::from_static(auth::USER_ID_HEADER),
                    HeaderName::from_static(auth::USER_EMAIL_HEADER),
                ])
                .allow_credentials(true)
                .max_age(std::time::Duration::from_secs(3600)),
        )
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}
