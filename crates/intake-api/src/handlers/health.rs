//! Liveness and database reachability.

use axum::{extract::State, response::IntoResponse, Json};

use crate::AppState;

/// # Returns
/// - 200 OK with `status`, `version` and `database`
///   (`connected`, `unreachable` or `memory`)
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (status, database) = match &state.db {
        Some(db) if db.ping().await => ("healthy", "connected"),
        Some(_) => ("degraded", "unreachable"),
        None => ("healthy", "memory"),
    };

    Json(serde_json::json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
    }))
}
