//! Client listing.

use axum::{extract::State, Json};

use intake_core::Client;

use crate::{ApiError, AppState, RequireUser};

/// List the caller's clients by name.
///
/// # Returns
/// - 200 OK with an array of clients
/// - 401 Unauthorized without an identified caller
pub async fn list_clients(
    State(state): State<AppState>,
    user: RequireUser,
) -> Result<Json<Vec<Client>>, ApiError> {
    let clients = state.stores.clients.list_for_user(user.id).await?;
    Ok(Json(clients))
}
