//! Caller identity.
//!
//! Authentication happens at the gateway, which forwards the user as
//! `x-user-id` (UUID) and `x-user-email`. The profile row is refreshed on
//! every authenticated request so completion emails have an address.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::debug;
use uuid::Uuid;

use crate::{ApiError, AppState};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Extractor that requires an identified caller.
///
/// ```ignore
/// async fn my_handler(user: RequireUser) -> impl IntoResponse {
///     state.stores.documents.list_for_user(user.id).await
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireUser {
    pub id: Uuid,
    pub email: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let id = header(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))?
            .parse::<Uuid>()
            .map_err(|_| ApiError::Unauthorized("Malformed user id".to_string()))?;
        let email = header(USER_EMAIL_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("User email required".to_string()))?
            .to_string();

        state.stores.profiles.upsert(id, &email).await?;
        debug!(subsystem = "api", component = "auth", user_id = %id, "Caller identified");

        Ok(RequireUser { id, email })
    }
}
