//! Bearer-token extraction for request handlers.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use fabula_core::error::DomainError;

use crate::error::ApiError;
use crate::state::AppState;

/// Resolves the request's bearer token to an owner id.
///
/// # Errors
///
/// Returns a 401 [`ApiError`] when the `Authorization` header is missing,
/// not a bearer scheme, or rejected by the verifier.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<String, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError(DomainError::Unauthorized))?;
    let owner_id = state.verifier.verify(token).await?;
    Ok(owner_id)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
