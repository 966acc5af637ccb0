use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::errors::AppError;
use crate::services::dispatcher::tokens_match;
use crate::state::AppState;

/// Guards the operator API with the static `ADMIN_API_KEY` bearer token.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = headers
        .get("authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthorized)?;

    if !tokens_match(token, &state.config.admin_api_key) {
        tracing::warn!("Rejected admin request with invalid API key");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
