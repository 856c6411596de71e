//! Node credential extraction for node-scoped routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::errors::AppError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Reads the node token from `X-API-KEY`, falling back to `Authorization: Bearer`.
/// The scheme name is case-insensitive.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|h| h.to_str().ok()) {
        return Some(key);
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| {
            let (scheme, token) = h.split_once(' ')?;
            scheme
                .eq_ignore_ascii_case("bearer")
                .then(|| token.trim_start())
        })
}

/// Authenticates the calling node once and stores the resulting
/// [`CallerNode`](crate::registry::CallerNode) in the request extensions.
pub async fn require_node(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(request.headers())
        .map(str::to_owned)
        .ok_or_else(|| {
            tracing::warn!(path = %request.uri().path(), "Missing node credential");
            AppError::Unauthorized
        })?;

    let caller = state.registry.authenticate(&token).await?;
    request.extensions_mut().insert(caller);

    Ok(next.run(request).await)
}
