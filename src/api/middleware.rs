//! HTTP middleware for API layer.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, Response, header},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::app::AppState;
use crate::domain::AppError;

/// Extracts the token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::Authentication("missing bearer token".to_string()))?
        .to_str()
        .map_err(|_| AppError::Authentication("malformed authorization header".to_string()))?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| AppError::Authentication("malformed authorization header".to_string()))?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AppError::Authentication(
            "authorization scheme must be Bearer".to_string(),
        ));
    }
    Ok(token)
}

/// Bearer authentication middleware for protected routes.
///
/// On success the verified [`CallerIdentity`](crate::domain::CallerIdentity)
/// is stored in the request extensions for handlers to extract.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let token = match bearer_token(request.headers()) {
        Ok(token) => token.to_string(),
        Err(e) => {
            warn!(path = %request.uri().path(), "API auth failed: {e}");
            return e.into_response();
        }
    };

    match state.verifier.verify(&token).await {
        Ok(caller) => {
            debug!(uid = %caller.uid, "Caller authenticated");
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        Err(e) => {
            warn!(path = %request.uri().path(), "API auth failed: {e}");
            e.into_response()
        }
    }
}
