use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use quill_auth::{JwtValidator, UserDirectory, UserProfile};

use crate::context::RequesterContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub directory: Arc<dyn UserDirectory>,
}

/// Resolve the bearer token, if any, into a [`RequesterContext`].
///
/// Reads are public, so a missing or invalid token does not fail the request
/// here; handlers that need a requester reject it via the extractor.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let claims = match extract_bearer(req.headers()) {
        Some(token) => match state.jwt.validate(token, Utc::now()) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!(error = %e, "bearer token rejected");
                None
            }
        },
        None => None,
    };

    if let Some(claims) = claims {
        let profile = UserProfile::from(&claims);
        state.directory.remember(profile.clone());
        req.extensions_mut().insert(RequesterContext::new(profile));
    }

    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
