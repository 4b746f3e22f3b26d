use axum::{async_trait, extract::FromRequestParts, http::StatusCode, http::request::Parts, response::Response};

use quill_auth::UserProfile;
use quill_core::UserId;

use crate::app::errors;

/// Authenticated requester for a request.
///
/// Inserted by the auth middleware when a valid bearer token is presented.
/// Handlers that mutate content take this as an extractor; requests without
/// it are rejected with `401`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequesterContext {
    profile: UserProfile,
}

impl RequesterContext {
    pub fn new(profile: UserProfile) -> Self {
        Self { profile }
    }

    pub fn user_id(&self) -> UserId {
        self.profile.id
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequesterContext
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequesterContext>()
            .cloned()
            .ok_or_else(|| {
                errors::json_error(
                    StatusCode::UNAUTHORIZED,
                    "unauthorized",
                    "not authorized, valid bearer token required",
                )
            })
    }
}
