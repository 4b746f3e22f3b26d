use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::context::RequesterContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(requester: RequesterContext) -> impl IntoResponse {
    Json(requester.profile().clone())
}
