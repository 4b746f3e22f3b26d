use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use quill_infra::{MediaError, ServiceError};

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        ServiceError::NotFound(entity) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{entity} not found"))
        }
        // Ownership failures share the status of a missing token.
        e @ ServiceError::Unauthorized { .. } => {
            json_error(StatusCode::UNAUTHORIZED, "not_authorized", e.to_string())
        }
        ServiceError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        ServiceError::Consistency(msg) => {
            tracing::error!(%msg, "cross-reference update aborted");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "consistency_error",
                "the change could not be applied; nothing was modified",
            )
        }
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "server error")
        }
    }
}

pub fn media_error_to_response(err: MediaError) -> axum::response::Response {
    match err {
        MediaError::Empty => json_error(StatusCode::BAD_REQUEST, "no_file", "No file uploaded"),
        e @ (MediaError::UnsupportedType(_) | MediaError::TooLarge { .. }) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_upload", e.to_string())
        }
        MediaError::Io(e) => {
            tracing::error!(error = %e, "failed to store upload");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "media_error", "File was not saved properly")
        }
    }
}

pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn invalid_id(entity: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {entity} id"))
}
