use std::sync::Arc;

use axum::{
    extract::{Extension, Multipart},
    response::IntoResponse,
    Json,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequesterContext;

/// Multipart form field carrying the image.
const IMAGE_FIELD: &str = "image";

pub async fn upload_image(
    Extension(services): Extension<Arc<AppServices>>,
    requester: RequesterContext,
    mut multipart: Multipart,
) -> axum::response::Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return errors::json_error(
                    axum::http::StatusCode::BAD_REQUEST,
                    "invalid_upload",
                    e.body_text(),
                );
            }
        };
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = match field.bytes().await {
            Ok(b) => b,
            Err(e) => {
                return errors::json_error(e.status(), "invalid_upload", e.body_text());
            }
        };

        return match services.media.store_image(&file_name, &bytes).await {
            Ok(stored) => {
                tracing::info!(uploader = %requester.user_id(), url = %stored.url, "image uploaded");
                Json(dto::UploadResponse {
                    message: "File uploaded successfully",
                    image_url: stored.url,
                })
                .into_response()
            }
            Err(e) => errors::media_error_to_response(e),
        };
    }

    errors::media_error_to_response(quill_infra::MediaError::Empty)
}
