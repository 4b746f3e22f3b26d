use std::sync::Arc;

use axum::{
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use quill_content::NewComment;
use quill_core::{BlogId, CommentId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequesterContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_comment))
        .route("/blog/:blog_id", get(list_blog_comments))
        .route(
            "/:id",
            get(get_comment).put(update_comment).delete(delete_comment),
        )
        .route("/:id/like", put(toggle_like))
}

fn parse_comment_id(raw: &str) -> Result<CommentId, axum::response::Response> {
    raw.parse().map_err(|_| errors::invalid_id("comment"))
}

pub async fn list_blog_comments(
    Extension(services): Extension<Arc<AppServices>>,
    Path(blog_id): Path<String>,
) -> axum::response::Response {
    let blog_id: BlogId = match blog_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("blog"),
    };

    match services.content.comments_for_blog(blog_id).await {
        Ok(comments) => Json(comments).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_comment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_comment_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.content.get_comment(id).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_comment(
    Extension(services): Extension<Arc<AppServices>>,
    requester: RequesterContext,
    body: Result<Json<dto::CreateCommentRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };
    let blog_id: BlogId = match body.blog_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("blog"),
    };

    let input = NewComment {
        blog_id,
        content: body.content,
    };
    match services.content.create_comment(requester.user_id(), input).await {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_comment(
    Extension(services): Extension<Arc<AppServices>>,
    requester: RequesterContext,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateCommentRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_comment_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    match services.content.update_comment(id, requester.user_id(), body.content).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_comment(
    Extension(services): Extension<Arc<AppServices>>,
    requester: RequesterContext,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_comment_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.content.delete_comment(id, requester.user_id()).await {
        Ok(()) => Json(dto::MessageResponse {
            message: "Comment removed",
        })
        .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn toggle_like(
    Extension(services): Extension<Arc<AppServices>>,
    requester: RequesterContext,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_comment_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.content.toggle_comment_like(id, requester.user_id()).await {
        Ok((view, state)) => Json(dto::LikeResponse { item: view, state }).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
