use std::sync::Arc;

use axum::{
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use quill_core::{BlogId, UserId};
use quill_infra::BlogFilter;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::RequesterContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_blogs).post(create_blog))
        .route("/user/:user_id", get(list_user_blogs))
        .route("/:id", get(get_blog).put(update_blog).delete(delete_blog))
        .route("/:id/like", put(toggle_like))
}

fn parse_blog_id(raw: &str) -> Result<BlogId, axum::response::Response> {
    raw.parse().map_err(|_| errors::invalid_id("blog"))
}

pub async fn list_blogs(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match services.content.list_blogs(BlogFilter::all()).await {
        Ok(blogs) => Json(blogs).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_user_blogs(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_id): Path<String>,
) -> axum::response::Response {
    let user_id: UserId = match user_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("user"),
    };

    match services.content.list_blogs(BlogFilter::by_author(user_id)).await {
        Ok(blogs) => Json(blogs).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_blog(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_blog_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.content.blog_with_comments(id).await {
        Ok(detail) => Json(detail).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_blog(
    Extension(services): Extension<Arc<AppServices>>,
    requester: RequesterContext,
    body: Result<Json<dto::CreateBlogRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    match services.content.create_blog(requester.user_id(), body.into()).await {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_blog(
    Extension(services): Extension<Arc<AppServices>>,
    requester: RequesterContext,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateBlogRequest>, JsonRejection>,
) -> axum::response::Response {
    let id = match parse_blog_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(v) => v,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    match services.content.update_blog(id, requester.user_id(), body.into()).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_blog(
    Extension(services): Extension<Arc<AppServices>>,
    requester: RequesterContext,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_blog_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.content.delete_blog(id, requester.user_id()).await {
        Ok(_) => Json(dto::MessageResponse {
            message: "Blog and associated comments removed",
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
    let id = match parse_blog_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.content.toggle_blog_like(id, requester.user_id()).await {
        Ok((view, state)) => Json(dto::LikeResponse { item: view, state }).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
