use serde::{Deserialize, Serialize};

use quill_content::{BlogPatch, LikeToggle, NewBlog};

// -------------------------
// Request DTOs
// -------------------------

// Required strings default to empty so a missing field surfaces as a
// validation error rather than a body rejection.

#[derive(Debug, Deserialize)]
pub struct CreateBlogRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub image: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl From<CreateBlogRequest> for NewBlog {
    fn from(body: CreateBlogRequest) -> Self {
        NewBlog {
            title: body.title,
            content: body.content,
            image: body.image,
            tags: body.tags,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateBlogRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl From<UpdateBlogRequest> for BlogPatch {
    fn from(body: UpdateBlogRequest) -> Self {
        BlogPatch {
            title: body.title,
            content: body.content,
            image: body.image,
            tags: body.tags,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub blog_id: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    #[serde(default)]
    pub content: String,
}

// -------------------------
// Response DTOs
// -------------------------

/// Entity after a like toggle, plus which way it went.
#[derive(Debug, Serialize)]
pub struct LikeResponse<T> {
    #[serde(flatten)]
    pub item: T,
    pub state: LikeToggle,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: &'static str,
    pub image_url: String,
}
