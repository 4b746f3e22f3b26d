//! Content domain module: blogs, comments and likes.
//!
//! This crate contains the business rules for posts and their discussion,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).
//! Cross-entity integrity (a blog's comment references, cascade delete) is
//! enforced by the storage/service layer in `quill-infra`.

pub mod blog;
pub mod comment;
pub mod likes;
mod validation;

pub use blog::{
    Blog, BlogPatch, BlogSnapshot, NewBlog, DEFAULT_BLOG_IMAGE, MAX_TITLE_CHARS,
};
pub use comment::{Comment, CommentSnapshot, NewComment, MAX_COMMENT_CHARS};
pub use likes::{LikeSet, LikeToggle};
