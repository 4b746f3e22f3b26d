use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use quill_content::{Blog, Comment};
use quill_core::{BlogId, CommentId, ExpectedVersion, UserId};

/// Content store operation error.
///
/// These are **infrastructure errors** (storage, concurrency, cross-record
/// consistency) as opposed to domain errors (validation, ownership).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed record (or a required parent record) does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// A multi-record change could not be applied as a whole. Nothing was
    /// committed.
    #[error("consistency failure: {0}")]
    Consistency(String),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Filter for [`ContentStore::list_blogs`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlogFilter {
    pub author_id: Option<UserId>,
}

impl BlogFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_author(author_id: UserId) -> Self {
        Self {
            author_id: Some(author_id),
        }
    }

    pub fn matches(&self, blog: &Blog) -> bool {
        self.author_id.is_none_or(|a| a == blog.author_id())
    }
}

/// Durable storage for blogs and comments.
///
/// ## Cross-references
///
/// A blog's `comment_ids` are never written by callers. Implementations derive
/// them from an index over comments keyed by `blog_id` and attach them to every
/// blog they return, ordered by comment insertion. Creating or deleting a
/// comment therefore updates both sides in a single step.
///
/// ## Versions
///
/// Every stored record carries a version: `1` after insert, `+1` per save.
/// `save_*` compares the stored version to the caller's [`ExpectedVersion`]
/// and fails with [`StoreError::Concurrency`] on mismatch.
///
/// ## Atomicity
///
/// Implementations must guarantee:
/// - `insert_comment` checks that the parent blog exists and makes the comment
///   visible together with its reference, or not at all.
/// - `delete_blog` removes every comment of the blog and the blog itself, or
///   nothing. Comments are removed first; if that fails the blog is kept.
/// - `delete_comment` detaches and removes the comment in one step.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn insert_blog(&self, blog: Blog) -> Result<Blog, StoreError>;

    async fn get_blog(&self, id: BlogId) -> Result<Option<Blog>, StoreError>;

    /// A blog together with its comments (newest first), read from one
    /// consistent snapshot: the returned comments are exactly the blog's
    /// `comment_ids`.
    async fn get_blog_with_comments(
        &self,
        id: BlogId,
    ) -> Result<Option<(Blog, Vec<Comment>)>, StoreError>;

    /// Blogs matching `filter`, newest first (ties broken by id, descending).
    async fn list_blogs(&self, filter: BlogFilter) -> Result<Vec<Blog>, StoreError>;

    async fn save_blog(&self, blog: Blog, expected: ExpectedVersion) -> Result<Blog, StoreError>;

    /// Cascade-delete a blog. Returns the ids of the removed comments.
    async fn delete_blog(&self, id: BlogId) -> Result<Vec<CommentId>, StoreError>;

    /// Insert a comment and attach it to its parent blog.
    ///
    /// Fails with `NotFound("blog")` when the parent does not exist.
    async fn insert_comment(&self, comment: Comment) -> Result<Comment, StoreError>;

    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>, StoreError>;

    /// Comments of a blog, newest first. Unknown blogs yield an empty list.
    async fn list_comments(&self, blog_id: BlogId) -> Result<Vec<Comment>, StoreError>;

    async fn save_comment(
        &self,
        comment: Comment,
        expected: ExpectedVersion,
    ) -> Result<Comment, StoreError>;

    async fn delete_comment(&self, id: CommentId) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> ContentStore for Arc<S>
where
    S: ContentStore + ?Sized,
{
    async fn insert_blog(&self, blog: Blog) -> Result<Blog, StoreError> {
        (**self).insert_blog(blog).await
    }

    async fn get_blog(&self, id: BlogId) -> Result<Option<Blog>, StoreError> {
        (**self).get_blog(id).await
    }

    async fn get_blog_with_comments(
        &self,
        id: BlogId,
    ) -> Result<Option<(Blog, Vec<Comment>)>, StoreError> {
        (**self).get_blog_with_comments(id).await
    }

    async fn list_blogs(&self, filter: BlogFilter) -> Result<Vec<Blog>, StoreError> {
        (**self).list_blogs(filter).await
    }

    async fn save_blog(&self, blog: Blog, expected: ExpectedVersion) -> Result<Blog, StoreError> {
        (**self).save_blog(blog, expected).await
    }

    async fn delete_blog(&self, id: BlogId) -> Result<Vec<CommentId>, StoreError> {
        (**self).delete_blog(id).await
    }

    async fn insert_comment(&self, comment: Comment) -> Result<Comment, StoreError> {
        (**self).insert_comment(comment).await
    }

    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>, StoreError> {
        (**self).get_comment(id).await
    }

    async fn list_comments(&self, blog_id: BlogId) -> Result<Vec<Comment>, StoreError> {
        (**self).list_comments(blog_id).await
    }

    async fn save_comment(
        &self,
        comment: Comment,
        expected: ExpectedVersion,
    ) -> Result<Comment, StoreError> {
        (**self).save_comment(comment, expected).await
    }

    async fn delete_comment(&self, id: CommentId) -> Result<(), StoreError> {
        (**self).delete_comment(id).await
    }
}
