//! Content service: the relationship-integrity manager.
//!
//! Every blog/comment use case goes through [`ContentService`]. It composes a
//! [`ContentStore`] (persistence, cross-reference atomicity) with a
//! [`UserDirectory`] (author resolution on reads) and applies the ownership
//! gate to content mutations.
//!
//! ## Write model
//!
//! ```text
//! request
//!   ↓
//! 1. Load entity (NotFound if missing)
//!   ↓
//! 2. Ownership gate (update/delete only)
//!   ↓
//! 3. Apply change to the loaded copy (validation)
//!   ↓
//! 4. Save with ExpectedVersion::Exact(loaded version)
//!   ↓ version conflict → back to 1 (bounded)
//! ```
//!
//! Steps 1-3 are repeated on every attempt, so a retry never writes over a
//! concurrent change and the gate always sees the current row.
//!
//! Cascade delete and comment creation are single store calls; the store
//! guarantees they are atomic.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::instrument;

use quill_auth::{AuthzError, Owned, UserDirectory, authorize_owner};
use quill_content::{Blog, BlogPatch, Comment, LikeToggle, NewBlog, NewComment};
use quill_core::{BlogId, CommentId, DomainError, Entity, ExpectedVersion, UserId};

use crate::content_store::{BlogFilter, ContentStore, StoreError};
use crate::views::{Author, BlogDetail, BlogView, CommentView};

/// Upper bound on read-modify-write attempts for a single mutation.
pub const MAX_WRITE_ATTEMPTS: usize = 8;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("not authorized to {action} this {entity}")]
    Unauthorized {
        action: &'static str,
        entity: &'static str,
    },

    /// A cascade could not be applied; nothing was committed.
    #[error("consistency failure: {0}")]
    Consistency(String),

    /// Optimistic concurrency retries were exhausted.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            DomainError::Unauthorized { action, entity } => {
                ServiceError::Unauthorized { action, entity }
            }
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(entity) => ServiceError::NotFound(entity),
            StoreError::Concurrency(msg) => ServiceError::Conflict(msg),
            StoreError::Consistency(msg) => ServiceError::Consistency(msg),
            StoreError::Backend(_) => ServiceError::Store(value),
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(value: AuthzError) -> Self {
        DomainError::from(value).into()
    }
}

/// Blog/comment use cases.
///
/// ## Generic Parameters
///
/// - `S`: content store (in-memory, Postgres, or an `Arc` of either)
/// - `D`: user directory used to resolve authors on reads
#[derive(Debug)]
pub struct ContentService<S, D> {
    store: S,
    directory: D,
}

impl<S, D> ContentService<S, D>
where
    S: ContentStore,
    D: UserDirectory,
{
    pub fn new(store: S, directory: D) -> Self {
        Self { store, directory }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    // --- blogs ---------------------------------------------------------------

    #[instrument(skip(self, input), fields(author_id = %author_id), err)]
    pub async fn create_blog(
        &self,
        author_id: UserId,
        input: NewBlog,
    ) -> Result<BlogView, ServiceError> {
        let blog = Blog::create(BlogId::new(), author_id, input, Utc::now())?;
        let stored = self.store.insert_blog(blog).await?;
        tracing::info!(blog_id = %stored.id_typed(), "blog created");
        Ok(self.blog_view(stored))
    }

    #[instrument(skip(self, patch), fields(blog_id = %id, requester = %requester), err)]
    pub async fn update_blog(
        &self,
        id: BlogId,
        requester: UserId,
        patch: BlogPatch,
    ) -> Result<BlogView, ServiceError> {
        let (blog, ()) = self
            .modify_blog(id, |blog, now| {
                authorize_owner(&*blog, requester, "update")?;
                blog.apply_patch(&patch, now)?;
                Ok(())
            })
            .await?;
        Ok(self.blog_view(blog))
    }

    /// Delete a blog and all of its comments. Returns the removed comment ids.
    #[instrument(skip(self), fields(blog_id = %id, requester = %requester), err)]
    pub async fn delete_blog(
        &self,
        id: BlogId,
        requester: UserId,
    ) -> Result<Vec<CommentId>, ServiceError> {
        let blog = self.load_blog(id).await?;
        authorize_owner(&blog, requester, "delete")?;

        let removed = self.store.delete_blog(id).await?;
        tracing::info!(removed_comments = removed.len(), "blog deleted");
        Ok(removed)
    }

    #[instrument(skip(self), fields(blog_id = %id, actor = %actor), err)]
    pub async fn toggle_blog_like(
        &self,
        id: BlogId,
        actor: UserId,
    ) -> Result<(BlogView, LikeToggle), ServiceError> {
        let (blog, toggle) = self
            .modify_blog(id, |blog, now| Ok(blog.toggle_like(actor, now)))
            .await?;
        tracing::debug!(?toggle, "blog like toggled");
        Ok((self.blog_view(blog), toggle))
    }

    #[instrument(skip(self), err)]
    pub async fn list_blogs(&self, filter: BlogFilter) -> Result<Vec<BlogView>, ServiceError> {
        let blogs = self.store.list_blogs(filter).await?;
        Ok(blogs.into_iter().map(|b| self.blog_view(b)).collect())
    }

    #[instrument(skip(self), fields(blog_id = %id), err)]
    pub async fn blog_with_comments(&self, id: BlogId) -> Result<BlogDetail, ServiceError> {
        let (blog, comments) = self
            .store
            .get_blog_with_comments(id)
            .await?
            .ok_or(ServiceError::NotFound(Blog::KIND))?;
        Ok(BlogDetail {
            blog: self.blog_view(blog),
            comments: comments.into_iter().map(|c| self.comment_view(c)).collect(),
        })
    }

    // --- comments ------------------------------------------------------------

    #[instrument(skip(self, input), fields(author_id = %author_id, blog_id = %input.blog_id), err)]
    pub async fn create_comment(
        &self,
        author_id: UserId,
        input: NewComment,
    ) -> Result<CommentView, ServiceError> {
        let comment = Comment::create(CommentId::new(), author_id, input, Utc::now())?;
        let stored = self.store.insert_comment(comment).await?;
        tracing::info!(comment_id = %stored.id_typed(), "comment created");
        Ok(self.comment_view(stored))
    }

    #[instrument(skip(self, content), fields(comment_id = %id, requester = %requester), err)]
    pub async fn update_comment(
        &self,
        id: CommentId,
        requester: UserId,
        content: String,
    ) -> Result<CommentView, ServiceError> {
        let (comment, ()) = self
            .modify_comment(id, |comment, now| {
                authorize_owner(&*comment, requester, "update")?;
                comment.replace_content(&content, now)?;
                Ok(())
            })
            .await?;
        Ok(self.comment_view(comment))
    }

    #[instrument(skip(self), fields(comment_id = %id, requester = %requester), err)]
    pub async fn delete_comment(&self, id: CommentId, requester: UserId) -> Result<(), ServiceError> {
        let comment = self.load_comment(id).await?;
        authorize_owner(&comment, requester, "delete")?;

        self.store.delete_comment(id).await?;
        tracing::info!(blog_id = %comment.blog_id(), "comment deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(comment_id = %id, actor = %actor), err)]
    pub async fn toggle_comment_like(
        &self,
        id: CommentId,
        actor: UserId,
    ) -> Result<(CommentView, LikeToggle), ServiceError> {
        let (comment, toggle) = self
            .modify_comment(id, |comment, now| Ok(comment.toggle_like(actor, now)))
            .await?;
        tracing::debug!(?toggle, "comment like toggled");
        Ok((self.comment_view(comment), toggle))
    }

    /// Comments of a blog, newest first. An unknown blog has no comments.
    #[instrument(skip(self), fields(blog_id = %blog_id), err)]
    pub async fn comments_for_blog(&self, blog_id: BlogId) -> Result<Vec<CommentView>, ServiceError> {
        let comments = self.store.list_comments(blog_id).await?;
        Ok(comments.into_iter().map(|c| self.comment_view(c)).collect())
    }

    #[instrument(skip(self), fields(comment_id = %id), err)]
    pub async fn get_comment(&self, id: CommentId) -> Result<CommentView, ServiceError> {
        let comment = self.load_comment(id).await?;
        Ok(self.comment_view(comment))
    }

    // --- internals -----------------------------------------------------------

    async fn load_blog(&self, id: BlogId) -> Result<Blog, ServiceError> {
        self.store
            .get_blog(id)
            .await?
            .ok_or(ServiceError::NotFound(Blog::KIND))
    }

    async fn load_comment(&self, id: CommentId) -> Result<Comment, ServiceError> {
        self.store
            .get_comment(id)
            .await?
            .ok_or(ServiceError::NotFound(Comment::KIND))
    }

    async fn modify_blog<T, F>(&self, id: BlogId, mut change: F) -> Result<(Blog, T), ServiceError>
    where
        F: FnMut(&mut Blog, DateTime<Utc>) -> Result<T, ServiceError> + Send,
        T: Send,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut blog = self.load_blog(id).await?;
            let expected = ExpectedVersion::Exact(blog.version());
            let outcome = change(&mut blog, Utc::now())?;

            match self.store.save_blog(blog, expected).await {
                Ok(saved) => return Ok((saved, outcome)),
                Err(StoreError::Concurrency(msg)) => {
                    tracing::debug!(attempt, %msg, "blog changed concurrently; retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(blog_id = %id, attempts = MAX_WRITE_ATTEMPTS, "giving up on contended blog");
        Err(ServiceError::Conflict(format!(
            "blog {id} changed concurrently {MAX_WRITE_ATTEMPTS} times"
        )))
    }

    async fn modify_comment<T, F>(
        &self,
        id: CommentId,
        mut change: F,
    ) -> Result<(Comment, T), ServiceError>
    where
        F: FnMut(&mut Comment, DateTime<Utc>) -> Result<T, ServiceError> + Send,
        T: Send,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut comment = self.load_comment(id).await?;
            let expected = ExpectedVersion::Exact(comment.version());
            let outcome = change(&mut comment, Utc::now())?;

            match self.store.save_comment(comment, expected).await {
                Ok(saved) => return Ok((saved, outcome)),
                Err(StoreError::Concurrency(msg)) => {
                    tracing::debug!(attempt, %msg, "comment changed concurrently; retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(comment_id = %id, attempts = MAX_WRITE_ATTEMPTS, "giving up on contended comment");
        Err(ServiceError::Conflict(format!(
            "comment {id} changed concurrently {MAX_WRITE_ATTEMPTS} times"
        )))
    }

    fn author(&self, id: UserId) -> Author {
        self.directory
            .get(&id)
            .map(Author::from)
            .unwrap_or_else(|| Author::unresolved(id))
    }

    fn blog_view(&self, blog: Blog) -> BlogView {
        let author = self.author(blog.author_id());
        BlogView { blog, author }
    }

    fn comment_view(&self, comment: Comment) -> CommentView {
        let author = self.author(comment.author_id());
        CommentView { comment, author }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use quill_auth::{InMemoryUserDirectory, UserProfile};

    use super::*;
    use crate::content_store::InMemoryContentStore;

    type Service = ContentService<Arc<InMemoryContentStore>, InMemoryUserDirectory>;

    fn service() -> Service {
        ContentService::new(Arc::new(InMemoryContentStore::new()), InMemoryUserDirectory::default())
    }

    fn new_blog(title: &str) -> NewBlog {
        NewBlog {
            title: title.to_string(),
            content: "Body".to_string(),
            ..NewBlog::default()
        }
    }

    fn new_comment(blog_id: BlogId, content: &str) -> NewComment {
        NewComment {
            blog_id,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn like_comment_and_cascade_delete_end_to_end() {
        let svc = service();
        let (u1, u2) = (UserId::new(), UserId::new());

        let blog = svc.create_blog(u1, new_blog("Hello")).await.unwrap();
        let blog_id = blog.blog.id_typed();

        let (liked, toggle) = svc.toggle_blog_like(blog_id, u2).await.unwrap();
        assert_eq!(toggle, LikeToggle::Liked);
        assert!(liked.blog.likes().contains(&u2));

        let comment = svc.create_comment(u2, new_comment(blog_id, "Nice")).await.unwrap();
        let comment_id = comment.comment.id_typed();

        let detail = svc.blog_with_comments(blog_id).await.unwrap();
        assert_eq!(detail.blog.blog.comment_ids(), &[comment_id]);
        assert_eq!(detail.comments.len(), 1);
        assert_eq!(detail.comments[0].comment.author_id(), u2);

        let removed = svc.delete_blog(blog_id, u1).await.unwrap();
        assert_eq!(removed, vec![comment_id]);

        assert!(matches!(
            svc.blog_with_comments(blog_id).await,
            Err(ServiceError::NotFound("blog"))
        ));
        assert!(matches!(
            svc.get_comment(comment_id).await,
            Err(ServiceError::NotFound("comment"))
        ));
    }

    #[tokio::test]
    async fn non_author_update_is_rejected_and_blog_unchanged() {
        let svc = service();
        let (u1, u2) = (UserId::new(), UserId::new());
        let blog = svc.create_blog(u1, new_blog("Original")).await.unwrap();
        let blog_id = blog.blog.id_typed();

        let patch = BlogPatch {
            title: Some("Hijacked".to_string()),
            ..BlogPatch::default()
        };
        let err = svc.update_blog(blog_id, u2, patch).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Unauthorized {
                action: "update",
                entity: "blog"
            }
        ));

        let after = svc.blog_with_comments(blog_id).await.unwrap();
        assert_eq!(after.blog.blog.title(), "Original");
        assert_eq!(after.blog.blog.version(), 1);
    }

    #[tokio::test]
    async fn ownership_is_checked_before_payload_validation() {
        let svc = service();
        let (u1, u2) = (UserId::new(), UserId::new());
        let blog_id = svc.create_blog(u1, new_blog("Mine")).await.unwrap().blog.id_typed();
        let comment_id = svc
            .create_comment(u1, new_comment(blog_id, "mine too"))
            .await
            .unwrap()
            .comment
            .id_typed();

        let invalid_patch = BlogPatch {
            title: Some("x".repeat(101)),
            ..BlogPatch::default()
        };
        assert!(matches!(
            svc.update_blog(blog_id, u2, invalid_patch).await,
            Err(ServiceError::Unauthorized {
                action: "update",
                entity: "blog"
            })
        ));
        assert!(matches!(
            svc.update_comment(comment_id, u2, "   ".into()).await,
            Err(ServiceError::Unauthorized {
                action: "update",
                entity: "comment"
            })
        ));
    }

    #[tokio::test]
    async fn non_author_delete_is_rejected_regardless_of_comments() {
        let svc = service();
        let (u1, u2) = (UserId::new(), UserId::new());
        let blog_id = svc.create_blog(u1, new_blog("Mine")).await.unwrap().blog.id_typed();
        let comment_id = svc
            .create_comment(u2, new_comment(blog_id, "theirs"))
            .await
            .unwrap()
            .comment
            .id_typed();

        assert!(matches!(
            svc.delete_blog(blog_id, u2).await,
            Err(ServiceError::Unauthorized { .. })
        ));
        assert!(matches!(
            svc.delete_comment(comment_id, u1).await,
            Err(ServiceError::Unauthorized { .. })
        ));
        assert_eq!(svc.comments_for_blog(blog_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn existence_is_checked_before_ownership() {
        let svc = service();
        let stranger = UserId::new();

        assert!(matches!(
            svc.delete_blog(BlogId::new(), stranger).await,
            Err(ServiceError::NotFound("blog"))
        ));
        assert!(matches!(
            svc.update_comment(CommentId::new(), stranger, "x".into()).await,
            Err(ServiceError::NotFound("comment"))
        ));
        assert!(matches!(
            svc.toggle_blog_like(BlogId::new(), stranger).await,
            Err(ServiceError::NotFound("blog"))
        ));
    }

    #[tokio::test]
    async fn comment_on_missing_blog_creates_nothing() {
        let svc = service();
        let missing = BlogId::new();

        let err = svc
            .create_comment(UserId::new(), new_comment(missing, "hello?"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("blog")));
        assert!(svc.comments_for_blog(missing).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_input_maps_to_validation() {
        let svc = service();
        let author = UserId::new();

        let err = svc.create_blog(author, new_blog("   ")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let blog_id = svc.create_blog(author, new_blog("ok")).await.unwrap().blog.id_typed();
        let too_long = "x".repeat(501);
        let err = svc
            .create_comment(author, new_comment(blog_id, &too_long))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn deleting_a_comment_detaches_it_from_the_blog() {
        let svc = service();
        let author = UserId::new();
        let blog_id = svc.create_blog(author, new_blog("t")).await.unwrap().blog.id_typed();
        let first = svc.create_comment(author, new_comment(blog_id, "one")).await.unwrap();
        let second = svc.create_comment(author, new_comment(blog_id, "two")).await.unwrap();

        svc.delete_comment(first.comment.id_typed(), author).await.unwrap();

        let detail = svc.blog_with_comments(blog_id).await.unwrap();
        assert_eq!(detail.blog.blog.comment_ids(), &[second.comment.id_typed()]);
        assert_eq!(detail.comments.len(), 1);
    }

    #[tokio::test]
    async fn toggling_twice_restores_likes() {
        let svc = service();
        let author = UserId::new();
        let blog_id = svc.create_blog(author, new_blog("t")).await.unwrap().blog.id_typed();
        let comment_id = svc
            .create_comment(author, new_comment(blog_id, "c"))
            .await
            .unwrap()
            .comment
            .id_typed();

        // Authors may like their own content.
        let (_, first) = svc.toggle_comment_like(comment_id, author).await.unwrap();
        let (view, second) = svc.toggle_comment_like(comment_id, author).await.unwrap();
        assert_eq!(first, LikeToggle::Liked);
        assert_eq!(second, LikeToggle::Unliked);
        assert!(view.comment.likes().is_empty());
        assert_eq!(view.comment.version(), 3);
    }

    #[tokio::test]
    async fn update_comment_replaces_content() {
        let svc = service();
        let author = UserId::new();
        let blog_id = svc.create_blog(author, new_blog("t")).await.unwrap().blog.id_typed();
        let comment_id = svc
            .create_comment(author, new_comment(blog_id, "draft"))
            .await
            .unwrap()
            .comment
            .id_typed();

        let updated = svc
            .update_comment(comment_id, author, "  final  ".into())
            .await
            .unwrap();
        assert_eq!(updated.comment.content(), "final");

        let err = svc
            .update_comment(comment_id, author, " ".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn authors_are_resolved_from_the_directory() {
        let svc = service();
        let (known, unknown) = (UserId::new(), UserId::new());
        svc.directory().remember(UserProfile {
            id: known,
            username: "ada".to_string(),
            avatar: Some("ada.png".to_string()),
        });

        let a = svc.create_blog(known, new_blog("a")).await.unwrap();
        let b = svc.create_blog(unknown, new_blog("b")).await.unwrap();

        assert_eq!(a.author.username.as_deref(), Some("ada"));
        assert_eq!(a.author.avatar.as_deref(), Some("ada.png"));
        assert_eq!(b.author, Author::unresolved(unknown));
    }

    #[tokio::test]
    async fn list_filters_by_author() {
        let svc = service();
        let (u1, u2) = (UserId::new(), UserId::new());
        svc.create_blog(u1, new_blog("a")).await.unwrap();
        svc.create_blog(u2, new_blog("b")).await.unwrap();
        svc.create_blog(u1, new_blog("c")).await.unwrap();

        assert_eq!(svc.list_blogs(BlogFilter::all()).await.unwrap().len(), 3);
        let mine = svc.list_blogs(BlogFilter::by_author(u1)).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|v| v.blog.author_id() == u1));
    }

    /// Store that reports a version conflict for the first `conflicts` saves.
    struct ContendedStore {
        inner: InMemoryContentStore,
        conflicts: AtomicUsize,
        saves: AtomicUsize,
    }

    impl ContendedStore {
        fn new(conflicts: usize) -> Self {
            Self {
                inner: InMemoryContentStore::new(),
                conflicts: AtomicUsize::new(conflicts),
                saves: AtomicUsize::new(0),
            }
        }

        fn contend(&self) -> Result<(), StoreError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            let left = self.conflicts.load(Ordering::SeqCst);
            if left > 0 {
                self.conflicts.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Concurrency("simulated".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ContentStore for ContendedStore {
        async fn insert_blog(&self, blog: Blog) -> Result<Blog, StoreError> {
            self.inner.insert_blog(blog).await
        }

        async fn get_blog(&self, id: BlogId) -> Result<Option<Blog>, StoreError> {
            self.inner.get_blog(id).await
        }

        async fn get_blog_with_comments(
            &self,
            id: BlogId,
        ) -> Result<Option<(Blog, Vec<Comment>)>, StoreError> {
            self.inner.get_blog_with_comments(id).await
        }

        async fn list_blogs(&self, filter: BlogFilter) -> Result<Vec<Blog>, StoreError> {
            self.inner.list_blogs(filter).await
        }

        async fn save_blog(&self, blog: Blog, expected: ExpectedVersion) -> Result<Blog, StoreError> {
            self.contend()?;
            self.inner.save_blog(blog, expected).await
        }

        async fn delete_blog(&self, id: BlogId) -> Result<Vec<CommentId>, StoreError> {
            self.inner.delete_blog(id).await
        }

        async fn insert_comment(&self, comment: Comment) -> Result<Comment, StoreError> {
            self.inner.insert_comment(comment).await
        }

        async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>, StoreError> {
            self.inner.get_comment(id).await
        }

        async fn list_comments(&self, blog_id: BlogId) -> Result<Vec<Comment>, StoreError> {
            self.inner.list_comments(blog_id).await
        }

        async fn save_comment(
            &self,
            comment: Comment,
            expected: ExpectedVersion,
        ) -> Result<Comment, StoreError> {
            self.contend()?;
            self.inner.save_comment(comment, expected).await
        }

        async fn delete_comment(&self, id: CommentId) -> Result<(), StoreError> {
            self.inner.delete_comment(id).await
        }
    }

    #[tokio::test]
    async fn conflicting_saves_are_retried_from_a_fresh_read() {
        let svc = ContentService::new(ContendedStore::new(3), InMemoryUserDirectory::default());
        let author = UserId::new();
        let blog_id = svc.create_blog(author, new_blog("t")).await.unwrap().blog.id_typed();

        let (view, toggle) = svc.toggle_blog_like(blog_id, author).await.unwrap();
        assert_eq!(toggle, LikeToggle::Liked);
        assert_eq!(view.blog.version(), 2);
        assert_eq!(svc.store().saves.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn exhausted_retries_report_conflict() {
        let svc = ContentService::new(
            ContendedStore::new(MAX_WRITE_ATTEMPTS),
            InMemoryUserDirectory::default(),
        );
        let author = UserId::new();
        let blog_id = svc.create_blog(author, new_blog("t")).await.unwrap().blog.id_typed();

        let err = svc.toggle_blog_like(blog_id, author).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let blog = svc.store().get_blog(blog_id).await.unwrap().unwrap();
        assert!(blog.likes().is_empty());
        assert_eq!(blog.version(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_likes_are_all_kept() {
        let svc = Arc::new(service());
        let author = UserId::new();
        let blog_id = svc.create_blog(author, new_blog("popular")).await.unwrap().blog.id_typed();

        let actors: Vec<UserId> = (0..6).map(|_| UserId::new()).collect();
        let handles: Vec<_> = actors
            .iter()
            .copied()
            .map(|actor| {
                let svc = Arc::clone(&svc);
                tokio::spawn(async move { svc.toggle_blog_like(blog_id, actor).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let blog = svc.blog_with_comments(blog_id).await.unwrap().blog.blog;
        assert_eq!(blog.likes().len(), actors.len());
        assert!(actors.iter().all(|a| blog.likes().contains(a)));
        assert_eq!(blog.version(), 1 + actors.len() as u64);
    }

    /// Store that cascade-deletes `target` right after the first read that
    /// touches it, as a concurrent request would.
    struct DeleteAfterFirstRead {
        inner: InMemoryContentStore,
        target: std::sync::Mutex<Option<BlogId>>,
    }

    impl DeleteAfterFirstRead {
        async fn fire(&self, id: BlogId) {
            let armed = {
                let mut target = self.target.lock().unwrap();
                if *target == Some(id) { target.take() } else { None }
            };
            if let Some(id) = armed {
                self.inner.delete_blog(id).await.unwrap();
            }
        }
    }

    #[async_trait]
    impl ContentStore for DeleteAfterFirstRead {
        async fn insert_blog(&self, blog: Blog) -> Result<Blog, StoreError> {
            self.inner.insert_blog(blog).await
        }

        async fn get_blog(&self, id: BlogId) -> Result<Option<Blog>, StoreError> {
            let found = self.inner.get_blog(id).await;
            self.fire(id).await;
            found
        }

        async fn get_blog_with_comments(
            &self,
            id: BlogId,
        ) -> Result<Option<(Blog, Vec<Comment>)>, StoreError> {
            let found = self.inner.get_blog_with_comments(id).await;
            self.fire(id).await;
            found
        }

        async fn list_blogs(&self, filter: BlogFilter) -> Result<Vec<Blog>, StoreError> {
            self.inner.list_blogs(filter).await
        }

        async fn save_blog(&self, blog: Blog, expected: ExpectedVersion) -> Result<Blog, StoreError> {
            self.inner.save_blog(blog, expected).await
        }

        async fn delete_blog(&self, id: BlogId) -> Result<Vec<CommentId>, StoreError> {
            self.inner.delete_blog(id).await
        }

        async fn insert_comment(&self, comment: Comment) -> Result<Comment, StoreError> {
            self.inner.insert_comment(comment).await
        }

        async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>, StoreError> {
            self.inner.get_comment(id).await
        }

        async fn list_comments(&self, blog_id: BlogId) -> Result<Vec<Comment>, StoreError> {
            let found = self.inner.list_comments(blog_id).await;
            self.fire(blog_id).await;
            found
        }

        async fn save_comment(
            &self,
            comment: Comment,
            expected: ExpectedVersion,
        ) -> Result<Comment, StoreError> {
            self.inner.save_comment(comment, expected).await
        }

        async fn delete_comment(&self, id: CommentId) -> Result<(), StoreError> {
            self.inner.delete_comment(id).await
        }
    }

    #[tokio::test]
    async fn blog_detail_is_never_torn_by_a_concurrent_cascade() {
        let store = DeleteAfterFirstRead {
            inner: InMemoryContentStore::new(),
            target: std::sync::Mutex::new(None),
        };
        let svc = ContentService::new(store, InMemoryUserDirectory::default());
        let author = UserId::new();
        let blog_id = svc.create_blog(author, new_blog("t")).await.unwrap().blog.id_typed();
        svc.create_comment(author, new_comment(blog_id, "c")).await.unwrap();

        *svc.store().target.lock().unwrap() = Some(blog_id);
        let detail = svc.blog_with_comments(blog_id).await.unwrap();

        let referenced = detail.blog.blog.comment_ids();
        let listed: Vec<CommentId> = detail.comments.iter().map(|c| c.comment.id_typed()).collect();
        assert_eq!(referenced.len(), 1);
        assert_eq!(referenced, listed.as_slice());

        // The cascade did land; later reads see it whole.
        assert!(matches!(
            svc.blog_with_comments(blog_id).await,
            Err(ServiceError::NotFound("blog"))
        ));
    }
}
