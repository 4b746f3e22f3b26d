use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quill_auth::Owned;
use quill_core::{AggregateRoot, BlogId, CommentId, DomainResult, Entity, UserId};

use crate::comment::Comment;
use crate::likes::{LikeSet, LikeToggle};
use crate::validation::{normalize_tags, required_text, supplied};

/// Maximum title length, in characters.
pub const MAX_TITLE_CHARS: usize = 100;

/// Placeholder image token used when a blog is created without an image.
pub const DEFAULT_BLOG_IMAGE: &str = "default-blog.jpg";

/// Input for creating a blog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBlog {
    pub title: String,
    pub content: String,
    pub image: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Partial update for a blog.
///
/// `title`, `content` and `image` keep their current value when absent or
/// blank. `tags` keeps the current list only when absent; a supplied list,
/// even an empty one, replaces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Persisted blog state, used by storage adapters to rebuild a [`Blog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogSnapshot {
    pub id: BlogId,
    pub author_id: UserId,
    pub title: String,
    pub content: String,
    pub image: String,
    pub tags: Vec<String>,
    pub likes: LikeSet,
    pub comment_ids: Vec<CommentId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// Aggregate root: Blog.
///
/// # Invariants
/// - `author_id` is set at creation and never reassigned.
/// - `title` is non-empty and at most [`MAX_TITLE_CHARS`]; `content` is non-empty.
/// - `comment_ids` lists exactly the comments whose `blog_id` is this blog.
///   The list is derived by storage from its comment index and attached on
///   read; the domain never edits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blog {
    id: BlogId,
    author_id: UserId,
    title: String,
    content: String,
    image: String,
    tags: Vec<String>,
    likes: LikeSet,
    comment_ids: Vec<CommentId>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Blog {
    /// Validate `input` and build a new blog owned by `author_id`.
    pub fn create(
        id: BlogId,
        author_id: UserId,
        input: NewBlog,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let title = required_text("title", &input.title, Some(MAX_TITLE_CHARS))?;
        let content = required_text("content", &input.content, None)?;
        let image = supplied(input.image.as_deref())
            .unwrap_or(DEFAULT_BLOG_IMAGE)
            .to_string();
        let tags = input.tags.map(normalize_tags).unwrap_or_default();

        Ok(Self {
            id,
            author_id,
            title,
            content,
            image,
            tags,
            likes: LikeSet::new(),
            comment_ids: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    pub fn restore(snapshot: BlogSnapshot) -> Self {
        Self {
            id: snapshot.id,
            author_id: snapshot.author_id,
            title: snapshot.title,
            content: snapshot.content,
            image: snapshot.image,
            tags: snapshot.tags,
            likes: snapshot.likes,
            comment_ids: snapshot.comment_ids,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            version: snapshot.version,
        }
    }

    pub fn id_typed(&self) -> BlogId {
        self.id
    }

    pub fn author_id(&self) -> UserId {
        self.author_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn likes(&self) -> &LikeSet {
        &self.likes
    }

    pub fn comment_ids(&self) -> &[CommentId] {
        &self.comment_ids
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Merge `patch` into this blog.
    ///
    /// Every supplied field is validated before anything is applied, so a
    /// rejected patch leaves the blog untouched.
    pub fn apply_patch(&mut self, patch: &BlogPatch, now: DateTime<Utc>) -> DomainResult<()> {
        let title = supplied(patch.title.as_deref())
            .map(|t| required_text("title", t, Some(MAX_TITLE_CHARS)))
            .transpose()?;
        let content = supplied(patch.content.as_deref()).map(str::to_string);
        let image = supplied(patch.image.as_deref()).map(str::to_string);

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(content) = content {
            self.content = content;
        }
        if let Some(image) = image {
            self.image = image;
        }
        if let Some(tags) = &patch.tags {
            self.tags = normalize_tags(tags);
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn toggle_like(&mut self, actor: UserId, now: DateTime<Utc>) -> LikeToggle {
        let outcome = self.likes.toggle(actor);
        self.updated_at = now;
        outcome
    }

    /// Attach the comment references derived by storage.
    pub fn with_comment_ids(mut self, comment_ids: Vec<CommentId>) -> Self {
        self.comment_ids = comment_ids;
        self
    }

    pub fn snapshot(&self) -> BlogSnapshot {
        BlogSnapshot {
            id: self.id,
            author_id: self.author_id,
            title: self.title.clone(),
            content: self.content.clone(),
            image: self.image.clone(),
            tags: self.tags.clone(),
            likes: self.likes.clone(),
            comment_ids: self.comment_ids.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        }
    }
}

impl Entity for Blog {
    type Id = BlogId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl AggregateRoot for Blog {
    type Child = Comment;

    fn child_ids(&self) -> &[CommentId] {
        &self.comment_ids
    }
}

impl Owned for Blog {
    const KIND: &'static str = "blog";

    fn owner_id(&self) -> UserId {
        self.author_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::DomainError;

    fn new_blog(title: &str, content: &str) -> NewBlog {
        NewBlog {
            title: title.to_string(),
            content: content.to_string(),
            ..NewBlog::default()
        }
    }

    fn created(title: &str, content: &str) -> Blog {
        Blog::create(BlogId::new(), UserId::new(), new_blog(title, content), Utc::now()).unwrap()
    }

    #[test]
    fn create_initializes_empty_relations() {
        let author = UserId::new();
        let now = Utc::now();
        let blog = Blog::create(BlogId::new(), author, new_blog("Hi", "World"), now).unwrap();

        assert_eq!(blog.author_id(), author);
        assert_eq!(blog.title(), "Hi");
        assert_eq!(blog.content(), "World");
        assert!(blog.likes().is_empty());
        assert!(blog.comment_ids().is_empty());
        assert_eq!(blog.created_at(), now);
        assert_eq!(blog.updated_at(), now);
        assert_eq!(blog.image(), DEFAULT_BLOG_IMAGE);
    }

    #[test]
    fn create_rejects_blank_title_and_content() {
        for (title, content) in [("", "body"), ("   ", "body"), ("title", ""), ("title", " \n ")] {
            let err = Blog::create(BlogId::new(), UserId::new(), new_blog(title, content), Utc::now())
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "{title:?}/{content:?}");
        }
    }

    #[test]
    fn create_enforces_title_length() {
        let ok = "t".repeat(MAX_TITLE_CHARS);
        let too_long = "t".repeat(MAX_TITLE_CHARS + 1);

        assert!(Blog::create(BlogId::new(), UserId::new(), new_blog(&ok, "c"), Utc::now()).is_ok());
        let err = Blog::create(BlogId::new(), UserId::new(), new_blog(&too_long, "c"), Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::validation("title cannot be more than 100 characters")
        );
    }

    #[test]
    fn create_trims_fields_and_tags() {
        let input = NewBlog {
            title: "  Hello ".to_string(),
            content: " body ".to_string(),
            image: Some("  ".to_string()),
            tags: Some(vec![" a ".to_string(), "".to_string(), "a".to_string()]),
        };
        let blog = Blog::create(BlogId::new(), UserId::new(), input, Utc::now()).unwrap();
        assert_eq!(blog.title(), "Hello");
        assert_eq!(blog.content(), "body");
        assert_eq!(blog.image(), DEFAULT_BLOG_IMAGE);
        assert_eq!(blog.tags(), &["a".to_string(), "a".to_string()]);
    }

    #[test]
    fn patch_keeps_fields_that_are_not_supplied() {
        let mut blog = created("Hi", "World");
        let before = blog.clone();

        let patch = BlogPatch {
            title: Some("".to_string()),
            content: Some("New body".to_string()),
            ..BlogPatch::default()
        };
        blog.apply_patch(&patch, Utc::now()).unwrap();

        assert_eq!(blog.title(), before.title());
        assert_eq!(blog.content(), "New body");
        assert_eq!(blog.image(), before.image());
        assert_eq!(blog.tags(), before.tags());
        assert_eq!(blog.author_id(), before.author_id());
    }

    #[test]
    fn patch_with_tags_replaces_even_when_empty() {
        let input = NewBlog {
            tags: Some(vec!["rust".to_string()]),
            ..new_blog("Hi", "World")
        };
        let mut blog = Blog::create(BlogId::new(), UserId::new(), input, Utc::now()).unwrap();

        blog.apply_patch(
            &BlogPatch {
                tags: Some(Vec::new()),
                ..BlogPatch::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert!(blog.tags().is_empty());
    }

    #[test]
    fn rejected_patch_leaves_blog_untouched() {
        let mut blog = created("Hi", "World");
        let before = blog.clone();

        let patch = BlogPatch {
            title: Some("x".repeat(MAX_TITLE_CHARS + 1)),
            content: Some("changed".to_string()),
            ..BlogPatch::default()
        };
        assert!(blog.apply_patch(&patch, Utc::now()).is_err());
        assert_eq!(blog, before);
    }

    #[test]
    fn author_may_like_own_blog() {
        let mut blog = created("Hi", "World");
        let author = blog.author_id();

        assert_eq!(blog.toggle_like(author, Utc::now()), LikeToggle::Liked);
        assert!(blog.likes().contains(&author));
    }

    #[test]
    fn serializes_with_camel_case_relations() {
        let blog = created("Hi", "World");
        let json = serde_json::to_value(&blog).unwrap();
        assert_eq!(json["authorId"], serde_json::json!(blog.author_id().to_string()));
        assert_eq!(json["commentIds"], serde_json::json!([]));
        assert_eq!(json["likes"], serde_json::json!([]));
    }

    #[test]
    fn snapshot_restores_identically() {
        let mut blog = created("Hi", "World");
        blog.toggle_like(UserId::new(), Utc::now());
        let blog = blog.with_comment_ids(vec![CommentId::new()]);

        assert_eq!(Blog::restore(blog.snapshot()), blog);
    }

    #[test]
    fn children_are_the_attached_comment_ids() {
        let ids = vec![CommentId::new(), CommentId::new()];
        let blog = created("Hi", "World").with_comment_ids(ids.clone());
        assert_eq!(blog.child_ids(), ids.as_slice());
    }
}
