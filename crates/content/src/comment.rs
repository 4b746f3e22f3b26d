use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quill_auth::Owned;
use quill_core::{BlogId, CommentId, DomainResult, Entity, UserId};

use crate::likes::{LikeSet, LikeToggle};
use crate::validation::required_text;

/// Maximum comment length, in characters.
pub const MAX_COMMENT_CHARS: usize = 500;

/// Input for creating a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    pub blog_id: BlogId,
    pub content: String,
}

/// Persisted comment state, used by storage adapters to rebuild a [`Comment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentSnapshot {
    pub id: CommentId,
    pub blog_id: BlogId,
    pub author_id: UserId,
    pub content: String,
    pub likes: LikeSet,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// A comment on exactly one blog.
///
/// `author_id` and `blog_id` are fixed at creation. Unlike blogs, content
/// updates are full replacements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    id: CommentId,
    blog_id: BlogId,
    author_id: UserId,
    content: String,
    likes: LikeSet,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Comment {
    pub fn create(
        id: CommentId,
        author_id: UserId,
        input: NewComment,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let content = required_text("content", &input.content, Some(MAX_COMMENT_CHARS))?;

        Ok(Self {
            id,
            blog_id: input.blog_id,
            author_id,
            content,
            likes: LikeSet::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    pub fn restore(snapshot: CommentSnapshot) -> Self {
        Self {
            id: snapshot.id,
            blog_id: snapshot.blog_id,
            author_id: snapshot.author_id,
            content: snapshot.content,
            likes: snapshot.likes,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            version: snapshot.version,
        }
    }

    pub fn id_typed(&self) -> CommentId {
        self.id
    }

    pub fn blog_id(&self) -> BlogId {
        self.blog_id
    }

    pub fn author_id(&self) -> UserId {
        self.author_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn likes(&self) -> &LikeSet {
        &self.likes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn replace_content(&mut self, content: &str, now: DateTime<Utc>) -> DomainResult<()> {
        self.content = required_text("content", content, Some(MAX_COMMENT_CHARS))?;
        self.updated_at = now;
        Ok(())
    }

    pub fn toggle_like(&mut self, actor: UserId, now: DateTime<Utc>) -> LikeToggle {
        let outcome = self.likes.toggle(actor);
        self.updated_at = now;
        outcome
    }

    pub fn snapshot(&self) -> CommentSnapshot {
        CommentSnapshot {
            id: self.id,
            blog_id: self.blog_id,
            author_id: self.author_id,
            content: self.content.clone(),
            likes: self.likes.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        }
    }
}

impl Entity for Comment {
    type Id = CommentId;

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

impl Owned for Comment {
    const KIND: &'static str = "comment";

    fn owner_id(&self) -> UserId {
        self.author_id
    }
}
