//! Read-side shapes returned by [`ContentService`](crate::service::ContentService).
//!
//! Views embed the stored entity and attach the resolved author profile.

use serde::Serialize;

use quill_auth::UserProfile;
use quill_content::{Blog, Comment};
use quill_core::UserId;

/// Author identity as shown to readers.
///
/// `username`/`avatar` are `None` when the user has not been seen by this
/// node yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    pub id: UserId,
    pub username: Option<String>,
    pub avatar: Option<String>,
}

impl Author {
    pub fn unresolved(id: UserId) -> Self {
        Self {
            id,
            username: None,
            avatar: None,
        }
    }
}

impl From<UserProfile> for Author {
    fn from(profile: UserProfile) -> Self {
        Self {
            id: profile.id,
            username: Some(profile.username),
            avatar: profile.avatar,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlogView {
    #[serde(flatten)]
    pub blog: Blog,
    pub author: Author,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: Author,
}

/// A blog with its comments resolved, newest comment first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlogDetail {
    #[serde(flatten)]
    pub blog: BlogView,
    pub comments: Vec<CommentView>,
}
