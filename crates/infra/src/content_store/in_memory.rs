use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use quill_content::{Blog, Comment};
use quill_core::{AggregateRoot, BlogId, CommentId, Entity, ExpectedVersion};

use super::r#trait::{BlogFilter, ContentStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    blogs: HashMap<BlogId, Blog>,
    comments: HashMap<CommentId, Comment>,
    /// `blog_id` index over comments, in insertion order.
    comments_by_blog: HashMap<BlogId, Vec<CommentId>>,
}

impl Tables {
    fn blog_view(&self, blog: &Blog) -> Blog {
        let ids = self
            .comments_by_blog
            .get(&blog.id_typed())
            .cloned()
            .unwrap_or_default();
        blog.clone().with_comment_ids(ids)
    }
}

/// In-memory content store.
///
/// Intended for tests/dev. All tables sit behind one lock, so every write is
/// a single critical section and multi-record changes are atomic.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    tables: RwLock<Tables>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

fn newest_first<T, K: Ord>(items: &mut [T], key: impl Fn(&T) -> K) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn insert_blog(&self, mut blog: Blog) -> Result<Blog, StoreError> {
        let mut tables = self.write()?;
        let id = blog.id_typed();
        if tables.blogs.contains_key(&id) {
            return Err(StoreError::Concurrency(format!("blog {id} already exists")));
        }

        blog.set_version(1);
        let blog = blog.with_comment_ids(Vec::new());
        tables.blogs.insert(id, blog.clone());
        Ok(blog)
    }

    async fn get_blog(&self, id: BlogId) -> Result<Option<Blog>, StoreError> {
        let tables = self.read()?;
        Ok(tables.blogs.get(&id).map(|b| tables.blog_view(b)))
    }

    async fn get_blog_with_comments(
        &self,
        id: BlogId,
    ) -> Result<Option<(Blog, Vec<Comment>)>, StoreError> {
        let tables = self.read()?;
        let Some(blog) = tables.blogs.get(&id).map(|b| tables.blog_view(b)) else {
            return Ok(None);
        };

        let mut comments = blog
            .child_ids()
            .iter()
            .map(|cid| {
                tables.comments.get(cid).cloned().ok_or_else(|| {
                    StoreError::Consistency(format!("blog {id}: indexed comment {cid} is missing"))
                })
            })
            .collect::<Result<Vec<Comment>, StoreError>>()?;
        newest_first(&mut comments, |c| (c.created_at(), c.id_typed()));
        Ok(Some((blog, comments)))
    }

    async fn list_blogs(&self, filter: BlogFilter) -> Result<Vec<Blog>, StoreError> {
        let tables = self.read()?;
        let mut blogs: Vec<Blog> = tables
            .blogs
            .values()
            .filter(|b| filter.matches(b))
            .map(|b| tables.blog_view(b))
            .collect();
        newest_first(&mut blogs, |b| (b.created_at(), b.id_typed()));
        Ok(blogs)
    }

    async fn save_blog(&self, mut blog: Blog, expected: ExpectedVersion) -> Result<Blog, StoreError> {
        let mut tables = self.write()?;
        let id = blog.id_typed();
        let current = tables
            .blogs
            .get(&id)
            .ok_or(StoreError::NotFound("blog"))?;

        expected
            .check(current.version())
            .map_err(|e| StoreError::Concurrency(format!("blog {id}: {e}")))?;
        if current.author_id() != blog.author_id() {
            return Err(StoreError::Consistency(format!("blog {id}: author is immutable")));
        }

        blog.set_version(current.version() + 1);
        let stored = blog.with_comment_ids(Vec::new());
        tables.blogs.insert(id, stored.clone());
        Ok(tables.blog_view(&stored))
    }

    async fn delete_blog(&self, id: BlogId) -> Result<Vec<CommentId>, StoreError> {
        let mut tables = self.write()?;
        if !tables.blogs.contains_key(&id) {
            return Err(StoreError::NotFound("blog"));
        }

        let indexed = tables.comments_by_blog.get(&id).cloned().unwrap_or_default();

        // Verify the index agrees with the comment table before touching
        // anything; a mismatch would leave orphans behind.
        let owned = tables.comments.values().filter(|c| c.blog_id() == id).count();
        let all_present = indexed
            .iter()
            .all(|cid| tables.comments.get(cid).is_some_and(|c| c.blog_id() == id));
        if owned != indexed.len() || !all_present {
            tracing::error!(blog_id = %id, indexed = indexed.len(), owned, "comment index out of sync");
            return Err(StoreError::Consistency(format!(
                "blog {id}: comment index out of sync, cascade aborted"
            )));
        }

        for cid in &indexed {
            tables.comments.remove(cid);
        }
        tables.comments_by_blog.remove(&id);
        tables.blogs.remove(&id);
        Ok(indexed)
    }

    async fn insert_comment(&self, mut comment: Comment) -> Result<Comment, StoreError> {
        let mut tables = self.write()?;
        let id = comment.id_typed();
        let blog_id = comment.blog_id();

        if !tables.blogs.contains_key(&blog_id) {
            return Err(StoreError::NotFound("blog"));
        }
        if tables.comments.contains_key(&id) {
            return Err(StoreError::Concurrency(format!("comment {id} already exists")));
        }

        comment.set_version(1);
        tables.comments.insert(id, comment.clone());
        tables.comments_by_blog.entry(blog_id).or_default().push(id);
        Ok(comment)
    }

    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>, StoreError> {
        Ok(self.read()?.comments.get(&id).cloned())
    }

    async fn list_comments(&self, blog_id: BlogId) -> Result<Vec<Comment>, StoreError> {
        let tables = self.read()?;
        let mut comments: Vec<Comment> = tables
            .comments_by_blog
            .get(&blog_id)
            .into_iter()
            .flatten()
            .filter_map(|cid| tables.comments.get(cid).cloned())
            .collect();
        newest_first(&mut comments, |c| (c.created_at(), c.id_typed()));
        Ok(comments)
    }

    async fn save_comment(
        &self,
        mut comment: Comment,
        expected: ExpectedVersion,
    ) -> Result<Comment, StoreError> {
        let mut tables = self.write()?;
        let id = comment.id_typed();
        let current = tables
            .comments
            .get(&id)
            .ok_or(StoreError::NotFound("comment"))?;

        expected
            .check(current.version())
            .map_err(|e| StoreError::Concurrency(format!("comment {id}: {e}")))?;
        if current.blog_id() != comment.blog_id() || current.author_id() != comment.author_id() {
            return Err(StoreError::Consistency(format!(
                "comment {id}: blog and author are immutable"
            )));
        }

        comment.set_version(current.version() + 1);
        tables.comments.insert(id, comment.clone());
        Ok(comment)
    }

    async fn delete_comment(&self, id: CommentId) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let blog_id = tables
            .comments
            .get(&id)
            .map(|c| c.blog_id())
            .ok_or(StoreError::NotFound("comment"))?;

        if let Some(ids) = tables.comments_by_blog.get_mut(&blog_id) {
            ids.retain(|cid| *cid != id);
            if ids.is_empty() {
                tables.comments_by_blog.remove(&blog_id);
            }
        }
        tables.comments.remove(&id);
        Ok(())
    }
}
