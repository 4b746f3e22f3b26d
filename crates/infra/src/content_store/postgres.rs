//! Postgres-backed content store.
//!
//! ## Cross-references
//!
//! `comments.blog_id` is the only stored link between the two tables. A blog's
//! comment ids are read with `ARRAY(SELECT id FROM comments WHERE blog_id = ..
//! ORDER BY seq)`, so there is no second copy to keep in sync.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Concurrency` |
//! | Database (foreign key violation) | `23503` | `NotFound("blog")` on comment insert, else `Backend` |
//! | any error while cascading comments | N/A | `Consistency` (transaction rolled back) |
//! | Other | N/A | `Backend` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use quill_content::{Blog, BlogSnapshot, Comment, CommentSnapshot, LikeSet};
use quill_core::{BlogId, CommentId, Entity, ExpectedVersion, UserId};

use super::r#trait::{BlogFilter, ContentStore, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_content.sql");

const BLOG_COLUMNS: &str = r#"
    b.id, b.author_id, b.title, b.content, b.image, b.tags, b.likes,
    b.created_at, b.updated_at, b.version,
    ARRAY(SELECT c.id FROM comments c WHERE c.blog_id = b.id ORDER BY c.seq) AS comment_ids
"#;

const COMMENT_COLUMNS: &str = r#"
    id, blog_id, author_id, content, likes, created_at, updated_at, version
"#;

/// Postgres-backed content store.
///
/// Every multi-statement operation runs in one transaction; version checks
/// are part of the `UPDATE` predicate so concurrent writers cannot interleave
/// between check and write.
#[derive(Debug, Clone)]
pub struct PostgresContentStore {
    pool: Arc<PgPool>,
}

impl PostgresContentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create tables and indexes if they do not exist.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn comment_ids(&self, blog_id: BlogId) -> Result<Vec<CommentId>, StoreError> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM comments WHERE blog_id = $1 ORDER BY seq",
        )
        .bind(blog_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("comment_ids", e))?;
        Ok(ids.into_iter().map(CommentId::from_uuid).collect())
    }

    async fn blog_exists(&self, id: BlogId) -> Result<bool, StoreError> {
        let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM blogs WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("blog_exists", e))?;
        Ok(found.is_some())
    }

    async fn comment_exists(&self, id: CommentId) -> Result<bool, StoreError> {
        let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM comments WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("comment_exists", e))?;
        Ok(found.is_some())
    }
}

fn expected_param(expected: ExpectedVersion) -> Option<i64> {
    match expected {
        ExpectedVersion::Any => None,
        ExpectedVersion::Exact(v) => Some(v as i64),
    }
}

fn user_uuids(likes: &LikeSet) -> Vec<Uuid> {
    likes.iter().map(|u| *u.as_uuid()).collect()
}

#[async_trait]
impl ContentStore for PostgresContentStore {
    #[instrument(skip(self, blog), fields(blog_id = %blog.id_typed()), err)]
    async fn insert_blog(&self, mut blog: Blog) -> Result<Blog, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO blogs (
                id, author_id, title, content, image, tags, likes,
                created_at, updated_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 1)
            "#,
        )
        .bind(blog.id_typed().as_uuid())
        .bind(blog.author_id().as_uuid())
        .bind(blog.title())
        .bind(blog.content())
        .bind(blog.image())
        .bind(blog.tags())
        .bind(user_uuids(blog.likes()))
        .bind(blog.created_at())
        .bind(blog.updated_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_blog", e))?;

        blog.set_version(1);
        Ok(blog.with_comment_ids(Vec::new()))
    }

    #[instrument(skip(self), fields(blog_id = %id), err)]
    async fn get_blog(&self, id: BlogId) -> Result<Option<Blog>, StoreError> {
        let row = sqlx::query(&format!("SELECT {BLOG_COLUMNS} FROM blogs b WHERE b.id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_blog", e))?;

        row.map(|r| BlogRow::try_from_row(&r).map(Blog::from))
            .transpose()
    }

    #[instrument(skip(self), fields(blog_id = %id), err)]
    async fn get_blog_with_comments(
        &self,
        id: BlogId,
    ) -> Result<Option<(Blog, Vec<Comment>)>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Both reads see the same snapshot.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;

        let row = sqlx::query(&format!("SELECT {BLOG_COLUMNS} FROM blogs b WHERE b.id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("get_blog_with_comments", e))?;
        let Some(row) = row else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Ok(None);
        };
        let blog = Blog::from(BlogRow::try_from_row(&row)?);

        let rows = sqlx::query(&format!(
            r#"
            SELECT {COMMENT_COLUMNS}
            FROM comments
            WHERE blog_id = $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("get_blog_with_comments", e))?;
        let comments = rows
            .iter()
            .map(|r| CommentRow::try_from_row(r).map(Comment::from))
            .collect::<Result<Vec<_>, _>>()?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(Some((blog, comments)))
    }

    #[instrument(skip(self), err)]
    async fn list_blogs(&self, filter: BlogFilter) -> Result<Vec<Blog>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {BLOG_COLUMNS}
            FROM blogs b
            WHERE ($1::UUID IS NULL OR b.author_id = $1)
            ORDER BY b.created_at DESC, b.id DESC
            "#
        ))
        .bind(filter.author_id.map(|a| *a.as_uuid()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_blogs", e))?;

        rows.iter()
            .map(|r| BlogRow::try_from_row(r).map(Blog::from))
            .collect()
    }

    #[instrument(skip(self, blog), fields(blog_id = %blog.id_typed(), expected = ?expected), err)]
    async fn save_blog(&self, mut blog: Blog, expected: ExpectedVersion) -> Result<Blog, StoreError> {
        let id = blog.id_typed();
        // author_id is part of the predicate: it is immutable and a mismatch
        // must never be written.
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE blogs
            SET title = $3, content = $4, image = $5, tags = $6, likes = $7,
                updated_at = $8, version = version + 1
            WHERE id = $1 AND author_id = $2 AND ($9::BIGINT IS NULL OR version = $9)
            RETURNING version
            "#,
        )
        .bind(id.as_uuid())
        .bind(blog.author_id().as_uuid())
        .bind(blog.title())
        .bind(blog.content())
        .bind(blog.image())
        .bind(blog.tags())
        .bind(user_uuids(blog.likes()))
        .bind(blog.updated_at())
        .bind(expected_param(expected))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_blog", e))?;

        let Some(version) = version else {
            return if self.blog_exists(id).await? {
                Err(StoreError::Concurrency(format!("blog {id}: expected {expected:?}")))
            } else {
                Err(StoreError::NotFound("blog"))
            };
        };

        blog.set_version(version as u64);
        let comment_ids = self.comment_ids(id).await?;
        Ok(blog.with_comment_ids(comment_ids))
    }

    #[instrument(skip(self), fields(blog_id = %id), err)]
    async fn delete_blog(&self, id: BlogId) -> Result<Vec<CommentId>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Lock the parent so no comment can be attached while we cascade.
        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM blogs WHERE id = $1 FOR UPDATE")
                .bind(id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("lock_blog", e))?;
        if locked.is_none() {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::NotFound("blog"));
        }

        let removed = match sqlx::query(
            "DELETE FROM comments WHERE blog_id = $1 RETURNING id, seq",
        )
        .bind(id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(blog_id = %id, error = %e, "comment cascade failed; blog kept");
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(StoreError::Consistency(format!(
                    "blog {id}: comment cascade failed: {e}"
                )));
            }
        };

        let mut removed: Vec<(i64, CommentId)> = removed
            .iter()
            .map(|r| -> Result<(i64, CommentId), sqlx::Error> {
                Ok((
                    r.try_get::<i64, _>("seq")?,
                    CommentId::from_uuid(r.try_get::<Uuid, _>("id")?),
                ))
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(|e| map_sqlx_error("decode_cascade", e))?;
        removed.sort_by_key(|(seq, _)| *seq);

        sqlx::query("DELETE FROM blogs WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_blog", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(removed.into_iter().map(|(_, cid)| cid).collect())
    }

    #[instrument(skip(self, comment), fields(comment_id = %comment.id_typed(), blog_id = %comment.blog_id()), err)]
    async fn insert_comment(&self, mut comment: Comment) -> Result<Comment, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        // Shared lock: concurrent comments may be added, a concurrent cascade
        // delete waits for us (or we wait for it and find no parent).
        let parent: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM blogs WHERE id = $1 FOR SHARE")
                .bind(comment.blog_id().as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("lock_parent", e))?;
        if parent.is_none() {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::NotFound("blog"));
        }

        sqlx::query(
            r#"
            INSERT INTO comments (
                id, blog_id, author_id, content, likes, created_at, updated_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1)
            "#,
        )
        .bind(comment.id_typed().as_uuid())
        .bind(comment.blog_id().as_uuid())
        .bind(comment.author_id().as_uuid())
        .bind(comment.content())
        .bind(user_uuids(comment.likes()))
        .bind(comment.created_at())
        .bind(comment.updated_at())
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StoreError::NotFound("blog")
            } else {
                map_sqlx_error("insert_comment", e)
            }
        })?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        comment.set_version(1);
        Ok(comment)
    }

    #[instrument(skip(self), fields(comment_id = %id), err)]
    async fn get_comment(&self, id: CommentId) -> Result<Option<Comment>, StoreError> {
        let row = sqlx::query(&format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_comment", e))?;

        row.map(|r| CommentRow::try_from_row(&r).map(Comment::from))
            .transpose()
    }

    #[instrument(skip(self), fields(blog_id = %blog_id), err)]
    async fn list_comments(&self, blog_id: BlogId) -> Result<Vec<Comment>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COMMENT_COLUMNS}
            FROM comments
            WHERE blog_id = $1
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(blog_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_comments", e))?;

        rows.iter()
            .map(|r| CommentRow::try_from_row(r).map(Comment::from))
            .collect()
    }

    #[instrument(skip(self, comment), fields(comment_id = %comment.id_typed(), expected = ?expected), err)]
    async fn save_comment(
        &self,
        mut comment: Comment,
        expected: ExpectedVersion,
    ) -> Result<Comment, StoreError> {
        let id = comment.id_typed();
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE comments
            SET content = $4, likes = $5, updated_at = $6, version = version + 1
            WHERE id = $1 AND blog_id = $2 AND author_id = $3
              AND ($7::BIGINT IS NULL OR version = $7)
            RETURNING version
            "#,
        )
        .bind(id.as_uuid())
        .bind(comment.blog_id().as_uuid())
        .bind(comment.author_id().as_uuid())
        .bind(comment.content())
        .bind(user_uuids(comment.likes()))
        .bind(comment.updated_at())
        .bind(expected_param(expected))
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_comment", e))?;

        let Some(version) = version else {
            return if self.comment_exists(id).await? {
                Err(StoreError::Concurrency(format!("comment {id}: expected {expected:?}")))
            } else {
                Err(StoreError::NotFound("comment"))
            };
        };

        comment.set_version(version as u64);
        Ok(comment)
    }

    #[instrument(skip(self), fields(comment_id = %id), err)]
    async fn delete_comment(&self, id: CommentId) -> Result<(), StoreError> {
        // Single statement: the reference disappears with the row.
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_comment", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("comment"));
        }
        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Concurrency(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23503");
    }
    false
}

// SQLx row types

#[derive(Debug)]
struct BlogRow {
    id: Uuid,
    author_id: Uuid,
    title: String,
    content: String,
    image: String,
    tags: Vec<String>,
    likes: Vec<Uuid>,
    comment_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl BlogRow {
    fn try_from_row(row: &sqlx::postgres::PgRow) -> Result<Self, StoreError> {
        let decode = || -> Result<Self, sqlx::Error> {
            Ok(BlogRow {
                id: row.try_get("id")?,
                author_id: row.try_get("author_id")?,
                title: row.try_get("title")?,
                content: row.try_get("content")?,
                image: row.try_get("image")?,
                tags: row.try_get("tags")?,
                likes: row.try_get("likes")?,
                comment_ids: row.try_get("comment_ids")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
                version: row.try_get("version")?,
            })
        };
        decode().map_err(|e| StoreError::Backend(format!("failed to decode blog row: {e}")))
    }
}

impl From<BlogRow> for Blog {
    fn from(row: BlogRow) -> Self {
        Blog::restore(BlogSnapshot {
            id: BlogId::from_uuid(row.id),
            author_id: UserId::from_uuid(row.author_id),
            title: row.title,
            content: row.content,
            image: row.image,
            tags: row.tags,
            likes: row.likes.into_iter().map(UserId::from_uuid).collect(),
            comment_ids: row.comment_ids.into_iter().map(CommentId::from_uuid).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version as u64,
        })
    }
}

#[derive(Debug)]
struct CommentRow {
    id: Uuid,
    blog_id: Uuid,
    author_id: Uuid,
    content: String,
    likes: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl CommentRow {
    fn try_from_row(row: &sqlx::postgres::PgRow) -> Result<Self, StoreError> {
        let decode = || -> Result<Self, sqlx::Error> {
            Ok(CommentRow {
                id: row.try_get("id")?,
                blog_id: row.try_get("blog_id")?,
                author_id: row.try_get("author_id")?,
                content: row.try_get("content")?,
                likes: row.try_get("likes")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
                version: row.try_get("version")?,
            })
        };
        decode().map_err(|e| StoreError::Backend(format!("failed to decode comment row: {e}")))
    }
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment::restore(CommentSnapshot {
            id: CommentId::from_uuid(row.id),
            blog_id: BlogId::from_uuid(row.blog_id),
            author_id: UserId::from_uuid(row.author_id),
            content: row.content,
            likes: row.likes.into_iter().map(UserId::from_uuid).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version as u64,
        })
    }
}
