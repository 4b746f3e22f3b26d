//! Postgres-backed user directory.
//!
//! Profiles live in an in-memory cache that is filled from the `users` table
//! at startup. `remember` updates the cache synchronously and writes changed
//! profiles through to the table in the background, so author names survive
//! restarts without putting a database round-trip on every request.

use std::sync::Arc;

use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use quill_auth::{InMemoryUserDirectory, UserDirectory, UserProfile};
use quill_core::UserId;

use crate::content_store::StoreError;

#[derive(Debug, Clone)]
pub struct PostgresUserDirectory {
    cache: Arc<InMemoryUserDirectory>,
    pool: Arc<PgPool>,
}

impl PostgresUserDirectory {
    /// Load every stored profile. The `users` table is created by
    /// [`PostgresContentStore::migrate`](crate::PostgresContentStore::migrate).
    #[instrument(skip(pool), err)]
    pub async fn load(pool: PgPool) -> Result<Self, StoreError> {
        let rows = sqlx::query("SELECT id, username, avatar FROM users")
            .fetch_all(&pool)
            .await
            .map_err(|e| StoreError::Backend(format!("load users: {e}")))?;

        let cache = InMemoryUserDirectory::new();
        for row in &rows {
            let read = |e: sqlx::Error| StoreError::Backend(format!("decode user: {e}"));
            let id: Uuid = row.try_get("id").map_err(read)?;
            cache.refresh(UserProfile {
                id: UserId::from_uuid(id),
                username: row.try_get("username").map_err(read)?,
                avatar: row.try_get("avatar").map_err(read)?,
            });
        }
        tracing::info!(users = rows.len(), "user directory loaded");

        Ok(Self {
            cache: Arc::new(cache),
            pool: Arc::new(pool),
        })
    }
}

async fn upsert(pool: &PgPool, profile: &UserProfile) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO users (id, username, avatar) VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE SET username = EXCLUDED.username, avatar = EXCLUDED.avatar
        "#,
    )
    .bind(profile.id.as_uuid())
    .bind(&profile.username)
    .bind(&profile.avatar)
    .execute(pool)
    .await?;
    Ok(())
}

impl UserDirectory for PostgresUserDirectory {
    fn get(&self, id: &UserId) -> Option<UserProfile> {
        self.cache.get(id)
    }

    fn remember(&self, profile: UserProfile) {
        if !self.cache.refresh(profile.clone()) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(user_id = %profile.id, "no runtime, profile kept in memory only");
            return;
        };
        let pool = Arc::clone(&self.pool);
        runtime.spawn(async move {
            if let Err(e) = upsert(&pool, &profile).await {
                tracing::warn!(user_id = %profile.id, error = %e, "failed to persist user profile");
            }
        });
    }
}
