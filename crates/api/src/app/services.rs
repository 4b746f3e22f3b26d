//! Infrastructure wiring: content store, user directory, media store.

use std::sync::Arc;

use quill_auth::{InMemoryUserDirectory, UserDirectory};
use quill_infra::{ContentService, ContentStore, InMemoryContentStore, LocalMediaStore, MediaStore};

use crate::config::ApiConfig;

pub type SharedContentService = ContentService<Arc<dyn ContentStore>, Arc<dyn UserDirectory>>;

pub struct AppServices {
    pub content: SharedContentService,
    pub media: Arc<dyn MediaStore>,
    pub directory: Arc<dyn UserDirectory>,
}

pub async fn build_services(config: &ApiConfig) -> anyhow::Result<AppServices> {
    let (store, directory) = build_stores(config).await?;
    let media: Arc<dyn MediaStore> = Arc::new(LocalMediaStore::new(
        config.upload_dir.clone(),
        config.public_base_url.clone(),
        config.max_upload_bytes,
    ));

    Ok(AppServices {
        content: ContentService::new(store, Arc::clone(&directory)),
        media,
        directory,
    })
}

type Stores = (Arc<dyn ContentStore>, Arc<dyn UserDirectory>);

async fn build_stores(config: &ApiConfig) -> anyhow::Result<Stores> {
    match config.database_url.as_deref() {
        #[cfg(feature = "postgres")]
        Some(url) => build_postgres_stores(url).await,
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            tracing::warn!("DATABASE_URL set but postgres feature not enabled, falling back to in-memory");
            Ok(in_memory_stores())
        }
        None => {
            tracing::info!("using in-memory content store");
            Ok(in_memory_stores())
        }
    }
}

fn in_memory_stores() -> Stores {
    (
        Arc::new(InMemoryContentStore::new()),
        Arc::new(InMemoryUserDirectory::default()),
    )
}

#[cfg(feature = "postgres")]
async fn build_postgres_stores(url: &str) -> anyhow::Result<Stores> {
    use anyhow::Context;
    use quill_infra::{PostgresContentStore, PostgresUserDirectory};
    use sqlx::postgres::PgPoolOptions;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to DATABASE_URL")?;
    let store = PostgresContentStore::new(pool.clone());
    store.migrate().await.context("failed to apply content schema")?;
    let directory = PostgresUserDirectory::load(pool)
        .await
        .context("failed to load user directory")?;

    tracing::info!("using postgres content store and user directory");
    Ok((Arc::new(store), Arc::new(directory)))
}
