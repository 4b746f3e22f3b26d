//! Infrastructure layer: content storage, the content service, media storage
//! and (under `postgres`) the persistent user directory.

pub mod content_store;
pub mod media;
pub mod service;
#[cfg(feature = "postgres")]
pub mod user_store;
pub mod views;


pub use content_store::{BlogFilter, ContentStore, InMemoryContentStore, StoreError};
#[cfg(feature = "postgres")]
pub use content_store::PostgresContentStore;
pub use media::{LocalMediaStore, MediaError, MediaStore, StoredMedia};
pub use service::{ContentService, MAX_WRITE_ATTEMPTS, ServiceError};
#[cfg(feature = "postgres")]
pub use user_store::PostgresUserDirectory;
pub use views::{Author, BlogDetail, BlogView, CommentView};
