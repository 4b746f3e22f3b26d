//! Image storage for blog cover images.
//!
//! The API hands raw upload bytes to a [`MediaStore`] and gets back a public
//! URL to put into a blog's `image` field.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

/// Accepted image extensions (lowercase).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Default upload limit: 5 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("no file uploaded")]
    Empty,

    #[error("only image files are allowed (got {0:?})")]
    UnsupportedType(String),

    #[error("file exceeds the {max} byte limit")]
    TooLarge { max: usize },

    #[error("media storage failure: {0}")]
    Io(#[from] std::io::Error),
}

/// A stored upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMedia {
    pub file_name: String,
    pub url: String,
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist an image. `original_name` is only used for its extension.
    async fn store_image(&self, original_name: &str, bytes: &[u8]) -> Result<StoredMedia, MediaError>;
}

/// Stores uploads as files under a local directory, served at `/uploads/*`.
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    public_base_url: String,
    max_bytes: usize,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn image_extension(original_name: &str) -> Result<String, MediaError> {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(MediaError::UnsupportedType(original_name.to_string()))
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()), err)]
    async fn store_image(&self, original_name: &str, bytes: &[u8]) -> Result<StoredMedia, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(MediaError::TooLarge { max: self.max_bytes });
        }
        let ext = image_extension(original_name)?;

        tokio::fs::create_dir_all(&self.root).await?;
        let file_name = format!("{}.{ext}", Uuid::now_v7());
        tokio::fs::write(self.root.join(&file_name), bytes).await?;

        tracing::info!(file_name = %file_name, "image stored");
        Ok(StoredMedia {
            url: format!("{}/uploads/{file_name}", self.public_base_url),
            file_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_check_is_case_insensitive() {
        assert_eq!(image_extension("Cover.PNG").unwrap(), "png");
        assert_eq!(image_extension("a.b.webp").unwrap(), "webp");
        assert!(matches!(image_extension("notes.txt"), Err(MediaError::UnsupportedType(_))));
        assert!(matches!(image_extension("no_extension"), Err(MediaError::UnsupportedType(_))));
    }

    #[tokio::test]
    async fn stores_file_and_returns_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "http://localhost:5000/", 1024);

        let stored = store.store_image("photo.jpg", b"jpeg-bytes").await.unwrap();

        assert!(stored.file_name.ends_with(".jpg"));
        assert_eq!(stored.url, format!("http://localhost:5000/uploads/{}", stored.file_name));
        let on_disk = std::fs::read(dir.path().join(&stored.file_name)).unwrap();
        assert_eq!(on_disk, b"jpeg-bytes");
    }

    #[tokio::test]
    async fn rejects_empty_oversized_and_non_images() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalMediaStore::new(dir.path(), "http://h", 4);

        assert!(matches!(store.store_image("a.png", b"").await, Err(MediaError::Empty)));
        assert!(matches!(
            store.store_image("a.png", b"12345").await,
            Err(MediaError::TooLarge { max: 4 })
        ));
        assert!(matches!(
            store.store_image("a.exe", b"1").await,
            Err(MediaError::UnsupportedType(_))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
