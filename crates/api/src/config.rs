//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;

use anyhow::Context;

use quill_infra::media::DEFAULT_MAX_UPLOAD_BYTES;

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Socket address to listen on (`BIND_ADDR`).
    pub bind_addr: String,
    /// HS256 secret shared with the identity provider (`JWT_SECRET`).
    pub jwt_secret: String,
    /// Postgres connection string (`DATABASE_URL`). Only honoured with the
    /// `postgres` feature.
    pub database_url: Option<String>,
    /// Directory uploaded images are written to and served from (`UPLOAD_DIR`).
    pub upload_dir: PathBuf,
    /// Origin used to build public image URLs (`PUBLIC_BASE_URL`).
    pub public_base_url: String,
    /// Upload size limit in bytes (`MAX_UPLOAD_BYTES`).
    pub max_upload_bytes: usize,
}

impl ApiConfig {
    /// Defaults for everything except the secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            jwt_secret: jwt_secret.into(),
            database_url: None,
            upload_dir: PathBuf::from("./uploads"),
            public_base_url: "http://localhost:5000".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });
        let mut config = Self::new(jwt_secret);

        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = addr;
        }
        config.database_url = get("DATABASE_URL");
        if let Some(dir) = get("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Some(url) = get("PUBLIC_BASE_URL") {
            config.public_base_url = url;
        }
        if let Some(raw) = get("MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = raw
                .trim()
                .parse()
                .with_context(|| format!("MAX_UPLOAD_BYTES must be a byte count, got {raw:?}"))?;
        }

        Ok(config)
    }
}
