//! Media byte retrieval.
//!
//! Bytes are only read to compute perceptual hashes and are dropped right
//! after.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::{MediaConfig, MediaDescriptor};
use crate::utils::http::{create_client, fetch_bytes};
use crate::utils::url::normalize_link;

/// Supplies the content of a media item.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Bytes for `descriptor`; `Ok(None)` when this source has no reference
    /// for it.
    async fn fetch(&self, descriptor: &MediaDescriptor) -> Result<Option<Vec<u8>>>;
}

/// Reads `local_path`, relative paths resolved against `root`.
#[derive(Debug, Clone, Default)]
pub struct LocalMediaSource {
    root: Option<PathBuf>,
}

impl LocalMediaSource {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[async_trait]
impl MediaSource for LocalMediaSource {
    async fn fetch(&self, descriptor: &MediaDescriptor) -> Result<Option<Vec<u8>>> {
        let Some(path) = &descriptor.local_path else {
            return Ok(None);
        };
        let full = self.resolve(path);
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) => Err(AppError::media(full.display().to_string(), e)),
        }
    }
}

/// Downloads `remote_url`.
#[derive(Debug, Clone)]
pub struct HttpMediaSource {
    client: Client,
}

impl HttpMediaSource {
    pub fn new(config: &MediaConfig) -> Result<Self> {
        Ok(Self {
            client: create_client(config)?,
        })
    }
}

#[async_trait]
impl MediaSource for HttpMediaSource {
    async fn fetch(&self, descriptor: &MediaDescriptor) -> Result<Option<Vec<u8>>> {
        let Some(raw) = &descriptor.remote_url else {
            return Ok(None);
        };
        let url = normalize_link(raw)
            .ok_or_else(|| AppError::invalid_input(descriptor.reference(), "unusable media URL"))?;
        fetch_bytes(&self.client, &url).await.map(Some)
    }
}

/// Local file first, then remote URL.
pub struct MediaSources {
    sources: Vec<Box<dyn MediaSource>>,
}

impl MediaSources {
    pub fn new(sources: Vec<Box<dyn MediaSource>>) -> Self {
        Self { sources }
    }

    /// Local and HTTP sources for the given configuration.
    pub fn from_config(config: &MediaConfig) -> Result<Self> {
        Ok(Self::new(vec![
            Box::new(LocalMediaSource::new(config.root_dir.clone())),
            Box::new(HttpMediaSource::new(config)?),
        ]))
    }
}

#[async_trait]
impl MediaSource for MediaSources {
    async fn fetch(&self, descriptor: &MediaDescriptor) -> Result<Option<Vec<u8>>> {
        let mut last_error = None;
        for source in &self.sources {
            match source.fetch(descriptor).await {
                Ok(Some(bytes)) => return Ok(Some(bytes)),
                Ok(None) => {}
                Err(e) => {
                    log::debug!("Media source failed for {}: {}", descriptor.reference(), e);
                    last_error = Some(e);
                }
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaKind;
    use tempfile::TempDir;

    fn descriptor(local: Option<&str>, remote: Option<&str>) -> MediaDescriptor {
        MediaDescriptor {
            message_id: 1,
            kind: MediaKind::Image,
            local_path: local.map(String::from),
            remote_url: remote.map(String::from),
            file_size: None,
            mime_type: Some("image/jpeg".into()),
            width: None,
            height: None,
            duration_sec: None,
        }
    }

    #[tokio::test]
    async fn test_local_relative_to_root() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a.jpg"), b"bytes").unwrap();
        let source = LocalMediaSource::new(Some(tmp.path().to_path_buf()));

        let bytes = source.fetch(&descriptor(Some("a.jpg"), None)).await.unwrap();
        assert_eq!(bytes.as_deref(), Some(&b"bytes"[..]));
        assert!(source.fetch(&descriptor(None, None)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_local_file_is_transient() {
        let tmp = TempDir::new().unwrap();
        let source = LocalMediaSource::new(Some(tmp.path().to_path_buf()));
        let err = source
            .fetch(&descriptor(Some("missing.jpg"), None))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_chain_falls_through_to_later_sources() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("b.jpg"), b"second").unwrap();
        let sources = MediaSources::new(vec![
            Box::new(LocalMediaSource::new(Some(tmp.path().join("empty")))),
            Box::new(LocalMediaSource::new(Some(tmp.path().to_path_buf()))),
        ]);

        let bytes = sources.fetch(&descriptor(Some("b.jpg"), None)).await.unwrap();
        assert_eq!(bytes.as_deref(), Some(&b"second"[..]));
        assert!(sources.fetch(&descriptor(None, None)).await.unwrap().is_none());
    }
}
