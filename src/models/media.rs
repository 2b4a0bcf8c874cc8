//! Media attached to posts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::PostId;
use crate::pipeline::phash::ImageHash;

/// Kind of attached medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Document,
    Audio,
    Voice,
    Sticker,
}

impl MediaKind {
    /// Classify a document by its mime type.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        if mime.starts_with("image/") {
            MediaKind::Image
        } else if mime.starts_with("video/") {
            MediaKind::Video
        } else if mime.starts_with("audio/") {
            MediaKind::Audio
        } else {
            MediaKind::Document
        }
    }
}

/// Media descriptor as delivered by the crawler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaDescriptor {
    /// Message id carrying the medium (differs per album item)
    pub message_id: i64,

    pub kind: MediaKind,

    #[serde(default)]
    pub local_path: Option<String>,

    #[serde(default)]
    pub remote_url: Option<String>,

    #[serde(default)]
    pub file_size: Option<u64>,

    #[serde(default)]
    pub mime_type: Option<String>,

    #[serde(default)]
    pub width: Option<u32>,

    #[serde(default)]
    pub height: Option<u32>,

    #[serde(default)]
    pub duration_sec: Option<u32>,
}

impl MediaDescriptor {
    /// Storage reference used in logs and errors.
    pub fn reference(&self) -> String {
        self.local_path
            .clone()
            .or_else(|| self.remote_url.clone())
            .unwrap_or_else(|| format!("message {}", self.message_id))
    }
}

/// A stored medium, owned by exactly one post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaRecord {
    pub post_id: PostId,
    pub message_id: i64,
    pub kind: MediaKind,
    pub local_path: Option<String>,
    pub remote_url: Option<String>,
    pub file_size: Option<u64>,
    pub mime_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_sec: Option<u32>,

    /// Perceptual hash, images only
    pub phash: Option<ImageHash>,

    pub created_at: DateTime<Utc>,
}

impl MediaRecord {
    /// Build a record from a descriptor; `post_id` is filled in on commit.
    pub fn from_descriptor(
        descriptor: &MediaDescriptor,
        phash: Option<ImageHash>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            post_id: 0,
            message_id: descriptor.message_id,
            kind: descriptor.kind,
            local_path: descriptor.local_path.clone(),
            remote_url: descriptor.remote_url.clone(),
            file_size: descriptor.file_size,
            mime_type: descriptor.mime_type.clone(),
            width: descriptor.width,
            height: descriptor.height,
            duration_sec: descriptor.duration_sec,
            phash,
            created_at,
        }
    }
}
