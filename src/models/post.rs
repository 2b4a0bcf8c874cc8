//! Post data structures: what the crawler delivers and what gets stored.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::MediaDescriptor;
use crate::pipeline::fingerprint::Fingerprint;

/// Internal post identifier assigned by storage.
pub type PostId = u64;

/// Channel-scoped message identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageKey {
    pub channel_id: i64,
    pub message_id: i64,
}

impl MessageKey {
    pub fn new(channel_id: i64, message_id: i64) -> Self {
        Self {
            channel_id,
            message_id,
        }
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel_id, self.message_id)
    }
}

/// Entity tokens the crawler already resolved (link entities, buttons, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawTokens {
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
}

/// A new or edited message (or album) delivered by the crawler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPost {
    pub channel_id: i64,

    /// Message id; for albums, the first message of the group
    pub message_id: i64,

    #[serde(default)]
    pub grouped_id: Option<i64>,

    #[serde(default)]
    pub channel_title: Option<String>,

    #[serde(default)]
    pub chat_type: Option<String>,

    #[serde(default)]
    pub text: Option<String>,

    pub published_at: DateTime<Utc>,

    #[serde(default)]
    pub media: Vec<MediaDescriptor>,

    #[serde(default)]
    pub entities: RawTokens,
}

impl RawPost {
    pub fn key(&self) -> MessageKey {
        MessageKey::new(self.channel_id, self.message_id)
    }

    /// Stable string identity: `msg:{channel}:{message}` or `album:{channel}:{group}`.
    pub fn post_uid(&self) -> String {
        match self.grouped_id {
            Some(group) => format!("album:{}:{}", self.channel_id, group),
            None => format!("msg:{}:{}", self.channel_id, self.message_id),
        }
    }

    /// Reject input that cannot be a real message.
    pub fn validate(&self) -> Result<()> {
        let uid = self.post_uid();
        if self.message_id <= 0 {
            return Err(AppError::invalid_input(uid, "message_id must be positive"));
        }
        if self.channel_id == 0 {
            return Err(AppError::invalid_input(uid, "channel_id is missing"));
        }
        if let Some(text) = &self.text {
            if text.contains('\u{0}') {
                return Err(AppError::invalid_input(uid, "text contains NUL bytes"));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for item in &self.media {
            if item.message_id <= 0 || !seen.insert(item.message_id) {
                return Err(AppError::invalid_input(
                    uid,
                    format!("invalid or repeated media message_id {}", item.message_id),
                ));
            }
        }
        Ok(())
    }
}

/// Crawler notice that a message was removed from its channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionSignal {
    pub channel_id: i64,
    pub message_id: i64,

    /// When the crawler noticed; defaults to processing time
    #[serde(default)]
    pub detected_at: Option<DateTime<Utc>>,
}

impl DeletionSignal {
    pub fn key(&self) -> MessageKey {
        MessageKey::new(self.channel_id, self.message_id)
    }
}

/// A stored post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostRecord {
    pub id: PostId,
    pub post_uid: String,
    pub channel_id: i64,
    pub message_id: i64,
    pub grouped_id: Option<i64>,

    pub text_raw: Option<String>,
    pub text_len: usize,

    pub phones: Vec<String>,
    pub links: Vec<String>,
    pub hashtags: Vec<String>,
    pub mentions: Vec<String>,

    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,

    pub text_hash: Option<String>,
    pub fingerprint: Option<Fingerprint>,
    pub duplicate_of: Option<PostId>,
}

impl PostRecord {
    pub fn key(&self) -> MessageKey {
        MessageKey::new(self.channel_id, self.message_id)
    }

    /// A root post is the canonical representative of its duplicate cluster.
    pub fn is_root(&self) -> bool {
        self.duplicate_of.is_none()
    }

    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn raw(message_id: i64, grouped_id: Option<i64>) -> RawPost {
        RawPost {
            channel_id: -100123,
            message_id,
            grouped_id,
            channel_title: None,
            chat_type: None,
            text: Some("Сдаю квартиру".into()),
            published_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            media: Vec::new(),
            entities: RawTokens::default(),
        }
    }

    #[test]
    fn test_post_uid() {
        assert_eq!(raw(42, None).post_uid(), "msg:-100123:42");
        assert_eq!(raw(42, Some(777)).post_uid(), "album:-100123:777");
    }

    #[test]
    fn test_validate_rejects_bad_ids() {
        assert!(raw(42, None).validate().is_ok());
        assert!(raw(0, None).validate().is_err());

        let mut post = raw(42, None);
        post.text = Some("bad\u{0}text".into());
        assert!(post.validate().is_err());
    }

    #[test]
    fn test_raw_post_from_json() {
        let json = r#"{
            "channel_id": 5,
            "message_id": 9,
            "text": "hello",
            "published_at": "2026-03-01T12:00:00Z"
        }"#;
        let post: RawPost = serde_json::from_str(json).unwrap();
        assert_eq!(post.key(), MessageKey::new(5, 9));
        assert!(post.media.is_empty());
        assert!(post.entities.links.is_empty());
    }
}
