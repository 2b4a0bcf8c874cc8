//! Deletion analytics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{PostId, PostRecord};

/// Immutable record of a post going from active to deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionLogEntry {
    pub post_id: PostId,
    pub channel_id: i64,
    pub message_id: i64,
    pub detected_at: DateTime<Utc>,
    /// Whole hours between publish and detection
    pub lifetime_hours: i64,
}

impl DeletionLogEntry {
    pub fn for_post(post: &PostRecord, detected_at: DateTime<Utc>) -> Self {
        Self {
            post_id: post.id,
            channel_id: post.channel_id,
            message_id: post.message_id,
            detected_at,
            lifetime_hours: (detected_at - post.published_at).num_hours().max(0),
        }
    }
}
