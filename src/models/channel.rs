//! Source channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A channel posts are scraped from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub title: Option<String>,
    pub chat_type: String,
    pub added_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Activity observed for a channel after a successful post write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelActivity {
    pub channel_id: i64,
    pub title: Option<String>,
    pub chat_type: Option<String>,
    pub message_at: DateTime<Utc>,
}

impl Channel {
    /// Apply observed activity; `last_message_at` only moves forward.
    pub fn apply(&mut self, activity: &ChannelActivity) {
        if let Some(title) = &activity.title {
            self.title = Some(title.clone());
        }
        if let Some(chat_type) = &activity.chat_type {
            self.chat_type = chat_type.clone();
        }
        let newer = self
            .last_message_at
            .is_none_or(|last| activity.message_at > last);
        if newer {
            self.last_message_at = Some(activity.message_at);
        }
    }
}
