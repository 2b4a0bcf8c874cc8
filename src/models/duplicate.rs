//! Duplicate relation between a re-posted ad and its original.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::PostId;

/// Signal that linked a duplicate to its original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    TextExact,
    Phone,
    TextSimilar,
    Image,
}

impl MatchType {
    /// Resolution precedence, strongest first.
    pub const PRECEDENCE: [MatchType; 4] = [
        MatchType::TextExact,
        MatchType::Phone,
        MatchType::TextSimilar,
        MatchType::Image,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::TextExact => "text_exact",
            MatchType::Phone => "phone",
            MatchType::TextSimilar => "text_similar",
            MatchType::Image => "image",
        }
    }
}

/// Edge as decided by the resolver, before the duplicate has a stored id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDraft {
    pub original_id: PostId,
    pub match_type: MatchType,
    /// Similarity in [0, 1]
    pub similarity: f64,
}

/// Stored duplicate edge. One per `(original, duplicate, match_type)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateEdge {
    pub original_id: PostId,
    pub duplicate_id: PostId,
    pub match_type: MatchType,
    pub similarity: f64,
    pub created_at: DateTime<Utc>,
}

impl DuplicateEdge {
    pub fn from_draft(draft: &EdgeDraft, duplicate_id: PostId, created_at: DateTime<Utc>) -> Self {
        Self {
            original_id: draft.original_id,
            duplicate_id,
            match_type: draft.match_type,
            similarity: draft.similarity.clamp(0.0, 1.0),
            created_at,
        }
    }
}
