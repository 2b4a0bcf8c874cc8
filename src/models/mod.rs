// src/models/mod.rs

//! Domain models for the listing engine.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod channel;
mod config;
mod deletion;
mod duplicate;
mod gazetteer;
mod listing;
mod media;
mod post;

// Re-export all public types
pub use channel::{Channel, ChannelActivity};
pub use config::{
    Config, DedupConfig, ExtractionConfig, FingerprintConfig, LoggingConfig, MediaConfig,
    PathsConfig, PipelineConfig, RetryConfig, ScoreWeights,
};
pub use deletion::DeletionLogEntry;
pub use duplicate::{DuplicateEdge, EdgeDraft, MatchType};
pub use gazetteer::{AliasMatch, District, Gazetteer, GazetteerData, MetroStation};
pub use listing::{Amenities, Currency, DealType, Listing, ObjectType, PricePeriod, TenantType};
pub use media::{MediaDescriptor, MediaKind, MediaRecord};
pub use post::{DeletionSignal, MessageKey, PostId, PostRecord, RawPost, RawTokens};

/// A post that exhausted its retries and needs a human look.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ManualReviewItem {
    pub post_uid: String,
    pub channel_id: i64,
    pub message_id: i64,
    pub reason: String,
    pub attempts: u32,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}
