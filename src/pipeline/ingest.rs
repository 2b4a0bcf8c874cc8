//! Ingestion pipeline.
//!
//! Composes the stages for one post:
//!
//! 1. validate the raw post
//! 2. normalize, extract, fingerprint and hash images (pure, any concurrency)
//! 3. resolve duplicates and commit on the post's resolver shard
//! 4. record channel activity
//!
//! Transient failures are retried with exponential backoff; a post that keeps
//! failing is queued for manual review instead of being stored.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{
    ChannelActivity, Config, DeletionSignal, Gazetteer, Listing, ManualReviewItem,
    MediaDescriptor, MediaKind, MediaRecord, PostRecord, RawPost, RetryConfig,
};
use crate::pipeline::dedup::Signals;
use crate::pipeline::extract::Extractor;
use crate::pipeline::fingerprint::FingerprintEngine;
use crate::pipeline::lifecycle::{DeletionOutcome, LifecycleTracker};
use crate::pipeline::normalize::{NormalizedPost, Normalizer};
use crate::pipeline::phash::{self, ImageHash};
use crate::pipeline::resolver::ResolverPool;
use crate::services::MediaSource;
use crate::storage::{CommitReceipt, ListingStore};

/// A post with every content-derived value computed, ready for resolution.
#[derive(Debug, Clone)]
pub struct PreparedPost {
    pub record: PostRecord,
    pub listing: Listing,
    pub media: Vec<MediaRecord>,
    pub signals: Signals,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Stored(CommitReceipt),
    /// Retries ran out; the post was not stored.
    ManualReview(ManualReviewItem),
}

/// Aggregate counts for a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub created: usize,
    pub updated: usize,
    pub duplicates: usize,
    pub manual_review: usize,
    pub rejected: usize,
}

impl IngestReport {
    fn record(&mut self, result: &Result<IngestOutcome>) {
        match result {
            Ok(IngestOutcome::Stored(receipt)) => {
                if receipt.created {
                    self.created += 1;
                } else {
                    self.updated += 1;
                }
                if receipt.duplicate_of.is_some() {
                    self.duplicates += 1;
                }
            }
            Ok(IngestOutcome::ManualReview(_)) => self.manual_review += 1,
            Err(_) => self.rejected += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.created + self.updated + self.manual_review + self.rejected
    }
}

pub struct Pipeline {
    normalizer: Normalizer,
    extractor: Extractor,
    fingerprints: FingerprintEngine,
    media: Arc<dyn MediaSource>,
    store: Arc<dyn ListingStore>,
    resolver: ResolverPool,
    lifecycle: LifecycleTracker,
    retry: RetryConfig,
    hash_images: bool,
    max_concurrent: usize,
}

impl Pipeline {
    /// Build the pipeline and spawn its resolver shards. Must be called inside
    /// a Tokio runtime.
    pub fn new(
        config: &Config,
        gazetteer: Arc<Gazetteer>,
        store: Arc<dyn ListingStore>,
        media: Arc<dyn MediaSource>,
    ) -> Result<Self> {
        config.validate()?;
        gazetteer.validate()?;

        Ok(Self {
            normalizer: Normalizer::new()?,
            extractor: Extractor::new(&config.extraction, gazetteer)?,
            fingerprints: FingerprintEngine::new(&config.fingerprint),
            media,
            resolver: ResolverPool::spawn(Arc::clone(&store), &config.dedup),
            lifecycle: LifecycleTracker::new(Arc::clone(&store)),
            store,
            retry: config.retry.clone(),
            hash_images: config.media.hash_images,
            max_concurrent: config.pipeline.max_concurrent.max(1),
        })
    }

    pub fn store(&self) -> &Arc<dyn ListingStore> {
        &self.store
    }

    /// Normalize and extract without touching storage.
    pub fn parse(&self, text: &str) -> (NormalizedPost, Listing) {
        let normalized = self.normalizer.normalize(Some(text), &Default::default());
        let listing = self.extractor.extract(&normalized);
        (normalized, listing)
    }

    /// Compute everything that depends only on the post's own content.
    pub async fn prepare(&self, raw: &RawPost) -> Result<PreparedPost> {
        raw.validate()?;
        if self.extractor.gazetteer().is_empty() {
            return Err(AppError::GazetteerUnavailable(
                "no districts or metro stations loaded".to_string(),
            ));
        }

        let now = Utc::now();
        let normalized = self.normalizer.normalize(raw.text.as_deref(), &raw.entities);
        let listing = self.extractor.extract(&normalized);
        let text_hash = self.fingerprints.exact_hash(&normalized.text);
        let fingerprint = self.fingerprints.fingerprint(&normalized.text);
        let media = self.hash_media(raw, now).await?;

        let signals = Signals {
            is_real_estate: listing.is_real_estate,
            deal_type: listing.deal_type,
            object_type: listing.object_type,
            text_hash: text_hash.clone(),
            fingerprint: fingerprint.clone(),
            phones: normalized.phones.clone(),
            image_hashes: media.iter().filter_map(|m| m.phash).collect(),
        };

        let record = PostRecord {
            id: 0,
            post_uid: raw.post_uid(),
            channel_id: raw.channel_id,
            message_id: raw.message_id,
            grouped_id: raw.grouped_id,
            text_raw: raw.text.clone(),
            text_len: raw.text.as_deref().map_or(0, |t| t.chars().count()),
            phones: normalized.phones,
            links: normalized.links,
            hashtags: normalized.hashtags,
            mentions: normalized.mentions,
            published_at: raw.published_at,
            fetched_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
            text_hash,
            fingerprint,
            duplicate_of: None,
        };

        Ok(PreparedPost {
            record,
            listing,
            media,
            signals,
        })
    }

    async fn hash_media(&self, raw: &RawPost, now: DateTime<Utc>) -> Result<Vec<MediaRecord>> {
        let mut records = Vec::with_capacity(raw.media.len());
        for descriptor in &raw.media {
            let phash = if self.hash_images && descriptor.kind == MediaKind::Image {
                self.image_hash(descriptor).await?
            } else {
                None
            };
            records.push(MediaRecord::from_descriptor(descriptor, phash, now));
        }
        Ok(records)
    }

    async fn image_hash(&self, descriptor: &MediaDescriptor) -> Result<Option<ImageHash>> {
        let Some(bytes) = self.media.fetch(descriptor).await? else {
            return Ok(None);
        };
        match phash::hash_bytes(&bytes) {
            Ok(hash) => Ok(Some(hash)),
            Err(e) => {
                // Undecodable bytes will not improve on retry
                log::warn!("No perceptual hash for {}: {}", descriptor.reference(), e);
                Ok(None)
            }
        }
    }

    /// One attempt: prepare, resolve and commit, then record channel activity.
    pub async fn process(&self, raw: &RawPost) -> Result<CommitReceipt> {
        let prepared = self.prepare(raw).await?;
        let receipt = self.resolver.submit(prepared).await?;

        self.store
            .touch_channel(&ChannelActivity {
                channel_id: raw.channel_id,
                title: raw.channel_title.clone(),
                chat_type: raw.chat_type.clone(),
                message_at: raw.published_at,
            })
            .await?;
        Ok(receipt)
    }

    /// Process with retries. Fatal errors are returned; exhausted transient
    /// failures end up in the manual review queue.
    pub async fn ingest(&self, raw: &RawPost) -> Result<IngestOutcome> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match self.process(raw).await {
                Ok(receipt) => return Ok(IngestOutcome::Stored(receipt)),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => e,
            };

            if attempt < max_attempts {
                let delay = self.retry.delay_for(attempt);
                log::warn!(
                    "Attempt {}/{} for {} failed: {}; retrying in {}ms",
                    attempt,
                    max_attempts,
                    raw.post_uid(),
                    err,
                    delay
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
                continue;
            }

            log::error!(
                "Giving up on {} after {} attempts: {}",
                raw.post_uid(),
                attempt,
                err
            );
            let item = ManualReviewItem {
                post_uid: raw.post_uid(),
                channel_id: raw.channel_id,
                message_id: raw.message_id,
                reason: err.to_string(),
                attempts: attempt,
                recorded_at: Utc::now(),
            };
            self.store.record_review(item.clone()).await?;
            return Ok(IngestOutcome::ManualReview(item));
        }
    }

    /// Ingest a batch with bounded concurrency.
    pub async fn ingest_all(&self, posts: &[RawPost]) -> IngestReport {
        let results: Vec<(String, Result<IngestOutcome>)> = stream::iter(posts)
            .map(|raw| async move { (raw.post_uid(), self.ingest(raw).await) })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;

        let mut report = IngestReport::default();
        for (uid, result) in &results {
            if let Err(e) = result {
                log::error!("Rejected {}: {}", uid, e);
            }
            report.record(result);
        }
        report
    }

    pub async fn handle_deletion(&self, signal: &DeletionSignal) -> Result<DeletionOutcome> {
        self.lifecycle.on_deleted(signal).await
    }
}
