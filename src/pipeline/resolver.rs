//! Resolver actors.
//!
//! Resolution and the commit that follows it run inside one task per shard,
//! fed through a bounded channel. Two near-identical posts routed to the same
//! shard are therefore resolved one after the other and cannot both become
//! roots. The shard is picked from the deal and object type; with a single
//! shard (the default) every post goes through one queue.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, oneshot};

use crate::error::{AppError, Result};
use crate::models::{DealType, DedupConfig, ObjectType};
use crate::pipeline::dedup::{Candidate, DedupResolver, Resolution, Signals};
use crate::pipeline::ingest::PreparedPost;
use crate::storage::{CommitReceipt, ListingStore, PostCommit};

struct Job {
    post: PreparedPost,
    reply: oneshot::Sender<Result<CommitReceipt>>,
}

/// Handle to the shard actors. Dropping it stops them once their queues drain.
pub struct ResolverPool {
    shards: Vec<mpsc::Sender<Job>>,
}

impl ResolverPool {
    /// Spawn one actor per configured shard. Must be called inside a Tokio runtime.
    pub fn spawn(store: Arc<dyn ListingStore>, config: &DedupConfig) -> Self {
        let shards = (0..config.shards.max(1))
            .map(|shard| {
                let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
                let worker = ShardWorker {
                    shard,
                    store: Arc::clone(&store),
                    resolver: DedupResolver::new(config),
                    window: chrono::Duration::days(i64::from(config.window_days)),
                };
                tokio::spawn(worker.run(rx));
                tx
            })
            .collect();
        Self { shards }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shard_for(&self, signals: &Signals) -> usize {
        shard_index(signals.deal_type, signals.object_type, self.shards.len())
    }

    /// Resolve and commit `post` on its shard, waiting for the result.
    pub async fn submit(&self, post: PreparedPost) -> Result<CommitReceipt> {
        let shard = self.shard_for(&post.signals);
        let sender = self
            .shards
            .get(shard)
            .ok_or(AppError::ResolverClosed { shard })?;

        let (reply, response) = oneshot::channel();
        sender
            .send(Job { post, reply })
            .await
            .map_err(|_| AppError::ResolverClosed { shard })?;
        response
            .await
            .map_err(|_| AppError::ResolverClosed { shard })?
    }
}

/// Stable shard for a deal/object type pair.
fn shard_index(deal: Option<DealType>, object: Option<ObjectType>, shards: usize) -> usize {
    if shards <= 1 {
        return 0;
    }
    let key = format!(
        "{}|{}",
        deal.map_or("-", |d| d.as_str()),
        object.map_or("-", |o| o.as_str())
    );
    let digest = Sha256::digest(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % shards as u64) as usize
}

struct ShardWorker {
    shard: usize,
    store: Arc<dyn ListingStore>,
    resolver: DedupResolver,
    window: chrono::Duration,
}

impl ShardWorker {
    async fn run(self, mut jobs: mpsc::Receiver<Job>) {
        log::debug!("Resolver shard {} started", self.shard);
        while let Some(job) = jobs.recv().await {
            let uid = job.post.record.post_uid.clone();
            let result = self.resolve_and_commit(job.post).await;
            match &result {
                Ok(receipt) => log::debug!(
                    "Shard {} committed {} as post {} (duplicate_of {:?})",
                    self.shard,
                    uid,
                    receipt.post_id,
                    receipt.duplicate_of
                ),
                Err(e) => log::warn!("Shard {} failed to commit {}: {}", self.shard, uid, e),
            }
            // The submitter may have given up; nothing to do then.
            let _ = job.reply.send(result);
        }
        log::debug!("Resolver shard {} stopped", self.shard);
    }

    async fn resolve_and_commit(&self, post: PreparedPost) -> Result<CommitReceipt> {
        let PreparedPost {
            mut record,
            listing,
            media,
            signals,
        } = post;

        let existing = self.store.find_active(record.key()).await?;
        let keeps_root = match &existing {
            Some(previous) => {
                previous.is_root() && self.store.has_dependents(previous.id).await?
            }
            None => false,
        };

        let resolution = if keeps_root {
            log::debug!("{} is an original of other posts; staying root", record.post_uid);
            Resolution::Root
        } else {
            let own_id = existing.as_ref().map(|p| p.id);
            let window: Vec<Candidate> = self
                .store
                .window(record.published_at - self.window, record.published_at + self.window)
                .await?
                .into_iter()
                .filter(|c| Some(c.id) != own_id)
                .collect();
            self.resolver.resolve(&signals, &window)
        };

        record.duplicate_of = resolution.original_id();
        self.store
            .commit(PostCommit {
                record,
                listing,
                media,
                edges: resolution.edges().to_vec(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_shard_is_global() {
        assert_eq!(shard_index(Some(DealType::Sale), Some(ObjectType::House), 1), 0);
        assert_eq!(shard_index(None, None, 0), 0);
    }

    #[test]
    fn test_shard_index_is_stable_and_bounded() {
        for shards in 2..8 {
            let a = shard_index(Some(DealType::RentLong), Some(ObjectType::Flat), shards);
            let b = shard_index(Some(DealType::RentLong), Some(ObjectType::Flat), shards);
            assert_eq!(a, b);
            assert!(a < shards);
        }
    }
}
