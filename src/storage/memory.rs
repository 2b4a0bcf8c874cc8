//! In-process storage backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{
    Channel, ChannelActivity, DeletionLogEntry, DuplicateEdge, Listing, ManualReviewItem,
    MediaRecord, MessageKey, PostId, PostRecord,
};
use crate::pipeline::dedup::Candidate;
use crate::storage::{CommitReceipt, ListingStore, PostCommit, StoreState, StoreStats};

/// Keeps everything in memory; contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> StoreState {
        self.state.read().await.clone()
    }
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn commit(&self, commit: PostCommit) -> Result<CommitReceipt> {
        self.state.write().await.commit(commit, Utc::now())
    }

    async fn find_active(&self, key: MessageKey) -> Result<Option<PostRecord>> {
        Ok(self.state.read().await.find_active(key))
    }

    async fn post(&self, id: PostId) -> Result<Option<PostRecord>> {
        Ok(self.state.read().await.post(id))
    }

    async fn listing(&self, id: PostId) -> Result<Option<Listing>> {
        Ok(self.state.read().await.listing(id))
    }

    async fn media(&self, id: PostId) -> Result<Vec<MediaRecord>> {
        Ok(self.state.read().await.media(id))
    }

    async fn edges_of(&self, id: PostId) -> Result<Vec<DuplicateEdge>> {
        Ok(self.state.read().await.edges_of(id))
    }

    async fn has_dependents(&self, id: PostId) -> Result<bool> {
        Ok(self.state.read().await.has_dependents(id))
    }

    async fn window(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Candidate>> {
        Ok(self.state.read().await.window(from, to))
    }

    async fn delete(
        &self,
        key: MessageKey,
        detected_at: DateTime<Utc>,
    ) -> Result<Option<DeletionLogEntry>> {
        Ok(self.state.write().await.delete(key, detected_at))
    }

    async fn deletion_log(&self) -> Result<Vec<DeletionLogEntry>> {
        Ok(self.state.read().await.deletion_log())
    }

    async fn touch_channel(&self, activity: &ChannelActivity) -> Result<Channel> {
        Ok(self.state.write().await.touch_channel(activity, Utc::now()))
    }

    async fn channel(&self, id: i64) -> Result<Option<Channel>> {
        Ok(self.state.read().await.channel(id))
    }

    async fn record_review(&self, item: ManualReviewItem) -> Result<()> {
        self.state.write().await.record_review(item);
        Ok(())
    }

    async fn review_queue(&self) -> Result<Vec<ManualReviewItem>> {
        Ok(self.state.read().await.review_queue())
    }

    async fn posts(&self) -> Result<Vec<PostRecord>> {
        Ok(self.state.read().await.posts())
    }

    async fn stats(&self) -> Result<StoreStats> {
        Ok(self.state.read().await.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::commit;

    #[tokio::test]
    async fn test_commit_and_read_back() {
        let store = MemoryStore::new();
        let receipt = store.commit(commit(1, "сдаю квартиру", None)).await.unwrap();

        let post = store.post(receipt.post_id).await.unwrap().unwrap();
        assert_eq!(post.message_id, 1);
        assert!(store.listing(receipt.post_id).await.unwrap().unwrap().is_real_estate);
        assert_eq!(store.stats().await.unwrap().roots, 1);
    }

    #[tokio::test]
    async fn test_channel_touch_and_review_queue() {
        let store = MemoryStore::new();
        let at = Utc::now();
        let channel = store
            .touch_channel(&ChannelActivity {
                channel_id: 7,
                title: Some("Аренда".into()),
                chat_type: Some("supergroup".into()),
                message_at: at,
            })
            .await
            .unwrap();
        assert_eq!(channel.chat_type, "supergroup");
        assert_eq!(store.channel(7).await.unwrap().unwrap().last_message_at, Some(at));

        store
            .record_review(ManualReviewItem {
                post_uid: "msg:7:1".into(),
                channel_id: 7,
                message_id: 1,
                reason: "media unavailable".into(),
                attempts: 3,
                recorded_at: at,
            })
            .await
            .unwrap();
        assert_eq!(store.review_queue().await.unwrap().len(), 1);
        assert_eq!(store.stats().await.unwrap().pending_review, 1);
    }
}
