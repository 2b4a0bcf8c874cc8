//! Post lifecycle: `active -> deleted`, terminal.

use std::sync::Arc;

use chrono::Utc;

use crate::error::Result;
use crate::models::{DeletionLogEntry, DeletionSignal};
use crate::storage::ListingStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    /// The post went from active to deleted.
    Deleted(DeletionLogEntry),
    /// No active post for the signal (unknown, or already deleted).
    Ignored,
}

/// The only writer of deletion state.
pub struct LifecycleTracker {
    store: Arc<dyn ListingStore>,
}

impl LifecycleTracker {
    pub fn new(store: Arc<dyn ListingStore>) -> Self {
        Self { store }
    }

    pub async fn on_deleted(&self, signal: &DeletionSignal) -> Result<DeletionOutcome> {
        let key = signal.key();
        let detected_at = signal.detected_at.unwrap_or_else(Utc::now);

        let Some(entry) = self.store.delete(key, detected_at).await? else {
            log::debug!("Deletion signal for {} ignored: no active post", key);
            return Ok(DeletionOutcome::Ignored);
        };
        log::info!(
            "Post {} ({}) deleted after {}h",
            entry.post_id,
            key,
            entry.lifetime_hours
        );
        Ok(DeletionOutcome::Deleted(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageKey;
    use crate::storage::MemoryStore;
    use crate::storage::test_support::commit;
    use chrono::Duration;

    #[tokio::test]
    async fn test_deletion_logs_lifetime_once() {
        let store = Arc::new(MemoryStore::new());
        let receipt = store.commit(commit(1, "сдаю квартиру", None)).await.unwrap();
        let published = store.post(receipt.post_id).await.unwrap().unwrap().published_at;

        let tracker = LifecycleTracker::new(store.clone());
        let signal = DeletionSignal {
            channel_id: 7,
            message_id: 1,
            detected_at: Some(published + Duration::hours(10) + Duration::minutes(20)),
        };

        let DeletionOutcome::Deleted(entry) = tracker.on_deleted(&signal).await.unwrap() else {
            panic!("expected a deletion");
        };
        assert_eq!(entry.lifetime_hours, 10);
        assert_eq!(entry.post_id, receipt.post_id);

        assert_eq!(tracker.on_deleted(&signal).await.unwrap(), DeletionOutcome::Ignored);
        assert_eq!(store.deletion_log().await.unwrap().len(), 1);

        let post = store.post(receipt.post_id).await.unwrap().unwrap();
        assert!(post.is_deleted);
        assert_eq!(post.deleted_at, signal.detected_at);
        assert!(store.find_active(MessageKey::new(7, 1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_post_is_ignored() {
        let tracker = LifecycleTracker::new(Arc::new(MemoryStore::new()));
        let signal = DeletionSignal {
            channel_id: 7,
            message_id: 99,
            detected_at: None,
        };
        assert_eq!(tracker.on_deleted(&signal).await.unwrap(), DeletionOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_post_active_for_retry() {
        use crate::storage::LocalStorage;
        use crate::storage::local::JOURNAL_FILE;

        let tmp = tempfile::TempDir::new().unwrap();
        let store = Arc::new(LocalStorage::open(tmp.path()).await.unwrap());
        store.commit(commit(1, "сдаю квартиру", None)).await.unwrap();
        let tracker = LifecycleTracker::new(store.clone());
        let signal = DeletionSignal {
            channel_id: 7,
            message_id: 1,
            detected_at: None,
        };

        let journal = tmp.path().join(JOURNAL_FILE);
        std::fs::remove_file(&journal).unwrap();
        std::fs::create_dir(&journal).unwrap();
        assert!(tracker.on_deleted(&signal).await.is_err());
        assert!(store.find_active(MessageKey::new(7, 1)).await.unwrap().is_some());
        assert!(store.deletion_log().await.unwrap().is_empty());

        std::fs::remove_dir(&journal).unwrap();
        assert!(matches!(
            tracker.on_deleted(&signal).await.unwrap(),
            DeletionOutcome::Deleted(_)
        ));
        assert_eq!(store.deletion_log().await.unwrap().len(), 1);
    }
}
