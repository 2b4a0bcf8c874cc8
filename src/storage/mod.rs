//! Storage abstractions for posts, listings and their relations.
//!
//! Both backends keep the same in-memory [`StoreState`]; `LocalStorage`
//! additionally persists it as a JSON snapshot plus an append-only journal
//! of the operations applied since that snapshot.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── state.json      # posts, listings, media, edges, deletions, channels, review queue
//! └── journal.jsonl   # one operation per line, newer than the snapshot
//! ```

pub mod local;
pub mod memory;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{
    Channel, ChannelActivity, DeletionLogEntry, DuplicateEdge, EdgeDraft, Listing,
    ManualReviewItem, MediaRecord, MessageKey, PostId, PostRecord,
};
use crate::pipeline::dedup::{Candidate, Signals};

pub use local::LocalStorage;
pub use memory::MemoryStore;

/// Everything written for one post, as a single unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostCommit {
    /// `id` is ignored; storage assigns it, or reuses the active post's id on edit
    pub record: PostRecord,
    pub listing: Listing,
    pub media: Vec<MediaRecord>,
    pub edges: Vec<EdgeDraft>,
}

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReceipt {
    pub post_id: PostId,
    /// False when an active post with the same message key was updated
    pub created: bool,
    pub duplicate_of: Option<PostId>,
    pub edges: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub posts: usize,
    pub active: usize,
    pub roots: usize,
    pub duplicates: usize,
    pub edges: usize,
    pub deletions: usize,
    pub channels: usize,
    pub pending_review: usize,
}

/// Trait for listing storage backends.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// Write a post with its listing, media and duplicate edges atomically.
    async fn commit(&self, commit: PostCommit) -> Result<CommitReceipt>;

    /// Active post for a message key.
    async fn find_active(&self, key: MessageKey) -> Result<Option<PostRecord>>;

    async fn post(&self, id: PostId) -> Result<Option<PostRecord>>;

    async fn listing(&self, id: PostId) -> Result<Option<Listing>>;

    async fn media(&self, id: PostId) -> Result<Vec<MediaRecord>>;

    /// Edges whose duplicate side is `id`.
    async fn edges_of(&self, id: PostId) -> Result<Vec<DuplicateEdge>>;

    /// Whether any post names `id` as its original.
    async fn has_dependents(&self, id: PostId) -> Result<bool>;

    /// Active posts published in `[from, to]`, as dedup candidates.
    async fn window(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<Candidate>>;

    /// Mark the active post for `key` deleted and append its deletion log
    /// entry, as one write. Returns `None` when no active post matches; on
    /// error neither change is made.
    async fn delete(
        &self,
        key: MessageKey,
        detected_at: DateTime<Utc>,
    ) -> Result<Option<DeletionLogEntry>>;

    async fn deletion_log(&self) -> Result<Vec<DeletionLogEntry>>;

    async fn touch_channel(&self, activity: &ChannelActivity) -> Result<Channel>;

    async fn channel(&self, id: i64) -> Result<Option<Channel>>;

    async fn record_review(&self, item: ManualReviewItem) -> Result<()>;

    async fn review_queue(&self) -> Result<Vec<ManualReviewItem>>;

    async fn posts(&self) -> Result<Vec<PostRecord>>;

    async fn stats(&self) -> Result<StoreStats>;
}

/// One state change. Applying the same operations in the same order to the
/// same state always gives the same result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Operation {
    Commit { commit: PostCommit, at: DateTime<Utc> },
    Delete { key: MessageKey, at: DateTime<Utc> },
    TouchChannel { activity: ChannelActivity, at: DateTime<Utc> },
    Review { item: ManualReviewItem },
}

/// Persisted tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    next_id: PostId,
    /// Last journal sequence number folded into these tables
    #[serde(default)]
    journal_seq: u64,
    #[serde(default)]
    posts: BTreeMap<PostId, PostRecord>,
    #[serde(default)]
    listings: BTreeMap<PostId, Listing>,
    #[serde(default)]
    media: BTreeMap<PostId, Vec<MediaRecord>>,
    /// Keyed by the duplicate side
    #[serde(default)]
    edges: BTreeMap<PostId, Vec<DuplicateEdge>>,
    #[serde(default)]
    deletions: Vec<DeletionLogEntry>,
    #[serde(default)]
    channels: BTreeMap<i64, Channel>,
    #[serde(default)]
    reviews: Vec<ManualReviewItem>,
}

/// Lookups derived from `Tables::posts`. Never persisted; rebuilt on load.
#[derive(Debug, Clone, Default)]
struct Index {
    active: HashMap<MessageKey, PostId>,
    /// Active posts only
    by_published: BTreeSet<(DateTime<Utc>, PostId)>,
    /// Number of posts, deleted ones included, naming each original
    dependents: HashMap<PostId, usize>,
}

impl Index {
    fn build(posts: &BTreeMap<PostId, PostRecord>) -> Self {
        let mut index = Self::default();
        for post in posts.values() {
            index.insert(post);
        }
        index
    }

    fn insert(&mut self, post: &PostRecord) {
        if post.is_active() {
            self.active.insert(post.key(), post.id);
            self.by_published.insert((post.published_at, post.id));
        }
        if let Some(original) = post.duplicate_of {
            *self.dependents.entry(original).or_default() += 1;
        }
    }

    fn remove(&mut self, post: &PostRecord) {
        if post.is_active() {
            if self.active.get(&post.key()) == Some(&post.id) {
                self.active.remove(&post.key());
            }
            self.by_published.remove(&(post.published_at, post.id));
        }
        if let Some(original) = post.duplicate_of {
            if let Some(count) = self.dependents.get_mut(&original) {
                *count -= 1;
                if *count == 0 {
                    self.dependents.remove(&original);
                }
            }
        }
    }
}

/// Complete store contents; the unit of persistence for `LocalStorage`.
/// Only the tables are serialized.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "Tables")]
pub struct StoreState {
    tables: Tables,
    index: Index,
}

impl From<Tables> for StoreState {
    fn from(tables: Tables) -> Self {
        let index = Index::build(&tables.posts);
        Self { tables, index }
    }
}

impl Serialize for StoreState {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.tables.serialize(serializer)
    }
}

impl StoreState {
    fn active_id(&self, key: MessageKey) -> Option<PostId> {
        self.index.active.get(&key).copied()
    }

    /// Check every commit invariant without changing anything. Returns the
    /// id the post will be stored under.
    pub fn check_commit(&self, commit: &PostCommit) -> Result<PostId> {
        let record = &commit.record;
        let existing = self.active_id(record.key());
        let id = existing.unwrap_or(self.tables.next_id + 1);

        if let Some(original) = record.duplicate_of {
            let root = self
                .tables
                .posts
                .get(&original)
                .ok_or_else(|| AppError::storage(format!("original post {} not found", original)))?;
            if original == id || !root.is_root() {
                return Err(AppError::storage(format!(
                    "post {} cannot be a duplicate of {}",
                    id, original
                )));
            }
            if existing.is_some() && self.has_dependents(id) {
                return Err(AppError::storage(format!(
                    "post {} is an original and cannot become a duplicate",
                    id
                )));
            }
        }
        if commit.edges.iter().any(|e| Some(e.original_id) != record.duplicate_of) {
            return Err(AppError::storage(format!(
                "edges of {} disagree with duplicate_of",
                record.post_uid
            )));
        }
        Ok(id)
    }

    /// Apply a commit after checking every invariant, so a rejected commit
    /// leaves the state untouched.
    pub fn commit(&mut self, commit: PostCommit, now: DateTime<Utc>) -> Result<CommitReceipt> {
        let id = self.check_commit(&commit)?;
        let PostCommit {
            mut record,
            listing,
            mut media,
            edges,
        } = commit;

        record.id = id;
        record.updated_at = now;
        let previous = self.tables.posts.remove(&id);
        match &previous {
            Some(previous) => {
                self.index.remove(previous);
                record.fetched_at = previous.fetched_at;
            }
            None => self.tables.next_id = id,
        }

        for item in &mut media {
            item.post_id = id;
        }
        let stored: Vec<_> = edges
            .iter()
            .map(|e| DuplicateEdge::from_draft(e, id, now))
            .collect();
        if stored.is_empty() {
            self.tables.edges.remove(&id);
        } else {
            self.tables.edges.insert(id, stored);
        }

        let receipt = CommitReceipt {
            post_id: id,
            created: previous.is_none(),
            duplicate_of: record.duplicate_of,
            edges: edges.len(),
        };
        self.index.insert(&record);
        self.tables.media.insert(id, media);
        self.tables.listings.insert(id, listing);
        self.tables.posts.insert(id, record);
        Ok(receipt)
    }

    pub fn find_active(&self, key: MessageKey) -> Option<PostRecord> {
        self.active_id(key)
            .and_then(|id| self.tables.posts.get(&id))
            .cloned()
    }

    pub fn window(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Candidate> {
        if from > to {
            return Vec::new();
        }
        self.index
            .by_published
            .range((from, PostId::MIN)..=(to, PostId::MAX))
            .filter_map(|(_, id)| self.tables.posts.get(id))
            .map(|p| self.candidate(p))
            .collect()
    }

    fn candidate(&self, post: &PostRecord) -> Candidate {
        let listing = self.tables.listings.get(&post.id);
        Candidate {
            id: post.id,
            published_at: post.published_at,
            duplicate_of: post.duplicate_of,
            signals: Signals {
                is_real_estate: listing.is_some_and(|l| l.is_real_estate),
                deal_type: listing.and_then(|l| l.deal_type),
                object_type: listing.and_then(|l| l.object_type),
                text_hash: post.text_hash.clone(),
                fingerprint: post.fingerprint.clone(),
                phones: post.phones.clone(),
                image_hashes: self
                    .tables
                    .media
                    .get(&post.id)
                    .into_iter()
                    .flatten()
                    .filter_map(|m| m.phash)
                    .collect(),
            },
        }
    }

    /// Whether `key` has an active post a deletion would apply to.
    pub fn has_active(&self, key: MessageKey) -> bool {
        self.index.active.contains_key(&key)
    }

    /// `active -> deleted` plus its log entry. `None` when nothing is active
    /// for `key`, so each transition is logged exactly once.
    pub fn delete(
        &mut self,
        key: MessageKey,
        detected_at: DateTime<Utc>,
    ) -> Option<DeletionLogEntry> {
        let id = self.active_id(key)?;
        let mut post = self.tables.posts.remove(&id)?;
        self.index.remove(&post);
        post.is_deleted = true;
        post.deleted_at = Some(detected_at);
        post.updated_at = detected_at;

        let entry = DeletionLogEntry::for_post(&post, detected_at);
        self.index.insert(&post);
        self.tables.posts.insert(id, post);
        self.tables.deletions.push(entry.clone());
        Some(entry)
    }

    pub fn touch_channel(&mut self, activity: &ChannelActivity, now: DateTime<Utc>) -> Channel {
        let channel = self
            .tables
            .channels
            .entry(activity.channel_id)
            .or_insert_with(|| Channel {
                id: activity.channel_id,
                title: None,
                chat_type: "channel".to_string(),
                added_at: now,
                last_message_at: None,
            });
        channel.apply(activity);
        channel.clone()
    }

    pub fn record_review(&mut self, item: ManualReviewItem) {
        self.tables.reviews.push(item);
    }

    pub(crate) fn apply(&mut self, op: Operation) -> Result<()> {
        match op {
            Operation::Commit { commit, at } => self.commit(commit, at).map(drop),
            Operation::Delete { key, at } => {
                self.delete(key, at);
                Ok(())
            }
            Operation::TouchChannel { activity, at } => {
                self.touch_channel(&activity, at);
                Ok(())
            }
            Operation::Review { item } => {
                self.record_review(item);
                Ok(())
            }
        }
    }

    pub(crate) fn journal_seq(&self) -> u64 {
        self.tables.journal_seq
    }

    pub(crate) fn set_journal_seq(&mut self, seq: u64) {
        self.tables.journal_seq = seq;
    }

    pub fn stats(&self) -> StoreStats {
        let t = &self.tables;
        let active: Vec<_> = t.posts.values().filter(|p| p.is_active()).collect();
        StoreStats {
            posts: t.posts.len(),
            active: active.len(),
            roots: active.iter().filter(|p| p.is_root()).count(),
            duplicates: active.iter().filter(|p| !p.is_root()).count(),
            edges: t.edges.values().map(Vec::len).sum(),
            deletions: t.deletions.len(),
            channels: t.channels.len(),
            pending_review: t.reviews.len(),
        }
    }
}

/// Read-only accessors shared by the backends.
impl StoreState {
    pub fn post(&self, id: PostId) -> Option<PostRecord> {
        self.tables.posts.get(&id).cloned()
    }

    pub fn listing(&self, id: PostId) -> Option<Listing> {
        self.tables.listings.get(&id).cloned()
    }

    pub fn media(&self, id: PostId) -> Vec<MediaRecord> {
        self.tables.media.get(&id).cloned().unwrap_or_default()
    }

    pub fn edges_of(&self, id: PostId) -> Vec<DuplicateEdge> {
        self.tables.edges.get(&id).cloned().unwrap_or_default()
    }

    pub fn has_dependents(&self, id: PostId) -> bool {
        self.index.dependents.contains_key(&id)
    }

    pub fn deletion_log(&self) -> Vec<DeletionLogEntry> {
        self.tables.deletions.clone()
    }

    pub fn channel(&self, id: i64) -> Option<Channel> {
        self.tables.channels.get(&id).cloned()
    }

    pub fn review_queue(&self) -> Vec<ManualReviewItem> {
        self.tables.reviews.clone()
    }

    pub fn posts(&self) -> Vec<PostRecord> {
        self.tables.posts.values().cloned().collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{TimeZone, Utc};

    use super::PostCommit;
    use crate::models::{Listing, PostId, PostRecord};

    pub fn commit(message_id: i64, text: &str, duplicate_of: Option<PostId>) -> PostCommit {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        PostCommit {
            record: PostRecord {
                id: 0,
                post_uid: format!("msg:7:{}", message_id),
                channel_id: 7,
                message_id,
                grouped_id: None,
                text_raw: Some(text.to_string()),
                text_len: text.chars().count(),
                phones: Vec::new(),
                links: Vec::new(),
                hashtags: Vec::new(),
                mentions: Vec::new(),
                published_at: at,
                fetched_at: at,
                updated_at: at,
                is_deleted: false,
                deleted_at: None,
                text_hash: Some(text.to_string()),
                fingerprint: None,
                duplicate_of,
            },
            listing: Listing {
                is_real_estate: true,
                ..Listing::default()
            },
            media: Vec::new(),
            edges: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::commit;
    use super::*;
    use crate::models::MatchType;

    fn link(mut c: PostCommit, original: PostId) -> PostCommit {
        c.record.duplicate_of = Some(original);
        c.edges = vec![EdgeDraft {
            original_id: original,
            match_type: MatchType::TextExact,
            similarity: 1.0,
        }];
        c
    }

    #[test]
    fn test_commit_assigns_ids_and_reuses_on_edit() {
        let mut state = StoreState::default();
        let now = Utc::now();
        let first = state.commit(commit(1, "a", None), now).unwrap();
        let second = state.commit(commit(2, "b", None), now).unwrap();
        assert_eq!((first.post_id, second.post_id), (1, 2));
        assert!(first.created);

        let edit = state.commit(commit(1, "a2", None), now).unwrap();
        assert_eq!(edit.post_id, 1);
        assert!(!edit.created);
        assert_eq!(state.posts().len(), 2);
        assert_eq!(state.post(1).unwrap().text_raw.as_deref(), Some("a2"));
    }

    #[test]
    fn test_commit_rejects_chains() {
        let mut state = StoreState::default();
        let now = Utc::now();
        state.commit(commit(1, "a", None), now).unwrap();
        state.commit(link(commit(2, "a", None), 1), now).unwrap();

        let chained = state.commit(link(commit(3, "a", None), 2), now);
        assert!(chained.is_err());
        assert_eq!(state.posts().len(), 2);

        let missing = state.commit(link(commit(4, "a", None), 99), now);
        assert!(missing.is_err());
    }

    #[test]
    fn test_original_cannot_be_demoted() {
        let mut state = StoreState::default();
        let now = Utc::now();
        state.commit(commit(1, "a", None), now).unwrap();
        state.commit(commit(2, "b", None), now).unwrap();
        state.commit(link(commit(3, "a", None), 1), now).unwrap();

        assert!(state.commit(link(commit(1, "b", None), 2), now).is_err());
        assert!(state.post(1).unwrap().is_root());
    }

    #[test]
    fn test_edit_replaces_edges() {
        let mut state = StoreState::default();
        let now = Utc::now();
        state.commit(commit(1, "a", None), now).unwrap();
        state.commit(link(commit(2, "a", None), 1), now).unwrap();
        assert_eq!(state.edges_of(2).len(), 1);

        state.commit(commit(2, "c", None), now).unwrap();
        assert!(state.edges_of(2).is_empty());
        assert!(!state.has_dependents(1));
    }

    #[test]
    fn test_deletion_is_update_if_active() {
        let mut state = StoreState::default();
        let now = Utc::now();
        state.commit(commit(1, "a", None), now).unwrap();
        let key = MessageKey::new(7, 1);

        let entry = state.delete(key, now).unwrap();
        assert_eq!(entry.post_id, 1);
        assert!(state.post(1).unwrap().is_deleted);
        assert!(state.delete(key, now).is_none());
        assert!(state.find_active(key).is_none());
        assert_eq!(state.deletion_log().len(), 1);

        // same message reported again is a new post
        let again = state.commit(commit(1, "a", None), now).unwrap();
        assert!(again.created);
        assert_eq!(again.post_id, 2);
        let published = state.post(2).unwrap().published_at;
        let ids: Vec<_> = state
            .window(published, published)
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_window_is_a_published_range() {
        let mut state = StoreState::default();
        let now = Utc::now();
        let base = commit(1, "a", None).record.published_at;
        for (message_id, hours) in [(1, 0), (2, 5), (3, 30), (4, 48)] {
            let mut c = commit(message_id, "a", None);
            c.record.published_at = base + chrono::Duration::hours(hours);
            state.commit(c, now).unwrap();
        }
        state.delete(MessageKey::new(7, 2), now);

        let ids: Vec<_> = state
            .window(base, base + chrono::Duration::hours(30))
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert!(state.window(base + chrono::Duration::hours(1), base).is_empty());
    }

    #[test]
    fn test_index_is_rebuilt_after_reload() {
        let mut state = StoreState::default();
        let now = Utc::now();
        state.commit(commit(1, "a", None), now).unwrap();
        state.commit(link(commit(2, "a", None), 1), now).unwrap();
        state.commit(commit(3, "b", None), now).unwrap();
        state.delete(MessageKey::new(7, 3), now);

        let json = serde_json::to_vec(&state).unwrap();
        let reloaded: StoreState = serde_json::from_slice(&json).unwrap();
        assert!(!String::from_utf8_lossy(&json).contains("by_published"));
        assert_eq!(reloaded.find_active(MessageKey::new(7, 1)).unwrap().id, 1);
        assert!(reloaded.find_active(MessageKey::new(7, 3)).is_none());
        assert!(reloaded.has_dependents(1));
        assert!(!reloaded.has_dependents(2));
        assert_eq!(reloaded.edges_of(2).len(), 1);

        let published = reloaded.post(1).unwrap().published_at;
        assert_eq!(reloaded.window(published, published).len(), 2);
        assert_eq!(reloaded.stats(), state.stats());
    }

    #[test]
    fn test_replayed_operations_match_direct_calls() {
        let now = Utc::now();
        let ops = vec![
            Operation::Commit { commit: commit(1, "a", None), at: now },
            Operation::Commit { commit: link(commit(2, "a", None), 1), at: now },
            Operation::Delete { key: MessageKey::new(7, 2), at: now },
        ];
        let mut replayed = StoreState::default();
        for op in ops {
            let line = serde_json::to_string(&op).unwrap();
            replayed.apply(serde_json::from_str(&line).unwrap()).unwrap();
        }
        assert_eq!(replayed.deletion_log().len(), 1);
        assert!(replayed.post(2).unwrap().is_deleted);
        // a deleted duplicate still counts as a dependent
        assert!(replayed.has_dependents(1));
    }
}
