//! Local filesystem storage implementation.
//!
//! Holds the state in memory. Every change is first appended to
//! `journal.jsonl` and only then applied, so a failed write changes nothing.
//! After `COMPACT_AFTER` entries the state is written to `state.json`
//! (temp file, then rename) and the journal starts over. On open the
//! snapshot is loaded and newer journal entries are replayed on top.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::models::{
    Channel, ChannelActivity, DeletionLogEntry, DuplicateEdge, Listing, ManualReviewItem,
    MediaRecord, MessageKey, PostId, PostRecord,
};
use crate::pipeline::dedup::Candidate;
use crate::storage::{CommitReceipt, ListingStore, Operation, PostCommit, StoreState, StoreStats};

const STATE_FILE: &str = "state.json";
pub(crate) const JOURNAL_FILE: &str = "journal.jsonl";
/// Journal entries written before they are folded into a new snapshot.
const COMPACT_AFTER: usize = 256;

/// One journal line.
#[derive(Debug, Serialize, Deserialize)]
struct JournalEntry<O> {
    seq: u64,
    op: O,
}

/// Local filesystem storage backend.
#[derive(Debug)]
pub struct LocalStorage {
    root_dir: PathBuf,
    state: RwLock<StoreState>,
    journal_len: AtomicUsize,
}

impl LocalStorage {
    /// Open the store rooted at `root_dir`, loading an existing snapshot and
    /// replaying the journal written after it.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        let mut state = match read_json::<StoreState>(&root_dir.join(STATE_FILE)).await? {
            Some(state) => {
                log::info!("Loaded storage snapshot from {}", root_dir.display());
                state
            }
            None => StoreState::default(),
        };
        let replayed = replay_journal(&root_dir.join(JOURNAL_FILE), &mut state).await?;

        let storage = Self {
            root_dir,
            state: RwLock::new(state),
            journal_len: AtomicUsize::new(0),
        };
        if let Some(count) = replayed {
            log::info!("Replayed {} journal entries", count);
            // start every session from a clean snapshot, which also drops a torn tail
            let state = storage.state.read().await;
            storage.compact(&state).await?;
            drop(state);
        }
        Ok(storage)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Append `op` as the next journal line. Returns its sequence number.
    async fn append(&self, state: &StoreState, op: &Operation) -> Result<u64> {
        let seq = state.journal_seq() + 1;
        let mut line = serde_json::to_vec(&JournalEntry { seq, op })?;
        line.push(b'\n');

        tokio::fs::create_dir_all(&self.root_dir).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(JOURNAL_FILE))
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(seq)
    }

    /// Record that the operation journaled as `seq` has been applied.
    async fn applied(&self, state: &mut StoreState, seq: u64) {
        state.set_journal_seq(seq);
        if self.journal_len.fetch_add(1, Ordering::Relaxed) + 1 < COMPACT_AFTER {
            return;
        }
        // the journal still holds everything, so a failed snapshot loses nothing
        if let Err(e) = self.compact(state).await {
            log::warn!("Storage snapshot failed, keeping journal: {}", e);
        }
    }

    /// Write the snapshot, then drop the journal it covers.
    async fn compact(&self, state: &StoreState) -> Result<()> {
        self.write_json(STATE_FILE, state).await?;
        match tokio::fs::remove_file(self.path(JOURNAL_FILE)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(AppError::Io(e)),
        }
        self.journal_len.store(0, Ordering::Relaxed);
        log::debug!("Storage snapshot written at journal seq {}", state.journal_seq());
        Ok(())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}

/// Apply journal entries newer than the snapshot. `None` when there is no journal.
async fn replay_journal(path: &Path, state: &mut StoreState) -> Result<Option<usize>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AppError::Io(e)),
    };
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();

    let mut applied = 0;
    for (i, line) in lines.iter().enumerate() {
        let entry: JournalEntry<Operation> = match serde_json::from_str(line) {
            Ok(entry) => entry,
            Err(e) if i + 1 == lines.len() => {
                log::warn!("Ignoring incomplete last journal line: {}", e);
                break;
            }
            Err(e) => {
                return Err(AppError::storage(format!(
                    "journal line {} is corrupt: {}",
                    i + 1,
                    e
                )));
            }
        };
        if entry.seq <= state.journal_seq() {
            continue;
        }
        if let Err(e) = state.apply(entry.op) {
            log::warn!("Journal entry {} not replayed: {}", entry.seq, e);
        }
        state.set_journal_seq(entry.seq);
        applied += 1;
    }
    Ok(Some(applied))
}

#[async_trait]
impl ListingStore for LocalStorage {
    async fn commit(&self, commit: PostCommit) -> Result<CommitReceipt> {
        let at = Utc::now();
        let mut state = self.state.write().await;
        state.check_commit(&commit)?;
        let op = Operation::Commit {
            commit: commit.clone(),
            at,
        };
        let seq = self.append(&state, &op).await?;
        let receipt = state.commit(commit, at)?;
        self.applied(&mut state, seq).await;
        Ok(receipt)
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
        let mut state = self.state.write().await;
        if !state.has_active(key) {
            return Ok(None);
        }
        let op = Operation::Delete {
            key,
            at: detected_at,
        };
        let seq = self.append(&state, &op).await?;
        let entry = state.delete(key, detected_at);
        self.applied(&mut state, seq).await;
        Ok(entry)
    }

    async fn deletion_log(&self) -> Result<Vec<DeletionLogEntry>> {
        Ok(self.state.read().await.deletion_log())
    }

    async fn touch_channel(&self, activity: &ChannelActivity) -> Result<Channel> {
        let at = Utc::now();
        let mut state = self.state.write().await;
        let op = Operation::TouchChannel {
            activity: activity.clone(),
            at,
        };
        let seq = self.append(&state, &op).await?;
        let channel = state.touch_channel(activity, at);
        self.applied(&mut state, seq).await;
        Ok(channel)
    }

    async fn channel(&self, id: i64) -> Result<Option<Channel>> {
        Ok(self.state.read().await.channel(id))
    }

    async fn record_review(&self, item: ManualReviewItem) -> Result<()> {
        let mut state = self.state.write().await;
        let op = Operation::Review { item: item.clone() };
        let seq = self.append(&state, &op).await?;
        state.record_review(item);
        self.applied(&mut state, seq).await;
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
