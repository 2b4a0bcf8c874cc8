//! Processing stages for scraped posts.
//!
//! - `normalize`: fold text and pull out phones, links, hashtags, mentions
//! - `extract`: listing fields and completeness score
//! - `fingerprint` / `phash`: exact hash, MinHash signature, image dHash
//! - `dedup`: duplicate resolution against a candidate window
//! - `resolver`: per-shard actors that serialize resolution and commit
//! - `lifecycle`: deletion transitions
//! - `ingest`: the composed pipeline

pub mod dedup;
pub mod extract;
pub mod fingerprint;
pub mod ingest;
pub mod lifecycle;
pub mod normalize;
pub mod phash;
pub mod resolver;

pub use dedup::{Candidate, DedupResolver, Resolution, Signals};
pub use extract::Extractor;
pub use fingerprint::{Fingerprint, FingerprintEngine};
pub use ingest::{IngestOutcome, IngestReport, Pipeline, PreparedPost};
pub use lifecycle::{DeletionOutcome, LifecycleTracker};
pub use normalize::{NormalizedPost, Normalizer};
pub use phash::ImageHash;
pub use resolver::ResolverPool;
