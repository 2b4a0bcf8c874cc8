//! Duplicate resolution against a window of recent posts.
//!
//! Resolution is a pure function of the new post's signals and the window.
//! Each candidate is tested for every match type; a match on a duplicate
//! counts for its root, provided the root is itself in the window. The
//! strongest match type that any root satisfies selects the candidate set,
//! and the earliest-published root in it becomes the original.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::models::{DealType, DedupConfig, EdgeDraft, MatchType, ObjectType, PostId};
use crate::pipeline::fingerprint::Fingerprint;
use crate::pipeline::phash::ImageHash;

/// Dedup-relevant content of a post.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signals {
    pub is_real_estate: bool,
    pub deal_type: Option<DealType>,
    pub object_type: Option<ObjectType>,
    pub text_hash: Option<String>,
    pub fingerprint: Option<Fingerprint>,
    pub phones: Vec<String>,
    pub image_hashes: Vec<ImageHash>,
}

/// A stored, active post inside the comparison window.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: PostId,
    pub published_at: DateTime<Utc>,
    pub duplicate_of: Option<PostId>,
    pub signals: Signals,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// No match: the post starts its own cluster.
    Root,
    /// One edge per satisfied match type, all against `original_id`.
    Duplicate {
        original_id: PostId,
        edges: Vec<EdgeDraft>,
    },
}

impl Resolution {
    pub fn original_id(&self) -> Option<PostId> {
        match self {
            Resolution::Root => None,
            Resolution::Duplicate { original_id, .. } => Some(*original_id),
        }
    }

    pub fn edges(&self) -> &[EdgeDraft] {
        match self {
            Resolution::Root => &[],
            Resolution::Duplicate { edges, .. } => edges,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DedupResolver {
    similarity_threshold: f64,
    phash_max_distance: u32,
    phone_weight: f64,
}

impl DedupResolver {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            similarity_threshold: config.similarity_threshold,
            phash_max_distance: config.phash_max_distance,
            phone_weight: config.phone_weight,
        }
    }

    /// Decide whether `post` duplicates something in `window`.
    ///
    /// `window` must not contain the post itself.
    pub fn resolve(&self, post: &Signals, window: &[Candidate]) -> Resolution {
        let by_id: HashMap<PostId, &Candidate> = window.iter().map(|c| (c.id, c)).collect();

        // Best similarity per match type, per root
        let mut matches: HashMap<PostId, BTreeMap<MatchType, f64>> = HashMap::new();
        for candidate in window {
            if candidate.signals.is_real_estate != post.is_real_estate {
                continue;
            }
            let Some(root) = self.root_of(candidate, &by_id) else {
                continue;
            };
            for (match_type, similarity) in self.compare(post, &candidate.signals) {
                let best = matches.entry(root.id).or_default().entry(match_type).or_insert(0.0);
                if similarity > *best {
                    *best = similarity;
                }
            }
        }

        for level in MatchType::PRECEDENCE {
            let original = matches
                .iter()
                .filter(|(_, types)| types.contains_key(&level))
                .filter_map(|(id, _)| by_id.get(id))
                .min_by_key(|c| (c.published_at, c.id));

            if let Some(original) = original {
                let edges = matches
                    .get(&original.id)
                    .into_iter()
                    .flatten()
                    .map(|(match_type, similarity)| EdgeDraft {
                        original_id: original.id,
                        match_type: *match_type,
                        similarity: *similarity,
                    })
                    .collect();
                return Resolution::Duplicate {
                    original_id: original.id,
                    edges,
                };
            }
        }
        Resolution::Root
    }

    fn root_of<'a>(
        &self,
        candidate: &'a Candidate,
        by_id: &HashMap<PostId, &'a Candidate>,
    ) -> Option<&'a Candidate> {
        match candidate.duplicate_of {
            None => Some(candidate),
            Some(root_id) => by_id
                .get(&root_id)
                .copied()
                .filter(|root| root.duplicate_of.is_none()),
        }
    }

    /// Every match type `a` satisfies against `b`, with its similarity.
    pub fn compare(&self, a: &Signals, b: &Signals) -> Vec<(MatchType, f64)> {
        let mut found = Vec::new();
        let text_similarity = match (&a.fingerprint, &b.fingerprint) {
            (Some(x), Some(y)) => x.similarity(y),
            _ => 0.0,
        };

        if a.text_hash.is_some() && a.text_hash == b.text_hash {
            found.push((MatchType::TextExact, 1.0));
        }

        let same_kind = a.deal_type == b.deal_type && a.object_type == b.object_type;
        if same_kind && a.phones.iter().any(|p| b.phones.contains(p)) {
            let w = self.phone_weight;
            found.push((MatchType::Phone, w + (1.0 - w) * text_similarity));
        }

        if a.fingerprint.is_some() && text_similarity >= self.similarity_threshold {
            found.push((MatchType::TextSimilar, text_similarity));
        }

        let closest = a
            .image_hashes
            .iter()
            .flat_map(|x| b.image_hashes.iter().map(move |y| x.distance(y)))
            .min();
        if let Some(distance) = closest.filter(|d| *d <= self.phash_max_distance) {
            found.push((MatchType::Image, 1.0 - f64::from(distance) / 64.0));
        }

        found
    }
}
