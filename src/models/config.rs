//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Field extraction and scoring
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Text fingerprint parameters
    #[serde(default)]
    pub fingerprint: FingerprintConfig,

    /// Duplicate matching thresholds
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Batch ingest behavior
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Media fetching and hashing
    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let weights = &self.extraction.weights;
        if weights.total() != 100 {
            return Err(AppError::validation(format!(
                "extraction.weights must sum to 100, got {}",
                weights.total()
            )));
        }
        if self.extraction.review_threshold > 100 {
            return Err(AppError::validation(
                "extraction.review_threshold must be <= 100",
            ));
        }
        if self.fingerprint.shingle_size == 0 {
            return Err(AppError::validation("fingerprint.shingle_size must be > 0"));
        }
        if self.fingerprint.signature_len == 0 {
            return Err(AppError::validation(
                "fingerprint.signature_len must be > 0",
            ));
        }
        if self.dedup.window_days == 0 {
            return Err(AppError::validation("dedup.window_days must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.dedup.similarity_threshold) {
            return Err(AppError::validation(
                "dedup.similarity_threshold must be within [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.dedup.phone_weight) {
            return Err(AppError::validation(
                "dedup.phone_weight must be within [0, 1]",
            ));
        }
        if self.dedup.phash_max_distance > 64 {
            return Err(AppError::validation(
                "dedup.phash_max_distance must be <= 64",
            ));
        }
        if self.dedup.shards == 0 {
            return Err(AppError::validation("dedup.shards must be > 0"));
        }
        if self.dedup.queue_depth == 0 {
            return Err(AppError::validation("dedup.queue_depth must be > 0"));
        }
        if self.pipeline.max_concurrent == 0 {
            return Err(AppError::validation("pipeline.max_concurrent must be > 0"));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::validation("retry.max_attempts must be > 0"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(AppError::validation(
                "retry.base_delay_ms must not exceed retry.max_delay_ms",
            ));
        }
        if self.media.timeout_secs == 0 {
            return Err(AppError::validation("media.timeout_secs must be > 0"));
        }
        if self.media.user_agent.trim().is_empty() {
            return Err(AppError::validation("media.user_agent is empty"));
        }
        Ok(())
    }
}

/// Extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Listings scoring below this are flagged for review
    #[serde(default = "defaults::review_threshold")]
    pub review_threshold: u8,

    #[serde(default)]
    pub weights: ScoreWeights,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            review_threshold: defaults::review_threshold(),
            weights: ScoreWeights::default(),
        }
    }
}

/// Points awarded per filled field group; must sum to 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "defaults::weight_deal")]
    pub deal: u8,
    #[serde(default = "defaults::weight_object")]
    pub object: u8,
    #[serde(default = "defaults::weight_price")]
    pub price: u8,
    #[serde(default = "defaults::weight_rooms_or_area")]
    pub rooms_or_area: u8,
    #[serde(default = "defaults::weight_location")]
    pub location: u8,
}

impl ScoreWeights {
    pub fn total(&self) -> u32 {
        [
            self.deal,
            self.object,
            self.price,
            self.rooms_or_area,
            self.location,
        ]
        .iter()
        .map(|w| u32::from(*w))
        .sum()
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            deal: defaults::weight_deal(),
            object: defaults::weight_object(),
            price: defaults::weight_price(),
            rooms_or_area: defaults::weight_rooms_or_area(),
            location: defaults::weight_location(),
        }
    }
}

/// MinHash signature settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintConfig {
    /// Character shingle width
    #[serde(default = "defaults::shingle_size")]
    pub shingle_size: usize,

    /// Number of MinHash components
    #[serde(default = "defaults::signature_len")]
    pub signature_len: usize,

    /// Digit runs at least this long are masked before shingling
    #[serde(default = "defaults::mask_min_digits")]
    pub mask_min_digits: usize,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            shingle_size: defaults::shingle_size(),
            signature_len: defaults::signature_len(),
            mask_min_digits: defaults::mask_min_digits(),
        }
    }
}

/// Duplicate resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Candidates are searched within this many days either side of a post
    #[serde(default = "defaults::window_days")]
    pub window_days: u32,

    /// Minimum fingerprint similarity for `text_similar`
    #[serde(default = "defaults::similarity_threshold")]
    pub similarity_threshold: f64,

    /// Maximum Hamming distance for `image_phash`
    #[serde(default = "defaults::phash_max_distance")]
    pub phash_max_distance: u32,

    /// Base score of a phone match before text similarity is blended in
    #[serde(default = "defaults::phone_weight")]
    pub phone_weight: f64,

    /// Number of resolver actors
    #[serde(default = "defaults::shards")]
    pub shards: usize,

    /// Pending requests per resolver actor
    #[serde(default = "defaults::queue_depth")]
    pub queue_depth: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_days: defaults::window_days(),
            similarity_threshold: defaults::similarity_threshold(),
            phash_max_distance: defaults::phash_max_distance(),
            phone_weight: defaults::phone_weight(),
            shards: defaults::shards(),
            queue_depth: defaults::queue_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Posts prepared concurrently in a batch
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
        }
    }
}

/// Exponential backoff for transient per-post failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "defaults::max_delay_ms")]
    pub max_delay_ms: u64,
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> u64 {
        let exp = attempt.saturating_sub(1).min(20);
        self.base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay_ms(),
            max_delay_ms: defaults::max_delay_ms(),
        }
    }
}

/// Where media bytes come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Base directory for relative `local_path` values
    #[serde(default)]
    pub root_dir: Option<PathBuf>,

    /// User-Agent header for remote media requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Compute perceptual hashes for images
    #[serde(default = "defaults::hash_images")]
    pub hash_images: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root_dir: None,
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            hash_images: defaults::hash_images(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::storage_dir")]
    pub storage_dir: PathBuf,

    /// Gazetteer TOML; the built-in Tashkent data is used when unset
    #[serde(default)]
    pub gazetteer_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            storage_dir: defaults::storage_dir(),
            gazetteer_file: None,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Extraction defaults
    pub fn review_threshold() -> u8 {
        50
    }
    pub fn weight_deal() -> u8 {
        20
    }
    pub fn weight_object() -> u8 {
        15
    }
    pub fn weight_price() -> u8 {
        30
    }
    pub fn weight_rooms_or_area() -> u8 {
        20
    }
    pub fn weight_location() -> u8 {
        15
    }

    // Fingerprint defaults
    pub fn shingle_size() -> usize {
        3
    }
    pub fn signature_len() -> usize {
        64
    }
    pub fn mask_min_digits() -> usize {
        3
    }

    // Dedup defaults
    pub fn window_days() -> u32 {
        14
    }
    pub fn similarity_threshold() -> f64 {
        0.85
    }
    pub fn phash_max_distance() -> u32 {
        10
    }
    pub fn phone_weight() -> f64 {
        0.7
    }
    pub fn shards() -> usize {
        1
    }
    pub fn queue_depth() -> usize {
        256
    }

    pub fn max_concurrent() -> usize {
        8
    }

    // Retry defaults
    pub fn max_attempts() -> u32 {
        3
    }
    pub fn base_delay_ms() -> u64 {
        200
    }
    pub fn max_delay_ms() -> u64 {
        5000
    }

    // Media defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; listing-dedup/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn hash_images() -> bool {
        true
    }

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn storage_dir() -> PathBuf {
        PathBuf::from("storage")
    }
}
