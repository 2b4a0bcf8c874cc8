//! listing-dedup CLI
//!
//! Reads crawler output as JSON lines and runs it through the engine against
//! a local storage snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use listing_dedup::{
    config::load_all,
    error::Result,
    models::{DeletionSignal, RawPost},
    pipeline::{DeletionOutcome, Pipeline},
    services::MediaSources,
    storage::{ListingStore, LocalStorage},
    utils::log as console,
};
use serde::de::DeserializeOwned;

/// Real-estate listing extraction and duplicate suppression
#[derive(Parser, Debug)]
#[command(name = "listing-dedup", version, about = "Listing extraction and dedup engine")]
struct Cli {
    /// Directory containing data/config.toml
    #[arg(short, long, default_value = ".")]
    base_dir: PathBuf,

    /// Storage directory (default: paths.storage_dir from config)
    #[arg(short, long)]
    storage_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest new or edited posts (one RawPost JSON object per line)
    Ingest {
        input: PathBuf,
    },

    /// Apply deletion signals (one DeletionSignal JSON object per line)
    Delete {
        input: PathBuf,
    },

    /// Extract a listing from text and print it, without storing anything
    Parse {
        text: String,
    },

    /// Validate configuration and gazetteer
    Validate,

    /// Show storage statistics
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, level: &str) {
    let level = if verbose { "debug" } else { level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
    console::init(level);
}

/// Parse a JSON-lines file, skipping blank lines. Bad lines are reported and
/// skipped.
async fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<(Vec<T>, usize)> {
    let content = tokio::fs::read_to_string(path).await?;
    let mut items = Vec::new();
    let mut bad = 0;
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(item) => items.push(item),
            Err(e) => {
                log::error!("{}:{}: unreadable record: {}", path.display(), number + 1, e);
                bad += 1;
            }
        }
    }
    Ok((items, bad))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, gazetteer) = load_all(&cli.base_dir)?;
    init_logging(cli.verbose, &config.logging.level);

    let storage_dir = cli
        .storage_dir
        .clone()
        .unwrap_or_else(|| cli.base_dir.join(&config.paths.storage_dir));
    let store: Arc<dyn ListingStore> = Arc::new(LocalStorage::open(&storage_dir).await?);
    let media = Arc::new(MediaSources::from_config(&config.media)?);
    let pipeline = Pipeline::new(&config, gazetteer.clone(), Arc::clone(&store), media)?;

    match cli.command {
        Command::Ingest { input } => {
            console::header("Ingest");
            let (posts, unreadable): (Vec<RawPost>, usize) = read_jsonl(&input).await?;
            console::step(1, 2, &format!("Read {} posts from {}", posts.len(), input.display()));

            let report = pipeline.ingest_all(&posts).await;
            console::step(2, 2, "Resolved and committed");

            console::summary(
                "Ingest",
                &[
                    ("created", report.created.to_string()),
                    ("updated", report.updated.to_string()),
                    ("duplicates", report.duplicates.to_string()),
                    ("manual review", report.manual_review.to_string()),
                    ("rejected", (report.rejected + unreadable).to_string()),
                ],
            );
        }

        Command::Delete { input } => {
            console::header("Delete");
            let (signals, unreadable): (Vec<DeletionSignal>, usize) = read_jsonl(&input).await?;

            let mut deleted = 0;
            let mut ignored = 0;
            let mut failed = unreadable;
            for signal in &signals {
                match pipeline.handle_deletion(signal).await {
                    Ok(DeletionOutcome::Deleted(entry)) => {
                        console::sub_item(&format!(
                            "post {} deleted after {}h",
                            entry.post_id, entry.lifetime_hours
                        ));
                        deleted += 1;
                    }
                    Ok(DeletionOutcome::Ignored) => ignored += 1,
                    Err(e) => {
                        log::error!("Deletion {}:{} failed: {}", signal.channel_id, signal.message_id, e);
                        failed += 1;
                    }
                }
            }

            console::summary(
                "Delete",
                &[
                    ("deleted", deleted.to_string()),
                    ("ignored", ignored.to_string()),
                    ("failed", failed.to_string()),
                ],
            );
        }

        Command::Parse { text } => {
            let (normalized, listing) = pipeline.parse(&text);
            let output = serde_json::json!({
                "phones": normalized.phones,
                "links": normalized.links,
                "hashtags": normalized.hashtags,
                "mentions": normalized.mentions,
                "listing": listing,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            config.validate()?;
            gazetteer.validate()?;
            log::info!(
                "✓ Config OK, gazetteer has {} districts and {} metro stations",
                gazetteer.districts().len(),
                gazetteer.metro_stations().len()
            );
        }

        Command::Info => {
            let stats = store.stats().await?;
            console::summary(
                &format!("Storage {}", storage_dir.display()),
                &[
                    ("posts", stats.posts.to_string()),
                    ("active", stats.active.to_string()),
                    ("roots", stats.roots.to_string()),
                    ("duplicates", stats.duplicates.to_string()),
                    ("edges", stats.edges.to_string()),
                    ("deletions", stats.deletions.to_string()),
                    ("channels", stats.channels.to_string()),
                    ("pending review", stats.pending_review.to_string()),
                ],
            );
        }
    }

    Ok(())
}
