//! End-to-end behaviour of the engine against an in-memory store.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use listing_dedup::models::{
    Config, Currency, DealType, DeletionSignal, FingerprintConfig, Gazetteer, MatchType,
    ObjectType, PricePeriod, RawPost, RawTokens,
};
use listing_dedup::pipeline::{
    DeletionOutcome, FingerprintEngine, IngestOutcome, Normalizer, Pipeline,
};
use listing_dedup::services::LocalMediaSource;
use listing_dedup::storage::{CommitReceipt, ListingStore, MemoryStore};

const AD: &str = "Сдаю 2-х комнатную квартиру, Чиланзар, 400$/мес, +998901234567";

fn published() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn raw(channel_id: i64, message_id: i64, text: &str, minutes: i64) -> RawPost {
    RawPost {
        channel_id,
        message_id,
        grouped_id: None,
        channel_title: None,
        chat_type: None,
        text: Some(text.to_string()),
        published_at: published() + Duration::minutes(minutes),
        media: Vec::new(),
        entities: RawTokens::default(),
    }
}

fn setup() -> (Arc<MemoryStore>, Pipeline) {
    let store = Arc::new(MemoryStore::new());
    let pipeline = Pipeline::new(
        &Config::default(),
        Arc::new(Gazetteer::builtin()),
        store.clone(),
        Arc::new(LocalMediaSource::default()),
    )
    .unwrap();
    (store, pipeline)
}

async fn stored(pipeline: &Pipeline, post: RawPost) -> CommitReceipt {
    match pipeline.ingest(&post).await.unwrap() {
        IngestOutcome::Stored(receipt) => receipt,
        other => panic!("expected {} to be stored, got {:?}", post.post_uid(), other),
    }
}

#[tokio::test]
async fn scenario_rent_ad_fields() {
    let (store, pipeline) = setup();
    let receipt = stored(&pipeline, raw(1, 10, AD, 0)).await;

    let listing = store.listing(receipt.post_id).await.unwrap().unwrap();
    assert!(listing.is_real_estate);
    assert_eq!(listing.deal_type, Some(DealType::RentLong));
    assert_eq!(listing.object_type, Some(ObjectType::Flat));
    assert_eq!(listing.rooms, Some(2));
    assert_eq!(listing.price, Some(400));
    assert_eq!(listing.currency, Some(Currency::Usd));
    assert_eq!(listing.price_period, Some(PricePeriod::Month));
    assert_eq!(listing.district_raw.as_deref(), Some("Чиланзар"));

    let post = store.post(receipt.post_id).await.unwrap().unwrap();
    assert_eq!(post.phones, vec!["+998901234567"]);
    assert!(post.is_root());
}

#[tokio::test]
async fn scenario_verbatim_repost_in_other_channel() {
    let (store, pipeline) = setup();
    let first = stored(&pipeline, raw(1, 10, AD, 0)).await;
    let second = stored(&pipeline, raw(2, 55, AD, 3)).await;

    let a = store.post(first.post_id).await.unwrap().unwrap();
    let b = store.post(second.post_id).await.unwrap().unwrap();
    assert_eq!(a.text_hash, b.text_hash);
    assert_eq!(second.duplicate_of, Some(first.post_id));

    let edges = store.edges_of(second.post_id).await.unwrap();
    assert_eq!(edges[0].match_type, MatchType::TextExact);
    assert_eq!(edges[0].similarity, 1.0);
    assert!(edges.iter().all(|e| e.original_id == first.post_id));
    assert!(edges.iter().any(|e| e.match_type == MatchType::Phone));
}

#[tokio::test]
async fn verbatim_repost_outside_the_window_stays_root() {
    let (store, pipeline) = setup();
    let day = 24 * 60;
    let first = stored(&pipeline, raw(1, 10, AD, 0)).await;
    let late = stored(&pipeline, raw(2, 55, AD, 15 * day)).await;
    assert!(late.created);
    assert_eq!(late.duplicate_of, None);
    assert!(store.edges_of(late.post_id).await.unwrap().is_empty());

    // 20 days after the first, 5 after the second: only the second is in range
    let third = stored(&pipeline, raw(3, 70, AD, 20 * day)).await;
    assert_eq!(third.duplicate_of, Some(late.post_id));
    assert_ne!(third.duplicate_of, Some(first.post_id));
}

#[tokio::test]
async fn scenario_price_change_and_emoji() {
    let (store, pipeline) = setup();
    let original = "Сдаю 2-х комнатную квартиру, Чиланзар, 400$/мес, евроремонт";
    let repost = "🔥 Сдаю 2-х комнатную квартиру, Чиланзар, 420$/мес, евроремонт";

    let first = stored(&pipeline, raw(1, 10, original, 0)).await;
    let second = stored(&pipeline, raw(1, 11, repost, 60)).await;

    let a = store.post(first.post_id).await.unwrap().unwrap();
    let b = store.post(second.post_id).await.unwrap().unwrap();
    assert_ne!(a.text_hash, b.text_hash);
    let similarity = a
        .fingerprint
        .as_ref()
        .unwrap()
        .similarity(b.fingerprint.as_ref().unwrap());
    assert!(similarity >= 0.85);

    assert_eq!(second.duplicate_of, Some(first.post_id));
    let edges = store.edges_of(second.post_id).await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].match_type, MatchType::TextSimilar);
}

#[tokio::test]
async fn scenario_not_real_estate() {
    let (store, pipeline) = setup();
    let listing_post = stored(&pipeline, raw(1, 10, AD, 0)).await;
    let greeting = stored(&pipeline, raw(1, 11, "С днём рождения!!!", 1)).await;
    let again = stored(&pipeline, raw(2, 12, "С днём рождения!!!", 2)).await;

    let listing = store.listing(greeting.post_id).await.unwrap().unwrap();
    assert!(!listing.is_real_estate);
    assert!(!listing.has_numeric_or_location());

    assert_eq!(greeting.duplicate_of, None);
    // only ever compared with other non-listings
    assert_eq!(again.duplicate_of, Some(greeting.post_id));
    assert_ne!(again.duplicate_of, Some(listing_post.post_id));
}

#[tokio::test]
async fn scenario_deletion_after_ten_hours() {
    let (store, pipeline) = setup();
    let receipt = stored(&pipeline, raw(1, 10, AD, 0)).await;

    let signal = DeletionSignal {
        channel_id: 1,
        message_id: 10,
        detected_at: Some(published() + Duration::hours(10)),
    };
    let outcome = pipeline.handle_deletion(&signal).await.unwrap();
    let DeletionOutcome::Deleted(entry) = outcome else {
        panic!("expected the post to be deleted");
    };
    assert_eq!(entry.lifetime_hours, 10);

    assert_eq!(
        pipeline.handle_deletion(&signal).await.unwrap(),
        DeletionOutcome::Ignored
    );
    assert_eq!(store.deletion_log().await.unwrap().len(), 1);
    assert!(store.post(receipt.post_id).await.unwrap().unwrap().is_deleted);

    // reported again after deletion: a new post
    let reborn = stored(&pipeline, raw(1, 10, AD, 11 * 60)).await;
    assert!(reborn.created);
    assert_ne!(reborn.post_id, receipt.post_id);
}

#[tokio::test]
async fn edits_rerun_dedup_but_never_demote_an_original() {
    let (store, pipeline) = setup();
    let other = "Продаю дом в Сергели, участок 6 соток, 90 000$";
    let a = stored(&pipeline, raw(1, 10, AD, 0)).await;
    let b = stored(&pipeline, raw(2, 20, AD, 5)).await;
    let c = stored(&pipeline, raw(3, 30, other, 6)).await;
    assert_eq!(b.duplicate_of, Some(a.post_id));
    assert_eq!(c.duplicate_of, None);

    // the original is edited to match c: it keeps its dependents and stays root
    let edited = stored(&pipeline, raw(1, 10, other, 0)).await;
    assert_eq!(edited.post_id, a.post_id);
    assert!(!edited.created);
    assert_eq!(edited.duplicate_of, None);

    // the duplicate is edited to match c: re-resolved from scratch
    let moved = stored(&pipeline, raw(2, 20, other, 5)).await;
    assert_eq!(moved.post_id, b.post_id);
    assert_eq!(moved.duplicate_of, Some(a.post_id));
    let edges = store.edges_of(b.post_id).await.unwrap();
    assert!(edges.iter().all(|e| e.original_id == a.post_id));

    // and edited into something unique: back to root, no edges
    let unique = stored(&pipeline, raw(2, 20, "Сдаю студию в Юнусабаде, 300$", 5)).await;
    assert_eq!(unique.duplicate_of, None);
    assert!(store.edges_of(b.post_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn concurrent_copies_produce_one_root() {
    let (store, pipeline) = setup();
    let posts: Vec<RawPost> = (0..24).map(|i| raw(100 + i, 1, AD, i)).collect();

    let report = pipeline.ingest_all(&posts).await;
    assert_eq!(report.created, 24);
    assert_eq!(report.duplicates, 23);

    let all = store.posts().await.unwrap();
    assert_eq!(all.iter().filter(|p| p.is_root()).count(), 1);
}

#[tokio::test]
async fn duplicate_of_never_chains() {
    let (store, pipeline) = setup();
    let texts = [
        AD,
        "Сдаю 2-х комнатную квартиру, Чиланзар, 450$/мес, +998901234567",
        "Продаю дом в Сергели, участок 6 соток, 90 000$",
        "Продаю дом в Сергели, участок 6 соток, 95 000$, звоните 90 111 22 33",
        "Сдаю комнату девушке, Юнусабад, 150$, 90 111 22 33",
        AD,
    ];
    for (i, text) in texts.iter().enumerate() {
        stored(&pipeline, raw(1 + (i as i64 % 3), 10 + i as i64, text, i as i64 * 30)).await;
    }

    let posts = store.posts().await.unwrap();
    for post in &posts {
        if let Some(original) = post.duplicate_of {
            let root = posts.iter().find(|p| p.id == original).unwrap();
            assert!(root.duplicate_of.is_none(), "{} chains through {}", post.id, root.id);
        }
    }
    assert_eq!(store.stats().await.unwrap().posts, texts.len());
}

#[tokio::test]
async fn extraction_is_idempotent() {
    let (_, pipeline) = setup();
    let text = "Продаю 3 комнатную квартиру 3/5/9, 75 м², Юнусабад, 85 000$, @owner_uz";
    assert_eq!(pipeline.parse(text), pipeline.parse(text));

    let normalizer = Normalizer::new().unwrap();
    let once = normalizer.normalize(Some(text), &RawTokens::default());
    let twice = normalizer.normalize(Some(text), &RawTokens::default());
    assert_eq!(once, twice);
}

#[test]
fn fingerprints_are_deterministic_and_symmetric() {
    let a = FingerprintEngine::new(&FingerprintConfig::default());
    let b = FingerprintEngine::new(&FingerprintConfig::default());
    let text = "сдаю 2-х комнатную квартиру, чиланзар, 400$/мес";
    assert_eq!(a.exact_hash(text), b.exact_hash(text));
    assert_eq!(a.fingerprint(text), b.fingerprint(text));

    let spaced = "сдаю   2-х комнатную квартиру ; чиланзар , 400 $ / мес !";
    let x = a.fingerprint(text).unwrap();
    let y = a.fingerprint(spaced).unwrap();
    assert!(x.similarity(&y) >= 0.85);
    assert_eq!(x.similarity(&y), y.similarity(&x));
}
