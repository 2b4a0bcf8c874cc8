//! Listing field extraction.
//!
//! A fixed sequence of detectors runs over a normalized post. Each detector
//! fills only fields that are still unset, so earlier detectors win. A
//! detector that fails leaves its fields unset and extraction carries on.

mod location;
mod numeric;
mod patterns;
mod property;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::error::Result;
use crate::models::{ExtractionConfig, Gazetteer, Listing, ScoreWeights};
use crate::pipeline::normalize::NormalizedPost;

use patterns::{Patterns, REAL_ESTATE_HASHTAGS, REAL_ESTATE_KEYWORDS};

/// A single field could not be read.
#[derive(Debug, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    field: &'static str,
    message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl fmt::Display) -> Self {
        Self {
            field,
            message: message.to_string(),
        }
    }
}

type FieldResult = std::result::Result<(), FieldError>;

/// Listing under construction plus the text views detectors read.
struct Draft<'a> {
    post: &'a NormalizedPost,
    /// Folded text with phones and links blanked
    numeric: String,
    /// Folded text with `-`/`_` as spaces
    matching: String,
    listing: Listing,
}

type Detector = fn(&Extractor, &mut Draft<'_>) -> FieldResult;

/// Detector order is priority order.
const DETECTORS: &[(&str, Detector)] = &[
    ("deal_type", property::detect_deal_type),
    ("object_type", property::detect_object_type),
    ("triple", numeric::detect_triple),
    ("rooms", numeric::detect_rooms),
    ("floors", numeric::detect_floors),
    ("area", numeric::detect_area),
    ("price", numeric::detect_price),
    ("deposit", numeric::detect_deposit),
    ("commission", numeric::detect_commission),
    ("district", location::detect_district),
    ("metro", location::detect_metro),
    ("coordinates", location::detect_coordinates),
    ("address", location::detect_address),
    ("condition", property::detect_condition),
    ("house_type", property::detect_house_type),
    ("amenities", property::detect_amenities),
    ("rules", property::detect_rules),
    ("tenants", property::detect_tenants),
    ("contact", property::detect_contact),
    ("description", property::detect_description),
];

/// Turns normalized posts into listings.
pub struct Extractor {
    patterns: Patterns,
    gazetteer: Arc<Gazetteer>,
    weights: ScoreWeights,
    review_threshold: u8,
}

impl Extractor {
    pub fn new(config: &ExtractionConfig, gazetteer: Arc<Gazetteer>) -> Result<Self> {
        Ok(Self {
            patterns: Patterns::new()?,
            gazetteer,
            weights: config.weights.clone(),
            review_threshold: config.review_threshold,
        })
    }

    pub fn gazetteer(&self) -> &Gazetteer {
        &self.gazetteer
    }

    /// Keyword gate: does the post look like a real-estate ad at all?
    pub fn is_real_estate(&self, post: &NormalizedPost) -> bool {
        if post.is_empty() {
            return false;
        }
        if REAL_ESTATE_KEYWORDS.iter().any(|k| post.text.contains(k)) {
            return true;
        }
        if post
            .hashtags
            .iter()
            .any(|tag| REAL_ESTATE_HASHTAGS.iter().any(|k| tag.contains(k)))
        {
            return true;
        }
        let numeric = post.masked_text();
        self.patterns.triple.is_match(&numeric) || self.patterns.dollar_price.is_match(&numeric)
    }

    /// Extract a listing. Deterministic for a given post.
    pub fn extract(&self, post: &NormalizedPost) -> Listing {
        if !self.is_real_estate(post) {
            return Listing::not_real_estate();
        }

        let mut draft = Draft {
            post,
            numeric: post.masked_text(),
            matching: post.match_text(),
            listing: Listing {
                is_real_estate: true,
                ..Listing::default()
            },
        };

        for (name, detect) in DETECTORS {
            if let Err(e) = detect(self, &mut draft) {
                log::debug!("Detector {} left field unset: {}", name, e);
            }
        }

        let mut listing = draft.listing;
        listing.parse_score = self.score(&listing);
        listing.needs_review =
            listing.parse_score < self.review_threshold || !listing.review_notes.is_empty();
        listing
    }

    /// Weighted completeness over the important field groups.
    fn score(&self, listing: &Listing) -> u8 {
        let w = &self.weights;
        let location = listing.district_id.is_some()
            || listing.metro_id.is_some()
            || listing.district_raw.is_some()
            || listing.metro_raw.is_some()
            || listing.address_raw.is_some();

        let groups = [
            (listing.deal_type.is_some(), w.deal),
            (listing.object_type.is_some(), w.object),
            (listing.price.is_some(), w.price),
            (
                listing.rooms.is_some() || listing.area_m2.is_some(),
                w.rooms_or_area,
            ),
            (location, w.location),
        ];
        let total: u32 = groups
            .iter()
            .filter(|(filled, _)| *filled)
            .map(|(_, weight)| u32::from(*weight))
            .sum();
        total.min(100) as u8
    }
}

/// Set `slot` unless an earlier detector already did.
fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// Up to `n` chars of `text` ending at byte `pos`.
fn chars_before(text: &str, pos: usize, n: usize) -> &str {
    let head = &text[..pos];
    let start = head
        .char_indices()
        .rev()
        .nth(n.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    &head[start..]
}

/// Up to `n` chars of `text` starting at byte `pos`.
fn chars_after(text: &str, pos: usize, n: usize) -> &str {
    let tail = &text[pos..];
    let end = tail
        .char_indices()
        .nth(n)
        .map(|(i, _)| i)
        .unwrap_or(tail.len());
    &tail[..end]
}

/// Whether the clause leading up to `pos` negates what follows
/// ("без мебели", "нет кондиционера").
fn negated_before(text: &str, pos: usize) -> bool {
    let window = chars_before(text, pos, 24);
    let clause = window
        .rsplit(|c| matches!(c, ',' | '.' | ';' | '\n' | '!'))
        .next()
        .unwrap_or(window);
    clause
        .split_whitespace()
        .any(|word| matches!(word, "без" | "нет" | "не" | "нельзя" | "нету"))
}

/// Trim a raw value read from display text.
fn clean_value(raw: &str) -> Option<String> {
    let trimmed = raw
        .trim()
        .trim_matches(|c: char| matches!(c, ',' | '.' | ';' | ':' | '-' | '"' | '\'' | '!'))
        .trim();
    if trimmed.chars().count() < 2 {
        None
    } else {
        Some(trimmed.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Currency, DealType, ObjectType, PricePeriod, RawTokens};
    use crate::pipeline::normalize::Normalizer;

    fn extract(text: &str) -> Listing {
        let normalizer = Normalizer::new().unwrap();
        let extractor = Extractor::new(
            &ExtractionConfig::default(),
            Arc::new(Gazetteer::builtin()),
        )
        .unwrap();
        extractor.extract(&normalizer.normalize(Some(text), &RawTokens::default()))
    }

    #[test]
    fn test_basic_rent_ad() {
        let listing =
            extract("Сдаю 2-х комнатную квартиру, Чиланзар, 400$/мес, +998901234567");
        assert!(listing.is_real_estate);
        assert_eq!(listing.deal_type, Some(DealType::RentLong));
        assert_eq!(listing.object_type, Some(ObjectType::Flat));
        assert_eq!(listing.rooms, Some(2));
        assert_eq!(listing.price, Some(400));
        assert_eq!(listing.currency, Some(Currency::Usd));
        assert_eq!(listing.price_period, Some(PricePeriod::Month));
        assert_eq!(listing.district_raw.as_deref(), Some("Чиланзар"));
        assert_eq!(listing.district_id, Some(3));
        assert_eq!(listing.contact_phone.as_deref(), Some("+998901234567"));
        assert_eq!(listing.parse_score, 100);
        assert!(!listing.needs_review);
    }

    #[test]
    fn test_not_real_estate() {
        let listing = extract("С днём рождения!!!");
        assert_eq!(listing, Listing::not_real_estate());
    }

    #[test]
    fn test_idempotent() {
        let text = "Продаю 3 комнатную квартиру 3/5/9, 75 м², Юнусабад, 85 000$";
        assert_eq!(extract(text), extract(text));
    }

    #[test]
    fn test_low_score_needs_review() {
        let listing = extract("сдаю");
        assert!(listing.is_real_estate);
        assert_eq!(listing.parse_score, 20);
        assert!(listing.needs_review);
    }

    #[test]
    fn test_conflict_flags_review() {
        let listing = extract(
            "Сдаю 3-х комнатную квартиру 2/5/9, Юнусабад, 500$, евроремонт",
        );
        assert_eq!(listing.rooms, Some(2));
        assert!(listing.review_notes.iter().any(|n| n == "rooms_conflict"));
        assert!(listing.needs_review);
    }

    #[test]
    fn test_negation_helper() {
        let text = "мебель есть, без кондиционера";
        let pos = text.find("кондиц").unwrap();
        assert!(negated_before(text, pos));
        assert!(!negated_before(text, text.find("мебел").unwrap()));
        let text = "без ремонта, мебель есть";
        assert!(!negated_before(text, text.find("мебел").unwrap()));
    }

    #[test]
    fn test_char_windows() {
        let text = "цена 400$ в месяц";
        let pos = text.find("400").unwrap();
        assert_eq!(chars_before(text, pos, 3), "на ");
        assert_eq!(chars_after(text, pos, 4), "400$");
        assert_eq!(chars_before(text, 0, 5), "");
    }
}
