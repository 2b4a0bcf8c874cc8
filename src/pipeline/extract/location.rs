//! Location detectors: gazetteer lookups for district and metro, then
//! coordinates, free-text address and landmark.

use super::patterns::LANDMARKS;
use super::{Draft, Extractor, FieldResult, clean_value, fill};
use crate::pipeline::normalize::fold_for_match;

/// Words that follow "метро" without naming a station.
const NOT_A_STATION: &[&str] = &[
    "рядом", "близко", "недалеко", "пешком", "в", "до", "от", "у", "yaqin", "yonida",
];

pub(super) fn detect_district(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    let gazetteer = ex.gazetteer();

    if let Some(hit) = gazetteer.find_district(&draft.matching) {
        let raw = draft
            .post
            .display_span(hit.start..hit.end)
            .and_then(|s| clean_value(&s.replace('_', " ")));
        fill(&mut draft.listing.district_id, Some(hit.id));
        fill(&mut draft.listing.district_raw, raw);
        return Ok(());
    }

    for tag in &draft.post.hashtags {
        if let Some(hit) = gazetteer.find_district(&fold_for_match(tag)) {
            fill(&mut draft.listing.district_id, Some(hit.id));
            fill(&mut draft.listing.district_raw, clean_value(&tag.replace('_', " ")));
            return Ok(());
        }
    }

    let text = draft.post.text.as_str();
    let p = &ex.patterns;
    let labelled = p
        .district_label
        .captures(text)
        .or_else(|| p.district_tumani.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| draft.post.display_span(m.range()))
        .and_then(clean_value);

    if let Some(raw) = labelled {
        fill(&mut draft.listing.district_raw, Some(raw));
        draft.listing.review_notes.push("district_unmatched".to_string());
    }
    Ok(())
}

pub(super) fn detect_metro(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    let text = draft.post.text.as_str();
    let matching = draft.matching.as_str();
    let p = &ex.patterns;

    let mut unmatched = None;
    for label in p.metro_label.find_iter(text) {
        let start = label.end();
        let end = matching[start..]
            .find(['\n', ','])
            .map_or(matching.len(), |i| start + i);
        let window = &matching[start..end];

        if let Some(hit) = ex.gazetteer().find_metro(window) {
            let raw = draft
                .post
                .display_span(start + hit.start..start + hit.end)
                .and_then(clean_value);
            fill(&mut draft.listing.metro_id, Some(hit.id));
            fill(&mut draft.listing.metro_raw, raw);
            return Ok(());
        }

        // "м." alone is too ambiguous without a gazetteer hit
        if unmatched.is_some() || label.as_str() == "м." {
            continue;
        }
        unmatched = p
            .metro_words
            .captures(window)
            .and_then(|caps| caps.get(1))
            .filter(|m| {
                m.as_str()
                    .split_whitespace()
                    .next()
                    .is_some_and(|w| !NOT_A_STATION.contains(&w))
            })
            .and_then(|m| draft.post.display_span(start + m.start()..start + m.end()))
            .and_then(clean_value);
    }

    if let Some(raw) = unmatched {
        fill(&mut draft.listing.metro_raw, Some(raw));
        draft.listing.review_notes.push("metro_unmatched".to_string());
    }
    Ok(())
}

/// Station coordinates when a station matched, else the district centre.
pub(super) fn detect_coordinates(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    if draft.listing.latitude.is_some() {
        return Ok(());
    }
    let gazetteer = ex.gazetteer();

    let station = draft
        .listing
        .metro_id
        .and_then(|id| gazetteer.metro(id))
        .and_then(|m| Some((m.latitude?, m.longitude?)));
    let centre = || {
        draft
            .listing
            .district_id
            .and_then(|id| gazetteer.district(id))
            .and_then(|d| Some((d.center_lat?, d.center_lng?)))
    };

    if let Some((lat, lng)) = station.or_else(centre) {
        draft.listing.latitude = Some(lat);
        draft.listing.longitude = Some(lng);
    }
    Ok(())
}

pub(super) fn detect_address(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    let post = draft.post;
    let text = post.text.as_str();
    let p = &ex.patterns;

    let span_of = |caps: Option<regex::Captures<'_>>| {
        caps.and_then(|c| c.get(1))
            .and_then(|m| post.display_span(m.range()))
            .and_then(clean_value)
    };

    let address = span_of(p.address_label.captures(text)).or_else(|| span_of(p.address_street.captures(text)));
    let complex = span_of(p.complex.captures(text));

    let address = match (complex, address) {
        (Some(c), Some(a)) if a.to_lowercase().contains(&c.to_lowercase()) => Some(a),
        (Some(c), Some(a)) => Some(format!("ЖК {}, {}", c, a)),
        (Some(c), None) => Some(format!("ЖК {}", c)),
        (None, a) => a,
    };

    let landmark = span_of(p.landmark_label.captures(text)).or_else(|| {
        LANDMARKS.iter().find_map(|name| {
            let start = text.find(name)?;
            post.display_span(start..start + name.len()).map(str::to_string)
        })
    });

    fill(&mut draft.listing.address_raw, address);
    fill(&mut draft.listing.landmark, landmark);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::{ExtractionConfig, Gazetteer, Listing, RawTokens};
    use crate::pipeline::normalize::Normalizer;

    fn extract_with(text: &str, tokens: &RawTokens) -> Listing {
        let normalizer = Normalizer::new().unwrap();
        let extractor = Extractor::new(
            &ExtractionConfig::default(),
            Arc::new(Gazetteer::builtin()),
        )
        .unwrap();
        extractor.extract(&normalizer.normalize(Some(text), tokens))
    }

    fn extract(text: &str) -> Listing {
        extract_with(text, &RawTokens::default())
    }

    #[test]
    fn test_spaced_dash_in_district_name() {
        let listing = extract("Сдаю квартиру, Мирзо - Улугбек, 500$");
        assert_eq!(listing.district_id, Some(1));
        assert_eq!(listing.district_raw.as_deref(), Some("Мирзо - Улугбек"));
    }

    #[test]
    fn test_short_alias_with_dash() {
        let listing = extract("Сдаю квартиру Ц-1, 400$");
        assert_eq!(listing.district_id, Some(1));
        assert_eq!(listing.district_raw.as_deref(), Some("Ц-1"));
        assert_eq!(listing.latitude, Some(41.3380));
    }

    #[test]
    fn test_district_from_entity_hashtag() {
        let tokens = RawTokens {
            hashtags: vec!["#Yunusabad".into()],
            ..RawTokens::default()
        };
        let listing = extract_with("Сдаю квартиру 500$", &tokens);
        assert_eq!(listing.district_id, Some(2));
    }

    #[test]
    fn test_unknown_district_is_kept_raw() {
        let listing = extract("Сдаю квартиру, район: Бостанлык, 300$");
        assert_eq!(listing.district_id, None);
        assert_eq!(listing.district_raw.as_deref(), Some("Бостанлык"));
        assert!(listing.review_notes.iter().any(|n| n == "district_unmatched"));
        assert!(listing.needs_review);
    }

    #[test]
    fn test_metro_station_sets_coordinates() {
        let listing = extract("Сдаю квартиру, м. Ойбек, 500$");
        assert_eq!(listing.metro_id, Some(2));
        assert_eq!(listing.metro_raw.as_deref(), Some("Ойбек"));
        assert_eq!(listing.latitude, Some(41.2963));
        assert_eq!(listing.longitude, Some(69.2805));
    }

    #[test]
    fn test_unknown_metro_after_label() {
        let listing = extract("Сдаю квартиру возле метро Беруни");
        assert_eq!(listing.metro_id, None);
        assert_eq!(listing.metro_raw.as_deref(), Some("Беруни"));

        let listing = extract("Сдаю квартиру, метро рядом");
        assert_eq!(listing.metro_raw, None);
    }

    #[test]
    fn test_complex_and_landmark() {
        let listing = extract("Продаю квартиру, ЖК Akay City, ориентир: Мега Планет");
        assert_eq!(listing.address_raw.as_deref(), Some("ЖК Akay City"));
        assert_eq!(listing.landmark.as_deref(), Some("Мега Планет"));
    }

    #[test]
    fn test_street_address_and_known_landmark() {
        let listing = extract("Сдаю квартиру, 9 квартал, Чиланзар, рядом IT Park");
        assert_eq!(listing.address_raw.as_deref(), Some("9 квартал"));
        assert_eq!(listing.district_id, Some(3));
        assert_eq!(listing.landmark.as_deref(), Some("IT Park"));
    }
}
