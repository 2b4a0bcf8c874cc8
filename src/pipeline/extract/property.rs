//! Keyword detectors: deal and object type, condition, amenities, rules,
//! tenants, contact and the cleaned description.

use super::patterns::Amenity;
use super::{Draft, Extractor, FieldResult, chars_after, fill, negated_before};
use crate::models::{DealType, ObjectType};

const WANTED_RENT: &[&str] = &[
    "сниму",
    "ищу квартиру",
    "ищу комнату",
    "ищу жилье",
    "нужна квартира",
    "ijaraga olaman",
];
const WANTED_BUY: &[&str] = &["куплю", "sotib olaman"];
const RENT_DAILY: &[&str] = &["посуточно", "сутки", "sutka", "kunlik"];
const SALE: &[&str] = &[
    "продам",
    "продаю",
    "продается",
    "продажа",
    "sotiladi",
    "sotaman",
];
const RENT_LONG: &[&str] = &["сдаю", "сдам", "сдается", "аренд", "ijara"];

pub(super) fn detect_deal_type(_ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    let text = draft.post.text.as_str();
    let tags = &draft.post.hashtags;
    let has = |words: &[&str]| {
        words
            .iter()
            .any(|w| text.contains(w) || tags.iter().any(|t| t.contains(w)))
    };

    let deal = if has(WANTED_RENT) {
        Some(DealType::WantedRent)
    } else if has(WANTED_BUY) {
        Some(DealType::WantedBuy)
    } else if has(RENT_DAILY) {
        Some(DealType::RentDaily)
    } else if has(SALE) {
        Some(DealType::Sale)
    } else if has(RENT_LONG) {
        Some(DealType::RentLong)
    } else {
        None
    };

    fill(&mut draft.listing.deal_type, deal);
    Ok(())
}

pub(super) fn detect_object_type(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    let text = draft.post.text.as_str();
    let p = &ex.patterns;

    let object = if p.studio.is_match(text) {
        Some(ObjectType::Studio)
    } else if p.room_word.is_match(text) && !p.numbered_rooms.is_match(text) {
        Some(ObjectType::Room)
    } else if p.house_strong.is_match(text) {
        Some(ObjectType::House)
    } else if p.flat.is_match(text) {
        Some(ObjectType::Flat)
    } else if p.house_word.is_match(text) {
        Some(ObjectType::House)
    } else if p.land.is_match(text) {
        Some(ObjectType::Land)
    } else if p.commercial.is_match(text) {
        Some(ObjectType::Commercial)
    } else if p.flat_fallback.is_match(text) || p.triple.is_match(&draft.numeric) {
        Some(ObjectType::Flat)
    } else {
        None
    };

    fill(&mut draft.listing.object_type, object);
    Ok(())
}

pub(super) fn detect_condition(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    let text = draft.post.text.as_str();
    let p = &ex.patterns;

    let labelled = p
        .condition_label
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| s.chars().count() > 2);

    let condition = labelled.or_else(|| {
        p.condition_words.find(text).map(|m| {
            let phrase = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
            if phrase.starts_with("евро") || phrase.starts_with("evro") {
                "евроремонт".to_string()
            } else {
                phrase
            }
        })
    });

    fill(&mut draft.listing.condition, condition);
    Ok(())
}

pub(super) fn detect_house_type(_ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    const KINDS: &[(&[&str], &str)] = &[
        (&["новостро", "novostroy", "yangi bino"], "новостройка"),
        (&["вторичн", "вторичк"], "вторичка"),
        (&["кирпич", "g'isht"], "кирпичный"),
        (&["панел"], "панельный"),
        (&["монолит"], "монолитный"),
    ];

    let text = draft.post.text.as_str();
    let house_type = KINDS
        .iter()
        .find(|(cues, _)| cues.iter().any(|c| text.contains(c)))
        .map(|(_, kind)| kind.to_string());

    fill(&mut draft.listing.house_type, house_type);
    Ok(())
}

pub(super) fn detect_amenities(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    let text = draft.post.text.as_str();

    for (amenity, pattern) in &ex.patterns.amenities {
        let mut mentioned = None;
        for m in pattern.find_iter(text) {
            let present = !negated_before(text, m.start());
            mentioned = Some(mentioned.unwrap_or(false) || present);
            if present {
                break;
            }
        }

        let a = &mut draft.listing.amenities;
        let slot = match amenity {
            Amenity::Furniture => &mut a.has_furniture,
            Amenity::Appliances => &mut a.has_appliances,
            Amenity::Internet => &mut a.has_internet,
            Amenity::Parking => &mut a.has_parking,
            Amenity::Conditioner => &mut a.has_conditioner,
            Amenity::WashingMachine => &mut a.has_washing_machine,
            Amenity::Refrigerator => &mut a.has_refrigerator,
            Amenity::Tv => &mut a.has_tv,
            Amenity::Balcony => &mut a.has_balcony,
        };
        fill(slot, mentioned);
    }
    Ok(())
}

pub(super) fn detect_rules(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    let text = draft.post.text.as_str();
    let p = &ex.patterns;

    let rule = |pattern: &regex::Regex| {
        pattern.find(text).map(|m| {
            let after = chars_after(text, m.end(), 20);
            let forbidden = ["нельзя", "запрещ", "не допуск", "не разреш", "mumkin emas"]
                .iter()
                .any(|w| after.contains(w));
            !(negated_before(text, m.start()) || forbidden)
        })
    };

    let pets = rule(&p.pets);
    let kids = rule(&p.kids);
    fill(&mut draft.listing.pets_allowed, pets);
    fill(&mut draft.listing.kids_allowed, kids);
    Ok(())
}

pub(super) fn detect_tenants(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    if !draft.listing.tenant_types.is_empty() {
        return Ok(());
    }
    let text = draft.post.text.as_str();
    let tags = &draft.post.hashtags;

    draft.listing.tenant_types = ex
        .patterns
        .tenants
        .iter()
        .filter(|(_, pattern)| pattern.is_match(text) || tags.iter().any(|t| pattern.is_match(t)))
        .map(|(tenant, _)| *tenant)
        .collect();
    Ok(())
}

pub(super) fn detect_contact(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    let post = draft.post;
    let text = post.text.as_str();
    let p = &ex.patterns;

    let phone = post.phones.first().cloned();
    let telegram = post.mentions.first().cloned().or_else(|| {
        post.links.iter().find_map(|link| {
            let rest = link.strip_prefix("https://t.me/")?;
            let name = rest.split(['/', '?']).next()?;
            let valid = name.len() >= 3
                && name != "joinchat"
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            valid.then(|| name.to_lowercase())
        })
    });

    let is_agent = if p.owner.is_match(text) {
        Some(false)
    } else if draft.listing.has_commission {
        Some(true)
    } else {
        p.agent
            .find(text)
            .map(|m| !negated_before(text, m.start()))
    };

    let listing = &mut draft.listing;
    fill(&mut listing.contact_phone, phone);
    fill(&mut listing.contact_tg, telegram);
    fill(&mut listing.is_agent, is_agent);
    Ok(())
}

/// Prose lines of the ad with tokens, emoji and `label: value` lines removed.
pub(super) fn detect_description(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    const TECHNICAL: &[&str] = &["комисс", "maklerskiy", "риелтор"];
    let p = &ex.patterns;

    let mut kept = Vec::new();
    for (display, folded) in draft.post.display.split('\n').zip(draft.post.text.split('\n')) {
        if TECHNICAL.iter().any(|w| folded.contains(w)) {
            continue;
        }

        let mut line = display.to_string();
        for pattern in &p.description_noise {
            line = pattern.replace_all(&line, " ").into_owned();
        }
        let line: String = line
            .chars()
            .filter(|c| {
                c.is_alphanumeric()
                    || c.is_whitespace()
                    || matches!(c, '.' | ',' | ':' | ';' | '!' | '?' | '(' | ')' | '-' | '\'' | '"' | '%' | '$' | '/' | '+' | '№')
            })
            .collect();
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");

        let meaningful = line.chars().count() >= 10
            && line.chars().any(char::is_alphabetic)
            && !p.label_line.is_match(&line);
        if meaningful {
            kept.push(line);
        }
    }

    let description = kept.join(" ");
    let description = (description.chars().count() >= 20).then_some(description);
    fill(&mut draft.listing.description_clean, description);
    Ok(())
}
