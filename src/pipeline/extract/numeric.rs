//! Numeric detectors: room/floor triple, rooms, floors, area, price,
//! deposit and commission. They read the masked text, so digits inside
//! phones and links never look like prices.

use regex::Captures;

use super::{Draft, Extractor, FieldError, FieldResult, chars_after, chars_before, fill};
use crate::models::{Currency, DealType, PricePeriod};

const MAX_ROOMS: u8 = 10;
const MAX_FLOOR: u8 = 50;

pub(super) fn detect_triple(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    for caps in ex.patterns.triple.captures_iter(&draft.numeric) {
        let rooms = small_number("triple", &caps[1])?;
        let floor = small_number("triple", &caps[2])?;
        let total = small_number("triple", &caps[3])?;
        let valid = (1..=MAX_ROOMS).contains(&rooms)
            && (1..=MAX_FLOOR).contains(&floor)
            && (1..=MAX_FLOOR).contains(&total)
            && floor <= total;
        if valid {
            let listing = &mut draft.listing;
            fill(&mut listing.rooms, Some(rooms));
            fill(&mut listing.floor, Some(floor));
            fill(&mut listing.total_floors, Some(total));
            break;
        }
    }
    Ok(())
}

pub(super) fn detect_rooms(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    let text = draft.numeric.as_str();
    let p = &ex.patterns;

    let mut explicit = None;
    for pattern in &p.rooms {
        if let Some(caps) = pattern.captures(text) {
            let rooms = small_number("rooms", &caps[1])?;
            if (1..=MAX_ROOMS).contains(&rooms) {
                explicit = Some(rooms);
                break;
            }
        }
    }
    if explicit.is_none() {
        explicit = p
            .rooms_words
            .captures(text)
            .and_then(|caps| word_rooms(&caps[1]));
    }
    if explicit.is_none() {
        explicit = p
            .rooms_slang
            .captures(text)
            .and_then(|caps| word_rooms(&caps[1]));
    }

    match (draft.listing.rooms, explicit) {
        (Some(known), Some(found)) if known != found => {
            draft.listing.review_notes.push("rooms_conflict".into());
        }
        _ => fill(&mut draft.listing.rooms, explicit),
    }
    Ok(())
}

fn word_rooms(word: &str) -> Option<u8> {
    let rooms = match word {
        w if w.starts_with("одн") => 1,
        w if w.starts_with("дв") => 2,
        w if w.starts_with("тре") => 3,
        w if w.starts_with("четыре") => 4,
        "пяти" => 5,
        "шести" => 6,
        "семи" => 7,
        _ => return None,
    };
    Some(rooms)
}

pub(super) fn detect_floors(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    let text = draft.numeric.as_str();
    let p = &ex.patterns;

    let mut floor = None;
    let mut total = None;

    if let Some(caps) = p.floor_label.captures(text) {
        floor = Some(small_number("floor", &caps[1])?);
        if let Some(m) = caps.get(2) {
            total = Some(small_number("total_floors", m.as_str())?);
        }
    }

    if total.is_none() {
        if let Some(caps) = p.total_label.captures(text) {
            total = Some(small_number("total_floors", &caps[1])?);
        }
    }

    // "3 этаже", "9-этажного": the word after the number decides which one it is
    for caps in p.floor_suffix.captures_iter(text) {
        let value = small_number("floor", &caps[1])?;
        let word = &caps[2];
        let is_total = word.starts_with("этажн")
            || word == "этажей"
            || word == "этажа"
            || word.starts_with("qavatli");
        if is_total {
            total.get_or_insert(value);
        } else {
            floor.get_or_insert(value);
        }
    }

    let floor = floor.filter(|f| (1..=MAX_FLOOR).contains(f));
    let total = total.filter(|t| (1..=MAX_FLOOR).contains(t));

    let listing = &mut draft.listing;
    fill(&mut listing.floor, floor);
    fill(&mut listing.total_floors, total);

    if let (Some(f), Some(t)) = (listing.floor, listing.total_floors) {
        if f > t {
            listing.review_notes.push("floor_above_total".into());
        }
    }
    Ok(())
}

pub(super) fn detect_area(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    let text = draft.numeric.as_str();
    let p = &ex.patterns;

    let mut area = None;
    for pattern in [&p.area_label, &p.area_unit] {
        if let Some(caps) = pattern.captures(text) {
            let value = decimal("area", &caps[1])?;
            if value > 5.0 && value <= 1000.0 {
                area = Some(value);
                break;
            }
        }
    }
    if area.is_none() {
        if let Some(caps) = p.area_sotki.captures(text) {
            let sotki = decimal("area", &caps[1])?;
            if sotki > 0.0 && sotki <= 100.0 {
                area = Some(sotki * 100.0);
            }
        }
    }

    fill(&mut draft.listing.area_m2, area);
    Ok(())
}

/// An amount read from text.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Money {
    value: u64,
    currency: Option<Currency>,
    start: usize,
    end: usize,
}

pub(super) fn detect_price(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    if draft.listing.price.is_some() {
        return Ok(());
    }
    let text = draft.numeric.as_str();
    let p = &ex.patterns;

    let mut found = None;
    for caps in p.price_labelled.captures_iter(text) {
        if let Some(money) = money(&caps)? {
            found = Some(money);
            break;
        }
    }

    if found.is_none() {
        for caps in p.price_range.captures_iter(text) {
            if let Some(money) = money(&caps)? {
                if !deposit_context(text, &money) {
                    found = Some(money);
                    break;
                }
            }
        }
    }

    if found.is_none() {
        let mut candidates = Vec::new();
        for pattern in [&p.price_after, &p.price_before] {
            for caps in pattern.captures_iter(text) {
                if let Some(money) = money(&caps)? {
                    if !deposit_context(text, &money) {
                        candidates.push(money);
                    }
                }
            }
        }
        found = candidates.into_iter().min_by_key(|m| m.start);
    }

    let Some(money) = found else {
        return Ok(());
    };

    let currency = money.currency.unwrap_or(if money.value > 50_000 {
        Currency::Uzs
    } else {
        Currency::Usd
    });
    if !plausible_price(money.value, currency) {
        return Err(FieldError::new(
            "price",
            format!("{} {:?} out of range", money.value, currency),
        ));
    }

    let listing = &mut draft.listing;
    listing.price = Some(money.value);
    fill(&mut listing.currency, Some(currency));
    fill(
        &mut listing.price_period,
        price_period(chars_after(text, money.end, 16), listing.deal_type),
    );
    Ok(())
}

fn plausible_price(value: u64, currency: Currency) -> bool {
    match currency {
        Currency::Usd | Currency::Eur => (10..=10_000_000).contains(&value),
        Currency::Uzs => (10_000..=1_000_000_000_000).contains(&value),
    }
}

/// Period written after the price, else implied by the deal type.
fn price_period(after: &str, deal: Option<DealType>) -> Option<PricePeriod> {
    const DAY: &[&str] = &["сут", "ноч", "день", "kun", "day"];
    const MONTH: &[&str] = &["мес", "oyiga", "/oy", "month"];

    if DAY.iter().any(|k| after.contains(k)) {
        return Some(PricePeriod::Day);
    }
    if MONTH.iter().any(|k| after.contains(k)) {
        return Some(PricePeriod::Month);
    }
    match deal? {
        DealType::RentDaily => Some(PricePeriod::Day),
        DealType::RentLong | DealType::WantedRent => Some(PricePeriod::Month),
        DealType::Sale | DealType::WantedBuy => None,
    }
}

/// Amounts right next to deposit or commission words are not the price.
fn deposit_context(text: &str, money: &Money) -> bool {
    const WORDS: &[&str] = &["депозит", "залог", "depozit", "комисс"];
    let before = chars_before(text, money.start, 16);
    let after = chars_after(text, money.end, 12);
    WORDS.iter().any(|w| before.contains(w) || after.contains(w))
}

/// Read `num`, `mult` and `cur` groups into an amount.
fn money(caps: &Captures<'_>) -> Result<Option<Money>, FieldError> {
    let Some(num) = caps.name("num") else {
        return Ok(None);
    };
    let base = amount("price", num.as_str())?;
    let multiplier = caps.name("mult").map(|m| multiplier(m.as_str())).unwrap_or(1.0);
    let value = base * multiplier;
    if !value.is_finite() || value > 1e13 {
        return Err(FieldError::new("price", format!("amount {} too large", value)));
    }
    let value = value.round() as u64;
    if value == 0 {
        return Ok(None);
    }

    let whole = caps.get(0).map(|m| m.range()).unwrap_or(num.range());
    Ok(Some(Money {
        value,
        currency: caps.name("cur").map(|c| currency(c.as_str())),
        start: num.start().min(whole.start),
        end: whole.end,
    }))
}

fn multiplier(word: &str) -> f64 {
    if word.starts_with("млн") || word.starts_with("милл") || word.starts_with("mln") || word.starts_with("mill") {
        1_000_000.0
    } else {
        1_000.0
    }
}

fn currency(marker: &str) -> Currency {
    let usd = ["$", "долл", "у.", "уе", "y.", "ye", "usd"];
    let eur = ["€", "евро", "eur"];
    if usd.iter().any(|m| marker.starts_with(m)) {
        Currency::Usd
    } else if eur.iter().any(|m| marker.starts_with(m)) {
        Currency::Eur
    } else {
        Currency::Uzs
    }
}

pub(super) fn detect_deposit(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    let text = draft.numeric.as_str();
    let p = &ex.patterns;

    if p.no_deposit.is_match(text) {
        draft.listing.no_deposit = true;
        return Ok(());
    }

    for pattern in [&p.deposit_plus, &p.deposit] {
        if let Some(caps) = pattern.captures(text) {
            if let Some(money) = money(&caps)? {
                if (10..=1_000_000_000).contains(&money.value) {
                    fill(&mut draft.listing.deposit, Some(money.value));
                    break;
                }
            }
        }
    }
    Ok(())
}

pub(super) fn detect_commission(ex: &Extractor, draft: &mut Draft<'_>) -> FieldResult {
    let text = draft.numeric.as_str();
    let p = &ex.patterns;

    if p.no_commission.is_match(text) {
        return Ok(());
    }
    let Some(keyword) = p.commission.find(text) else {
        return Ok(());
    };

    let listing = &mut draft.listing;
    listing.has_commission = true;

    let window = chars_after(text, keyword.start(), 40);
    if let Some(caps) = p.percent.captures(window) {
        let pct = small_number("commission_pct", &caps[1])?;
        if (1..=100).contains(&pct) {
            fill(&mut listing.commission_pct, Some(pct));
        }
    }
    Ok(())
}

fn small_number(field: &'static str, digits: &str) -> Result<u8, FieldError> {
    digits
        .parse::<u8>()
        .map_err(|e| FieldError::new(field, format!("{:?}: {}", digits, e)))
}

fn decimal(field: &'static str, raw: &str) -> Result<f64, FieldError> {
    raw.replace(',', ".")
        .parse::<f64>()
        .map_err(|e| FieldError::new(field, format!("{:?}: {}", raw, e)))
}

/// `1 200 000` and `1.200` are grouped integers; `1,5` and `2.5` are decimals.
fn amount(field: &'static str, raw: &str) -> Result<f64, FieldError> {
    let groups: Vec<&str> = raw.split([' ', '.', ',']).collect();
    let grouped = groups.len() > 1
        && groups[0].len() <= 3
        && groups[1..].iter().all(|g| g.len() == 3);
    if grouped {
        let digits: String = groups.concat();
        digits
            .parse::<u64>()
            .map(|v| v as f64)
            .map_err(|e| FieldError::new(field, format!("{:?}: {}", raw, e)))
    } else {
        decimal(field, raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionConfig, Gazetteer, Listing, RawTokens};
    use crate::pipeline::normalize::Normalizer;
    use std::sync::Arc;

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
    fn test_amount_parsing() {
        assert_eq!(amount("price", "1 200 000").unwrap(), 1_200_000.0);
        assert_eq!(amount("price", "1.200").unwrap(), 1200.0);
        assert_eq!(amount("price", "1,5").unwrap(), 1.5);
        assert_eq!(amount("price", "400").unwrap(), 400.0);
    }

    #[test]
    fn test_triple_fills_rooms_and_floors() {
        let listing = extract("Квартира 1/4/4, массив Ялангач, 350$");
        assert_eq!(listing.rooms, Some(1));
        assert_eq!(listing.floor, Some(4));
        assert_eq!(listing.total_floors, Some(4));
    }

    #[test]
    fn test_invalid_triple_is_ignored() {
        let listing = extract("Квартира 2/9/5 сдаю");
        assert_eq!(listing.floor, None);
    }

    #[test]
    fn test_labelled_floors() {
        let listing = extract("Сдаю квартиру. Комнат: 2\nЭтаж: 6\nЭтажей в доме: 13\nПлощадь: 55 м²");
        assert_eq!(listing.rooms, Some(2));
        assert_eq!(listing.floor, Some(6));
        assert_eq!(listing.total_floors, Some(13));
        assert_eq!(listing.area_m2, Some(55.0));
    }

    #[test]
    fn test_floor_above_total_is_noted() {
        let listing = extract("Сдаю квартиру, этаж 9 из 5");
        assert!(listing.review_notes.iter().any(|n| n == "floor_above_total"));
        assert!(listing.needs_review);
    }

    #[test]
    fn test_word_rooms_and_suffix_floor() {
        let listing = extract("Продаю двухкомнатную квартиру на 3 этаже 9-этажного дома");
        assert_eq!(listing.rooms, Some(2));
        assert_eq!(listing.floor, Some(3));
        assert_eq!(listing.total_floors, Some(9));
    }

    #[test]
    fn test_price_in_sum_with_million() {
        let listing = extract("Сдаю квартиру, цена 5,5 млн сум в месяц");
        assert_eq!(listing.price, Some(5_500_000));
        assert_eq!(listing.currency, Some(Currency::Uzs));
        assert_eq!(listing.price_period, Some(PricePeriod::Month));
    }

    #[test]
    fn test_large_bare_price_is_sum() {
        let listing = extract("Сдаю квартиру. Цена: 4 500 000");
        assert_eq!(listing.price, Some(4_500_000));
        assert_eq!(listing.currency, Some(Currency::Uzs));
    }

    #[test]
    fn test_sale_price_has_no_period() {
        let listing = extract("Продаю квартиру 65 000 у.е.");
        assert_eq!(listing.price, Some(65_000));
        assert_eq!(listing.currency, Some(Currency::Usd));
        assert_eq!(listing.price_period, None);
    }

    #[test]
    fn test_daily_price() {
        let listing = extract("Квартира посуточно 40$ за сутки");
        assert_eq!(listing.deal_type, Some(DealType::RentDaily));
        assert_eq!(listing.price, Some(40));
        assert_eq!(listing.price_period, Some(PricePeriod::Day));
    }

    #[test]
    fn test_price_and_deposit() {
        let listing = extract("Сдаю квартиру 350$+300$ Депозит");
        assert_eq!(listing.price, Some(350));
        assert_eq!(listing.deposit, Some(300));
        assert!(!listing.no_deposit);
    }

    #[test]
    fn test_phone_digits_are_not_price() {
        let listing = extract("Сдаю квартиру, тел +998 90 123 45 67, 500$");
        assert_eq!(listing.price, Some(500));
    }

    #[test]
    fn test_unspaced_sum_price_is_not_a_phone() {
        let listing = extract("Продаю 2 комнатную квартиру, Чиланзар, цена 500000000 сум");
        assert_eq!(listing.price, Some(500_000_000));
        assert_eq!(listing.currency, Some(Currency::Uzs));
        assert_eq!(listing.contact_phone, None);
    }

    #[test]
    fn test_no_deposit_and_commission() {
        let listing = extract("Сдаю квартиру без депозита, комиссия 50% от первого месяца");
        assert!(listing.no_deposit);
        assert_eq!(listing.deposit, None);
        assert!(listing.has_commission);
        assert_eq!(listing.commission_pct, Some(50));

        let listing = extract("Сдаю квартиру без комиссии");
        assert!(!listing.has_commission);
    }

    #[test]
    fn test_land_area_in_sotki() {
        let listing = extract("Продаю участок 6 соток");
        assert_eq!(listing.area_m2, Some(600.0));
    }
}
