//! Compiled field patterns.
//!
//! All patterns run against folded text (lowercase, `ё` folded to `е`,
//! harmonized dashes and apostrophes).

use regex::Regex;

use crate::error::Result;

/// Number as written in ads: `400`, `1 200 000`, `1.5`, `2,5`.
const NUM: &str = r"[0-9]{1,3}(?:[ .,][0-9]{3})+|[0-9]+(?:[.,][0-9]{1,2})?";

/// Optional magnitude word after a number.
const MULT: &str = r"(?P<mult>млн|миллион\p{L}*|mln|million|тыс\p{L}*\.?|ming|k\b)?";

/// Currency marker.
const CUR: &str = r"(?P<cur>\$|долл\p{L}*\.?|у\.\s?е\.?|уе\b|y\.\s?e\.?|ye\b|usd|сум\p{L}*|so'm|som\b|sum\b|uzs|€|евро|eur)";

/// Substring cues that a post is about real estate.
pub(super) const REAL_ESTATE_KEYWORDS: &[&str] = &[
    "квартир",
    "комнат",
    "аренд",
    "сдается",
    "сдаю",
    "сдам",
    "продаю",
    "продам",
    "продается",
    "этаж",
    "депозит",
    "комисс",
    "риелтор",
    "маклер",
    "посуточно",
    "новостройк",
    "коттедж",
    "участок",
    "соток",
    "xona",
    "ijara",
    "kvartira",
    "narx",
    "maklerskiy",
    "sotiladi",
];

pub(super) const REAL_ESTATE_HASHTAGS: &[&str] = &[
    "аренда",
    "квартира",
    "недвижимость",
    "rent",
    "ijara",
    "kvartira",
];

pub(super) const LANDMARKS: &[&str] = &[
    "it park",
    "ит парк",
    "мегапланет",
    "megaplanet",
    "hi-tech",
    "хай-тек",
    "ассалом сохил",
    "assalom sohil",
    "akay city",
    "акай сити",
    "imperial club",
    "империал клуб",
    "mirabad avenue",
    "prestige gardens",
    "солярис",
    "solaris",
];

pub struct Patterns {
    // Gate
    pub(super) triple: Regex,
    pub(super) dollar_price: Regex,

    // Object type
    pub(super) studio: Regex,
    pub(super) room_word: Regex,
    pub(super) numbered_rooms: Regex,
    pub(super) house_strong: Regex,
    pub(super) flat: Regex,
    pub(super) house_word: Regex,
    pub(super) land: Regex,
    pub(super) commercial: Regex,
    pub(super) flat_fallback: Regex,

    // Rooms
    pub(super) rooms: Vec<Regex>,
    pub(super) rooms_words: Regex,
    pub(super) rooms_slang: Regex,

    // Floors
    pub(super) floor_label: Regex,
    pub(super) floor_suffix: Regex,
    pub(super) total_label: Regex,

    // Area
    pub(super) area_label: Regex,
    pub(super) area_unit: Regex,
    pub(super) area_sotki: Regex,

    // Price
    pub(super) price_labelled: Regex,
    pub(super) price_range: Regex,
    pub(super) price_after: Regex,
    pub(super) price_before: Regex,

    // Deposit and commission
    pub(super) no_deposit: Regex,
    pub(super) deposit: Regex,
    pub(super) deposit_plus: Regex,
    pub(super) no_commission: Regex,
    pub(super) commission: Regex,
    pub(super) percent: Regex,

    // Location
    pub(super) district_label: Regex,
    pub(super) district_tumani: Regex,
    pub(super) metro_label: Regex,
    pub(super) metro_words: Regex,
    pub(super) address_label: Regex,
    pub(super) address_street: Regex,
    pub(super) complex: Regex,
    pub(super) landmark_label: Regex,

    // Property
    pub(super) condition_label: Regex,
    pub(super) condition_words: Regex,
    pub(super) amenities: Vec<(Amenity, Regex)>,
    pub(super) pets: Regex,
    pub(super) kids: Regex,
    pub(super) tenants: Vec<(crate::models::TenantType, Regex)>,

    // Contact
    pub(super) owner: Regex,
    pub(super) agent: Regex,

    // Description cleanup (case-insensitive, runs on display text)
    pub(super) description_noise: Vec<Regex>,
    pub(super) label_line: Regex,
}

/// Amenity flag a pattern sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Amenity {
    Furniture,
    Appliances,
    Internet,
    Parking,
    Conditioner,
    WashingMachine,
    Refrigerator,
    Tv,
    Balcony,
}

impl Patterns {
    pub fn new() -> Result<Self> {
        use crate::models::TenantType;

        Ok(Self {
            triple: Regex::new(
                r"(?:^|[^0-9/])([0-9]{1,2})\s*/\s*([0-9]{1,2})\s*/\s*([0-9]{1,2})(?:$|[^0-9/])",
            )?,
            dollar_price: Regex::new(r"[0-9]{2,4}\s*\$")?,

            studio: Regex::new(r"студи|studio")?,
            room_word: Regex::new(r"\bкомнат[уа]\b")?,
            numbered_rooms: Regex::new(r"[0-9]+\s*-?\s*(?:х\s*-?\s*)?комнат")?,
            house_strong: Regex::new(r"коттедж|котедж|частный\s+дом|hovli|особняк|таунхаус")?,
            flat: Regex::new(r"квартир|kvartira|xonadon")?,
            house_word: Regex::new(r"\bдом\b|\buy\b")?,
            land: Regex::new(r"участ(?:ок|ка)|сот(?:ок|ки)\b|yer\s+uchast")?,
            commercial: Regex::new(r"офис|коммерч|магазин|нежил|склад|помещени")?,
            flat_fallback: Regex::new(r"комнатн|xona")?,

            rooms: vec![
                Regex::new(r"([0-9]{1,2})\s*-?\s*(?:х|x|ти|и|ух|ех)?\s*-?\s*комнатн")?,
                Regex::new(r"(?:кол(?:-?во|\.)?\s*)?комнат[аы]?\s*[:\-]\s*([0-9]{1,2})")?,
                Regex::new(r"([0-9]{1,2})\s*комнат(?:ы|а)?\b")?,
                Regex::new(r"([0-9]{1,2})\s*-?\s*xona")?,
                Regex::new(r"xonalar?\s*(?:soni)?\s*[:\-]?\s*([0-9]{1,2})")?,
            ],
            rooms_words: Regex::new(
                r"(одно|одна|двух|трех|четырех|пяти|шести|семи)\s*-?\s*комнатн",
            )?,
            rooms_slang: Regex::new(r"\b(однушк|двушк|трешк|четырешк)")?,

            floor_label: Regex::new(
                r"(?:этаж|qavat)\s*[:\-]?\s*([0-9]{1,2})(?:\s*(?:/|из)\s*([0-9]{1,2}))?",
            )?,
            floor_suffix: Regex::new(
                r"([0-9]{1,2})[ ]*-?[ ]*(?:й|ой|ий|м|ом)?[ ]*(этаж\p{L}*|qavat\p{L}*)",
            )?,
            total_label: Regex::new(
                r"(?:этажност[ьи]|этажей\s*в\s*доме|этажей|qavatlar\s*soni)\s*[:\-]?\s*([0-9]{1,2})",
            )?,

            area_label: Regex::new(
                r"(?:площад\p{L}*|maydon\p{L}*)\s*(?:кв\.?\s*м\p{L}*\.?)?\s*[:\-]?\s*([0-9]+(?:[.,][0-9]+)?)",
            )?,
            area_unit: Regex::new(
                r"([0-9]+(?:[.,][0-9]+)?)\s*(?:кв\.?\s*м\p{L}*\.?|м2|м²|m2|m²|kv\.?\s*m\b)",
            )?,
            area_sotki: Regex::new(r"([0-9]+(?:[.,][0-9]+)?)\s*(?:сот(?:ок|ки|ка|ых)|sotix|sotka)")?,

            price_labelled: Regex::new(&format!(
                r"(?:цена|narx\p{{L}}*|стоимость|price|оплата)\s*[:\-]?\s*(?P<num>{NUM})\s*{MULT}\s*{CUR}?"
            ))?,
            price_range: Regex::new(&format!(
                r"(?P<num>{NUM})\s*(?:-|до)\s*(?:{NUM})\s*{MULT}\s*{CUR}"
            ))?,
            price_after: Regex::new(&format!(r"(?P<num>{NUM})\s*{MULT}\s*{CUR}"))?,
            price_before: Regex::new(&format!(r"(?P<cur>\$|usd)\s*(?P<num>{NUM})\s*{MULT}"))?,

            no_deposit: Regex::new(r"без\s+(?:депозит|залог)|depozitsiz")?,
            deposit: Regex::new(&format!(
                r"(?:депозит\p{{L}}*|залог\p{{L}}*|depozit\p{{L}}*)\s*[:\-]?\s*(?P<num>{NUM})\s*{MULT}\s*{CUR}?"
            ))?,
            deposit_plus: Regex::new(&format!(
                r"\+\s*(?P<num>{NUM})\s*{MULT}\s*{CUR}?\s*(?:депозит|залог|depozit)"
            ))?,
            no_commission: Regex::new(
                r"без\s+(?:маклер|комисс|посредник|риелтор)|bezmakler|не\s+для\s+риелтор",
            )?,
            commission: Regex::new(r"комисс|коммис|maklerskiy|маклерск|риелторск|услуги\s+риелтор")?,
            percent: Regex::new(r"([0-9]{1,3})\s*%")?,

            district_label: Regex::new(r"(?:район|tuman)\s*[:\-]\s*([\p{L}' \-]{3,40})")?,
            district_tumani: Regex::new(r"([\p{L}'\-]{3,30}(?:\s+[\p{L}'\-]{2,30})?)\s+tumani\b")?,
            metro_label: Regex::new(r"метро|metro|станци[яи]|\bм\.")?,
            metro_words: Regex::new(r"^\s*[:\-]?\s*([\p{L}' ]{3,30})")?,
            address_label: Regex::new(r"(?:адрес|manzil|address)\s*[:\-]?\s*([^\n]{3,80})")?,
            address_street: Regex::new(
                r"(?:^|[^\p{L}])((?:[0-9]{1,2}\s*-?\s*)?(?:ул\.|улица|массив|мкр\.?|квартал|kvartal|ko'chasi)[\p{L}\p{N}\-' ]{0,40})",
            )?,
            complex: Regex::new(r#"(?:^|[^\p{L}])(?:жк|jk)\s*"?([\p{L}\p{N}\-' ]{2,40})"#)?,
            landmark_label: Regex::new(
                r"(?:ориентир|ор-р|mo'ljal|мулжал)\s*[:\-]?\s*([^\n]{3,80})",
            )?,

            condition_label: Regex::new(r"состояние\s*[:\-]?\s*([\p{L} ]{3,30})")?,
            condition_words: Regex::new(
                r"евро\s*ремонт|evro\s*ta'?mir|(?:свеж|нов|хорош|капитальн|косметическ|дизайнерск)\p{L}*\s+ремонт|без\s+ремонта|требует\s+ремонта|коробка",
            )?,
            amenities: vec![
                (
                    Amenity::Furniture,
                    Regex::new(r"мебел|меблир|mebel|диван|кровать|divan")?,
                ),
                (Amenity::Appliances, Regex::new(r"техник|texnika")?),
                (Amenity::Internet, Regex::new(r"интернет|wi-?fi|internet")?),
                (Amenity::Parking, Regex::new(r"парковк|паркинг|parking|гараж")?),
                (
                    Amenity::Conditioner,
                    Regex::new(r"кондиц|сплит|konditsion|konditsoner")?,
                ),
                (
                    Amenity::WashingMachine,
                    Regex::new(r"стирал|стир\.?\s*маш|кирмошин|kirmoshina")?,
                ),
                (Amenity::Refrigerator, Regex::new(r"холодильник|muzlatgich")?),
                (
                    Amenity::Tv,
                    Regex::new(r"телевизор|televizor|\bтв\b|\btv\b")?,
                ),
                (Amenity::Balcony, Regex::new(r"балкон|лоджи|balkon")?),
            ],
            pets: Regex::new(r"животн|питомц|кошк|собак|hayvon")?,
            kids: Regex::new(r"\bдет(?:ей|ьми|и)\b|ребен|bolali")?,
            tenants: vec![
                (
                    TenantType::Family,
                    Regex::new(r"семь[яеи]|семейн|oila|загс")?,
                ),
                (TenantType::Girls, Regex::new(r"девушк|qizlar|qizga")?),
                (TenantType::Guys, Regex::new(r"парн(?:ям|и|ей)|bollar|yigitlar")?),
                (
                    TenantType::Single,
                    Regex::new(r"одиноч|один\s+человек|один\s+парень|одна\s+девушка")?,
                ),
            ],

            owner: Regex::new(
                r"собственник|хозяин|от\s+хозяина|egasi|без\s+посредник|bezmakler|без\s+маклер|без\s+комисс",
            )?,
            agent: Regex::new(r"риелтор|риэлтор|маклер|агентств|агент\b|makler|rieltor")?,

            description_noise: vec![
                Regex::new(r"#\S+")?,
                Regex::new(r"(?i)https?://\S+|www\.\S+|t\.me/\S+")?,
                Regex::new(r"@\S+")?,
                Regex::new(r"\+?998[0-9\s\-()]{9,}")?,
                Regex::new(r"\b[0-9]{2}[\s\-]?[0-9]{3}[\s\-]?[0-9]{2}[\s\-]?[0-9]{2}\b")?,
                Regex::new(r"(?i)\bid\s*[:\-]?\s*[0-9]+")?,
                Regex::new(r"[0-9]+\s*/\s*[0-9]+\s*/\s*[0-9]+")?,
            ],
            label_line: Regex::new(r"^[\p{L}\s.]+\s*[:\-]\s*[0-9]")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_compile() {
        let patterns = Patterns::new().unwrap();
        assert!(patterns.triple.is_match("квартира 2/5/9 чиланзар"));
        assert!(!patterns.triple.is_match("дата 12/05/2026"));
        assert!(patterns.price_after.is_match("400$/мес"));
        assert_eq!(patterns.amenities.len(), 9);
    }
}
