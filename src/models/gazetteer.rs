//! District and metro reference data.
//!
//! Loaded once at startup into an immutable alias index. Aliases are matched
//! by word-start containment against folded post text, so inflected forms
//! ("Чиланзаре", "Юнусабадский") still resolve to their canonical entry.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::pipeline::normalize::fold_for_match;

/// A city district.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct District {
    pub id: u32,
    pub name_ru: String,
    #[serde(default)]
    pub name_uz: Option<String>,
    #[serde(default = "defaults::city")]
    pub city: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub center_lat: Option<f64>,
    #[serde(default)]
    pub center_lng: Option<f64>,
}

/// A metro station.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetroStation {
    pub id: u32,
    pub name_ru: String,
    #[serde(default)]
    pub name_uz: Option<String>,
    #[serde(default)]
    pub line_name: Option<String>,
    #[serde(default)]
    pub line_color: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// On-disk gazetteer layout (`[[districts]]`, `[[metro_stations]]`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GazetteerData {
    #[serde(default)]
    pub districts: Vec<District>,
    #[serde(default)]
    pub metro_stations: Vec<MetroStation>,
}

/// Location of an alias hit inside the searched text (byte offsets).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AliasMatch {
    pub id: u32,
    pub start: usize,
    /// End of the word containing the alias
    pub end: usize,
}

#[derive(Debug, Clone)]
struct AliasEntry {
    key: String,
    id: u32,
    char_len: usize,
    needs_end_boundary: bool,
}

/// Immutable lookup structure over districts and metro stations.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    districts: Vec<District>,
    metro_stations: Vec<MetroStation>,
    district_aliases: Vec<AliasEntry>,
    metro_aliases: Vec<AliasEntry>,
}

impl Gazetteer {
    /// Build the alias index.
    pub fn from_data(data: GazetteerData) -> Self {
        let district_aliases = build_aliases(
            data.districts
                .iter()
                .map(|d| (d.id, names(&d.name_ru, d.name_uz.as_deref(), &d.aliases))),
        );
        let metro_aliases = build_aliases(
            data.metro_stations
                .iter()
                .map(|m| (m.id, names(&m.name_ru, m.name_uz.as_deref(), &m.aliases))),
        );

        Self {
            districts: data.districts,
            metro_stations: data.metro_stations,
            district_aliases,
            metro_aliases,
        }
    }

    /// Load a gazetteer from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let data: GazetteerData = toml::from_str(&content)?;
        let gazetteer = Self::from_data(data);
        gazetteer.validate()?;
        Ok(gazetteer)
    }

    /// Built-in Tashkent gazetteer.
    pub fn builtin() -> Self {
        Self::from_data(GazetteerData {
            districts: defaults::districts(),
            metro_stations: defaults::metro_stations(),
        })
    }

    /// Validate ids and aliases.
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(AppError::GazetteerUnavailable(
                "no districts or metro stations defined".into(),
            ));
        }
        let mut ids = HashSet::new();
        for district in &self.districts {
            if !ids.insert(district.id) {
                return Err(AppError::validation(format!(
                    "duplicate district id {}",
                    district.id
                )));
            }
        }
        ids.clear();
        for station in &self.metro_stations {
            if !ids.insert(station.id) {
                return Err(AppError::validation(format!(
                    "duplicate metro id {}",
                    station.id
                )));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.districts.is_empty() && self.metro_stations.is_empty()
    }

    pub fn districts(&self) -> &[District] {
        &self.districts
    }

    pub fn metro_stations(&self) -> &[MetroStation] {
        &self.metro_stations
    }

    pub fn district(&self, id: u32) -> Option<&District> {
        self.districts.iter().find(|d| d.id == id)
    }

    pub fn metro(&self, id: u32) -> Option<&MetroStation> {
        self.metro_stations.iter().find(|m| m.id == id)
    }

    /// Find the best district alias in match-folded text.
    pub fn find_district(&self, text: &str) -> Option<AliasMatch> {
        find_best(&self.district_aliases, text)
    }

    /// Find the best metro alias in match-folded text.
    pub fn find_metro(&self, text: &str) -> Option<AliasMatch> {
        find_best(&self.metro_aliases, text)
    }
}

fn names<'a>(name_ru: &'a str, name_uz: Option<&'a str>, aliases: &'a [String]) -> Vec<&'a str> {
    let mut all = vec![name_ru];
    all.extend(name_uz);
    all.extend(aliases.iter().map(String::as_str));
    all
}

fn build_aliases<'a>(entries: impl Iterator<Item = (u32, Vec<&'a str>)>) -> Vec<AliasEntry> {
    let mut seen = HashSet::new();
    let mut aliases = Vec::new();
    for (id, names) in entries {
        for name in names {
            let key = fold_for_match(name);
            if key.is_empty() || !seen.insert((key.clone(), id)) {
                continue;
            }
            let char_len = key.chars().count();
            let needs_end_boundary =
                char_len <= 4 || key.chars().last().is_some_and(|c| c.is_ascii_digit());
            aliases.push(AliasEntry {
                key,
                id,
                char_len,
                needs_end_boundary,
            });
        }
    }
    aliases
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '\''
}

/// Longest alias wins; ties go to the earliest position. Whitespace runs in
/// `text` match the single spaces of alias keys; offsets refer to `text`.
fn find_best(aliases: &[AliasEntry], text: &str) -> Option<AliasMatch> {
    let (text, origin) = squeeze_whitespace(text);
    let mut best: Option<(usize, usize, AliasMatch)> = None;

    for alias in aliases {
        for (start, _) in text.match_indices(alias.key.as_str()) {
            let starts_word = text[..start]
                .chars()
                .next_back()
                .is_none_or(|c| !is_word_char(c));
            if !starts_word {
                continue;
            }

            let alias_end = start + alias.key.len();
            let rest = &text[alias_end..];
            if alias.needs_end_boundary && rest.chars().next().is_some_and(is_word_char) {
                continue;
            }
            let word_end = alias_end
                + rest
                    .char_indices()
                    .find(|(_, c)| !is_word_char(*c))
                    .map(|(i, _)| i)
                    .unwrap_or(rest.len());

            let hit = AliasMatch {
                id: alias.id,
                start: origin[start],
                end: origin[word_end],
            };
            let better = match &best {
                None => true,
                Some((len, pos, _)) => alias.char_len > *len || (alias.char_len == *len && start < *pos),
            };
            if better {
                best = Some((alias.char_len, start, hit));
            }
            break;
        }
    }

    best.map(|(_, _, hit)| hit)
}

/// Copy of `text` with every whitespace run replaced by one space, plus the
/// `text` offset of each byte of the copy (and one past the end).
fn squeeze_whitespace(text: &str) -> (String, Vec<usize>) {
    let mut squeezed = String::with_capacity(text.len());
    let mut origin = Vec::with_capacity(text.len() + 1);
    let mut in_space = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if !in_space {
                squeezed.push(' ');
                origin.push(i);
            }
            in_space = true;
            continue;
        }
        in_space = false;
        squeezed.push(c);
        origin.extend(i..i + c.len_utf8());
    }
    origin.push(text.len());
    (squeezed, origin)
}

mod defaults {
    use super::{District, MetroStation};

    pub fn city() -> String {
        "Ташкент".into()
    }

    fn district(
        id: u32,
        name_ru: &str,
        name_uz: &str,
        aliases: &[&str],
        center: (f64, f64),
    ) -> District {
        District {
            id,
            name_ru: name_ru.into(),
            name_uz: Some(name_uz.into()),
            city: city(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            center_lat: Some(center.0),
            center_lng: Some(center.1),
        }
    }

    fn station(
        id: u32,
        name_ru: &str,
        name_uz: &str,
        line: &str,
        aliases: &[&str],
        coords: (f64, f64),
    ) -> MetroStation {
        MetroStation {
            id,
            name_ru: name_ru.into(),
            name_uz: Some(name_uz.into()),
            line_name: Some(line.into()),
            line_color: None,
            latitude: Some(coords.0),
            longitude: Some(coords.1),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn districts() -> Vec<District> {
        vec![
            district(
                1,
                "Мирзо-Улугбекский",
                "Mirzo Ulug'bek",
                &["мирзо улугбек", "мирзоулугбек", "mirzo ulugbek", "ц-1", "ц-4", "ц-5"],
                (41.3380, 69.3347),
            ),
            district(
                2,
                "Юнусабадский",
                "Yunusobod",
                &["юнусабад", "юнус абад", "yunusabad"],
                (41.3640, 69.2870),
            ),
            district(
                3,
                "Чиланзарский",
                "Chilonzor",
                &["чиланзар", "чилонзор", "chilanzar"],
                (41.2760, 69.2050),
            ),
            district(
                4,
                "Мирабадский",
                "Mirobod",
                &["мирабад", "миробод", "mirabad"],
                (41.2900, 69.2800),
            ),
            district(
                5,
                "Яккасарайский",
                "Yakkasaroy",
                &["яккасарай", "яккасарой", "yakkasaray"],
                (41.2850, 69.2550),
            ),
            district(
                6,
                "Сергелийский",
                "Sergeli",
                &["сергели"],
                (41.2270, 69.2200),
            ),
            district(
                7,
                "Шайхантахурский",
                "Shayxontohur",
                &["шайхантахур", "шайхонтохур", "шайхонтогур", "shayxontoxur"],
                (41.3250, 69.2300),
            ),
            district(
                8,
                "Алмазарский",
                "Olmazor",
                &["алмазар", "олмазор", "almazar", "olmazar"],
                (41.3450, 69.2100),
            ),
            district(
                9,
                "Бектемирский",
                "Bektemir",
                &["бектемир"],
                (41.2300, 69.3350),
            ),
            district(
                10,
                "Яшнабадский",
                "Yashnobod",
                &["яшнабад", "яшнобод", "yashnabad"],
                (41.2950, 69.3300),
            ),
            district(
                11,
                "Учтепинский",
                "Uchtepa",
                &["учтепа", "учтепе"],
                (41.2950, 69.1750),
            ),
            district(
                12,
                "Янгихаётский",
                "Yangihayot",
                &["янгихает", "янгихаёт"],
                (41.2000, 69.2100),
            ),
        ]
    }

    pub fn metro_stations() -> Vec<MetroStation> {
        vec![
            station(1, "Минор", "Minor", "Юнусабадская", &[], (41.3336, 69.2866)),
            station(2, "Ойбек", "Oybek", "Узбекистанская", &[], (41.2963, 69.2805)),
            station(
                3,
                "Пушкинская",
                "Pushkin",
                "Чиланзарская",
                &["пушкин"],
                (41.3260, 69.3230),
            ),
            station(
                4,
                "Космонавтлар",
                "Kosmonavtlar",
                "Узбекистанская",
                &["космонавтов", "космонавт"],
                (41.3040, 69.2770),
            ),
            station(
                5,
                "Хамида Олимжона",
                "Hamid Olimjon",
                "Чиланзарская",
                &["хамид олимжон", "хамида олимджана"],
                (41.3168, 69.3153),
            ),
            station(
                6,
                "Буюк Ипак Йўли",
                "Buyuk Ipak Yo'li",
                "Чиланзарская",
                &["буюк ипак йули", "буюк ипак йули"],
                (41.3262, 69.3336),
            ),
            station(
                7,
                "Миллий Боғ",
                "Milliy Bog'",
                "Чиланзарская",
                &["милий бог", "миллий бог", "milliy bog"],
                (41.3036, 69.2391),
            ),
            station(8, "Тузел", "Tuzel", "Сергелийская", &["тузель"], (41.2690, 69.3290)),
            station(9, "Сергели", "Sergeli", "Сергелийская", &[], (41.2270, 69.2180)),
            station(10, "Чкалов", "Chkalov", "Узбекистанская", &[], (41.2820, 69.3160)),
            station(
                11,
                "Чиланзар",
                "Chilonzor",
                "Чиланзарская",
                &["чилонзор"],
                (41.2754, 69.2040),
            ),
            station(12, "Новза", "Novza", "Чиланзарская", &[], (41.2929, 69.2240)),
            station(
                13,
                "Юнус Раджаби",
                "Yunus Rajabiy",
                "Юнусабадская",
                &["юнус ражабий", "юнус раджабий"],
                (41.3216, 69.2850),
            ),
            station(
                14,
                "Шахристан",
                "Shahriston",
                "Юнусабадская",
                &["шахристон"],
                (41.3470, 69.2870),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_is_valid() {
        let gazetteer = Gazetteer::builtin();
        assert!(gazetteer.validate().is_ok());
        assert!(!gazetteer.is_empty());
        assert_eq!(gazetteer.district(3).unwrap().name_ru, "Чиланзарский");
    }

    #[test]
    fn test_find_district_by_alias() {
        let gazetteer = Gazetteer::builtin();
        let text = "сдаю квартиру, чиланзар, 400$";
        let hit = gazetteer.find_district(text).unwrap();
        assert_eq!(hit.id, 3);
        assert_eq!(&text[hit.start..hit.end], "чиланзар");
    }

    #[test]
    fn test_find_district_extends_inflected_word() {
        let gazetteer = Gazetteer::builtin();
        let text = "квартира в юнусабадском районе";
        let hit = gazetteer.find_district(text).unwrap();
        assert_eq!(hit.id, 2);
        assert_eq!(&text[hit.start..hit.end], "юнусабадском");
    }

    #[test]
    fn test_find_district_prefers_longest_alias() {
        let gazetteer = Gazetteer::builtin();
        let text = "мирзо улугбекский район";
        let hit = gazetteer.find_district(text).unwrap();
        assert_eq!(hit.id, 1);
        assert_eq!(&text[hit.start..hit.end], "мирзо улугбекский");
    }

    #[test]
    fn test_alias_matches_across_whitespace_runs() {
        let gazetteer = Gazetteer::builtin();
        let text = "квартира, мирзо   улугбек, 500$";
        let hit = gazetteer.find_district(text).unwrap();
        assert_eq!(hit.id, 1);
        assert_eq!(&text[hit.start..hit.end], "мирзо   улугбек");

        let (squeezed, origin) = squeeze_whitespace("а \n б");
        assert_eq!(squeezed, "а б");
        assert_eq!(origin, vec![0, 1, 2, 5, 6, 7]);
    }

    #[test]
    fn test_alias_requires_word_start() {
        let gazetteer = Gazetteer::builtin();
        assert!(gazetteer.find_district("каламиробод").is_none());
    }

    #[test]
    fn test_empty_gazetteer_is_unavailable() {
        let gazetteer = Gazetteer::from_data(GazetteerData::default());
        assert!(matches!(
            gazetteer.validate(),
            Err(AppError::GazetteerUnavailable(_))
        ));
    }

    #[test]
    fn test_load_from_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("gazetteer.toml");
        std::fs::write(
            &path,
            r#"
[[districts]]
id = 1
name_ru = "Центральный"
aliases = ["центр"]

[[metro_stations]]
id = 5
name_ru = "Площадь"
"#,
        )
        .unwrap();

        let gazetteer = Gazetteer::load(&path).unwrap();
        assert_eq!(gazetteer.districts()[0].city, "Ташкент");
        assert_eq!(gazetteer.find_district("район центр").unwrap().id, 1);
        assert_eq!(gazetteer.find_metro("метро площадь").unwrap().id, 5);
    }
}
