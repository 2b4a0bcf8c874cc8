//! Text normalization.
//!
//! Every textual comparison downstream (extraction, exact hashing,
//! fingerprinting) works on the folded text produced here. The normalizer
//! also pulls out the contact and reference tokens: phones, links, hashtags
//! and mentions.

use std::ops::Range;

use regex::Regex;

use crate::error::Result;
use crate::models::RawTokens;
use crate::utils::url::{normalize_link, trim_link};

/// Normalized form of a post's text.
///
/// `text` and `display` always have the same number of chars; `display`
/// keeps the original letter case so extracted raw values read naturally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedPost {
    /// Folded text: harmonized characters, collapsed whitespace, lowercase
    pub text: String,
    /// Same as `text` but case-preserved
    pub display: String,
    /// Phones in canonical `+<digits>` form, in order of appearance
    pub phones: Vec<String>,
    pub links: Vec<String>,
    /// Lowercased, without the leading `#`
    pub hashtags: Vec<String>,
    /// Lowercased, without the leading `@`
    pub mentions: Vec<String>,
    token_spans: Vec<Range<usize>>,
}

impl NormalizedPost {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Case-preserved slice for a byte range of `text`.
    pub fn display_span(&self, range: Range<usize>) -> Option<&str> {
        let start_char = self.text.get(..range.start)?.chars().count();
        let len = self.text.get(range)?.chars().count();

        let mut offsets = self
            .display
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(self.display.len()));
        let start = offsets.nth(start_char)?;
        let end = if len == 0 {
            start
        } else {
            offsets.nth(len - 1)?
        };
        self.display.get(start..end)
    }

    /// Folded text with phone and link spans blanked out.
    pub fn masked_text(&self) -> String {
        blank(&self.text, &self.token_spans)
    }

    /// Folded text with `-` and `_` turned into spaces, for alias lookups.
    /// Byte offsets match `text`.
    pub fn match_text(&self) -> String {
        self.text
            .chars()
            .map(|c| if c == '-' || c == '_' { ' ' } else { c })
            .collect()
    }
}

/// Compiled token patterns.
#[derive(Debug, Clone)]
pub struct Normalizer {
    link: Regex,
    phone_uz: Regex,
    phone_intl: Regex,
    phone_local: Regex,
    hashtag: Regex,
    mention: Regex,
}

impl Normalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            link: Regex::new(r#"(?:https?://|www\.|t\.me/)[^\s<>"]+"#)?,
            phone_uz: Regex::new(
                r"\+?998[\s\-().]*([0-9]{2})[\s\-().]*([0-9]{3})[\s\-().]*([0-9]{2})[\s\-().]*([0-9]{2})",
            )?,
            phone_intl: Regex::new(r"\+[0-9][0-9\s\-().]{8,20}[0-9]")?,
            phone_local: Regex::new(
                r"\(?(33|50|55|71|77|78|88|9[0-9]|20)\)?[\s\-.]*([0-9]{3})[\s\-.]*([0-9]{2})[\s\-.]*([0-9]{2})",
            )?,
            hashtag: Regex::new(r"#([\p{L}\p{N}_]+)")?,
            mention: Regex::new(r"(?:^|[^\p{L}\p{N}_@.])@([a-z0-9_]{3,32})")?,
        })
    }

    /// Normalize post text and merge crawler-supplied entity tokens.
    ///
    /// Blank text yields an empty result with no tokens.
    pub fn normalize(&self, text: Option<&str>, entities: &RawTokens) -> NormalizedPost {
        let (folded, display) = harmonize(text.unwrap_or_default());
        if folded.is_empty() {
            return NormalizedPost::default();
        }
        let folded = digitize_letter_o(&folded);

        let mut links = Vec::new();
        let mut link_spans = Vec::new();
        for m in self.link.find_iter(&folded) {
            let trimmed = trim_link(m.as_str());
            if let Some(url) = normalize_link(trimmed) {
                push_unique(&mut links, url);
            }
            link_spans.push(m.start()..m.start() + trimmed.len());
        }

        let without_links = blank(&folded, &link_spans);
        let found = self.find_phones(&without_links);

        let mut phones = Vec::new();
        let mut token_spans = link_spans;
        for (span, phone) in found {
            push_unique(&mut phones, phone);
            token_spans.push(span);
        }

        let mut hashtags = Vec::new();
        for caps in self.hashtag.captures_iter(&without_links) {
            if let Some(tag) = caps.get(1) {
                push_unique(&mut hashtags, tag.as_str().to_string());
            }
        }

        let mut mentions = Vec::new();
        for caps in self.mention.captures_iter(&without_links) {
            if let Some(name) = caps.get(1) {
                push_unique(&mut mentions, name.as_str().to_string());
            }
        }

        for link in &entities.links {
            if let Some(url) = normalize_link(link) {
                push_unique(&mut links, url);
            }
        }
        for tag in &entities.hashtags {
            let (tag, _) = harmonize(tag.trim().trim_start_matches('#'));
            push_unique(&mut hashtags, tag);
        }
        for name in &entities.mentions {
            push_unique(
                &mut mentions,
                name.trim().trim_start_matches('@').to_lowercase(),
            );
        }

        NormalizedPost {
            text: folded,
            display,
            phones,
            links,
            hashtags,
            mentions,
            token_spans,
        }
    }

    /// Phones with their byte spans, sorted by position.
    fn find_phones(&self, text: &str) -> Vec<(Range<usize>, String)> {
        let mut found = Vec::new();

        for caps in self.phone_uz.captures_iter(text) {
            let Some(m) = caps.get(0) else { continue };
            if !digit_bounded(text, m.range()) {
                continue;
            }
            found.push((m.range(), format!("+998{}", joined_groups(&caps))));
        }

        let text = blank(text, &spans(&found));
        for m in self.phone_intl.find_iter(&text) {
            if !digit_bounded(&text, m.range()) {
                continue;
            }
            let digits: String = m.as_str().chars().filter(char::is_ascii_digit).collect();
            if (10..=15).contains(&digits.len()) && !digits.starts_with("998") {
                found.push((m.range(), format!("+{}", digits)));
            }
        }

        let text = blank(&text, &spans(&found));
        for caps in self.phone_local.captures_iter(&text) {
            let Some(m) = caps.get(0) else { continue };
            if !digit_bounded(&text, m.range()) || price_context(&text, m.range()) {
                continue;
            }
            found.push((m.range(), format!("+998{}", joined_groups(&caps))));
        }

        found.sort_by_key(|(span, _)| span.start);
        found
    }
}

/// Fold text for alias keys: same folding as post text, with `-` and `_`
/// treated as spaces.
pub fn fold_for_match(text: &str) -> String {
    let (folded, _) = harmonize(text);
    folded
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Harmonize characters and collapse whitespace. Returns `(folded, display)`.
fn harmonize(raw: &str) -> (String, String) {
    let mut folded = String::with_capacity(raw.len());
    let mut display = String::with_capacity(raw.len());
    let mut pending: Option<char> = None;

    for c in raw.chars() {
        let Some(c) = harmonize_char(c) else { continue };
        if c.is_whitespace() {
            pending = match pending {
                Some('\n') => Some('\n'),
                _ if c == '\n' => Some('\n'),
                _ => Some(' '),
            };
            continue;
        }
        if let Some(ws) = pending.take() {
            if !display.is_empty() {
                folded.push(ws);
                display.push(ws);
            }
        }
        folded.push(fold_char(c));
        display.push(c);
    }

    (folded, display)
}

fn harmonize_char(c: char) -> Option<char> {
    match c {
        '\u{200B}'..='\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{FE0E}' | '\u{FE0F}' | '\u{00AD}' => {
            None
        }
        '\u{00A0}' | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}' => Some(' '),
        '\r' | '\u{2028}' | '\u{2029}' => Some('\n'),
        '\u{2010}'..='\u{2015}' | '\u{2212}' => Some('-'),
        '«' | '»' | '“' | '”' | '„' | '″' => Some('"'),
        '’' | '‘' | 'ʻ' | 'ʼ' | '`' | '´' | '′' => Some('\''),
        '…' => Some('.'),
        c if c.is_control() && !c.is_whitespace() => None,
        c => Some(c),
    }
}

fn fold_char(c: char) -> char {
    let lower = c.to_lowercase().next().unwrap_or(c);
    if lower == 'ё' { 'е' } else { lower }
}

/// Latin or Cyrillic `o` between two digits is a typed zero.
fn digitize_letter_o(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        let between_digits = i > 0
            && chars[i - 1].is_ascii_digit()
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit() || *n == 'o' || *n == 'о');
        if (c == 'o' || c == 'о') && between_digits {
            out.push('0');
        } else {
            out.push(c);
        }
    }
    out
}

/// Replace every char inside `ranges` with spaces, keeping byte offsets.
fn blank(text: &str, ranges: &[Range<usize>]) -> String {
    if ranges.is_empty() {
        return text.to_string();
    }
    text.char_indices()
        .flat_map(|(i, c)| {
            let masked = ranges.iter().any(|r| r.contains(&i));
            let (ch, n) = if masked { (' ', c.len_utf8()) } else { (c, 1) };
            std::iter::repeat_n(ch, n)
        })
        .collect()
}

fn spans(found: &[(Range<usize>, String)]) -> Vec<Range<usize>> {
    found.iter().map(|(span, _)| span.clone()).collect()
}

fn joined_groups(caps: &regex::Captures<'_>) -> String {
    (1..caps.len())
        .filter_map(|i| caps.get(i))
        .map(|g| g.as_str())
        .collect()
}

/// No digit (or `+`) directly before the match and no digit directly after.
fn digit_bounded(text: &str, range: Range<usize>) -> bool {
    let before_ok = text[..range.start]
        .chars()
        .next_back()
        .is_none_or(|c| !c.is_ascii_digit() && c != '+');
    let after_ok = text[range.end..]
        .chars()
        .next()
        .is_none_or(|c| !c.is_ascii_digit());
    before_ok && after_ok
}

const MONEY_AFTER: &[&str] = &[
    "сум", "сўм", "so'm", "som", "sum", "uzs", "$", "у.е", "уе", "y.e", "usd", "€", "евро",
    "eur", "млн", "mln", "тыс", "ming", "долл",
];
const PRICE_BEFORE: &[&str] = &["цена", "narxi", "narx", "стоимость", "price", "оплата"];

/// A bare local-format number directly followed by a currency or multiplier,
/// or directly preceded by a price label, is an amount.
fn price_context(text: &str, range: Range<usize>) -> bool {
    let after = text[range.end..].trim_start();
    if MONEY_AFTER.iter().any(|unit| after.starts_with(unit)) {
        return true;
    }
    let before = text[..range.start]
        .trim_end_matches(|c: char| c.is_whitespace() || ":-=".contains(c));
    PRICE_BEFORE.iter().any(|label| before.ends_with(label))
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}
