// src/utils/url.rs

//! URL normalization for links found in post text.

use url::Url;

/// Characters that commonly trail a link in prose but are not part of it.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', '(', '"', '\'', '»'];

/// Trim trailing punctuation from a link candidate.
pub fn trim_link(raw: &str) -> &str {
    raw.trim_end_matches(TRAILING_PUNCTUATION)
}

/// Normalize a link as written in an ad into an absolute URL.
///
/// Bare `www.` and `t.me/` links get an `https://` scheme. Returns `None`
/// when the result has no host.
///
/// # Examples
/// ```
/// use listing_dedup::utils::url::normalize_link;
///
/// assert_eq!(
///     normalize_link("t.me/arenda_tashkent").as_deref(),
///     Some("https://t.me/arenda_tashkent")
/// );
/// ```
pub fn normalize_link(raw: &str) -> Option<String> {
    let trimmed = trim_link(raw.trim());
    if trimmed.is_empty() {
        return None;
    }

    let candidate = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate).ok()?;
    url.host_str()?;
    Some(url.to_string())
}
