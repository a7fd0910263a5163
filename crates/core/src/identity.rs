//! Identity keys: the deterministic string that says "same logical event"
//! across runs.
//!
//! Two records are the same event iff `(source, source_url)` match, or, when
//! the URL is not stable, `(city, name, date, venue)` match after
//! normalization. Every record maps to exactly one key.

use sha2::{Digest, Sha256};
use url::Url;

use crate::model::EventRecord;

/// Prefix of keys derived from a stable URL.
pub const URL_KEY_PREFIX: &str = "url:";
/// Prefix of keys derived from the composite fields.
pub const COMPOSITE_KEY_PREFIX: &str = "evt:";

/// Lowercase, trim and collapse internal whitespace runs to one space.
pub fn collapse(s: &str) -> String {
    s.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonical URL form: lowercased, query/fragment and trailing `/` removed.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let cut = trimmed
        .find(|c| c == '?' || c == '#')
        .map(|i| &trimmed[..i])
        .unwrap_or(trimmed);
    cut.trim_end_matches('/').to_lowercase()
}

/// A URL identifies a single event unless it is an http(s) landing page
/// (empty path). Opaque identifiers that aren't URLs count as stable.
pub fn is_stable_url(raw: &str) -> bool {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return false;
    }
    match Url::parse(trimmed) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            let path = url.path().trim_matches('/');
            !path.is_empty()
        }
        _ => true,
    }
}

/// The identity key of a record.
pub fn identity_key(record: &EventRecord) -> String {
    if is_stable_url(&record.source_url) {
        format!(
            "{URL_KEY_PREFIX}{}|{}",
            collapse(&record.source),
            normalize_url(&record.source_url)
        )
    } else {
        let date = match record.date_time {
            Some(dt) => dt.to_rfc3339(),
            None => collapse(&record.raw_date),
        };
        format!(
            "{COMPOSITE_KEY_PREFIX}{}|{}|{}|{}",
            collapse(record.city.as_str()),
            collapse(&record.name),
            date,
            collapse(&record.venue)
        )
    }
}

/// Short display id: first 12 hex chars of SHA-256 over the identity key.
pub fn event_id(identity_key: &str) -> String {
    let digest = Sha256::digest(identity_key.as_bytes());
    digest
        .iter()
        .take(6)
        .map(|b| format!("{b:02x}"))
        .collect()
}
