//! Date coercion for scraped event dates.
//!
//! Listing pages and JSON-LD blocks disagree on formats. Anything we can't
//! read yields `None`; callers keep the raw text and flag the record instead
//! of rejecting it.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// IST. Every default city is in it.
pub const DEFAULT_UTC_OFFSET: &str = "+05:30";

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d %B %Y %I:%M %p",
    "%d %B %Y %H:%M",
    "%B %d, %Y %I:%M %p",
    "%A, %d %B %Y %I:%M %p",
    "%A, %d %B %Y %H:%M",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d %B %Y",
    "%B %d, %Y",
    "%A, %d %B %Y",
    "%A %d %B %Y",
    "%d/%m/%Y",
];

/// Parse `±HH:MM` into a fixed offset.
pub fn parse_utc_offset(s: &str) -> Option<FixedOffset> {
    let s = s.trim();
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (h, m) = rest.split_once(':')?;
    if h.len() != 2 || m.len() != 2 {
        return None;
    }
    let hours: i32 = h.parse().ok()?;
    let minutes: i32 = m.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Coerce scraped date text into a UTC timestamp.
///
/// Values without an explicit offset are read in `local`. Date-only values
/// resolve to local midnight.
pub fn parse_event_date(text: &str, local: FixedOffset) -> Option<DateTime<Utc>> {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&text, fmt) {
            return from_local(naive, local);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&text, fmt) {
            return from_local(date.and_hms_opt(0, 0, 0)?, local);
        }
    }

    None
}

fn from_local(naive: NaiveDateTime, local: FixedOffset) -> Option<DateTime<Utc>> {
    local
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
