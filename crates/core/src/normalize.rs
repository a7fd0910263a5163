use chrono::{DateTime, FixedOffset, Utc};

use crate::dates::parse_event_date;
use crate::error::ValidationError;
use crate::identity::{event_id, identity_key};
use crate::model::{CitySet, EventRecord, EventStatus, RawEvent};

/// Placeholder the platform itself uses for unknown venue/date.
pub const PLACEHOLDER_TBA: &str = "TBA";
pub const DEFAULT_CATEGORY: &str = "General";

/// Everything `normalize` needs besides the raw record.
pub struct NormalizeContext<'a> {
    /// Platform constant stamped on every record.
    pub source: &'a str,
    pub cities: &'a CitySet,
    /// Offset for dates scraped without one.
    pub local_offset: FixedOffset,
    pub now: DateTime<Utc>,
}

/// A candidate rejected by [`normalize_batch`], with its position in the fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub index: usize,
    pub error: ValidationError,
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
}

/// Validate and coerce one raw candidate.
///
/// An unparseable date is not an error: `date_time` stays `None` and
/// `date_unparsed` is set.
pub fn normalize(raw: &RawEvent, ctx: &NormalizeContext<'_>) -> Result<EventRecord, ValidationError> {
    let name = clean(&raw.name).ok_or(ValidationError::MissingField("name"))?;
    let city_text = clean(&raw.city).ok_or(ValidationError::MissingField("city"))?;
    let source_url = raw
        .url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingField("source_url"))?
        .to_string();
    let city = ctx
        .cities
        .resolve(&city_text)
        .ok_or(ValidationError::UnsupportedCity(city_text))?;

    let raw_date = clean(&raw.date).unwrap_or_else(|| PLACEHOLDER_TBA.to_string());
    let date_time = parse_event_date(&raw_date, ctx.local_offset);

    let mut record = EventRecord {
        event_id: String::new(),
        name,
        date_time,
        date_unparsed: date_time.is_none(),
        raw_date,
        venue: clean(&raw.venue).unwrap_or_else(|| PLACEHOLDER_TBA.to_string()),
        city,
        category: clean(&raw.category).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        source_url,
        status: EventStatus::Active,
        last_updated: ctx.now,
        source: ctx.source.to_string(),
        missed_cycles: 0,
    };
    record.event_id = event_id(&identity_key(&record));
    Ok(record)
}

/// Normalize a whole fetch. Bad records are logged and returned separately.
pub fn normalize_batch(raws: &[RawEvent], ctx: &NormalizeContext<'_>) -> (Vec<EventRecord>, Vec<Rejected>) {
    let mut records = Vec::with_capacity(raws.len());
    let mut rejected = Vec::new();
    for (index, raw) in raws.iter().enumerate() {
        match normalize(raw, ctx) {
            Ok(record) => {
                if record.date_unparsed {
                    log::debug!("date unparsed for '{}': '{}'", record.name, record.raw_date);
                }
                records.push(record);
            }
            Err(error) => {
                log::warn!(
                    "skipping candidate #{index} from {} ({}): {error}",
                    ctx.source,
                    raw.url.as_deref().unwrap_or("<no url>")
                );
                rejected.push(Rejected { index, error });
            }
        }
    }
    (records, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::{parse_utc_offset, DEFAULT_UTC_OFFSET};
    use chrono::TimeZone;

    fn raw(name: &str, date: &str, url: &str) -> RawEvent {
        RawEvent {
            name: Some(name.into()),
            date: Some(date.into()),
            venue: Some("Blue Frog".into()),
            city: Some("mumbai".into()),
            category: Some("Music".into()),
            url: Some(url.into()),
        }
    }

    fn with_ctx<T>(f: impl FnOnce(&NormalizeContext<'_>) -> T) -> T {
        let cities = CitySet::default();
        let ctx = NormalizeContext {
            source: "District",
            cities: &cities,
            local_offset: parse_utc_offset(DEFAULT_UTC_OFFSET).unwrap(),
            now: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        };
        f(&ctx)
    }

    #[test]
    fn normalizes_valid_record() {
        let rec = with_ctx(|ctx| normalize(&raw("  Jazz   Night ", "2026-03-01 19:30", "e1"), ctx)).unwrap();
        assert_eq!(rec.name, "Jazz Night");
        assert_eq!(rec.city.as_str(), "Mumbai");
        assert_eq!(rec.status, EventStatus::Active);
        assert_eq!(rec.source, "District");
        assert!(!rec.date_unparsed);
        assert_eq!(rec.date_time, Some(Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap()));
        assert_eq!(rec.event_id.len(), 12);
    }

    #[test]
    fn unparseable_date_is_flagged_not_rejected() {
        let rec = with_ctx(|ctx| normalize(&raw("Jazz Night", "Coming soon", "e1"), ctx)).unwrap();
        assert!(rec.date_time.is_none());
        assert!(rec.date_unparsed);
        assert_eq!(rec.raw_date, "Coming soon");
    }

    #[test]
    fn missing_optional_fields_get_placeholders() {
        let r = RawEvent {
            name: Some("Standup".into()),
            city: Some("Pune".into()),
            url: Some("e9".into()),
            ..Default::default()
        };
        let rec = with_ctx(|ctx| normalize(&r, ctx)).unwrap();
        assert_eq!(rec.venue, PLACEHOLDER_TBA);
        assert_eq!(rec.category, DEFAULT_CATEGORY);
        assert_eq!(rec.raw_date, PLACEHOLDER_TBA);
        assert!(rec.date_unparsed);
    }

    #[test]
    fn required_fields_are_enforced() {
        let mut r = raw("Jazz Night", "2026-03-01", "e1");
        r.name = Some("   ".into());
        assert_eq!(with_ctx(|ctx| normalize(&r, ctx)), Err(ValidationError::MissingField("name")));

        let mut r = raw("Jazz Night", "2026-03-01", "e1");
        r.url = None;
        assert_eq!(with_ctx(|ctx| normalize(&r, ctx)), Err(ValidationError::MissingField("source_url")));

        let mut r = raw("Jazz Night", "2026-03-01", "e1");
        r.city = Some("Atlantis".into());
        assert_eq!(
            with_ctx(|ctx| normalize(&r, ctx)),
            Err(ValidationError::UnsupportedCity("Atlantis".into()))
        );
    }

    #[test]
    fn batch_keeps_good_records_and_reports_bad_ones() {
        let raws = vec![
            raw("A", "2026-03-01", "e1"),
            RawEvent::default(),
            raw("B", "TBA", "e2"),
        ];
        let (records, rejected) = with_ctx(|ctx| normalize_batch(&raws, ctx));
        assert_eq!(records.len(), 2);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].index, 1);
    }
}
