//! Tabular layout shared by every file backend.
//!
//! Columns are matched by header name on load, so reordered or extra
//! columns (a user sorting the sheet, adding notes) are tolerated. Sheets
//! written by older versions lack the last four columns; defaults fill in.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};

use eventwatch_core::{event_id, identity_key, City, EventRecord, EventStatus, StorageError};

pub const COL_EVENT_ID: &str = "Event ID";
pub const COL_NAME: &str = "Event Name";
pub const COL_DATE: &str = "Date";
pub const COL_RAW_DATE: &str = "Raw Date";
pub const COL_VENUE: &str = "Venue";
pub const COL_CITY: &str = "City";
pub const COL_CATEGORY: &str = "Category";
pub const COL_URL: &str = "URL";
pub const COL_SOURCE: &str = "Source";
pub const COL_STATUS: &str = "Status";
pub const COL_LAST_UPDATED: &str = "Last Updated";
pub const COL_MISSED_CYCLES: &str = "Missed Cycles";
pub const COL_DATE_UNPARSED: &str = "Date Unparsed";

/// Header row, in write order.
pub const HEADERS: [&str; 13] = [
    COL_EVENT_ID,
    COL_NAME,
    COL_DATE,
    COL_RAW_DATE,
    COL_VENUE,
    COL_CITY,
    COL_CATEGORY,
    COL_URL,
    COL_SOURCE,
    COL_STATUS,
    COL_LAST_UPDATED,
    COL_MISSED_CYCLES,
    COL_DATE_UNPARSED,
];

/// Display widths for spreadsheet backends, parallel to [`HEADERS`].
pub const COLUMN_WIDTHS: [f64; 13] = [15.0, 30.0, 22.0, 22.0, 25.0, 15.0, 15.0, 50.0, 12.0, 10.0, 22.0, 8.0, 8.0];

/// Legacy `Last Updated` format written by the first generation of sheets.
const LEGACY_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// One cell of an encoded row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    pub fn to_text(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

/// Encode a record in [`HEADERS`] order.
pub fn encode(record: &EventRecord) -> [Cell; 13] {
    [
        Cell::Text(record.event_id.clone()),
        Cell::Text(record.name.clone()),
        Cell::Text(record.date_time.map(|d| d.to_rfc3339()).unwrap_or_default()),
        Cell::Text(record.raw_date.clone()),
        Cell::Text(record.venue.clone()),
        Cell::Text(record.city.as_str().to_string()),
        Cell::Text(record.category.clone()),
        Cell::Text(record.source_url.clone()),
        Cell::Text(record.source.clone()),
        Cell::Text(record.status.as_str().to_string()),
        Cell::Text(record.last_updated.to_rfc3339()),
        Cell::Number(record.missed_cycles as f64),
        Cell::Bool(record.date_unparsed),
    ]
}

/// Maps header names to column indices for one loaded table.
pub struct HeaderMap {
    index: HashMap<String, usize>,
}

impl HeaderMap {
    pub fn new<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let index = headers
            .into_iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_string(), i))
            .collect();
        Self { index }
    }

    /// Fail unless every column needed to rebuild a record is present.
    pub fn require_core_columns(&self, location: &str) -> Result<(), StorageError> {
        for col in [COL_NAME, COL_CITY, COL_URL, COL_STATUS, COL_LAST_UPDATED] {
            if !self.index.contains_key(col) {
                return Err(StorageError::Corrupt {
                    location: location.to_string(),
                    message: format!("missing column '{col}'"),
                });
            }
        }
        Ok(())
    }

    fn get<'r>(&self, row: &'r [String], col: &str) -> Option<&'r str> {
        self.index
            .get(col)
            .and_then(|&i| row.get(i))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

fn corrupt(location: &str, message: impl Into<String>) -> StorageError {
    StorageError::Corrupt {
        location: location.to_string(),
        message: message.into(),
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, LEGACY_TIMESTAMP)
                .ok()
                .map(|n| n.and_utc())
        })
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// True if every cell is blank (trailing rows some editors leave behind).
pub fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

/// Rebuild a record from one row of cell text.
///
/// `city` is the snapshot being loaded; a row for a different city means the
/// file is not what we think it is.
pub fn decode(headers: &HeaderMap, row: &[String], city: &City, location: &str) -> Result<EventRecord, StorageError> {
    let name = headers
        .get(row, COL_NAME)
        .ok_or_else(|| corrupt(location, "empty event name"))?;
    let source_url = headers
        .get(row, COL_URL)
        .ok_or_else(|| corrupt(location, "empty URL"))?;

    let row_city = headers
        .get(row, COL_CITY)
        .ok_or_else(|| corrupt(location, "empty city"))?;
    if !row_city.eq_ignore_ascii_case(city.as_str()) {
        return Err(corrupt(location, format!("row belongs to '{row_city}', expected '{city}'")));
    }

    let status_text = headers.get(row, COL_STATUS).unwrap_or_default();
    let status = EventStatus::parse(status_text)
        .ok_or_else(|| corrupt(location, format!("unknown status '{status_text}'")))?;

    let last_updated_text = headers.get(row, COL_LAST_UPDATED).unwrap_or_default();
    let last_updated = parse_timestamp(last_updated_text)
        .ok_or_else(|| corrupt(location, format!("bad timestamp '{last_updated_text}'")))?;

    // Legacy sheets kept scraped text in `Date`; keep it as raw date then.
    let date_text = headers.get(row, COL_DATE);
    let date_time = date_text.and_then(|s| DateTime::parse_from_rfc3339(s).ok()).map(|d| d.with_timezone(&Utc));
    let raw_date = headers
        .get(row, COL_RAW_DATE)
        .or(date_text)
        .unwrap_or("TBA")
        .to_string();

    let missed_cycles = match headers.get(row, COL_MISSED_CYCLES) {
        None => 0,
        Some(s) => s
            .parse::<f64>()
            .ok()
            .filter(|n| *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as u32)
            .ok_or_else(|| corrupt(location, format!("bad missed cycle count '{s}'")))?,
    };

    let date_unparsed = match headers.get(row, COL_DATE_UNPARSED) {
        None => date_time.is_none(),
        Some(s) => parse_flag(s).ok_or_else(|| corrupt(location, format!("bad flag '{s}'")))?,
    };

    let mut record = EventRecord {
        event_id: headers.get(row, COL_EVENT_ID).unwrap_or_default().to_string(),
        name: name.to_string(),
        date_time,
        raw_date,
        date_unparsed,
        venue: headers.get(row, COL_VENUE).unwrap_or("TBA").to_string(),
        city: city.clone(),
        category: headers.get(row, COL_CATEGORY).unwrap_or("General").to_string(),
        source_url: source_url.to_string(),
        status,
        last_updated,
        source: headers.get(row, COL_SOURCE).unwrap_or_default().to_string(),
        missed_cycles,
    };
    if record.event_id.is_empty() {
        record.event_id = event_id(&identity_key(&record));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> EventRecord {
        EventRecord {
            event_id: "0a1b2c3d4e5f".into(),
            name: "Jazz Night".into(),
            date_time: Some(Utc.with_ymd_and_hms(2026, 3, 1, 14, 0, 0).unwrap()),
            raw_date: "1 Mar 2026 7:30 PM".into(),
            date_unparsed: false,
            venue: "Blue Frog".into(),
            city: City::new_unchecked("Mumbai"),
            category: "Music".into(),
            source_url: "https://www.district.in/events/jazz-night".into(),
            status: EventStatus::Updated,
            last_updated: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            source: "District".into(),
            missed_cycles: 2,
        }
    }

    fn as_text(record: &EventRecord) -> Vec<String> {
        encode(record).iter().map(Cell::to_text).collect()
    }

    #[test]
    fn encoded_row_decodes_to_same_record() {
        let headers = HeaderMap::new(HEADERS);
        let city = City::new_unchecked("Mumbai");
        let decoded = decode(&headers, &as_text(&sample()), &city, "row 2").unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn legacy_layout_is_readable() {
        let headers = HeaderMap::new([
            "Event ID", "Event Name", "Date", "Venue", "City", "Category", "URL", "Source", "Status", "Last Updated",
        ]);
        let row: Vec<String> = [
            "", "Jazz Night", "Sat, 1 Mar", "Blue Frog", "Mumbai", "Music", "https://www.district.in/events/x",
            "District", "Active", "2026-01-02 03:04:05",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let city = City::new_unchecked("Mumbai");
        let r = decode(&headers, &row, &city, "row 2").unwrap();
        assert_eq!(r.raw_date, "Sat, 1 Mar");
        assert!(r.date_unparsed);
        assert_eq!(r.missed_cycles, 0);
        assert_eq!(r.event_id.len(), 12);
        assert_eq!(r.last_updated, Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap());
    }

    #[test]
    fn unknown_status_is_corrupt() {
        let mut row = as_text(&sample());
        row[9] = "Gone".into();
        let err = decode(&HeaderMap::new(HEADERS), &row, &City::new_unchecked("Mumbai"), "row 7").unwrap_err();
        assert!(err.to_string().contains("row 7"));
        assert!(err.to_string().contains("Gone"));
    }

    #[test]
    fn foreign_city_row_is_corrupt() {
        let err = decode(&HeaderMap::new(HEADERS), &as_text(&sample()), &City::new_unchecked("Pune"), "row 2");
        assert!(matches!(err, Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn missing_core_column_is_reported() {
        let headers = HeaderMap::new(["Event Name", "City"]);
        assert!(headers.require_core_columns("events.csv").is_err());
        assert!(HeaderMap::new(HEADERS).require_core_columns("events.csv").is_ok());
    }
}
