use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// City
// ---------------------------------------------------------------------------

/// Markets the platform lists events for.
pub const DEFAULT_SUPPORTED_CITIES: &[&str] = &[
    "Mumbai",
    "Delhi",
    "Bangalore",
    "Hyderabad",
    "Chennai",
    "Pune",
    "Kolkata",
    "Ahmedabad",
    "Jaipur",
    "Kochi",
];

/// Canonical city name. Only constructed through [`CitySet::resolve`] (or
/// [`City::new_unchecked`] in tests and backends that already validated it).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct City(String);

impl City {
    pub fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase, filesystem-safe form used for per-city file names.
    pub fn slug(&self) -> String {
        self.0
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    }
}

impl std::fmt::Display for City {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The fixed set of cities a deployment tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitySet {
    cities: Vec<City>,
}

impl CitySet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut cities: Vec<City> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if !cities.iter().any(|c| c.0.eq_ignore_ascii_case(name)) {
                cities.push(City(name.to_string()));
            }
        }
        Self { cities }
    }

    /// Case-insensitive lookup returning the canonical spelling.
    pub fn resolve(&self, name: &str) -> Option<City> {
        let name = name.trim();
        self.cities
            .iter()
            .find(|c| c.0.eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn contains(&self, city: &City) -> bool {
        self.resolve(city.as_str()).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &City> {
        self.cities.iter()
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }
}

impl Default for CitySet {
    fn default() -> Self {
        Self::new(DEFAULT_SUPPORTED_CITIES)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventStatus {
    /// Newly discovered or reconfirmed.
    Active,
    /// Re-discovered with a changed tracked field.
    Updated,
    /// Date has passed, or missing from fetches past the grace period.
    Expired,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Updated => "Updated",
            Self::Expired => "Expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "updated" => Some(Self::Updated),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A candidate exactly as a source adapter scraped it. Every field is
/// optional; [`crate::normalize::normalize`] decides what is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawEvent {
    pub name: Option<String>,
    pub date: Option<String>,
    pub venue: Option<String>,
    pub city: Option<String>,
    pub category: Option<String>,
    pub url: Option<String>,
}

/// One tracked event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Short hash of the identity key, shown in spreadsheets.
    pub event_id: String,
    pub name: String,
    /// `None` when the scraped date text could not be parsed.
    pub date_time: Option<DateTime<Utc>>,
    /// Date text as scraped.
    pub raw_date: String,
    pub date_unparsed: bool,
    pub venue: String,
    pub city: City,
    pub category: String,
    pub source_url: String,
    pub status: EventStatus,
    pub last_updated: DateTime<Utc>,
    /// Platform constant, e.g. `District`.
    pub source: String,
    /// Consecutive cycles this record was absent from a fetch.
    #[serde(default)]
    pub missed_cycles: u32,
}

impl EventRecord {
    /// True if `date_time` is known and strictly before `reference`.
    pub fn is_past(&self, reference: DateTime<Utc>) -> bool {
        self.date_time.map(|dt| dt < reference).unwrap_or(false)
    }

    /// Fields whose change turns a re-discovered record into `Updated`.
    ///
    /// When both dates are unparsed the raw text stands in for the date.
    pub fn tracked_fields_differ(&self, other: &EventRecord) -> bool {
        let date_differs = match (self.date_time, other.date_time) {
            (None, None) => {
                crate::identity::collapse(&self.raw_date) != crate::identity::collapse(&other.raw_date)
            }
            (a, b) => a != b,
        };
        date_differs || self.venue != other.venue || self.category != other.category
    }
}

impl std::fmt::Display for EventRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.date_time {
            Some(dt) => write!(f, "{} - {} - {}", self.name, self.city, dt.to_rfc3339()),
            None => write!(f, "{} - {} - {}", self.name, self.city, self.raw_date),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_set_resolves_case_insensitively() {
        let set = CitySet::default();
        assert_eq!(set.resolve("  mumbai ").unwrap().as_str(), "Mumbai");
        assert_eq!(set.resolve("KOCHI").unwrap().as_str(), "Kochi");
        assert!(set.resolve("Springfield").is_none());
        assert_eq!(set.len(), 10);
    }

    #[test]
    fn city_set_drops_blank_and_duplicate_names() {
        let set = CitySet::new(["Pune", "", "pune", "Delhi"]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().next().unwrap().as_str(), "Pune");
    }

    #[test]
    fn city_slug_is_filesystem_safe() {
        assert_eq!(City::new_unchecked("New Delhi").slug(), "new_delhi");
    }

    #[test]
    fn status_parse_roundtrips_display() {
        for s in [EventStatus::Active, EventStatus::Updated, EventStatus::Expired] {
            assert_eq!(EventStatus::parse(&s.to_string()), Some(s));
        }
        assert_eq!(EventStatus::parse(" expired "), Some(EventStatus::Expired));
        assert_eq!(EventStatus::parse("gone"), None);
    }
}
