// District (district.in) scraper.
//
// The city listing page links to individual event pages; each event page
// carries a schema.org JSON-LD `Event` block. Falls back to the `<h1>` and
// `event:*` meta tags when the block is missing or incomplete.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;
use url::Url;

use eventwatch_core::{City, FetchError, RawEvent, SourceAdapter};

use crate::html::{collapse_whitespace, Patterns};
use crate::http::{ClientSettings, PageClient};
use crate::SourceError;

pub const SOURCE_NAME: &str = "District";

#[derive(Debug, Clone)]
pub struct DistrictSettings {
    pub client: ClientSettings,
    /// Cap on event pages visited per city.
    pub max_events: usize,
    /// Listing page per city name (matched case-insensitively).
    pub city_urls: HashMap<String, String>,
}

pub struct DistrictAdapter {
    client: PageClient,
    patterns: Patterns,
    max_events: usize,
    city_urls: HashMap<String, String>,
}

impl DistrictAdapter {
    pub fn new(settings: DistrictSettings) -> Result<Self, SourceError> {
        let patterns = Patterns::compile().map_err(|e| SourceError::Pattern(e.to_string()))?;
        let city_urls = settings
            .city_urls
            .into_iter()
            .map(|(city, url)| (city.trim().to_lowercase(), url))
            .collect();
        Ok(Self {
            client: PageClient::new(settings.client)?,
            patterns,
            max_events: settings.max_events,
            city_urls,
        })
    }

    fn listing_url(&self, city: &City) -> Option<&str> {
        self.city_urls
            .get(&city.as_str().trim().to_lowercase())
            .map(String::as_str)
    }

    /// Event page links on a listing page: absolute, query-free, unique,
    /// sorted, capped at `max_events`.
    pub fn extract_event_links(&self, listing_html: &str, base: &Url) -> Vec<String> {
        let mut links = BTreeSet::new();
        for href in self.patterns.hrefs(listing_html) {
            if !(href.contains("/events/") || href.contains("/event/")) || href.contains("/artist") {
                continue;
            }
            let Ok(mut url) = base.join(&href) else {
                continue;
            };
            if !matches!(url.scheme(), "http" | "https") {
                continue;
            }
            url.set_query(None);
            url.set_fragment(None);
            links.insert(url.to_string());
        }
        links.into_iter().take(self.max_events).collect()
    }

    /// Pull one event out of an event page. `None` only if the page yields
    /// nothing at all.
    pub fn parse_event_page(&self, html: &str, url: &str, city: &City) -> Option<RawEvent> {
        let mut event = RawEvent {
            url: Some(url.to_string()),
            city: Some(city.as_str().to_string()),
            ..Default::default()
        };

        if let Some(item) = self.patterns.ld_json_blocks(html).find_map(find_event_item) {
            apply_json_ld(&mut event, &item);
        }

        if event.name.is_none() {
            event.name = self.patterns.first_h1(html);
        }
        if event.date.is_none() {
            event.date = self.patterns.meta_content(html, "event:start_date");
        }
        if event.venue.is_none() {
            event.venue = self.patterns.meta_content(html, "event:location");
        }

        let found_anything = event.name.is_some() || event.date.is_some() || event.venue.is_some();
        found_anything.then_some(event)
    }
}

// ---------------------------------------------------------------------------
// JSON-LD
// ---------------------------------------------------------------------------

fn is_event_type(value: &Value) -> bool {
    let matches = |s: &str| s == "Event" || s.ends_with("Event");
    match value {
        Value::String(s) => matches(s),
        Value::Array(types) => types.iter().filter_map(Value::as_str).any(matches),
        _ => false,
    }
}

/// First `@type: Event` object in a JSON-LD block (top level, array, or
/// `@graph`).
fn find_event_item(block: &str) -> Option<Value> {
    let data: Value = serde_json::from_str(block).ok()?;
    let mut candidates: Vec<Value> = match data {
        Value::Array(items) => items,
        other => vec![other],
    };
    let mut i = 0;
    while i < candidates.len() {
        let nested = match candidates[i].get("@graph") {
            Some(Value::Array(graph)) => graph.clone(),
            _ => Vec::new(),
        };
        candidates.extend(nested);
        i += 1;
    }
    candidates
        .into_iter()
        .find(|item| item.get("@type").is_some_and(is_event_type))
}

fn text_of(value: Option<&Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => collapse_whitespace(s),
        Value::Array(items) => return items.iter().find_map(|v| text_of(Some(v))),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn apply_json_ld(event: &mut RawEvent, item: &Value) {
    event.name = text_of(item.get("name"));
    event.date = text_of(item.get("startDate"));
    event.category = text_of(item.get("eventType")).or_else(|| text_of(item.get("genre")));

    let location = match item.get("location") {
        Some(Value::Array(items)) => items.first(),
        other => other,
    };
    if let Some(location) = location.filter(|l| l.is_object()) {
        let venue = text_of(location.get("name"));
        let locality = location
            .get("address")
            .filter(|a| a.is_object())
            .and_then(|a| text_of(a.get("addressLocality")));
        event.venue = match (venue, locality) {
            (Some(v), Some(l)) => Some(format!("{v} - {l}")),
            (Some(v), None) => Some(v),
            (None, Some(l)) => Some(l),
            (None, None) => None,
        };
    }
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

impl SourceAdapter for DistrictAdapter {
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    fn fetch(&self, city: &City) -> Result<Vec<RawEvent>, FetchError> {
        let listing = self
            .listing_url(city)
            .ok_or_else(|| FetchError::permanent(format!("no listing URL configured for {city}")))?;
        let base = Url::parse(listing)
            .map_err(|e| FetchError::permanent(format!("bad listing URL '{listing}': {e}")))?;

        let html = self.client.get_text(listing)?;
        let links = self.extract_event_links(&html, &base);
        if links.is_empty() {
            log::warn!("{}: no event links found on {}", city, listing);
            return Ok(Vec::new());
        }
        log::info!("{}: visiting {} event pages", city, links.len());

        let mut events = Vec::new();
        let mut last_error = None;
        for link in &links {
            self.client.pace();
            match self.client.get_text(link) {
                Ok(page) => match self.parse_event_page(&page, link, city) {
                    Some(event) => events.push(event),
                    None => log::debug!("{}: nothing usable on {}", city, link),
                },
                Err(e) => {
                    log::warn!("{}: skipping {}: {}", city, link, e);
                    last_error = Some(e);
                }
            }
        }

        // Every page failing looks like an outage, not an empty city.
        if events.is_empty() {
            if let Some(e) = last_error {
                return Err(FetchError::transient(format!(
                    "all {} event pages failed, last: {}",
                    links.len(),
                    e.message
                )));
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn adapter(max_events: usize) -> DistrictAdapter {
        DistrictAdapter::new(DistrictSettings {
            client: ClientSettings {
                rate_limit_delay: Duration::ZERO,
                retry_base_delay: Duration::ZERO,
                ..Default::default()
            },
            max_events,
            city_urls: HashMap::from([("Mumbai".to_string(), "https://www.district.in/".to_string())]),
        })
        .unwrap()
    }

    fn base() -> Url {
        Url::parse("https://www.district.in/").unwrap()
    }

    #[test]
    fn links_are_filtered_absolutized_and_capped() {
        let html = r#"
            <a href="/events/zakir-khan-live?utm=home">Zakir</a>
            <a href="https://www.district.in/events/zakir-khan-live">dup</a>
            <a href="/event/food-fest#tickets">Food</a>
            <a href="/events/artist/arijit">artist</a>
            <a href="/movies/dune">movie</a>
            <a href="mailto:events/help">mail</a>
            <a href="/events/anuv-jain">Anuv</a>
        "#;

        let links = adapter(25).extract_event_links(html, &base());
        assert_eq!(
            links,
            vec![
                "https://www.district.in/event/food-fest",
                "https://www.district.in/events/anuv-jain",
                "https://www.district.in/events/zakir-khan-live",
            ]
        );

        assert_eq!(adapter(2).extract_event_links(html, &base()).len(), 2);
    }

    #[test]
    fn json_ld_event_is_preferred() {
        let html = r#"<html><head>
            <meta property="event:start_date" content="2030-01-01">
            <script type="application/ld+json">{"@type":"Organization","name":"District"}</script>
            <script type="application/ld+json">
            {"@context":"https://schema.org","@type":"MusicEvent","name":"Anuv Jain Live",
             "startDate":"2026-11-21T19:00:00+05:30","genre":["Music","Indie"],
             "location":{"@type":"Place","name":"Jio World Garden","address":{"addressLocality":"Mumbai"}}}
            </script></head><body><h1>Something Else</h1></body></html>"#;

        let city = City::new_unchecked("Mumbai");
        let e = adapter(25).parse_event_page(html, "https://www.district.in/events/anuv", &city).unwrap();
        assert_eq!(e.name.as_deref(), Some("Anuv Jain Live"));
        assert_eq!(e.date.as_deref(), Some("2026-11-21T19:00:00+05:30"));
        assert_eq!(e.venue.as_deref(), Some("Jio World Garden - Mumbai"));
        assert_eq!(e.category.as_deref(), Some("Music"));
        assert_eq!(e.city.as_deref(), Some("Mumbai"));
        assert_eq!(e.url.as_deref(), Some("https://www.district.in/events/anuv"));
    }

    #[test]
    fn graph_wrapped_event_is_found() {
        let block = r#"{"@graph":[{"@type":"WebPage"},{"@type":["Event"],"name":"Sunburn"}]}"#;
        let item = find_event_item(block).unwrap();
        assert_eq!(item["name"], "Sunburn");
    }

    #[test]
    fn falls_back_to_h1_and_meta() {
        let html = r#"<meta property="event:start_date" content="Sat, 14 Feb 2026">
            <meta property="event:location" content="Canvas Laugh Club">
            <script type="application/ld+json">not json</script>
            <h1>Valentine's Standup</h1>"#;
        let city = City::new_unchecked("Mumbai");
        let e = adapter(25).parse_event_page(html, "https://x/events/v", &city).unwrap();
        assert_eq!(e.name.as_deref(), Some("Valentine's Standup"));
        assert_eq!(e.date.as_deref(), Some("Sat, 14 Feb 2026"));
        assert_eq!(e.venue.as_deref(), Some("Canvas Laugh Club"));
        assert_eq!(e.category, None);
    }

    #[test]
    fn empty_page_yields_nothing() {
        let city = City::new_unchecked("Mumbai");
        assert!(adapter(25).parse_event_page("<html></html>", "https://x/events/v", &city).is_none());
    }

    #[test]
    fn unmapped_city_is_permanent() {
        let err = adapter(25).fetch(&City::new_unchecked("Kochi")).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn city_lookup_ignores_case() {
        assert!(adapter(25).listing_url(&City::new_unchecked("MUMBAI")).is_some());
    }
}
