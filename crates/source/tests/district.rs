//! District adapter against a mock site: listing page, event pages, failures.

use std::collections::HashMap;
use std::time::Duration;

use httpmock::prelude::*;

use eventwatch_core::{City, SourceAdapter};
use eventwatch_source::{ClientSettings, DistrictAdapter, DistrictSettings};

fn adapter_for(server: &MockServer, max_events: usize) -> DistrictAdapter {
    DistrictAdapter::new(DistrictSettings {
        client: ClientSettings {
            request_timeout: Duration::from_secs(5),
            max_retries: 1,
            retry_base_delay: Duration::ZERO,
            rate_limit_delay: Duration::ZERO,
            ..Default::default()
        },
        max_events,
        city_urls: HashMap::from([("Mumbai".to_string(), server.url("/mumbai"))]),
    })
    .unwrap()
}

fn event_page(name: &str, date: &str, venue: &str) -> String {
    format!(
        r#"<html><head><script type="application/ld+json">
        {{"@type":"Event","name":"{name}","startDate":"{date}","eventType":"Comedy",
          "location":{{"name":"{venue}","address":{{"addressLocality":"Mumbai"}}}}}}
        </script></head><body><h1>{name}</h1></body></html>"#
    )
}

const LISTING: &str = r#"<html><body>
    <a href="/events/zakir-khan?src=home">Zakir Khan</a>
    <a href="/events/anuv-jain">Anuv Jain</a>
    <a href="/events/artist/someone">Artist page</a>
    <a href="/about">About</a>
</body></html>"#;

#[test]
fn scrapes_every_linked_event() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/mumbai");
        then.status(200).body(LISTING);
    });
    server.mock(|when, then| {
        when.method(GET).path("/events/zakir-khan");
        then.status(200).body(event_page("Zakir Khan Live", "2026-12-12T20:00:00+05:30", "NSCI Dome"));
    });
    server.mock(|when, then| {
        when.method(GET).path("/events/anuv-jain");
        then.status(200).body(event_page("Anuv Jain", "2026-12-20", "Jio World Garden"));
    });

    let events = adapter_for(&server, 25).fetch(&City::new_unchecked("Mumbai")).unwrap();

    assert_eq!(events.len(), 2);
    // Links are visited in sorted order.
    assert_eq!(events[0].name.as_deref(), Some("Anuv Jain"));
    assert_eq!(events[1].name.as_deref(), Some("Zakir Khan Live"));
    assert_eq!(events[1].venue.as_deref(), Some("NSCI Dome - Mumbai"));
    assert_eq!(events[1].category.as_deref(), Some("Comedy"));
    assert_eq!(events[1].url.as_deref(), Some(server.url("/events/zakir-khan").as_str()));
}

#[test]
fn failing_event_page_is_skipped() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/mumbai");
        then.status(200).body(LISTING);
    });
    server.mock(|when, then| {
        when.method(GET).path("/events/zakir-khan");
        then.status(200).body(event_page("Zakir Khan Live", "2026-12-12", "NSCI Dome"));
    });
    let broken = server.mock(|when, then| {
        when.method(GET).path("/events/anuv-jain");
        then.status(500);
    });

    let events = adapter_for(&server, 25).fetch(&City::new_unchecked("Mumbai")).unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name.as_deref(), Some("Zakir Khan Live"));
    broken.assert_calls(2);
}

#[test]
fn every_event_page_failing_is_transient() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/mumbai");
        then.status(200).body(LISTING);
    });
    server.mock(|when, then| {
        when.method(GET).path_includes("/events/");
        then.status(502);
    });

    let err = adapter_for(&server, 25).fetch(&City::new_unchecked("Mumbai")).unwrap_err();
    assert!(err.is_transient());
}

#[test]
fn listing_without_links_is_empty_not_an_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/mumbai");
        then.status(200).body("<html><body>Maintenance</body></html>");
    });

    let events = adapter_for(&server, 25).fetch(&City::new_unchecked("Mumbai")).unwrap();
    assert!(events.is_empty());
}

#[test]
fn listing_outage_is_transient() {
    let server = MockServer::start();
    let listing = server.mock(|when, then| {
        when.method(GET).path("/mumbai");
        then.status(503);
    });

    let err = adapter_for(&server, 25).fetch(&City::new_unchecked("Mumbai")).unwrap_err();

    assert!(err.is_transient());
    listing.assert_calls(2);
}

#[test]
fn listing_forbidden_is_permanent() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/mumbai");
        then.status(403);
    });

    let err = adapter_for(&server, 25).fetch(&City::new_unchecked("Mumbai")).unwrap_err();
    assert!(!err.is_transient());
}

#[test]
fn max_events_caps_page_visits() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/mumbai");
        then.status(200).body(LISTING);
    });
    let pages = server.mock(|when, then| {
        when.method(GET).path_includes("/events/");
        then.status(200).body(event_page("Any", "2026-12-12", "Somewhere"));
    });

    let events = adapter_for(&server, 1).fetch(&City::new_unchecked("Mumbai")).unwrap();

    assert_eq!(events.len(), 1);
    pages.assert_calls(1);
}
