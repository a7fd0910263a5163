//! Status transitions for records, seen or missing in a fetch.
//!
//! Active ─(tracked field changed)─▶ Updated
//! Active/Updated ─(date passed, or missed > grace cycles)─▶ Expired
//! Expired ─(re-discovered with a new future date, new_occurrence policy)─▶ Active

use chrono::{DateTime, Utc};

use eventwatch_core::{EventRecord, EventStatus};

use crate::model::{Change, ReactivationPolicy, ReconPolicy};

/// Current time plus the policy's "is it past" reference.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    pub now: DateTime<Utc>,
    pub expiry_ref: DateTime<Utc>,
}

impl Clock {
    pub fn new(policy: &ReconPolicy, now: DateTime<Utc>) -> Self {
        Self { now, expiry_ref: policy.expiry_reference(now) }
    }
}

fn expire(record: &mut EventRecord, clock: Clock) {
    record.status = EventStatus::Expired;
    record.last_updated = clock.now;
}

/// Copy scraped fields from a fresh candidate. City and event id stay.
fn absorb(stored: &mut EventRecord, fresh: EventRecord) {
    stored.name = fresh.name;
    stored.date_time = fresh.date_time;
    stored.raw_date = fresh.raw_date;
    stored.date_unparsed = fresh.date_unparsed;
    stored.venue = fresh.venue;
    stored.category = fresh.category;
    stored.source_url = fresh.source_url;
    stored.source = fresh.source;
}

/// A candidate with no stored counterpart.
pub fn insert(mut fresh: EventRecord, event_id: String, clock: Clock) -> EventRecord {
    fresh.event_id = event_id;
    fresh.status = if fresh.is_past(clock.expiry_ref) {
        EventStatus::Expired
    } else {
        EventStatus::Active
    };
    fresh.last_updated = clock.now;
    fresh.missed_cycles = 0;
    fresh
}

fn reactivates(stored: &EventRecord, fresh: &EventRecord, policy: &ReconPolicy, clock: Clock) -> bool {
    if policy.reactivation == ReactivationPolicy::KeepExpired {
        return false;
    }
    match fresh.date_time {
        Some(date) => date >= clock.expiry_ref && fresh.date_time != stored.date_time,
        None => false,
    }
}

/// A stored record that appeared in this fetch.
pub fn apply_seen(stored: &mut EventRecord, fresh: EventRecord, policy: &ReconPolicy, clock: Clock) -> Change {
    stored.missed_cycles = 0;

    if stored.status == EventStatus::Expired {
        if reactivates(stored, &fresh, policy, clock) {
            absorb(stored, fresh);
            stored.status = EventStatus::Active;
            stored.last_updated = clock.now;
            return Change::Reactivated;
        }
        return Change::Unchanged;
    }

    if stored.tracked_fields_differ(&fresh) {
        absorb(stored, fresh);
        stored.last_updated = clock.now;
        // A change that leaves the event in the past is reported as the expiry.
        if stored.is_past(clock.expiry_ref) {
            stored.status = EventStatus::Expired;
            return Change::Expired;
        }
        stored.status = EventStatus::Updated;
        return Change::Updated;
    }

    if stored.is_past(clock.expiry_ref) {
        expire(stored, clock);
        return Change::Expired;
    }

    Change::Unchanged
}

/// A stored record absent from this fetch.
///
/// Past events expire immediately. Future or undated ones get
/// `grace_cycles` misses before they are forced out.
pub fn apply_missing(stored: &mut EventRecord, policy: &ReconPolicy, clock: Clock) -> Change {
    if stored.status == EventStatus::Expired {
        return Change::Unchanged;
    }

    stored.missed_cycles = stored.missed_cycles.saturating_add(1);

    if stored.is_past(clock.expiry_ref) || stored.missed_cycles > policy.grace_cycles {
        expire(stored, clock);
        return Change::Expired;
    }

    Change::Unchanged
}
