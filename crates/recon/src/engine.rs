use chrono::{DateTime, Utc};

use eventwatch_core::{event_id, EventRecord};

use crate::index::{dedupe_candidates, index_snapshot};
use crate::lifecycle::{apply_missing, apply_seen, insert, Clock};
use crate::model::{Change, ChangeReport, ReconPolicy, Reconciliation};

/// Merge one fetch into a city's stored snapshot.
///
/// Three-way diff with an asymmetric policy: a record missing from the fetch
/// is only expired when its date has passed or it has been missing for more
/// than `grace_cycles`. Every stored identity key appears in the output.
///
/// Output order: stored records in stored order, then new records in fetch
/// order.
pub fn reconcile(
    snapshot: Vec<EventRecord>,
    candidates: Vec<EventRecord>,
    policy: &ReconPolicy,
    now: DateTime<Utc>,
) -> Reconciliation {
    let clock = Clock::new(policy, now);
    let (mut stored, collisions) = index_snapshot(snapshot);
    let (fresh, batch_duplicates) = dedupe_candidates(candidates);

    let mut report = ChangeReport {
        batch_duplicates,
        ..Default::default()
    };
    let mut seen = vec![false; stored.len()];
    let mut inserted = Vec::new();

    for (key, candidate) in fresh.entries {
        match stored.position(&key) {
            Some(i) => {
                seen[i] = true;
                let change = apply_seen(&mut stored.entries[i].1, candidate, policy, clock);
                report.record(change);
            }
            None => {
                inserted.push(insert(candidate, event_id(&key), clock));
                report.record(Change::Inserted);
            }
        }
    }

    for (i, (_, record)) in stored.entries.iter_mut().enumerate() {
        if !seen[i] {
            report.record(apply_missing(record, policy, clock));
        }
    }

    let mut snapshot: Vec<EventRecord> = stored.entries.into_iter().map(|(_, r)| r).collect();
    snapshot.extend(inserted);
    report.total = snapshot.len();

    Reconciliation {
        snapshot,
        report,
        collisions,
    }
}
