use std::collections::HashMap;

use eventwatch_core::{identity_key, EventRecord};

use crate::model::IdentityCollision;

/// Records keyed by identity, in first-seen order.
#[derive(Debug, Default)]
pub struct KeyedRecords {
    pub entries: Vec<(String, EventRecord)>,
    positions: HashMap<String, usize>,
}

impl KeyedRecords {
    pub fn position(&self, key: &str) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert, or hand back the existing slot's index if the key is taken.
    fn push_or_slot(&mut self, key: String, record: EventRecord) -> Result<(), (usize, EventRecord)> {
        if let Some(&i) = self.positions.get(&key) {
            return Err((i, record));
        }
        self.positions.insert(key.clone(), self.entries.len());
        self.entries.push((key, record));
        Ok(())
    }
}

/// Index a stored snapshot by identity key.
///
/// Keys are unique in a well-formed snapshot. If two stored records collide,
/// the one with the later `last_updated` wins (ties go to the later position),
/// keeps the slot of the first occurrence, and the loser is returned as a
/// collision.
pub fn index_snapshot(snapshot: Vec<EventRecord>) -> (KeyedRecords, Vec<IdentityCollision>) {
    let mut keyed = KeyedRecords::default();
    let mut collisions = Vec::new();

    for record in snapshot {
        let key = identity_key(&record);
        if let Err((i, record)) = keyed.push_or_slot(key.clone(), record) {
            let existing = &mut keyed.entries[i].1;
            let dropped = if record.last_updated >= existing.last_updated {
                std::mem::replace(existing, record)
            } else {
                record
            };
            log::warn!(
                "identity collision on '{key}': kept {}, dropped {} ({})",
                existing.event_id,
                dropped.event_id,
                dropped
            );
            collisions.push(IdentityCollision {
                identity_key: key,
                kept_event_id: existing.event_id.clone(),
                dropped,
            });
        }
    }

    (keyed, collisions)
}

/// Collapse candidates of one fetch by identity key. The later candidate
/// replaces the earlier one in place. Returns the number collapsed.
pub fn dedupe_candidates(candidates: Vec<EventRecord>) -> (KeyedRecords, usize) {
    let mut keyed = KeyedRecords::default();
    let mut duplicates = 0;

    for record in candidates {
        let key = identity_key(&record);
        if let Err((i, record)) = keyed.push_or_slot(key, record) {
            log::debug!("duplicate candidate in fetch: {record}");
            keyed.entries[i].1 = record;
            duplicates += 1;
        }
    }

    (keyed, duplicates)
}
