// In-process snapshot store. Used by `--dry-run` style runs and tests.

use std::collections::HashMap;
use std::sync::Mutex;

use eventwatch_core::{City, CommitGate, EventRecord, StorageError, StoragePort};

#[derive(Default)]
pub struct MemoryStore {
    snapshots: Mutex<HashMap<City, Vec<EventRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a city's snapshot, replacing anything already there.
    pub fn with_snapshot(self, city: City, records: Vec<EventRecord>) -> Self {
        if let Ok(mut map) = self.snapshots.lock() {
            map.insert(city, records);
        }
        self
    }

    /// Copy of a city's snapshot, `None` if never saved.
    pub fn snapshot(&self, city: &City) -> Option<Vec<EventRecord>> {
        self.snapshots.lock().ok()?.get(city).cloned()
    }
}

fn poisoned() -> StorageError {
    StorageError::Io("memory store lock poisoned".to_string())
}

impl StoragePort for MemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    fn load(&self, city: &City) -> Result<Vec<EventRecord>, StorageError> {
        let map = self.snapshots.lock().map_err(|_| poisoned())?;
        Ok(map.get(city).cloned().unwrap_or_default())
    }

    fn save_gated(&self, city: &City, records: &[EventRecord], gate: &CommitGate) -> Result<(), StorageError> {
        let mut map = self.snapshots.lock().map_err(|_| poisoned())?;
        if !gate.try_commit() {
            return Err(StorageError::Withdrawn);
        }
        map.insert(city.clone(), records.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use eventwatch_core::EventStatus;

    fn record(name: &str) -> EventRecord {
        EventRecord {
            event_id: "aaaaaaaaaaaa".into(),
            name: name.into(),
            date_time: None,
            raw_date: "TBA".into(),
            date_unparsed: true,
            venue: "TBA".into(),
            city: City::new_unchecked("Delhi"),
            category: "General".into(),
            source_url: format!("https://www.district.in/events/{name}"),
            status: EventStatus::Active,
            last_updated: Utc::now(),
            source: "District".into(),
            missed_cycles: 0,
        }
    }

    #[test]
    fn cities_are_isolated() {
        let store = MemoryStore::new();
        let delhi = City::new_unchecked("Delhi");
        let pune = City::new_unchecked("Pune");

        store.save(&delhi, &[record("a")]).unwrap();

        assert_eq!(store.load(&delhi).unwrap().len(), 1);
        assert!(store.load(&pune).unwrap().is_empty());
        assert!(store.snapshot(&pune).is_none());
    }

    #[test]
    fn withdrawn_save_keeps_previous_snapshot() {
        let delhi = City::new_unchecked("Delhi");
        let store = MemoryStore::new().with_snapshot(delhi.clone(), vec![record("a")]);
        let gate = CommitGate::new();
        gate.withdraw();

        let err = store.save_gated(&delhi, &[record("b"), record("c")], &gate);

        assert_eq!(err, Err(StorageError::Withdrawn));
        assert_eq!(store.snapshot(&delhi).unwrap()[0].name, "a");
    }

    #[test]
    fn seeded_snapshot_is_loaded() {
        let delhi = City::new_unchecked("Delhi");
        let store = MemoryStore::new().with_snapshot(delhi.clone(), vec![record("a"), record("b")]);
        assert_eq!(store.load(&delhi).unwrap().len(), 2);
    }
}
