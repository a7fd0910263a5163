// Config -> concrete adapter, store and orchestrator settings.

use std::sync::Arc;
use std::time::Duration;

use eventwatch_config::{EventwatchConfig, SourcePlatform, StorageBackend};
use eventwatch_core::{City, CommitGate, EventRecord, SourceAdapter, StorageError, StoragePort};
use eventwatch_io::{CsvStore, ExcelStore, MemoryStore};
use eventwatch_runner::{RetryPolicy, RunSettings};
use eventwatch_source::{ClientSettings, DistrictAdapter, DistrictSettings, FileAdapter};

use crate::CliError;

pub fn source(config: &EventwatchConfig) -> Result<Arc<dyn SourceAdapter>, CliError> {
    let s = &config.source;
    match s.platform {
        SourcePlatform::District => {
            let adapter = DistrictAdapter::new(DistrictSettings {
                client: ClientSettings {
                    request_timeout: Duration::from_secs(s.request_timeout_secs),
                    user_agent: s.user_agent.clone(),
                    max_retries: s.max_retries,
                    retry_base_delay: Duration::from_millis(config.retry.base_delay_ms),
                    rate_limit_delay: Duration::from_millis(s.rate_limit_delay_ms),
                },
                max_events: s.max_events,
                city_urls: s.city_urls.clone().into_iter().collect(),
            })
            .map_err(|e| CliError::usage(e.to_string()))?;
            Ok(Arc::new(adapter))
        }
        SourcePlatform::File => Ok(Arc::new(FileAdapter::new(&s.fixtures_dir))),
    }
}

pub fn storage(config: &EventwatchConfig) -> Arc<dyn StoragePort> {
    let dir = &config.storage.dir;
    match config.storage.backend {
        StorageBackend::Excel => Arc::new(ExcelStore::new(dir)),
        StorageBackend::Csv => Arc::new(CsvStore::new(dir)),
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
    }
}

pub fn run_settings(config: &EventwatchConfig) -> RunSettings {
    RunSettings {
        retry: RetryPolicy {
            max_retries: config.retry.max_retries,
            base_delay: Duration::from_millis(config.retry.base_delay_ms),
            max_delay: Duration::from_millis(config.retry.max_delay_ms),
        },
        fetch_timeout: config.fetch_timeout(),
        storage_timeout: config.storage_timeout(),
        policy: config.recon_policy(),
        supported: config.supported_set(),
        local_offset: config.local_offset(),
        max_parallel_cities: config.run.max_parallel_cities,
        skip_empty_fetch: config.run.skip_empty_fetch,
    }
}

/// Reads through to the configured backend the first time a city is
/// loaded, then keeps everything in memory. Nothing reaches the backend.
pub struct DryRunStore {
    backing: Arc<dyn StoragePort>,
    memory: MemoryStore,
    name: String,
}

impl DryRunStore {
    pub fn new(backing: Arc<dyn StoragePort>) -> Self {
        let name = format!("{} (dry run)", backing.backend_name());
        Self { backing, memory: MemoryStore::new(), name }
    }
}

impl StoragePort for DryRunStore {
    fn backend_name(&self) -> &str {
        &self.name
    }

    fn load(&self, city: &City) -> Result<Vec<EventRecord>, StorageError> {
        match self.memory.snapshot(city) {
            Some(records) => Ok(records),
            None => {
                let records = self.backing.load(city)?;
                self.memory.save(city, &records)?;
                Ok(records)
            }
        }
    }

    fn save_gated(&self, city: &City, snapshot: &[EventRecord], gate: &CommitGate) -> Result<(), StorageError> {
        log::debug!("{}: dry run, {} records kept in memory", city, snapshot.len());
        self.memory.save_gated(city, snapshot, gate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use eventwatch_core::EventStatus;

    fn record(city: &City) -> EventRecord {
        EventRecord {
            event_id: "a1b2c3d4e5f6".into(),
            name: "Zakir Khan Live".into(),
            date_time: None,
            raw_date: "TBA".into(),
            date_unparsed: true,
            venue: "NSCI Dome".into(),
            city: city.clone(),
            category: "Comedy".into(),
            source_url: "https://www.district.in/events/zakir".into(),
            status: EventStatus::Active,
            last_updated: Utc::now(),
            source: "District".into(),
            missed_cycles: 0,
        }
    }

    #[test]
    fn dry_run_reads_backend_but_never_writes_it() {
        let city = City::new_unchecked("Mumbai");
        let backing = Arc::new(MemoryStore::new().with_snapshot(city.clone(), vec![record(&city)]));
        let dry = DryRunStore::new(backing.clone());

        assert_eq!(dry.load(&city).unwrap().len(), 1);
        dry.save(&city, &[]).unwrap();

        assert!(dry.load(&city).unwrap().is_empty());
        assert_eq!(backing.snapshot(&city).unwrap().len(), 1);
        assert_eq!(dry.backend_name(), "memory (dry run)");
    }

    #[test]
    fn settings_follow_config() {
        let mut config = EventwatchConfig::default();
        config.retry.max_retries = 5;
        config.run.max_parallel_cities = 2;
        config.lifecycle.grace_cycles = 7;

        let s = run_settings(&config);

        assert_eq!(s.retry.max_retries, 5);
        assert_eq!(s.max_parallel_cities, 2);
        assert_eq!(s.policy.grace_cycles, 7);
        assert!(s.supported.resolve("pune").is_some());
    }

    #[test]
    fn memory_backend_is_selectable() {
        let mut config = EventwatchConfig::default();
        config.storage.backend = StorageBackend::Memory;
        assert_eq!(storage(&config).backend_name(), "memory");
    }
}
