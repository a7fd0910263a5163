// Per-city cycles: fetch (with cycle-level retry), load + reconcile,
// persist. Cities run on a bounded pool of scoped threads and never affect
// one another; a city's working set lives only inside its cycle.
//
// At most one fetch per city is ever in flight. A fetch that overruns its
// limit is parked and waited for before the next one starts, in this cycle
// or a later one. A save that overruns is withdrawn through its commit gate,
// so a cycle reported as failed never leaves a new snapshot behind.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use eventwatch_core::{
    normalize_batch, City, CommitGate, EventRecord, FetchError, NormalizeContext, RawEvent,
    SourceAdapter, StorageError, StoragePort,
};
use eventwatch_recon::reconcile;

use crate::bounded::{run_bounded, spawn_bounded, BoundedError, Pending};
use crate::phase::{CyclePhase, PhaseTracker, TransitionError};
use crate::report::{CycleOutcome, CycleReport, RunReport};
use crate::settings::RunSettings;
use crate::shutdown::Shutdown;

/// How often a wait on an overrun fetch checks for shutdown.
const SETTLE_POLL: Duration = Duration::from_millis(50);

type FetchResult = Result<Vec<RawEvent>, FetchError>;

pub struct Orchestrator {
    settings: RunSettings,
    source: Arc<dyn SourceAdapter>,
    storage: Arc<dyn StoragePort>,
    /// Fetches that overran their limit and were still running when their
    /// cycle ended.
    overrun: Mutex<HashMap<City, Pending<FetchResult>>>,
}

/// Counters gathered while a cycle runs.
struct CycleState {
    tracker: PhaseTracker,
    attempts: u32,
    rejected: usize,
    collisions: usize,
}

enum FetchAbort {
    Failed(FetchError),
    Cancelled,
}

enum Attempt {
    Finished(FetchResult),
    Overran(Pending<FetchResult>),
}

impl Orchestrator {
    pub fn new(settings: RunSettings, source: Arc<dyn SourceAdapter>, storage: Arc<dyn StoragePort>) -> Self {
        Self { settings, source, storage, overrun: Mutex::new(HashMap::new()) }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    // -----------------------------------------------------------------------
    // Whole run
    // -----------------------------------------------------------------------

    /// One cycle for each city, up to `max_parallel_cities` at a time.
    /// Cycles are reported in the order the cities were given.
    pub fn run(&self, cities: &[City], shutdown: &Shutdown) -> RunReport {
        let started_at = Utc::now();
        log::info!(
            "run started: {} cities via {} -> {}",
            cities.len(),
            self.source.source_name(),
            self.storage.backend_name()
        );

        let queue: Mutex<VecDeque<usize>> = Mutex::new((0..cities.len()).collect());
        let slots: Mutex<Vec<Option<CycleReport>>> = Mutex::new(vec![None; cities.len()]);
        let workers = self.settings.max_parallel_cities.max(1).min(cities.len());

        thread::scope(|scope| {
            for n in 0..workers {
                let spawned = thread::Builder::new()
                    .name(format!("evw-cycle-{n}"))
                    .spawn_scoped(scope, || self.drain(cities, &queue, &slots, shutdown));
                if let Err(e) = spawned {
                    log::warn!("could not start cycle worker {}: {}", n, e);
                }
            }
        });
        // Picks up whatever is left if no worker could be started.
        self.drain(cities, &queue, &slots, shutdown);

        let slots = slots.into_inner().unwrap_or_else(PoisonError::into_inner);
        let cycles: Vec<CycleReport> = slots
            .into_iter()
            .zip(cities)
            .map(|(slot, city)| slot.unwrap_or_else(|| never_started(city)))
            .collect();

        let report = RunReport { started_at, finished_at: Utc::now(), cycles };
        log::info!(
            "run finished: {} succeeded, {} failed, {} skipped, {} cancelled",
            report.succeeded(),
            report.failed(),
            report.skipped(),
            report.cancelled()
        );
        report
    }

    fn drain(
        &self,
        cities: &[City],
        queue: &Mutex<VecDeque<usize>>,
        slots: &Mutex<Vec<Option<CycleReport>>>,
        shutdown: &Shutdown,
    ) {
        loop {
            let next = queue.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
            let Some(index) = next else { break };
            let report = self.run_city(&cities[index], shutdown);
            slots.lock().unwrap_or_else(PoisonError::into_inner)[index] = Some(report);
        }
    }

    // -----------------------------------------------------------------------
    // One city
    // -----------------------------------------------------------------------

    pub fn run_city(&self, city: &City, shutdown: &Shutdown) -> CycleReport {
        let started = Instant::now();
        let mut state = CycleState {
            tracker: PhaseTracker::new(city.as_str()),
            attempts: 0,
            rejected: 0,
            collisions: 0,
        };

        let outcome = match self.drive(city, shutdown, &mut state) {
            Ok(outcome) => outcome,
            Err(e) => CycleOutcome::Failed { phase: state.tracker.phase(), reason: e.to_string() },
        };

        match &outcome {
            CycleOutcome::Failed { .. } => log::error!("{}: {}", city, outcome),
            _ => log::info!("{}: {}", city, outcome),
        }

        CycleReport {
            city: city.clone(),
            outcome,
            attempts: state.attempts,
            rejected: state.rejected,
            collisions: state.collisions,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }

    fn drive(&self, city: &City, shutdown: &Shutdown, state: &mut CycleState) -> Result<CycleOutcome, TransitionError> {
        if shutdown.is_requested() {
            return Ok(CycleOutcome::Cancelled { phase: CyclePhase::Idle });
        }

        state.tracker.advance(CyclePhase::Fetching)?;
        let raws = match self.fetch_with_retry(city, shutdown, &mut state.attempts) {
            Ok(raws) => raws,
            Err(FetchAbort::Cancelled) => return Ok(CycleOutcome::Cancelled { phase: CyclePhase::Fetching }),
            Err(FetchAbort::Failed(e)) => return fail(&mut state.tracker, CyclePhase::Fetching, e.to_string()),
        };
        if shutdown.is_requested() {
            return Ok(CycleOutcome::Cancelled { phase: CyclePhase::Fetching });
        }

        state.tracker.advance(CyclePhase::Reconciling)?;
        let snapshot = match self.load(city) {
            Ok(snapshot) => snapshot,
            Err(e) => return fail(&mut state.tracker, CyclePhase::Reconciling, e.to_string()),
        };

        let now = Utc::now();
        let fetched = raws.len();
        let candidates = self.normalize(city, raws, now, &mut state.rejected);
        if candidates.is_empty() && self.settings.skip_empty_fetch && !snapshot.is_empty() {
            let reason = if fetched == 0 {
                format!("no events fetched; {} stored records kept", snapshot.len())
            } else {
                format!("all {} fetched events were rejected; {} stored records kept", fetched, snapshot.len())
            };
            log::warn!("{}: {}", city, reason);
            return Ok(CycleOutcome::Skipped { reason });
        }

        let result = reconcile(snapshot, candidates, &self.settings.policy, now);
        for collision in &result.collisions {
            log::warn!(
                "{}: identity collision on '{}'; kept {}, dropped {} ({})",
                city,
                collision.identity_key,
                collision.kept_event_id,
                collision.dropped.event_id,
                collision.dropped.source_url
            );
        }
        state.collisions = result.collisions.len();
        if shutdown.is_requested() {
            return Ok(CycleOutcome::Cancelled { phase: CyclePhase::Reconciling });
        }

        state.tracker.advance(CyclePhase::Persisting)?;
        if let Err(e) = self.save(city, result.snapshot) {
            return fail(&mut state.tracker, CyclePhase::Persisting, e.to_string());
        }
        state.tracker.advance(CyclePhase::Done)?;

        Ok(CycleOutcome::Succeeded { report: result.report })
    }

    // -----------------------------------------------------------------------
    // Phases
    // -----------------------------------------------------------------------

    fn fetch_with_retry(&self, city: &City, shutdown: &Shutdown, attempts: &mut u32) -> Result<Vec<RawEvent>, FetchAbort> {
        if let Some(previous) = self.take_overrun(city) {
            log::info!("{}: waiting for a fetch left over from an earlier cycle", city);
            self.settle(city, previous, shutdown)?;
        }

        let retry = &self.settings.retry;
        let mut attempt = 0;
        loop {
            *attempts = attempt + 1;
            let (error, straggler) = match self.fetch_once(city) {
                Attempt::Finished(Ok(raws)) => {
                    log::debug!("{}: fetched {} candidates on attempt {}", city, raws.len(), attempt + 1);
                    return Ok(raws);
                }
                Attempt::Finished(Err(e)) => (e, None),
                Attempt::Overran(pending) => {
                    let e = FetchError::transient(overran("fetch", city, self.settings.fetch_timeout));
                    (e, Some(pending))
                }
            };

            if !error.is_transient() || attempt >= retry.max_retries {
                if let Some(pending) = straggler {
                    self.park_overrun(city, pending);
                }
                return Err(FetchAbort::Failed(error));
            }

            let delay = retry.delay_for(attempt);
            log::warn!(
                "{}: fetch attempt {}/{} failed: {}; retrying in {}ms",
                city,
                attempt + 1,
                retry.max_retries + 1,
                error,
                delay.as_millis()
            );
            if !shutdown.sleep(delay) {
                if let Some(pending) = straggler {
                    self.park_overrun(city, pending);
                }
                return Err(FetchAbort::Cancelled);
            }
            if let Some(pending) = straggler {
                self.settle(city, pending, shutdown)?;
            }
            attempt += 1;
        }
    }

    fn fetch_once(&self, city: &City) -> Attempt {
        let source = Arc::clone(&self.source);
        let target = city.clone();
        let pending = match spawn_bounded(&format!("fetch-{}", city.slug()), move || source.fetch(&target)) {
            Ok(pending) => pending,
            Err(e) => return Attempt::Finished(Err(FetchError::permanent(e.to_string()))),
        };
        match pending.wait(self.settings.fetch_timeout) {
            Ok(result) => Attempt::Finished(result),
            Err(BoundedError::TimedOut(_)) => Attempt::Overran(pending),
            Err(e @ BoundedError::Worker(_)) => Attempt::Finished(Err(FetchError::permanent(e.to_string()))),
        }
    }

    /// Wait, for at most another `fetch_timeout`, until an overrun fetch
    /// finishes. Its result is discarded. If it is still running after that,
    /// the cycle fails rather than start a second fetch for the city.
    fn settle(&self, city: &City, pending: Pending<FetchResult>, shutdown: &Shutdown) -> Result<(), FetchAbort> {
        let limit = self.settings.fetch_timeout;
        let deadline = Instant::now() + limit;
        loop {
            match pending.wait(SETTLE_POLL.min(limit)) {
                Ok(_) | Err(BoundedError::Worker(_)) => {
                    log::debug!("{}: overrun {} finished", city, pending.name());
                    return Ok(());
                }
                Err(BoundedError::TimedOut(_)) => {}
            }
            if shutdown.is_requested() {
                self.park_overrun(city, pending);
                return Err(FetchAbort::Cancelled);
            }
            if Instant::now() >= deadline {
                self.park_overrun(city, pending);
                return Err(FetchAbort::Failed(FetchError::permanent(format!(
                    "an earlier fetch for {} is still running after a further {:?}; not starting another",
                    city, limit
                ))));
            }
        }
    }

    fn take_overrun(&self, city: &City) -> Option<Pending<FetchResult>> {
        self.overrun.lock().unwrap_or_else(PoisonError::into_inner).remove(city)
    }

    fn park_overrun(&self, city: &City, pending: Pending<FetchResult>) {
        self.overrun
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(city.clone(), pending);
    }

    fn load(&self, city: &City) -> Result<Vec<EventRecord>, StorageError> {
        let storage = Arc::clone(&self.storage);
        let target = city.clone();
        let limit = self.settings.storage_timeout;
        run_bounded(&format!("load-{}", city.slug()), limit, move || storage.load(&target))
            .map_err(|e| storage_failure("load", city, e))?
    }

    /// Bounded save. On timeout the save is withdrawn, unless the backend
    /// has already begun committing, in which case its outcome is awaited.
    fn save(&self, city: &City, snapshot: Vec<EventRecord>) -> Result<(), StorageError> {
        let storage = Arc::clone(&self.storage);
        let target = city.clone();
        let limit = self.settings.storage_timeout;
        let count = snapshot.len();
        let gate = CommitGate::new();
        let backend_gate = gate.clone();

        let pending = spawn_bounded(&format!("save-{}", city.slug()), move || {
            storage.save_gated(&target, &snapshot, &backend_gate)
        })
        .map_err(|e| storage_failure("save", city, e))?;

        let result = match pending.wait(limit) {
            Err(BoundedError::TimedOut(_)) if gate.withdraw() => {
                log::warn!("{}: save exceeded {:?}; withdrawn, previous snapshot kept", city, limit);
                return Err(StorageError::Timeout(overran("save", city, limit)));
            }
            Err(BoundedError::TimedOut(_)) => {
                log::debug!("{}: save exceeded {:?} while committing; waiting for it", city, limit);
                pending.join().map_err(|e| storage_failure("save", city, e))?
            }
            other => other.map_err(|e| storage_failure("save", city, e))?,
        };
        result?;
        log::debug!("{}: saved {} records to {}", city, count, self.storage.backend_name());
        Ok(())
    }

    /// Validate the fetch. Candidates without a city belong to the city being
    /// fetched; candidates naming a different city are rejected.
    fn normalize(&self, city: &City, raws: Vec<RawEvent>, now: DateTime<Utc>, rejected: &mut usize) -> Vec<EventRecord> {
        let raws: Vec<RawEvent> = raws
            .into_iter()
            .map(|mut raw| {
                if raw.city.as_deref().map_or(true, |c| c.trim().is_empty()) {
                    raw.city = Some(city.as_str().to_string());
                }
                raw
            })
            .collect();

        let ctx = NormalizeContext {
            source: self.source.source_name(),
            cities: &self.settings.supported,
            local_offset: self.settings.local_offset,
            now,
        };
        let (records, invalid) = normalize_batch(&raws, &ctx);
        *rejected = invalid.len();

        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            if &record.city == city {
                kept.push(record);
            } else {
                let error = eventwatch_core::ValidationError::ForeignCity {
                    expected: city.to_string(),
                    found: record.city.to_string(),
                };
                log::warn!("{}: skipping {}: {}", city, record.source_url, error);
                *rejected += 1;
            }
        }
        kept
    }
}

fn fail(tracker: &mut PhaseTracker, phase: CyclePhase, reason: String) -> Result<CycleOutcome, TransitionError> {
    tracker.advance(CyclePhase::Failed)?;
    Ok(CycleOutcome::Failed { phase, reason })
}

fn overran(op: &str, city: &City, limit: Duration) -> String {
    format!("{} for {} took longer than {:?}", op, city, limit)
}

fn storage_failure(op: &str, city: &City, e: BoundedError) -> StorageError {
    match e {
        BoundedError::TimedOut(limit) => StorageError::Timeout(overran(op, city, limit)),
        BoundedError::Worker(msg) => StorageError::Io(msg),
    }
}

fn never_started(city: &City) -> CycleReport {
    CycleReport {
        city: city.clone(),
        outcome: CycleOutcome::Cancelled { phase: CyclePhase::Idle },
        attempts: 0,
        rejected: 0,
        collisions: 0,
        duration_ms: 0,
    }
}
