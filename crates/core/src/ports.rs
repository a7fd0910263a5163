//! Capability contracts the orchestrator drives. Concrete scrapers and
//! storage backends live in their own crates and are picked by config.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::{FetchError, StorageError};
use crate::model::{City, EventRecord, RawEvent};

/// Produces raw candidates for one city.
///
/// The result is finite but not necessarily complete (pages may be missed).
/// Implementations apply their own request-level retries before failing.
pub trait SourceAdapter: Send + Sync {
    /// Platform constant stamped on every record, e.g. `District`.
    fn source_name(&self) -> &str;

    fn fetch(&self, city: &City) -> Result<Vec<RawEvent>, FetchError>;
}

/// Durable per-city snapshot store.
///
/// A save replaces the whole snapshot; backends never patch in place.
pub trait StoragePort: Send + Sync {
    fn backend_name(&self) -> &str;

    /// Current snapshot, or an empty one if the city was never saved.
    fn load(&self, city: &City) -> Result<Vec<EventRecord>, StorageError>;

    /// Replace the snapshot. The backend must call [`CommitGate::try_commit`]
    /// immediately before the step that makes the new snapshot visible, and
    /// leave the old one in place (returning [`StorageError::Withdrawn`]) if
    /// that returns `false`.
    fn save_gated(&self, city: &City, snapshot: &[EventRecord], gate: &CommitGate) -> Result<(), StorageError>;

    fn save(&self, city: &City, snapshot: &[EventRecord]) -> Result<(), StorageError> {
        self.save_gated(city, snapshot, &CommitGate::new())
    }
}

// ---------------------------------------------------------------------------
// Commit gate
// ---------------------------------------------------------------------------

const OPEN: u8 = 0;
const COMMITTED: u8 = 1;
const WITHDRAWN: u8 = 2;

/// One-shot race between a save and the caller waiting on it. Exactly one
/// side wins: either the backend commits, or the caller withdraws the save
/// and the backend publishes nothing.
#[derive(Debug, Clone, Default)]
pub struct CommitGate {
    state: Arc<AtomicU8>,
}

impl CommitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend side. `false` means the save was withdrawn.
    pub fn try_commit(&self) -> bool {
        self.state
            .compare_exchange(OPEN, COMMITTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Caller side. `false` means the backend already started committing.
    pub fn withdraw(&self) -> bool {
        self.state
            .compare_exchange(OPEN, WITHDRAWN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_withdrawn(&self) -> bool {
        self.state.load(Ordering::Acquire) == WITHDRAWN
    }
}
