use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use eventwatch_core::EventRecord;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// What happens when an `Expired` record is re-discovered with a new future
/// date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactivationPolicy {
    /// Treat it as a new occurrence under the same identity key: take the
    /// fresh fields and reset status to `Active`.
    #[default]
    NewOccurrence,
    /// Once expired, always expired.
    KeepExpired,
}

impl std::fmt::Display for ReactivationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewOccurrence => write!(f, "new_occurrence"),
            Self::KeepExpired => write!(f, "keep_expired"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconPolicy {
    /// Consecutive missed cycles tolerated before a future/undated record is
    /// forced to `Expired`.
    pub grace_cycles: u32,
    /// Shifts the "has this event passed" reference point by whole days.
    pub expiry_offset_days: i64,
    pub reactivation: ReactivationPolicy,
}

impl Default for ReconPolicy {
    fn default() -> Self {
        Self {
            grace_cycles: 3,
            expiry_offset_days: 0,
            reactivation: ReactivationPolicy::NewOccurrence,
        }
    }
}

impl ReconPolicy {
    /// Instant before which a dated event counts as past.
    pub fn expiry_reference(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.expiry_offset_days)
    }
}

// ---------------------------------------------------------------------------
// Per-record outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    Inserted,
    Updated,
    Unchanged,
    Expired,
    Reactivated,
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inserted => write!(f, "inserted"),
            Self::Updated => write!(f, "updated"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Expired => write!(f, "expired"),
            Self::Reactivated => write!(f, "reactivated"),
        }
    }
}

// ---------------------------------------------------------------------------
// Report + Output
// ---------------------------------------------------------------------------

/// Per-cycle counts. Each record lands in exactly one bucket, the one
/// matching its status after the cycle: a record whose fields changed and
/// whose date is now past counts as `expired`, not `updated`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeReport {
    pub inserted: usize,
    pub updated: usize,
    pub expired: usize,
    pub unchanged: usize,
    pub reactivated: usize,
    /// Candidates collapsed because an earlier one in the same fetch had the
    /// same identity key.
    pub batch_duplicates: usize,
    /// Records in the output snapshot.
    pub total: usize,
}

impl ChangeReport {
    pub fn record(&mut self, change: Change) {
        match change {
            Change::Inserted => self.inserted += 1,
            Change::Updated => self.updated += 1,
            Change::Unchanged => self.unchanged += 1,
            Change::Expired => self.expired += 1,
            Change::Reactivated => self.reactivated += 1,
        }
    }

    pub fn has_changes(&self) -> bool {
        self.inserted + self.updated + self.expired + self.reactivated > 0
    }
}

impl std::fmt::Display for ChangeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "inserted={} updated={} expired={} unchanged={} reactivated={} total={}",
            self.inserted, self.updated, self.expired, self.unchanged, self.reactivated, self.total
        )
    }
}

/// Two stored records shared an identity key. Non-fatal: the record with the
/// later `last_updated` was kept, the other is carried here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityCollision {
    pub identity_key: String,
    pub kept_event_id: String,
    pub dropped: EventRecord,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub snapshot: Vec<EventRecord>,
    pub report: ChangeReport,
    pub collisions: Vec<IdentityCollision>,
}
