use chrono::{DateTime, Utc};
use serde::Serialize;

use eventwatch_core::City;
use eventwatch_recon::ChangeReport;

use crate::phase::CyclePhase;

/// How one city's cycle ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    Succeeded { report: ChangeReport },
    /// `phase` is where it failed; storage is untouched unless that was
    /// `persisting`, and even then no partial write happened.
    Failed { phase: CyclePhase, reason: String },
    /// Nothing was written, deliberately.
    Skipped { reason: String },
    /// Shutdown was requested; `phase` is the last phase the cycle was in.
    Cancelled { phase: CyclePhase },
}

impl std::fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleOutcome::Succeeded { report } => write!(f, "ok ({})", report),
            CycleOutcome::Failed { phase, reason } => write!(f, "FAILED while {}: {}", phase, reason),
            CycleOutcome::Skipped { reason } => write!(f, "skipped: {}", reason),
            CycleOutcome::Cancelled { phase } => write!(f, "cancelled ({})", phase),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    pub city: City,
    pub outcome: CycleOutcome,
    /// Fetch attempts made, including the first.
    pub attempts: u32,
    /// Candidates dropped by validation.
    pub rejected: usize,
    /// Stored records dropped because they shared an identity key.
    pub collisions: usize,
    pub duration_ms: u64,
}

impl CycleReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, CycleOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per requested city, in request order.
    pub cycles: Vec<CycleReport>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, CycleOutcome::Succeeded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, CycleOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, CycleOutcome::Skipped { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, CycleOutcome::Cancelled { .. }))
    }

    fn count(&self, pred: impl Fn(&CycleOutcome) -> bool) -> usize {
        self.cycles.iter().filter(|c| pred(&c.outcome)).count()
    }

    pub fn cycle(&self, city: &City) -> Option<&CycleReport> {
        self.cycles.iter().find(|c| &c.city == city)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle(city: &str, outcome: CycleOutcome) -> CycleReport {
        CycleReport {
            city: City::new_unchecked(city),
            outcome,
            attempts: 1,
            rejected: 0,
            collisions: 0,
            duration_ms: 5,
        }
    }

    #[test]
    fn counts_by_outcome() {
        let now = Utc::now();
        let run = RunReport {
            started_at: now,
            finished_at: now,
            cycles: vec![
                cycle("Mumbai", CycleOutcome::Succeeded { report: ChangeReport::default() }),
                cycle("Delhi", CycleOutcome::Failed { phase: CyclePhase::Fetching, reason: "HTTP 503".into() }),
                cycle("Pune", CycleOutcome::Cancelled { phase: CyclePhase::Idle }),
            ],
        };
        assert_eq!(run.succeeded(), 1);
        assert_eq!(run.failed(), 1);
        assert_eq!(run.cancelled(), 1);
        assert_eq!(run.skipped(), 0);
        assert!(run.cycle(&City::new_unchecked("Delhi")).unwrap().is_failure());
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = CycleOutcome::Failed { phase: CyclePhase::Persisting, reason: "disk full".into() };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["phase"], "persisting");
        assert_eq!(json["reason"], "disk full");
    }

    #[test]
    fn display_is_one_line() {
        let outcome = CycleOutcome::Skipped { reason: "empty fetch".into() };
        assert_eq!(outcome.to_string(), "skipped: empty fetch");
    }
}
