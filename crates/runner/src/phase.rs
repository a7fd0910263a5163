use serde::Serialize;

/// Where a city's cycle is.
///
/// ```text
/// Idle → Fetching → Reconciling → Persisting → Done
///          │            │             │
///          └────────────┴─────────────┴──────→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Idle,
    Fetching,
    Reconciling,
    Persisting,
    Done,
    Failed,
}

impl CyclePhase {
    pub fn can_advance_to(self, next: CyclePhase) -> bool {
        use CyclePhase::*;
        matches!(
            (self, next),
            (Idle, Fetching)
                | (Fetching, Reconciling)
                | (Reconciling, Persisting)
                | (Persisting, Done)
                | (Fetching, Failed)
                | (Reconciling, Failed)
                | (Persisting, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CyclePhase::Done | CyclePhase::Failed)
    }
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Reconciling => "reconciling",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Illegal phase transition. Indicates an orchestrator bug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: CyclePhase,
    pub to: CyclePhase,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "illegal cycle transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for TransitionError {}

/// One city's walk through [`CyclePhase`]. Every transition is checked and
/// logged.
#[derive(Debug)]
pub struct PhaseTracker {
    city: String,
    phase: CyclePhase,
}

impl PhaseTracker {
    pub fn new(city: impl Into<String>) -> Self {
        Self { city: city.into(), phase: CyclePhase::Idle }
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    pub fn advance(&mut self, next: CyclePhase) -> Result<(), TransitionError> {
        if !self.phase.can_advance_to(next) {
            return Err(TransitionError { from: self.phase, to: next });
        }
        log::debug!("{}: {} -> {}", self.city, self.phase, next);
        self.phase = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_legal() {
        let mut t = PhaseTracker::new("Mumbai");
        for next in [CyclePhase::Fetching, CyclePhase::Reconciling, CyclePhase::Persisting, CyclePhase::Done] {
            t.advance(next).unwrap();
        }
        assert!(t.phase().is_terminal());
    }

    #[test]
    fn fetch_failure_skips_reconciling() {
        let mut t = PhaseTracker::new("Mumbai");
        t.advance(CyclePhase::Fetching).unwrap();
        t.advance(CyclePhase::Failed).unwrap();
        assert_eq!(
            t.advance(CyclePhase::Reconciling),
            Err(TransitionError { from: CyclePhase::Failed, to: CyclePhase::Reconciling })
        );
    }

    #[test]
    fn phases_cannot_be_skipped() {
        assert!(!CyclePhase::Idle.can_advance_to(CyclePhase::Persisting));
        assert!(!CyclePhase::Fetching.can_advance_to(CyclePhase::Done));
        assert!(!CyclePhase::Idle.can_advance_to(CyclePhase::Failed));
        assert!(!CyclePhase::Done.can_advance_to(CyclePhase::Fetching));
    }
}
