// Human-readable tables for `run` and `show`.

use std::fmt::Write as _;

use chrono::FixedOffset;

use eventwatch_core::EventRecord;
use eventwatch_runner::{CycleOutcome, RunReport};

use crate::util::pad_right;

const CITY_WIDTH: usize = 12;

pub fn run_summary(report: &RunReport, dry_run: bool) -> String {
    let mut out = String::new();
    for cycle in &report.cycles {
        let mut line = format!("{} {}", pad_right(cycle.city.as_str(), CITY_WIDTH), cycle.outcome);
        if cycle.rejected > 0 {
            let _ = write!(line, " rejected={}", cycle.rejected);
        }
        if cycle.collisions > 0 {
            let _ = write!(line, " collisions={}", cycle.collisions);
        }
        if cycle.attempts > 1 {
            let _ = write!(line, " attempts={}", cycle.attempts);
        }
        let _ = writeln!(out, "{}", line.trim_end());
    }

    let elapsed = (report.finished_at - report.started_at).num_milliseconds();
    let _ = writeln!(
        out,
        "{} cities: {} succeeded, {} failed, {} skipped, {} cancelled ({} ms)",
        report.cycles.len(),
        report.succeeded(),
        report.failed(),
        report.skipped(),
        report.cancelled(),
        elapsed
    );
    if dry_run && report.cycles.iter().any(|c| matches!(c.outcome, CycleOutcome::Succeeded { .. })) {
        let _ = writeln!(out, "dry run: nothing was written");
    }
    out
}

const STATUS_WIDTH: usize = 8;
const DATE_WIDTH: usize = 16;
const NAME_WIDTH: usize = 36;
const VENUE_WIDTH: usize = 30;
const CATEGORY_WIDTH: usize = 12;

/// One row per record. Dates are shown in `offset` local time; unparsed
/// dates show the scraped text.
pub fn snapshot_table(records: &[EventRecord], offset: FixedOffset) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} {} {} {} {}",
        pad_right("STATUS", STATUS_WIDTH),
        pad_right("DATE", DATE_WIDTH),
        pad_right("NAME", NAME_WIDTH),
        pad_right("VENUE", VENUE_WIDTH),
        pad_right("CATEGORY", CATEGORY_WIDTH),
        "ID"
    );
    for r in records {
        let date = match r.date_time {
            Some(dt) => dt.with_timezone(&offset).format("%Y-%m-%d %H:%M").to_string(),
            None => r.raw_date.clone(),
        };
        let _ = writeln!(
            out,
            "{} {} {} {} {} {}",
            pad_right(r.status.as_str(), STATUS_WIDTH),
            pad_right(&date, DATE_WIDTH),
            pad_right(&r.name, NAME_WIDTH),
            pad_right(&r.venue, VENUE_WIDTH),
            pad_right(&r.category, CATEGORY_WIDTH),
            r.event_id
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use eventwatch_core::{City, EventStatus};
    use eventwatch_recon::ChangeReport;
    use eventwatch_runner::{CyclePhase, CycleReport};

    fn ist() -> FixedOffset {
        FixedOffset::east_opt(5 * 3600 + 1800).unwrap()
    }

    #[test]
    fn summary_lists_each_city_and_totals() {
        let now = Utc::now();
        let report = RunReport {
            started_at: now,
            finished_at: now,
            cycles: vec![
                CycleReport {
                    city: City::new_unchecked("Mumbai"),
                    outcome: CycleOutcome::Succeeded { report: ChangeReport { inserted: 2, total: 2, ..Default::default() } },
                    attempts: 2,
                    rejected: 1,
                    collisions: 0,
                    duration_ms: 10,
                },
                CycleReport {
                    city: City::new_unchecked("Delhi"),
                    outcome: CycleOutcome::Failed { phase: CyclePhase::Fetching, reason: "HTTP 403".into() },
                    attempts: 1,
                    rejected: 0,
                    collisions: 0,
                    duration_ms: 3,
                },
            ],
        };

        let text = run_summary(&report, false);

        assert!(text.contains("Mumbai"));
        assert!(text.contains("inserted=2"));
        assert!(text.contains("rejected=1 attempts=2"));
        assert!(text.contains("FAILED while fetching: HTTP 403"));
        assert!(text.contains("2 cities: 1 succeeded, 1 failed"));
        assert!(!text.contains("dry run"));
    }

    #[test]
    fn table_shows_local_time_or_raw_text() {
        let base = EventRecord {
            event_id: "0123456789ab".into(),
            name: "Anuv Jain".into(),
            date_time: Some(Utc.with_ymd_and_hms(2026, 12, 20, 14, 30, 0).unwrap()),
            raw_date: "2026-12-20T20:00:00+05:30".into(),
            date_unparsed: false,
            venue: "Jio World Garden".into(),
            city: City::new_unchecked("Mumbai"),
            category: "Music".into(),
            source_url: "https://www.district.in/events/anuv".into(),
            status: EventStatus::Active,
            last_updated: Utc::now(),
            source: "District".into(),
            missed_cycles: 0,
        };
        let undated = EventRecord { date_time: None, raw_date: "Coming soon".into(), date_unparsed: true, ..base.clone() };

        let text = snapshot_table(&[base, undated], ist());

        assert!(text.starts_with("STATUS"));
        assert!(text.contains("2026-12-20 20:00"));
        assert!(text.contains("Coming soon"));
        assert_eq!(text.lines().count(), 3);
    }
}
