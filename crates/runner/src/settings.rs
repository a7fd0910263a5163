use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use eventwatch_core::dates::{parse_utc_offset, DEFAULT_UTC_OFFSET};
use eventwatch_core::CitySet;
use eventwatch_recon::ReconPolicy;

/// Cycle-level retry for whole fetches. The adapter's own per-request
/// retries happen inside each attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `attempt + 1`: `min(base × 2^attempt, cap)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Everything the orchestrator needs, already validated by the caller.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub retry: RetryPolicy,
    pub fetch_timeout: Duration,
    pub storage_timeout: Duration,
    pub policy: ReconPolicy,
    pub supported: CitySet,
    /// Offset for scraped dates without one.
    pub local_offset: FixedOffset,
    pub max_parallel_cities: usize,
    /// Leave storage alone when a fetch returns nothing for a city that
    /// already has records.
    pub skip_empty_fetch: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            fetch_timeout: Duration::from_secs(300),
            storage_timeout: Duration::from_secs(60),
            policy: ReconPolicy::default(),
            supported: CitySet::default(),
            local_offset: parse_utc_offset(DEFAULT_UTC_OFFSET).unwrap_or_else(|| Utc.fix()),
            max_parallel_cities: 4,
            skip_empty_fetch: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        let retry = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(retry.delay_for(0), Duration::from_millis(100));
        assert_eq!(retry.delay_for(1), Duration::from_millis(200));
        assert_eq!(retry.delay_for(2), Duration::from_millis(400));
        assert_eq!(retry.delay_for(3), Duration::from_millis(500));
        assert_eq!(retry.delay_for(40), Duration::from_millis(500));
    }

    #[test]
    fn defaults_match_documented_values() {
        let s = RunSettings::default();
        assert_eq!(s.max_parallel_cities, 4);
        assert_eq!(s.fetch_timeout, Duration::from_secs(300));
        assert_eq!(s.local_offset.local_minus_utc(), 5 * 3600 + 30 * 60);
        assert!(s.skip_empty_fetch);
    }
}
