// Config file sections. Every key is optional; `Default` impls are the
// shipped defaults.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use eventwatch_core::dates::DEFAULT_UTC_OFFSET;
use eventwatch_core::DEFAULT_SUPPORTED_CITIES;
use eventwatch_recon::ReactivationPolicy;

pub const DEFAULT_CITIES: &[&str] = &["Mumbai", "Delhi", "Bangalore"];

pub const DISTRICT_HOME: &str = "https://www.district.in/";

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EventwatchConfig {
    /// Cities processed by `run` when no `--city` is given.
    pub cities: Vec<String>,
    /// Cities the deployment accepts at all (candidate records for other
    /// cities are rejected).
    pub supported_cities: Vec<String>,
    pub retry: RetrySettings,
    pub timeouts: TimeoutSettings,
    pub lifecycle: LifecycleSettings,
    pub run: RunSection,
    pub storage: StorageSettings,
    pub source: SourceSettings,
    pub logging: LoggingSettings,
}

impl Default for EventwatchConfig {
    fn default() -> Self {
        Self {
            cities: DEFAULT_CITIES.iter().map(|s| s.to_string()).collect(),
            supported_cities: DEFAULT_SUPPORTED_CITIES.iter().map(|s| s.to_string()).collect(),
            retry: RetrySettings::default(),
            timeouts: TimeoutSettings::default(),
            lifecycle: LifecycleSettings::default(),
            run: RunSection::default(),
            storage: StorageSettings::default(),
            source: SourceSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Cycle behaviour
// ---------------------------------------------------------------------------

/// Cycle-level fetch retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self { max_retries: 3, base_delay_ms: 1_000, max_delay_ms: 30_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutSettings {
    pub fetch_secs: u64,
    pub storage_secs: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self { fetch_secs: 300, storage_secs: 60 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LifecycleSettings {
    pub grace_cycles: u32,
    pub expiry_offset_days: i64,
    pub reactivation: ReactivationPolicy,
    /// Offset applied to scraped dates that carry no zone.
    pub utc_offset: String,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            grace_cycles: 3,
            expiry_offset_days: 0,
            reactivation: ReactivationPolicy::NewOccurrence,
            utc_offset: DEFAULT_UTC_OFFSET.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunSection {
    pub max_parallel_cities: usize,
    /// Leave a non-empty snapshot alone when a fetch returns nothing.
    pub skip_empty_fetch: bool,
    /// `watch` interval.
    pub interval_hours: u64,
}

impl Default for RunSection {
    fn default() -> Self {
        Self { max_parallel_cities: 4, skip_empty_fetch: true, interval_hours: 24 }
    }
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Excel,
    Csv,
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Excel => write!(f, "excel"),
            Self::Csv => write!(f, "csv"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { backend: StorageBackend::Excel, dir: PathBuf::from("data") }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourcePlatform {
    #[default]
    District,
    /// JSON fixtures on disk, one file per city.
    File,
}

impl std::fmt::Display for SourcePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::District => write!(f, "district"),
            Self::File => write!(f, "file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSettings {
    pub platform: SourcePlatform,
    pub request_timeout_secs: u64,
    /// Per-request retries inside the adapter (independent of `[retry]`).
    pub max_retries: u32,
    pub rate_limit_delay_ms: u64,
    pub max_events: usize,
    pub user_agent: String,
    pub fixtures_dir: PathBuf,
    /// Listing page per city.
    pub city_urls: BTreeMap<String, String>,
}

impl Default for SourceSettings {
    fn default() -> Self {
        let city_urls = DEFAULT_CITIES
            .iter()
            .map(|c| (c.to_string(), DISTRICT_HOME.to_string()))
            .collect();
        Self {
            platform: SourcePlatform::District,
            request_timeout_secs: 30,
            max_retries: 3,
            rate_limit_delay_ms: 2_000,
            max_events: 25,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            fixtures_dir: PathBuf::from("fixtures"),
            city_urls,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// `error`, `warn`, `info`, `debug` or `trace`.
    pub level: String,
    /// Append log lines here instead of stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string(), file: None }
    }
}
