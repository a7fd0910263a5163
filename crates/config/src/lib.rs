//! Configuration loading.
//!
//! Loaded from `~/.config/eventwatch/config.toml` (or `--config`). Every key
//! is optional; [`EventwatchConfig::validate`] runs on every load.

pub mod error;
pub mod settings;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use eventwatch_core::dates::{parse_utc_offset, DEFAULT_UTC_OFFSET};
use eventwatch_core::{City, CitySet};
use eventwatch_recon::ReconPolicy;

pub use error::ConfigError;
pub use settings::{
    EventwatchConfig, LifecycleSettings, LoggingSettings, RetrySettings, RunSection, SourcePlatform,
    SourceSettings, StorageBackend, StorageSettings, TimeoutSettings,
};

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

/// `<config dir>/eventwatch/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("eventwatch").join("config.toml"))
}

impl EventwatchConfig {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let config: EventwatchConfig =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path (must exist) or the default location
    /// (absent means defaults).
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml(&text)
    }

    /// Effective settings as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let supported = self.supported_set();
        if supported.is_empty() {
            return Err(ConfigError::invalid("supported_cities", "must list at least one city"));
        }
        for city in &self.cities {
            if supported.resolve(city).is_none() {
                return Err(ConfigError::invalid(
                    "cities",
                    format!("'{city}' is not in supported_cities"),
                ));
            }
        }

        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::invalid(
                "retry.max_delay_ms",
                format!(
                    "{} is smaller than retry.base_delay_ms ({})",
                    self.retry.max_delay_ms, self.retry.base_delay_ms
                ),
            ));
        }

        if self.timeouts.fetch_secs == 0 {
            return Err(ConfigError::invalid("timeouts.fetch_secs", "must be greater than 0"));
        }
        if self.timeouts.storage_secs == 0 {
            return Err(ConfigError::invalid("timeouts.storage_secs", "must be greater than 0"));
        }
        if self.source.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("source.request_timeout_secs", "must be greater than 0"));
        }
        if self.source.max_events == 0 {
            return Err(ConfigError::invalid("source.max_events", "must be at least 1"));
        }

        if parse_utc_offset(&self.lifecycle.utc_offset).is_none() {
            return Err(ConfigError::invalid(
                "lifecycle.utc_offset",
                format!("'{}' is not of the form +HH:MM", self.lifecycle.utc_offset),
            ));
        }

        if self.run.max_parallel_cities == 0 {
            return Err(ConfigError::invalid("run.max_parallel_cities", "must be at least 1"));
        }
        if self.run.interval_hours == 0 {
            return Err(ConfigError::invalid("run.interval_hours", "must be at least 1"));
        }

        for (city, url) in &self.source.city_urls {
            if supported.resolve(city).is_none() {
                return Err(ConfigError::invalid(
                    "source.city_urls",
                    format!("'{city}' is not in supported_cities"),
                ));
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::invalid(
                    "source.city_urls",
                    format!("'{url}' for {city} is not an http(s) URL"),
                ));
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::invalid(
                "logging.level",
                format!("'{}' is not one of {}", self.logging.level, LOG_LEVELS.join(", ")),
            ));
        }

        Ok(())
    }

    pub fn supported_set(&self) -> CitySet {
        CitySet::new(&self.supported_cities)
    }

    /// Cities to process: `requested` if non-empty, else `cities`. Names are
    /// resolved to their canonical spelling.
    pub fn resolve_cities(&self, requested: &[String]) -> Result<Vec<City>, ConfigError> {
        let supported = self.supported_set();
        let names = if requested.is_empty() { self.cities.as_slice() } else { requested };
        let mut out: Vec<City> = Vec::new();
        for name in names {
            let city = supported.resolve(name).ok_or_else(|| {
                ConfigError::invalid("cities", format!("'{name}' is not in supported_cities"))
            })?;
            if !out.contains(&city) {
                out.push(city);
            }
        }
        Ok(out)
    }

    pub fn recon_policy(&self) -> ReconPolicy {
        ReconPolicy {
            grace_cycles: self.lifecycle.grace_cycles,
            expiry_offset_days: self.lifecycle.expiry_offset_days,
            reactivation: self.lifecycle.reactivation,
        }
    }

    /// Validated offset; the default if called on an unvalidated config.
    pub fn local_offset(&self) -> FixedOffset {
        parse_utc_offset(&self.lifecycle.utc_offset)
            .or_else(|| parse_utc_offset(DEFAULT_UTC_OFFSET))
            .unwrap_or_else(|| Utc.fix())
    }

    /// Listing URL for a city, matched case-insensitively.
    pub fn city_url(&self, city: &City) -> Option<&str> {
        self.source
            .city_urls
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(city.as_str()))
            .map(|(_, url)| url.as_str())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.fetch_secs)
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.storage_secs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use eventwatch_recon::ReactivationPolicy;

    const FULL: &str = r#"
cities = ["mumbai", "Pune"]

[retry]
max_retries = 5
base_delay_ms = 500
max_delay_ms = 8000

[timeouts]
fetch_secs = 120
storage_secs = 30

[lifecycle]
grace_cycles = 1
expiry_offset_days = 1
reactivation = "keep_expired"
utc_offset = "+05:30"

[run]
max_parallel_cities = 2
skip_empty_fetch = false
interval_hours = 6

[storage]
backend = "csv"
dir = "/var/lib/eventwatch"

[source]
platform = "file"
fixtures_dir = "tests/fixtures"
rate_limit_delay_ms = 0

[source.city_urls]
Pune = "https://www.district.in/events/pune"

[logging]
level = "debug"
file = "logs/eventwatch.log"
"#;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = EventwatchConfig::from_toml("").unwrap();
        assert_eq!(config, EventwatchConfig::default());
        assert_eq!(config.cities, vec!["Mumbai", "Delhi", "Bangalore"]);
        assert_eq!(config.supported_cities.len(), 10);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.timeouts.fetch_secs, 300);
        assert_eq!(config.run.max_parallel_cities, 4);
        assert_eq!(config.storage.backend, StorageBackend::Excel);
        assert_eq!(config.source.max_events, 25);
        assert_eq!(config.city_url(&City::new_unchecked("Delhi")), Some(settings::DISTRICT_HOME));
    }

    #[test]
    fn full_file_parses() {
        let config = EventwatchConfig::from_toml(FULL).unwrap();
        assert_eq!(config.retry.base_delay_ms, 500);
        assert_eq!(config.lifecycle.reactivation, ReactivationPolicy::KeepExpired);
        assert!(!config.run.skip_empty_fetch);
        assert_eq!(config.storage.backend, StorageBackend::Csv);
        assert_eq!(config.source.platform, SourcePlatform::File);
        // Unset keys inside a present section keep their defaults.
        assert_eq!(config.source.max_events, 25);
        assert_eq!(config.logging.file, Some(PathBuf::from("logs/eventwatch.log")));

        let policy = config.recon_policy();
        assert_eq!(policy.grace_cycles, 1);
        assert_eq!(policy.expiry_offset_days, 1);
    }

    #[test]
    fn cities_resolve_to_canonical_names() {
        let config = EventwatchConfig::from_toml(FULL).unwrap();
        let cities = config.resolve_cities(&[]).unwrap();
        assert_eq!(cities, vec![City::new_unchecked("Mumbai"), City::new_unchecked("Pune")]);

        let picked = config.resolve_cities(&["PUNE".to_string(), "pune".to_string()]).unwrap();
        assert_eq!(picked, vec![City::new_unchecked("Pune")]);

        assert!(config.resolve_cities(&["Atlantis".to_string()]).is_err());
    }

    #[test]
    fn unsupported_city_is_rejected() {
        let err = EventwatchConfig::from_toml(r#"cities = ["Atlantis"]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { key: "cities", .. }));
        assert!(err.to_string().contains("Atlantis"));
    }

    #[test]
    fn unknown_key_names_the_key() {
        let err = EventwatchConfig::from_toml("[retry]\nmax_retrys = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("max_retrys"));
    }

    #[test]
    fn validation_rules() {
        let cases = [
            ("[retry]\nbase_delay_ms = 5000\nmax_delay_ms = 1000", "retry.max_delay_ms"),
            ("[timeouts]\nfetch_secs = 0", "timeouts.fetch_secs"),
            ("[timeouts]\nstorage_secs = 0", "timeouts.storage_secs"),
            ("[run]\nmax_parallel_cities = 0", "run.max_parallel_cities"),
            ("[run]\ninterval_hours = 0", "run.interval_hours"),
            ("[lifecycle]\nutc_offset = \"IST\"", "lifecycle.utc_offset"),
            ("[logging]\nlevel = \"loud\"", "logging.level"),
            ("[source.city_urls]\nMumbai = \"ftp://x\"", "source.city_urls"),
        ];
        for (input, expected) in cases {
            match EventwatchConfig::from_toml(input) {
                Err(ConfigError::Validation { key, .. }) => assert_eq!(key, expected, "{input}"),
                other => panic!("{input}: expected validation error, got {other:?}"),
            }
        }
    }

    #[test]
    fn explicit_missing_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EventwatchConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn explicit_path_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, FULL).unwrap();
        let config = EventwatchConfig::load(Some(&path)).unwrap();
        assert_eq!(config.run.interval_hours, 6);
    }

    #[test]
    fn effective_settings_render_back_to_toml() {
        let config = EventwatchConfig::from_toml(FULL).unwrap();
        let text = config.to_toml().unwrap();
        assert_eq!(EventwatchConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn local_offset_is_ist_by_default() {
        let config = EventwatchConfig::default();
        assert_eq!(config.local_offset().local_minus_utc(), 5 * 3600 + 30 * 60);
    }
}
