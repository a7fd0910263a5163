// evw - track event listings per city in a spreadsheet
// Runs fetch -> reconcile -> persist for each configured city.

mod exit_codes;
mod logging;
mod render;
mod util;
mod wiring;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use eventwatch_config::{ConfigError, EventwatchConfig};
use eventwatch_core::{EventRecord, EventStatus, StoragePort};
use eventwatch_runner::{Orchestrator, RunReport, Shutdown};

use exit_codes::{EXIT_CYCLE_FAILED, EXIT_INTERRUPTED, EXIT_STORAGE, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "evw")]
#[command(about = "Track event listings per city: fetch, reconcile, keep a spreadsheet current")]
#[command(version)]
struct Cli {
    /// Config file (default: <config dir>/eventwatch/config.toml)
    #[arg(long, short = 'c', global = true, env = "EVENTWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one cycle for each city
    #[command(after_help = "\
Examples:
  evw run                          # cities from config
  evw run --city Mumbai --city Pune
  evw run --json > report.json
  evw run --dry-run                # reconcile, but write nothing")]
    Run {
        /// City to process (repeatable; default: `cities` from config)
        #[arg(long = "city")]
        cities: Vec<String>,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,

        /// Keep results in memory instead of writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Repeat `run` on an interval until Ctrl-C
    #[command(after_help = "\
Examples:
  evw watch                        # every run.interval_hours
  evw watch --interval-hours 6")]
    Watch {
        /// Hours between runs (default: run.interval_hours from config)
        #[arg(long)]
        interval_hours: Option<u64>,

        /// Stop after this many runs
        #[arg(long)]
        runs: Option<u32>,
    },

    /// Load and validate the config, print the effective settings
    ValidateConfig,

    /// Print the stored snapshot for a city
    #[command(after_help = "\
Examples:
  evw show --city Mumbai
  evw show --city Mumbai --status expired
  evw show --city Delhi --json")]
    Show {
        #[arg(long)]
        city: String,

        /// Only records with this status (active, updated, expired)
        #[arg(long)]
        status: Option<String>,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|config| {
        let level = logging::effective_level(&config.logging.level, cli.verbose, cli.quiet);
        logging::init(level, config.logging.file.as_deref())?;
        match cli.command {
            Commands::Run { cities, json, dry_run } => cmd_run(&config, &cities, json, dry_run),
            Commands::Watch { interval_hours, runs } => cmd_watch(&config, interval_hours, runs),
            Commands::ValidateConfig => cmd_validate_config(&config, cli.config.as_deref()),
            Commands::Show { city, status, json } => cmd_show(&config, &city, status.as_deref(), json),
        }
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_STORAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_CYCLE_FAILED, message: msg.into(), hint: None }
    }

    pub fn config(err: ConfigError) -> Self {
        let hint = match &err {
            ConfigError::Io { .. } => Some("check the --config path".to_string()),
            ConfigError::Validation { key, .. } if *key == "cities" => {
                Some("add the city to supported_cities or fix its spelling".to_string())
            }
            _ => None,
        };
        Self { code: EXIT_USAGE, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn load_config(path: Option<&Path>) -> Result<EventwatchConfig, CliError> {
    EventwatchConfig::load(path).map_err(CliError::config)
}

/// Ctrl-C requests shutdown; in-flight phases finish first.
fn install_interrupt(shutdown: &Shutdown) -> Result<(), CliError> {
    let handle = shutdown.clone();
    ctrlc::set_handler(move || handle.request())
        .map_err(|e| CliError::io(format!("cannot install Ctrl-C handler: {}", e)))
}

fn write_stdout(text: &str) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .and_then(|_| handle.flush())
        .map_err(|e| CliError::io(e.to_string()))
}

fn run_exit_code(report: &RunReport, shutdown: &Shutdown) -> u8 {
    if shutdown.is_requested() {
        EXIT_INTERRUPTED
    } else if report.failed() > 0 {
        EXIT_CYCLE_FAILED
    } else {
        EXIT_SUCCESS
    }
}

// ============================================================================
// run
// ============================================================================

fn cmd_run(config: &EventwatchConfig, requested: &[String], json: bool, dry_run: bool) -> Result<u8, CliError> {
    let cities = config.resolve_cities(requested).map_err(CliError::config)?;
    let source = wiring::source(config)?;
    let mut storage = wiring::storage(config);
    if dry_run {
        storage = Arc::new(wiring::DryRunStore::new(storage));
    }

    let shutdown = Shutdown::new();
    install_interrupt(&shutdown)?;

    let orchestrator = Orchestrator::new(wiring::run_settings(config), source, storage);
    let report = orchestrator.run(&cities, &shutdown);

    if json {
        let text = serde_json::to_string_pretty(&report).map_err(|e| CliError::io(e.to_string()))?;
        write_stdout(&format!("{}\n", text))?;
    } else {
        write_stdout(&render::run_summary(&report, dry_run))?;
    }

    Ok(run_exit_code(&report, &shutdown))
}

// ============================================================================
// watch
// ============================================================================

fn cmd_watch(config: &EventwatchConfig, interval_hours: Option<u64>, runs: Option<u32>) -> Result<u8, CliError> {
    let hours = interval_hours.unwrap_or(config.run.interval_hours);
    if hours == 0 {
        return Err(CliError::usage("--interval-hours must be at least 1"));
    }
    if runs == Some(0) {
        return Err(CliError::usage("--runs must be at least 1"));
    }
    let interval = Duration::from_secs(hours.saturating_mul(3600));

    let cities = config.resolve_cities(&[]).map_err(CliError::config)?;
    let orchestrator = Orchestrator::new(wiring::run_settings(config), wiring::source(config)?, wiring::storage(config));

    let shutdown = Shutdown::new();
    install_interrupt(&shutdown)?;

    let mut completed = 0u32;
    let last_code = loop {
        let report = orchestrator.run(&cities, &shutdown);
        write_stdout(&render::run_summary(&report, false))?;
        let code = run_exit_code(&report, &shutdown);
        completed += 1;

        if shutdown.is_requested() || runs.is_some_and(|n| completed >= n) {
            break code;
        }
        log::info!("next run in {}h", hours);
        if !shutdown.sleep(interval) {
            break code;
        }
    };

    if shutdown.is_requested() {
        log::info!("watch stopped after {} runs", completed);
        return Ok(EXIT_INTERRUPTED);
    }
    Ok(last_code)
}

// ============================================================================
// validate-config
// ============================================================================

fn cmd_validate_config(config: &EventwatchConfig, path: Option<&Path>) -> Result<u8, CliError> {
    let source = match path {
        Some(p) => p.display().to_string(),
        None => match eventwatch_config::default_config_path() {
            Some(p) if p.exists() => p.display().to_string(),
            _ => "built-in defaults".to_string(),
        },
    };
    let text = config.to_toml().map_err(CliError::config)?;
    write_stdout(&format!("# config OK ({})\n{}", source, text))?;
    Ok(EXIT_SUCCESS)
}

// ============================================================================
// show
// ============================================================================

fn cmd_show(config: &EventwatchConfig, city: &str, status: Option<&str>, json: bool) -> Result<u8, CliError> {
    let city = config
        .supported_set()
        .resolve(city)
        .ok_or_else(|| CliError::usage(format!("'{}' is not in supported_cities", city)))?;
    let status = match status {
        Some(s) => Some(
            EventStatus::parse(s)
                .ok_or_else(|| CliError::usage(format!("unknown status '{}'", s)).with_hint("use active, updated or expired"))?,
        ),
        None => None,
    };

    let storage = wiring::storage(config);
    let records: Vec<EventRecord> = storage
        .load(&city)
        .map_err(|e| CliError::storage(e.to_string()))?
        .into_iter()
        .filter(|r| status.map_or(true, |s| r.status == s))
        .collect();

    if json {
        let text = serde_json::to_string_pretty(&records).map_err(|e| CliError::io(e.to_string()))?;
        write_stdout(&format!("{}\n", text))?;
    } else {
        write_stdout(&render::snapshot_table(&records, config.local_offset()))?;
        log::info!("{}: {} records from {}", city, records.len(), storage.backend_name());
    }
    Ok(EXIT_SUCCESS)
}
