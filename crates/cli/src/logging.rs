// env_logger setup. Precedence: RUST_LOG, then -v/-q, then `[logging] level`.

use std::fs::{self, OpenOptions};
use std::path::Path;

use log::LevelFilter;

use crate::CliError;

/// Level after applying `-v` (repeatable) and `-q` to the configured level.
pub fn effective_level(configured: &str, verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    let base = configured.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
    match verbose {
        0 => base,
        1 => base.max(LevelFilter::Debug),
        _ => LevelFilter::Trace,
    }
}

/// Install the global logger. Writes to stderr, or appends to `file`.
pub fn init(level: LevelFilter, file: Option<&Path>) -> Result<(), CliError> {
    let env = env_logger::Env::default().default_filter_or(level.as_str().to_ascii_lowercase());
    let mut builder = env_logger::Builder::from_env(env);
    builder.format_target(false);

    if let Some(path) = file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| CliError::usage(format!("cannot create log directory {}: {}", parent.display(), e)))?;
        }
        let handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| CliError::usage(format!("cannot open log file {}: {}", path.display(), e)))?;
        builder.target(env_logger::Target::Pipe(Box::new(handle)));
    }

    // Already installed is fine.
    let _ = builder.try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_level() {
        assert_eq!(effective_level("info", 0, false), LevelFilter::Info);
        assert_eq!(effective_level("info", 1, false), LevelFilter::Debug);
        assert_eq!(effective_level("warn", 2, false), LevelFilter::Trace);
        assert_eq!(effective_level("trace", 1, false), LevelFilter::Trace);
    }

    #[test]
    fn quiet_wins() {
        assert_eq!(effective_level("debug", 2, true), LevelFilter::Error);
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        assert_eq!(effective_level("chatty", 0, false), LevelFilter::Info);
    }
}
