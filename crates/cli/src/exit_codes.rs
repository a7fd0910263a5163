//! CLI Exit Code Registry
//!
//! Single source of truth for `evw` exit codes. Scripts and schedulers rely
//! on them.
//!
//! | Code | Meaning                                             |
//! |------|-----------------------------------------------------|
//! | 0    | Success (every city succeeded, or was skipped)      |
//! | 1    | At least one city's cycle failed                    |
//! | 2    | Usage or configuration error                        |
//! | 3    | Storage error while reading a snapshot (`show`)     |
//! | 130  | Interrupted by Ctrl-C                               |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// At least one city failed. The others were still processed and saved.
pub const EXIT_CYCLE_FAILED: u8 = 1;

/// Usage error - bad arguments, unreadable or invalid config, unknown city.
pub const EXIT_USAGE: u8 = 2;

/// Stored snapshot could not be read.
pub const EXIT_STORAGE: u8 = 3;

/// Stopped by Ctrl-C (128 + SIGINT).
pub const EXIT_INTERRUPTED: u8 = 130;
