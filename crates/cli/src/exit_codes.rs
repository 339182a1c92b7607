//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                                   |
//! |------|-----------------------------------------------------------|
//! | 0    | Success                                                   |
//! | 1    | General error (unspecified)                               |
//! | 2    | CLI usage error (bad args, no input paths)                |
//! | 3    | Invalid run configuration                                 |
//! | 4    | Runtime failure (unreadable input, malformed CSV, write)  |
//! | 5    | Anomalies found and `--fail-on-anomaly` was given         |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Config failed to parse or validate (bad window, inverted date range).
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Input could not be read or loaded, or artifacts could not be written.
pub const EXIT_RUNTIME: u8 = 4;

/// At least one order was flagged and the caller asked to fail on it.
pub const EXIT_ANOMALIES: u8 = 5;
