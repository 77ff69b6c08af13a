//! CLI Exit Code Registry
//!
//! Exit codes are part of the shell contract; batch scripts rely on them.
//!
//! | Code | Meaning                                                        |
//! |------|----------------------------------------------------------------|
//! | 0    | Success, including batches where some files were skipped      |
//! | 1    | Unrecoverable I/O (input folder unreadable, document not saved) |
//! | 2    | Usage error (bad arguments, invalid config file)               |
//!
//! Per-file problems (unreadable file, bad totals, chart failures) are
//! reported on stdout and never change the exit code.

/// Success - the batch ran to completion.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - the batch could not run or its document could not be written.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments or configuration. Matches clap's own code.
pub const EXIT_USAGE: u8 = 2;
