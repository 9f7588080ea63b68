//! Stable exit codes for the `judge` CLI.

/// Every discovered test passed.
pub const OK: i32 = 0;
/// Setup failed (bad arguments, config, layout, missing fixture or reference file).
pub const INVALID: i32 = 1;
/// The run completed but at least one test did not pass.
pub const FAILED: i32 = 2;
