//! Stable exit codes for pilot CLI commands.
//!
//! The dispatcher keys its handling on these: OK deletes the plan artifact,
//! FAILED raises a failure notice, anything else keeps the watch going.

/// Plan ran to SUCCESS, or the candidate was certified.
pub const OK: i32 = 0;
/// Plan ran to FAILURE, or the candidate was rejected.
pub const FAILED: i32 = 1;
