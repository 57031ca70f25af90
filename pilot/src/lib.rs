//! Tick-driven plan runtime for a companion robot.
//!
//! A plan is a serialized behaviour tree: composites, a failure guard, and
//! leaf actions (move, speak, ask, call, alert, fall detection, condition
//! checks, the run summary). The architecture keeps a strict split:
//!
//! - **[`core`]**: Pure, deterministic logic (tick propagation, exhaustive
//!   certification). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (messaging, shared run context,
//!   leaf state machines, notifications, plan files).
//!
//! Orchestration modules ([`run`], [`certify`]) coordinate core logic with
//! I/O to implement the CLI commands.

pub mod certify;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod plan;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
