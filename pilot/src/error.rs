//! Runtime error taxonomy for leaf effects.

use thiserror::Error;

/// Faults a leaf can hit while driving its external effect.
///
/// These never propagate past the leaf boundary: `io::leaves` converts them
/// to FAILURE and records the first one in the shared context for the
/// summary report.
#[derive(Debug, Error)]
pub enum LeafError {
    /// Setup failed; the leaf keeps producing FAILURE for the rest of the run.
    #[error("setup failed: {0}")]
    Initialization(String),

    /// No external confirmation arrived within the configured bound.
    #[error("timed out: {0}")]
    EffectTimeout(String),

    /// The robot reported an explicit abnormal signal.
    #[error("abnormal signal: {0}")]
    ExternalSignal(String),
}
