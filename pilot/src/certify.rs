//! Certification harness: verdict files for plan producers.
//!
//! Wraps [`crate::core::verify`] in the file protocol the dispatcher speaks:
//! read a candidate, evaluate it, write a verdict report. Every defect ends
//! as a FAILED report with a reason; this entry point never errors on bad
//! candidates, only on an unwritable verdict.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::core::verify::{self, Verdict};
use crate::io::plan_store::read_candidate;
use crate::plan::check_shape;

/// Verdict report exchanged with the submitting side.
///
/// Wire form: `{"result": "PASSED"}` or `{"result": "FAILED", "error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Report {
    Passed,
    Failed { error: String },
}

/// Certify one candidate file and write the verdict report.
#[instrument(skip_all, fields(plan = %plan_path.display()))]
pub fn certify_file(plan_path: &Path, result_path: &Path) -> Result<Report> {
    let report = evaluate(plan_path);
    match &report {
        Report::Passed => info!("plan certified"),
        Report::Failed { error } => info!(error, "plan rejected"),
    }
    write_report(result_path, &report)?;
    Ok(report)
}

fn evaluate(plan_path: &Path) -> Report {
    let plan = match read_candidate(plan_path) {
        Ok(plan) => plan,
        Err(err) => {
            return Report::Failed {
                error: format!("{err:#}"),
            };
        }
    };
    let findings = check_shape(&plan);
    if !findings.is_empty() {
        return Report::Failed {
            error: format!("plan shape check failed: {}", findings.join("; ")),
        };
    }
    match verify::certify(&plan) {
        Ok(Verdict::Accepted) => Report::Passed,
        Ok(Verdict::Rejected(rejection)) => Report::Failed {
            error: rejection.to_string(),
        },
        Err(error) => Report::Failed { error },
    }
}

fn write_report(path: &Path, report: &Report) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(report)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write verdict {}", path.display()))
}

/// Read a verdict report written by [`certify_file`].
pub fn read_report(path: &Path) -> Result<Report> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read verdict {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse verdict {}", path.display()))
}
