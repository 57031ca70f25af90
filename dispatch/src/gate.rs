//! Intake gate: certify candidates, store them, announce them to the
//! supervisor.
//!
//! Clarification text is not a plan and short-circuits to the robot's
//! listen command. Everything else is written out, certified by the
//! configured verify command, and either admitted under
//! `task_<priority>_<identifier>.json` or reported back to the producer.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::json;
use tracing::{info, instrument, warn};
use wait_timeout::ChildExt;

use pilot::certify::{Report, read_report};
use pilot::io::bus::{Bus, command_topic};
use pilot::io::plan_store::artifact_name;

use crate::config::DispatchConfig;
use crate::notices::{Candidate, FailureNotice, IntakeRecord};

/// Queue priority for a candidate's owner.
pub fn priority_for(owner: &str) -> u32 {
    match owner {
        "emergency" => 3,
        "user" => 2,
        _ => 1,
    }
}

pub struct Gate {
    config: Arc<DispatchConfig>,
    bus: Arc<Bus>,
    next_identifier: u64,
}

impl Gate {
    pub fn new(config: Arc<DispatchConfig>, bus: Arc<Bus>) -> Self {
        Self {
            config,
            bus,
            next_identifier: 0,
        }
    }

    /// Process one candidate submission end to end.
    ///
    /// Returns `Ok` for both admitted and rejected candidates; `Err` means
    /// the gate itself could not run (verifier missing, disk trouble).
    #[instrument(skip_all, fields(owner = %candidate.user))]
    pub fn handle(&mut self, candidate: &Candidate) -> Result<()> {
        if let Some(text) = candidate.plan.as_str() {
            // The producer needs another exchange with the user before a
            // plan exists.
            info!("clarification request, forwarding to the robot");
            self.bus.publish(
                &command_topic(&self.config.robot_topic_header, "listen"),
                &json!({"text": text}),
            );
            return Ok(());
        }

        let identifier = self.next_identifier;
        self.next_identifier += 1;

        let candidate_path = self.store_candidate(identifier, candidate)?;
        let result_path = candidate_path.with_extension("result.json");
        let report = self.certify(&candidate_path, &result_path)?;

        match report {
            Report::Failed { error } => {
                // The stored candidate stays on disk for inspection.
                warn!(identifier, error, "candidate rejected");
                let notice = FailureNotice {
                    filename: file_name(&candidate_path),
                    error,
                    user: candidate.user.clone(),
                };
                self.bus
                    .publish(&self.config.topics.failed, &serde_json::to_value(&notice)?);
            }
            Report::Passed => {
                let priority = priority_for(&candidate.user);
                let task = artifact_name(priority, identifier);
                let artifact_path = self.config.paths.artifact_dir.join(&task);
                fs::rename(&candidate_path, &artifact_path).with_context(|| {
                    format!("store admitted plan {}", artifact_path.display())
                })?;
                info!(identifier, priority, task, "candidate admitted");
                let record = IntakeRecord::new(&task, &candidate.user, candidate.is_correction());
                self.bus
                    .publish(&self.config.topics.intake, &serde_json::to_value(&record)?);
            }
        }
        Ok(())
    }

    fn store_candidate(&self, identifier: u64, candidate: &Candidate) -> Result<PathBuf> {
        let dir = &self.config.paths.artifact_dir;
        fs::create_dir_all(dir)
            .with_context(|| format!("create artifact directory {}", dir.display()))?;
        let path = dir.join(format!("candidate_{identifier}.json"));
        let mut buf = serde_json::to_string_pretty(&candidate.plan)
            .context("serialize candidate plan")?;
        buf.push('\n');
        fs::write(&path, buf)
            .with_context(|| format!("write candidate {}", path.display()))?;
        Ok(path)
    }

    /// Run the configured verify command and consume its verdict file.
    fn certify(&self, plan_path: &Path, result_path: &Path) -> Result<Report> {
        let cmd = &self.config.verify.command;
        let mut child = Command::new(&cmd[0])
            .args(&cmd[1..])
            .arg(plan_path)
            .arg("--result")
            .arg(result_path)
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("spawn verifier {cmd:?}"))?;
        let deadline = Duration::from_millis(self.config.verify_wait_ms);
        if child
            .wait_timeout(deadline)
            .context("wait for verifier")?
            .is_none()
        {
            child.kill().ok();
            child.wait().context("wait for verifier after kill")?;
            bail!(
                "verifier did not finish within {}ms",
                self.config.verify_wait_ms
            );
        }
        // The verdict file is authoritative; the exit status is not read.
        let report = read_report(result_path)?;
        fs::remove_file(result_path)
            .with_context(|| format!("consume verdict {}", result_path.display()))?;
        Ok(report)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("candidate")
        .to_string()
}
