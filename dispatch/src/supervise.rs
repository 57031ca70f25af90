//! Execution supervisor: runs admitted plans one at a time in queue order.
//!
//! The loop alternates between draining intake records and watching the
//! single active plan process. Exit code 0 completes the plan, exit code 1
//! fails it and parks dispatch until a correction arrives, and any other
//! report keeps the watch going until the monitor wait runs out. An overdue
//! plan is failed without being killed, so a robot mid-interaction is never
//! cut off.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use anyhow::Result;
use serde_json::to_value;
use tracing::{info, warn};

use pilot::exit_codes;
use pilot::io::bus::{Bus, Envelope};
use pilot::io::plan_store::{delete_artifact, parse_artifact_name};

use crate::config::DispatchConfig;
use crate::launch::{Launcher, PlanProcess, WaitOutcome};
use crate::notices::{CompletionNotice, FailureNotice, IntakeRecord};
use crate::queue::{Plan, PlanQueue};

struct ActivePlan {
    identifier: u64,
    process: Box<dyn PlanProcess>,
    deadline: Instant,
}

pub struct Supervisor<L> {
    config: Arc<DispatchConfig>,
    bus: Arc<Bus>,
    launcher: L,
    queue: PlanQueue,
    active: Option<ActivePlan>,
    /// Cleared while a plan runs and after a failure; a completion or a
    /// correction sets it again.
    idle: bool,
}

impl<L: Launcher> Supervisor<L> {
    pub fn new(config: Arc<DispatchConfig>, bus: Arc<Bus>, launcher: L) -> Self {
        Self {
            config,
            bus,
            launcher,
            queue: PlanQueue::new(),
            active: None,
            idle: true,
        }
    }

    #[cfg(test)]
    pub fn queue(&self) -> &PlanQueue {
        &self.queue
    }

    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        self.idle
    }

    /// One cycle: admit pending intake records, then monitor or dispatch.
    pub fn step(&mut self, intake: &Receiver<Envelope>) -> Result<()> {
        self.drain_intake(intake);
        if self.active.is_some() {
            self.monitor()
        } else {
            self.dispatch()
        }
    }

    fn drain_intake(&mut self, intake: &Receiver<Envelope>) {
        if self.active.is_none() {
            // Nothing to watch, so the poll interval paces the loop here.
            let poll = Duration::from_millis(self.config.poll_interval_ms);
            match intake.recv_timeout(poll) {
                Ok(envelope) => self.admit(envelope),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {}
            }
        }
        while let Ok(envelope) = intake.try_recv() {
            self.admit(envelope);
        }
    }

    fn admit(&mut self, envelope: Envelope) {
        let record: IntakeRecord = match serde_json::from_value(envelope.payload) {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, "dropping unreadable intake record");
                return;
            }
        };
        let Some((priority, identifier)) = parse_artifact_name(&record.task) else {
            warn!(task = %record.task, "dropping intake record with an invalid task name");
            return;
        };
        let correction = record.is_correction();
        self.queue.insert(Plan {
            identifier,
            priority,
            owner: record.user,
            artifact: self.config.paths.artifact_dir.join(&record.task),
            correction,
        });
        if correction {
            // A correction is the go-ahead after a failure.
            self.idle = true;
            info!(identifier, priority, "correction admitted, dispatch re-armed");
        } else {
            info!(identifier, priority, queued = self.queue.len(), "plan admitted");
        }
    }

    fn monitor(&mut self) -> Result<()> {
        let chunk = Duration::from_millis(self.config.poll_interval_ms);
        let (outcome, deadline) = match self.active.as_mut() {
            Some(active) => (active.process.wait(chunk)?, active.deadline),
            None => return Ok(()),
        };
        match outcome {
            WaitOutcome::Exited(Some(exit_codes::OK)) => self.complete(),
            WaitOutcome::Exited(Some(exit_codes::FAILED)) => {
                self.fail("plan exited with failure status")
            }
            WaitOutcome::Exited(code) => {
                // Not a verdict the plan runner produces; keep watching
                // until the monitor wait decides.
                warn!(?code, "unexpected exit report from plan process");
                Ok(())
            }
            WaitOutcome::StillRunning if Instant::now() >= deadline => self.expire(),
            WaitOutcome::StillRunning => Ok(()),
        }
    }

    fn complete(&mut self) -> Result<()> {
        let Some(mut active) = self.active.take() else {
            return Ok(());
        };
        active.process.shutdown(self.grace())?;
        let Some(plan) = self.queue.remove(active.identifier) else {
            warn!(identifier = active.identifier, "finished plan was not queued");
            self.idle = true;
            return Ok(());
        };
        delete_artifact(&plan.artifact)?;
        self.bus.publish(
            &self.config.topics.finished,
            &to_value(CompletionNotice::default())?,
        );
        info!(
            identifier = plan.identifier,
            owner = %plan.owner,
            remaining = self.queue.len(),
            "plan finished"
        );
        self.idle = true;
        Ok(())
    }

    fn fail(&mut self, cause: &str) -> Result<()> {
        let Some(mut active) = self.active.take() else {
            return Ok(());
        };
        active.process.shutdown(self.grace())?;
        self.report_failure(active.identifier, cause)
    }

    fn expire(&mut self) -> Result<()> {
        let Some(active) = self.active.take() else {
            return Ok(());
        };
        // No kill: the robot may be mid-interaction. The process is reaped
        // in the background whenever it does finish.
        active.process.abandon();
        let cause = format!(
            "plan did not finish within {}ms",
            self.config.monitor_wait_ms
        );
        self.report_failure(active.identifier, &cause)
    }

    /// Failure path shared by exit status 1 and monitor expiry. The plan
    /// artifact stays on disk for inspection, and `idle` stays cleared, so
    /// nothing else dispatches until a correction arrives.
    fn report_failure(&mut self, identifier: u64, cause: &str) -> Result<()> {
        let Some(plan) = self.queue.remove(identifier) else {
            return Ok(());
        };
        let filename = plan
            .artifact
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("plan")
            .to_string();
        let notice = FailureNotice {
            filename,
            error: cause.to_string(),
            user: plan.owner.clone(),
        };
        self.bus
            .publish(&self.config.topics.failed, &to_value(&notice)?);
        warn!(identifier, owner = %plan.owner, cause, "plan failed, dispatch parked");
        if !self.queue.is_empty() {
            info!(
                queued = self.queue.len(),
                "plans stay queued until a correction arrives"
            );
        }
        Ok(())
    }

    fn dispatch(&mut self) -> Result<()> {
        if !self.idle {
            return Ok(());
        }
        let Some(head) = self.queue.head() else {
            return Ok(());
        };
        let identifier = head.identifier;
        let artifact = head.artifact.clone();
        match self.launcher.launch(&artifact) {
            Ok(process) => {
                let deadline =
                    Instant::now() + Duration::from_millis(self.config.monitor_wait_ms);
                self.active = Some(ActivePlan {
                    identifier,
                    process,
                    deadline,
                });
                self.idle = false;
                info!(identifier, artifact = %artifact.display(), "plan launched");
            }
            Err(err) => {
                // The plan stays queued; the next cycle tries again.
                warn!(identifier, error = format!("{err:#}"), "plan launch failed");
            }
        }
        Ok(())
    }

    fn grace(&self) -> Duration {
        Duration::from_millis(self.config.grace_ms)
    }
}
