//! Launching plan-runner processes and relaying their output.
//!
//! The launched process owns the robot session; the dispatcher only watches
//! its exit status. Stdout is relayed line by line to the dispatcher's own
//! stdout and appended, timestamped, to a per-plan log file.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Local;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// One observation of a launched plan process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Process exited; `None` means it was terminated by a signal.
    Exited(Option<i32>),
    StillRunning,
}

/// Handle on one launched plan process.
pub trait PlanProcess: Send {
    /// Wait up to `timeout` for the process to exit.
    fn wait(&mut self, timeout: Duration) -> Result<WaitOutcome>;

    /// Let the process finish within `grace`, then force a kill. Joins the
    /// output relay.
    fn shutdown(&mut self, grace: Duration) -> Result<()>;

    /// Walk away without killing. The exit is reaped in the background so
    /// the process cannot become a zombie.
    fn abandon(self: Box<Self>);
}

/// Launches the plan-runner command for one stored artifact.
pub trait Launcher {
    fn launch(&self, artifact: &Path) -> Result<Box<dyn PlanProcess>>;
}

pub struct CommandLauncher {
    command: Vec<String>,
    log_dir: PathBuf,
}

impl CommandLauncher {
    pub fn new(command: &[String], log_dir: &Path) -> Self {
        Self {
            command: command.to_vec(),
            log_dir: log_dir.to_path_buf(),
        }
    }
}

impl Launcher for CommandLauncher {
    fn launch(&self, artifact: &Path) -> Result<Box<dyn PlanProcess>> {
        if self.command.is_empty() {
            bail!("launch command must be non-empty");
        }
        let mut child = Command::new(&self.command[0])
            .args(&self.command[1..])
            .arg(artifact)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("spawn plan runner {:?}", self.command))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("plan runner stdout was not piped"))?;

        fs::create_dir_all(&self.log_dir)
            .with_context(|| format!("create log directory {}", self.log_dir.display()))?;
        let log_path = self.log_dir.join(log_name(artifact));
        let log = File::create(&log_path)
            .with_context(|| format!("create plan log {}", log_path.display()))?;
        let relay = thread::spawn(move || relay_output(stdout, log));

        Ok(Box::new(ChildProcess {
            child,
            exit_code: None,
            relay: Some(relay),
        }))
    }
}

fn log_name(artifact: &Path) -> String {
    let stem = artifact
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("plan");
    format!("{stem}.log")
}

/// Print each line as it arrives and append it, timestamped, to the log.
fn relay_output(stdout: ChildStdout, log: File) {
    let mut log = Some(log);
    for line in BufReader::new(stdout).lines() {
        let Ok(line) = line else { break };
        println!("{line}");
        if let Some(file) = log.as_mut() {
            let stamp = Local::now().format("[%H:%M:%S%.3f]");
            if let Err(err) = writeln!(file, "{stamp} {line}") {
                warn!(error = %err, "plan log write failed, relay continues on stdout");
                log = None;
            }
        }
    }
}

struct ChildProcess {
    child: Child,
    /// Exit code once the child has been reaped; a child may be waited on
    /// only once.
    exit_code: Option<Option<i32>>,
    relay: Option<JoinHandle<()>>,
}

impl PlanProcess for ChildProcess {
    fn wait(&mut self, timeout: Duration) -> Result<WaitOutcome> {
        if let Some(code) = self.exit_code {
            return Ok(WaitOutcome::Exited(code));
        }
        match self
            .child
            .wait_timeout(timeout)
            .context("wait for plan process")?
        {
            Some(status) => {
                self.exit_code = Some(status.code());
                Ok(WaitOutcome::Exited(status.code()))
            }
            None => Ok(WaitOutcome::StillRunning),
        }
    }

    fn shutdown(&mut self, grace: Duration) -> Result<()> {
        if self.exit_code.is_none() {
            match self
                .child
                .wait_timeout(grace)
                .context("grace wait for plan process")?
            {
                Some(status) => self.exit_code = Some(status.code()),
                None => {
                    warn!("plan process outlived its grace window, killing");
                    self.child.kill().context("kill plan process")?;
                    let status = self.child.wait().context("wait after kill")?;
                    self.exit_code = Some(status.code());
                }
            }
        }
        if let Some(relay) = self.relay.take() {
            if relay.join().is_err() {
                warn!("output relay thread panicked");
            }
        }
        Ok(())
    }

    fn abandon(mut self: Box<Self>) {
        if self.exit_code.is_some() {
            return;
        }
        thread::spawn(move || {
            match self.child.wait() {
                Ok(status) => debug!(code = ?status.code(), "abandoned plan process exited"),
                Err(err) => warn!(error = %err, "could not reap abandoned plan process"),
            }
            if let Some(relay) = self.relay.take() {
                relay.join().ok();
            }
        });
    }
}
