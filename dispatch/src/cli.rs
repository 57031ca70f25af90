//! Subcommand implementations.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use serde_json::Value;
use tracing::{info, warn};

use pilot::io::bus::Bus;

use crate::config::{DispatchConfig, load_config};
use crate::gate::Gate;
use crate::launch::CommandLauncher;
use crate::notices::Candidate;
use crate::supervise::Supervisor;

/// Run the gate and the supervisor until the process is stopped.
pub fn serve(config_path: &Path) -> Result<()> {
    let config = Arc::new(load_config(config_path)?);
    let session = Local::now().format("dispatch-%Y%m%d_%H%M%S").to_string();
    info!(session, config = %config_path.display(), "dispatcher starting");

    for dir in [
        &config.paths.inbox_dir,
        &config.paths.artifact_dir,
        &config.paths.log_dir,
    ] {
        fs::create_dir_all(dir)
            .with_context(|| format!("create directory {}", dir.display()))?;
    }

    let bus = Arc::new(Bus::new());
    let submissions = bus.subscribe(&config.topics.submit);
    let intake = bus.subscribe(&config.topics.intake);
    let mut gate = Gate::new(config.clone(), bus.clone());
    let launcher = CommandLauncher::new(&config.launch.command, &config.paths.log_dir);
    let mut supervisor = Supervisor::new(config.clone(), bus.clone(), launcher);

    loop {
        sweep_inbox(&config, &bus)?;
        while let Ok(envelope) = submissions.try_recv() {
            match serde_json::from_value::<Candidate>(envelope.payload) {
                Ok(candidate) => {
                    if let Err(err) = gate.handle(&candidate) {
                        warn!(error = format!("{err:#}"), "candidate processing failed");
                    }
                }
                Err(err) => warn!(error = %err, "dropping malformed candidate"),
            }
        }
        supervisor.step(&intake)?;
    }
}

/// Publish waiting inbox files on the submit topic and consume them.
///
/// The inbox directory is the producer-facing edge; a deployment transport
/// would publish straight to the topic instead.
fn sweep_inbox(config: &DispatchConfig, bus: &Bus) -> Result<()> {
    let dir = &config.paths.inbox_dir;
    let mut waiting: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("read inbox {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    waiting.sort();

    for path in waiting {
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("read submission {}", path.display()))?;
        match serde_json::from_str::<Value>(&contents) {
            Ok(payload) => {
                bus.publish(&config.topics.submit, &payload);
                fs::remove_file(&path)
                    .with_context(|| format!("consume submission {}", path.display()))?;
            }
            Err(err) => {
                // Keep the file as evidence but stop retrying it.
                warn!(file = %path.display(), error = %err, "unreadable submission set aside");
                let aside = path.with_extension("json.bad");
                fs::rename(&path, &aside)
                    .with_context(|| format!("set aside {}", path.display()))?;
            }
        }
    }
    Ok(())
}

/// Package a plan file as a candidate and drop it into the serve inbox.
pub fn submit(plan_path: &Path, owner: &str, correction: bool, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let contents = fs::read_to_string(plan_path)
        .with_context(|| format!("read plan {}", plan_path.display()))?;
    let plan: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse plan {}", plan_path.display()))?;
    let candidate = Candidate::new(plan, owner, correction);

    fs::create_dir_all(&config.paths.inbox_dir)
        .with_context(|| format!("create inbox {}", config.paths.inbox_dir.display()))?;
    let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
    let path = config
        .paths
        .inbox_dir
        .join(format!("candidate_{stamp}.json"));
    let mut buf = serde_json::to_string_pretty(&candidate).context("serialize candidate")?;
    buf.push('\n');
    // Written under a name the sweep ignores, then renamed, so a serve
    // loop never picks up a half-written submission.
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, buf).with_context(|| format!("write submission {}", staging.display()))?;
    fs::rename(&staging, &path)
        .with_context(|| format!("publish submission {}", path.display()))?;
    println!("{}", path.display());
    Ok(())
}
