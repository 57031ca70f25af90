//! Dispatcher configuration (`dispatch.toml`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

/// Site-side dispatcher configuration (TOML).
///
/// Missing fields default to deployment values, same contract as the robot
/// config.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Intake poll timeout and process wait slice, in milliseconds.
    pub poll_interval_ms: u64,

    /// Total wall-clock allowance for one launched plan, in milliseconds.
    pub monitor_wait_ms: u64,

    /// Window for a terminal plan process to exit on its own before it is
    /// killed, in milliseconds.
    pub grace_ms: u64,

    /// Deadline for one certification run, in milliseconds.
    pub verify_wait_ms: u64,

    /// Topic prefix of the robot that receives clarification requests.
    pub robot_topic_header: String,

    pub launch: LaunchConfig,
    pub verify: VerifyConfig,
    pub paths: PathConfig,
    pub topics: TopicConfig,
}

/// Command that runs one stored plan. The artifact path is appended.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LaunchConfig {
    pub command: Vec<String>,
}

/// Command that certifies one candidate plan. The candidate path and
/// `--result <path>` are appended; the verdict is read from that file.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VerifyConfig {
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathConfig {
    /// Directory polled for candidate submissions.
    pub inbox_dir: PathBuf,
    /// Directory holding stored plan artifacts.
    pub artifact_dir: PathBuf,
    /// Directory receiving one output log per launched plan.
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TopicConfig {
    /// Candidate submissions from the plan producer.
    pub submit: String,
    /// Certified intake records, gate to supervisor.
    pub intake: String,
    /// Completion notices back to the producer.
    pub finished: String,
    /// Rejection and failure notices back to the producer.
    pub failed: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            monitor_wait_ms: 600_000,
            grace_ms: 2_000,
            verify_wait_ms: 30_000,
            robot_topic_header: "companion/unit0".to_string(),
            launch: LaunchConfig::default(),
            verify: VerifyConfig::default(),
            paths: PathConfig::default(),
            topics: TopicConfig::default(),
        }
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            command: vec!["pilot".to_string(), "run".to_string()],
        }
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            command: vec!["pilot".to_string(), "verify".to_string()],
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            inbox_dir: PathBuf::from("inbox"),
            artifact_dir: PathBuf::from("artifacts"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            submit: "plans/submit".to_string(),
            intake: "plans/intake".to_string(),
            finished: "plans/finished".to_string(),
            failed: "plans/failed".to_string(),
        }
    }
}

impl DispatchConfig {
    pub fn validate(&self) -> Result<()> {
        let timers = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("monitor_wait_ms", self.monitor_wait_ms),
            ("grace_ms", self.grace_ms),
            ("verify_wait_ms", self.verify_wait_ms),
        ];
        for (name, value) in timers {
            if value == 0 {
                return Err(anyhow!("{name} must be > 0"));
            }
        }
        if self.robot_topic_header.trim().is_empty() {
            return Err(anyhow!("robot_topic_header must be non-empty"));
        }
        if self.launch.command.is_empty() {
            return Err(anyhow!("launch.command must be non-empty"));
        }
        if self.verify.command.is_empty() {
            return Err(anyhow!("verify.command must be non-empty"));
        }
        let topics = [
            ("topics.submit", &self.topics.submit),
            ("topics.intake", &self.topics.intake),
            ("topics.finished", &self.topics.finished),
            ("topics.failed", &self.topics.failed),
        ];
        for (name, value) in topics {
            if value.trim().is_empty() {
                return Err(anyhow!("{name} must be non-empty"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `DispatchConfig::default()`.
pub fn load_config(path: &Path) -> Result<DispatchConfig> {
    if !path.exists() {
        let cfg = DispatchConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DispatchConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
