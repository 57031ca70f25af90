//! Robot-side configuration (`robot.toml`).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Runtime configuration for one robot (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to deployment values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RobotConfig {
    /// Topic prefix for this robot on the message fabric.
    pub topic_header: String,

    /// Interval between external ticks of the plan root, in milliseconds.
    pub tick_interval_ms: u64,

    pub timers: TimerConfig,
    pub movement: MovementConfig,
    pub speech: SpeechConfig,
    pub camera: CameraConfig,
    pub contacts: ContactConfig,
    pub reminders: ReminderConfig,
    pub smtp: SmtpConfig,
}

/// Bounds for the leaf state machines, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimerConfig {
    /// Overall deadline for one movement.
    pub move_ms: u64,
    /// How long an obstacle may block progress before the movement fails.
    pub no_progress_ms: u64,
    /// Window for the pause-menu decision during a movement.
    pub pause_ms: u64,
    /// Deadline for the "finished speaking" confirmation.
    pub speak_ms: u64,
    /// Window for capturing an answer to a question.
    pub answer_ms: u64,
    /// Maximum video call duration.
    pub call_ms: u64,
    /// Fall-detection acquisition window.
    pub detect_ms: u64,
    /// Delay added to every condition tick to avoid busy-spin.
    pub condition_settle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MovementConfig {
    /// Speed level passed with every move command.
    pub speed: String,
}

/// Delivery parameters passed with every speak command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SpeechConfig {
    /// Speech volume in percent.
    pub volume: u32,
    /// Accompany speech with gestures.
    pub animated: bool,
}

/// Parameters for the fall-detection acquisition command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CameraConfig {
    /// Pictures per second during the acquisition window.
    pub frequency: u32,
    pub angle: i32,
    pub resolution_width: u32,
    pub resolution_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContactConfig {
    /// Contact name the `emergency` alias resolves to.
    pub emergency: String,
    /// Contact name to notification address.
    pub book: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReminderConfig {
    /// File with one reminder phrase per line.
    pub file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            topic_header: "companion/unit0".to_string(),
            tick_interval_ms: 100,
            timers: TimerConfig::default(),
            movement: MovementConfig::default(),
            speech: SpeechConfig::default(),
            camera: CameraConfig::default(),
            contacts: ContactConfig::default(),
            reminders: ReminderConfig::default(),
            smtp: SmtpConfig::default(),
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            move_ms: 300_000,
            no_progress_ms: 10_000,
            pause_ms: 60_000,
            speak_ms: 30_000,
            answer_ms: 20_000,
            call_ms: 300_000,
            detect_ms: 20_000,
            condition_settle_ms: 1_000,
        }
    }
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            speed: "medium".to_string(),
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            volume: 70,
            animated: true,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            frequency: 2,
            angle: 40,
            resolution_width: 640,
            resolution_height: 480,
        }
    }
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            emergency: "caretaker".to_string(),
            book: BTreeMap::new(),
        }
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            file: "reminders.txt".to_string(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 25,
            tls: false,
            username: String::new(),
            password: String::new(),
            from: "robot@example.com".to_string(),
        }
    }
}

impl RobotConfig {
    pub fn validate(&self) -> Result<()> {
        if self.topic_header.trim().is_empty() {
            return Err(anyhow!("topic_header must be non-empty"));
        }
        if self.tick_interval_ms == 0 {
            return Err(anyhow!("tick_interval_ms must be > 0"));
        }
        let timers = [
            ("timers.move_ms", self.timers.move_ms),
            ("timers.no_progress_ms", self.timers.no_progress_ms),
            ("timers.pause_ms", self.timers.pause_ms),
            ("timers.speak_ms", self.timers.speak_ms),
            ("timers.answer_ms", self.timers.answer_ms),
            ("timers.call_ms", self.timers.call_ms),
            ("timers.detect_ms", self.timers.detect_ms),
        ];
        for (name, value) in timers {
            if value == 0 {
                return Err(anyhow!("{name} must be > 0"));
            }
        }
        if self.speech.volume > 100 {
            return Err(anyhow!("speech.volume must be at most 100"));
        }
        if self.camera.frequency == 0 {
            return Err(anyhow!("camera.frequency must be > 0"));
        }
        if self.contacts.emergency.trim().is_empty() {
            return Err(anyhow!("contacts.emergency must be non-empty"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `RobotConfig::default()`.
pub fn load_config(path: &Path) -> Result<RobotConfig> {
    if !path.exists() {
        let cfg = RobotConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: RobotConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &RobotConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
