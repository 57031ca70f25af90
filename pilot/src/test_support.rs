//! Test-only helpers: plan builders and a recording notifier.

use std::sync::{Mutex, PoisonError};

use anyhow::{Result, bail};

use crate::io::config::{RobotConfig, TimerConfig};
use crate::io::notify::Notifier;
use crate::plan::{Leaf, Node};

/// Config with timers short enough for real-time leaf tests.
pub fn fast_config() -> RobotConfig {
    RobotConfig {
        timers: TimerConfig {
            move_ms: 80,
            no_progress_ms: 30,
            pause_ms: 60,
            speak_ms: 50,
            answer_ms: 50,
            call_ms: 60,
            detect_ms: 50,
            condition_settle_ms: 1,
        },
        ..RobotConfig::default()
    }
}

/// Memory sequence with the given children.
pub fn sequence(name: &str, children: Vec<Node>) -> Node {
    Node::Sequence {
        name: name.to_string(),
        memory: true,
        children,
    }
}

/// Memory selector with the given children.
pub fn selector(name: &str, children: Vec<Node>) -> Node {
    Node::Selector {
        name: name.to_string(),
        memory: true,
        children,
    }
}

pub fn failure_is_success(name: &str, child: Node) -> Node {
    Node::FailureIsSuccess {
        name: name.to_string(),
        child: Box::new(child),
    }
}

pub fn move_leaf(name: &str, destination: &str) -> Node {
    Node::Leaf(Leaf::Move {
        name: name.to_string(),
        destination: destination.to_string(),
    })
}

pub fn speak_leaf(name: &str, message: &str) -> Node {
    Node::Leaf(Leaf::Speak {
        name: name.to_string(),
        message: message.to_string(),
    })
}

pub fn remind_leaf(name: &str) -> Node {
    Node::Leaf(Leaf::Remind {
        name: name.to_string(),
    })
}

/// Wrap a main branch in the executable root shape: guarded main branch plus
/// the summary leaf.
pub fn standard_plan(main: Node) -> Node {
    sequence(
        "root",
        vec![failure_is_success("main_guard", main), remind_leaf("report")],
    )
}

/// Write a reminders file under a fresh temp dir. Keep the returned dir alive
/// for the duration of the test.
pub fn reminders_file(lines: &[&str]) -> (tempfile::TempDir, String) {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("reminders.txt");
    std::fs::write(&path, lines.join("\n")).expect("write reminders");
    (temp, path.to_string_lossy().into_owned())
}

/// Notifier that records sends instead of talking to a relay.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String, String)>>,
    failure: Mutex<Option<String>>,
}

impl RecordingNotifier {
    /// Make every subsequent send fail with this message.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.to_string());
    }

    /// Everything sent so far, as `(to, subject, body)`.
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        if let Some(message) = self
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            bail!(message);
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}
