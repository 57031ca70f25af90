//! Shared execution context for one plan run.
//!
//! Two producers write here: the fabric subscriber applying inbound robot
//! signals, and the leaves themselves. All access goes through this API so
//! every field observes last-write-wins under the one lock; leaves never
//! touch fields directly.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};

/// Sentinel answer recorded when a question's window closes unanswered.
pub const NO_ANSWER: &str = "no answer";

/// Movement descriptor code for an unreachable destination.
pub const CODE_UNREACHABLE: &str = "1003";
/// Movement descriptor code for a user-requested pause.
pub const CODE_PAUSED: &str = "1005";

/// Movement states the robot reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStatus {
    /// Underway; also the mapping for any unrecognized report.
    Moving,
    Complete,
    ObstacleDetected,
    Abort,
    Reposing,
}

impl MoveStatus {
    fn from_wire(status: &str) -> Self {
        match status {
            "complete" => MoveStatus::Complete,
            "obstacle detected" => MoveStatus::ObstacleDetected,
            "abort" => MoveStatus::Abort,
            "reposing" => MoveStatus::Reposing,
            _ => MoveStatus::Moving,
        }
    }
}

/// Aggregated perception verdict for the detection window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersonState {
    #[default]
    Nobody,
    Fallen,
    NotFallen,
}

impl fmt::Display for PersonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PersonState::Nobody => "nobody",
            PersonState::Fallen => "fallen",
            PersonState::NotFallen => "not fallen",
        };
        f.write_str(label)
    }
}

/// First leaf failure of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub leaf: String,
    pub message: String,
}

#[derive(Default)]
struct Fields {
    move_status: Option<MoveStatus>,
    move_code: Option<String>,
    interaction: bool,
    speech_done: bool,
    response: Option<String>,
    answer: Option<String>,
    call_ended: bool,
    person_state: PersonState,
    person_state_latched: bool,
    failure: Option<FailureRecord>,
}

/// Mutex-guarded context store shared by the signal pump and the leaves.
#[derive(Default)]
pub struct Blackboard {
    inner: Mutex<Fields>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn fields(&self) -> MutexGuard<'_, Fields> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset movement state for a fresh move command.
    pub fn begin_move(&self) {
        let mut fields = self.fields();
        fields.move_status = None;
        fields.move_code = None;
        fields.interaction = false;
    }

    pub fn move_status(&self) -> Option<MoveStatus> {
        self.fields().move_status
    }

    /// Consume the pending movement descriptor code, if any.
    pub fn take_move_code(&self) -> Option<String> {
        self.fields().move_code.take()
    }

    /// Consume the repositioned-by-user latch.
    pub fn take_interaction(&self) -> bool {
        std::mem::take(&mut self.fields().interaction)
    }

    /// Reset the finished-speaking latch for a fresh speak command.
    pub fn begin_speech(&self) {
        self.fields().speech_done = false;
    }

    pub fn speech_done(&self) -> bool {
        self.fields().speech_done
    }

    /// Drop any stale response so a question only sees fresh input.
    pub fn clear_response(&self) {
        self.fields().response = None;
    }

    /// Consume the pending user response, if any.
    pub fn take_response(&self) -> Option<String> {
        self.fields().response.take()
    }

    pub fn set_answer(&self, answer: &str) {
        self.fields().answer = Some(answer.to_string());
    }

    /// Reset the call-ended latch for a fresh call.
    pub fn begin_call(&self) {
        self.fields().call_ended = false;
    }

    pub fn call_ended(&self) -> bool {
        self.fields().call_ended
    }

    /// Reset the perception verdict for a fresh detection window.
    pub fn begin_detection(&self) {
        let mut fields = self.fields();
        fields.person_state = PersonState::Nobody;
        fields.person_state_latched = false;
    }

    pub fn person_state(&self) -> PersonState {
        self.fields().person_state
    }

    /// Record a leaf failure; only the first of a run is kept.
    pub fn record_failure(&self, leaf: &str, message: &str) {
        let mut fields = self.fields();
        if fields.failure.is_some() {
            return;
        }
        fields.failure = Some(FailureRecord {
            leaf: leaf.to_string(),
            message: message.to_string(),
        });
    }

    pub fn failure(&self) -> Option<FailureRecord> {
        self.fields().failure.clone()
    }

    /// Named read for condition leaves. `None` means the field is unknown.
    pub fn field(&self, name: &str) -> Option<String> {
        let fields = self.fields();
        match name {
            "person_state" => Some(fields.person_state.to_string()),
            "answer" => Some(fields.answer.clone().unwrap_or_default()),
            _ => None,
        }
    }

    /// Apply one inbound robot signal. `tail` is the topic segment after the
    /// signal prefix.
    pub fn apply_signal(&self, tail: &str, payload: &Value) {
        match tail {
            "move" => self.apply_move(payload),
            "speech" => {
                if payload["status"] == "0" {
                    self.fields().speech_done = true;
                }
            }
            "response" => {
                if let Some(text) = payload["text"].as_str() {
                    self.fields().response = Some(text.to_string());
                }
            }
            "call" => {
                if payload["status"] == "ended" {
                    self.fields().call_ended = true;
                }
            }
            "interaction" => {
                self.fields().interaction = true;
            }
            "fall" => self.apply_fall(payload),
            _ => {
                debug!(tail, "unhandled signal topic");
            }
        }
    }

    fn apply_move(&self, payload: &Value) {
        let mut fields = self.fields();
        if let Some(status) = payload["status"].as_str() {
            let status = MoveStatus::from_wire(status);
            // A repose that flips straight to abort means the user picked the
            // robot up and repositioned it.
            if status == MoveStatus::Abort && fields.move_status == Some(MoveStatus::Reposing) {
                fields.interaction = true;
            }
            fields.move_status = Some(status);
        }
        if let Some(code) = payload["code"].as_str() {
            fields.move_code = Some(code.to_string());
        }
    }

    fn apply_fall(&self, payload: &Value) {
        let mut fields = self.fields();
        if fields.person_state_latched {
            return;
        }
        let fallen = payload["fallen"].as_u64().unwrap_or(0);
        let not_fallen = payload["not_fallen"].as_u64().unwrap_or(0);
        let state = if fallen > 0 {
            PersonState::Fallen
        } else if not_fallen > 0 {
            PersonState::NotFallen
        } else {
            PersonState::Nobody
        };
        if state != fields.person_state {
            debug!(state = %state, "person state updated");
        }
        fields.person_state = state;
        if state != PersonState::Nobody {
            fields.person_state_latched = true;
        }
    }
}

/// Drain a signal receiver into the blackboard until the bus side closes.
///
/// Runs on its own thread for the lifetime of a plan run; trailing messages
/// after process exit are simply lost, matching the at-most-once expectations
/// of the signal topics.
pub fn pump_signals(
    board: &Blackboard,
    signal_prefix: &str,
    receiver: &std::sync::mpsc::Receiver<super::bus::Envelope>,
) {
    for envelope in receiver.iter() {
        match envelope.topic.strip_prefix(signal_prefix) {
            Some(tail) => board.apply_signal(tail, &envelope.payload),
            None => {
                warn!(topic = %envelope.topic, "signal outside the subscribed prefix");
            }
        }
    }
}
