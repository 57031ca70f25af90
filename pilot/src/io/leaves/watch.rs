//! Observation leaves: context checks and camera-backed fall detection.

use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{debug, info};

use crate::error::LeafError;
use crate::io::blackboard::PersonState;
use crate::io::bus::command_topic;
use crate::plan::Status;

use super::Ctx;

/// Compare one context field against an expected value. A mismatch is an
/// ordinary FAILURE so a selector can branch on it; only a field nothing
/// writes is an error.
pub(super) struct ConditionState {
    field: String,
    expected: String,
}

impl ConditionState {
    pub(super) fn new(field: &str, expected: &str) -> Self {
        Self {
            field: field.to_string(),
            expected: expected.to_string(),
        }
    }

    pub(super) fn poll(&mut self, ctx: &Ctx) -> Result<Status, LeafError> {
        // Let signals already on the wire land before reading.
        thread::sleep(Duration::from_millis(ctx.config.timers.condition_settle_ms));
        match ctx.board.field(&self.field) {
            Some(value) => {
                debug!(field = %self.field, value = %value, expected = %self.expected, "condition read");
                if value == self.expected {
                    Ok(Status::Success)
                } else {
                    Ok(Status::Failure)
                }
            }
            None => Err(LeafError::Initialization(format!(
                "unknown context field '{}'",
                self.field
            ))),
        }
    }
}

/// Camera sweep for a person on the floor. The sweep itself always succeeds;
/// what it saw is left in the `person_state` field for a condition leaf.
pub(super) struct DetectFallState {
    started_at: Instant,
}

impl DetectFallState {
    pub(super) fn new() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    pub(super) fn start(&mut self, ctx: &Ctx) -> Result<(), LeafError> {
        ctx.board.begin_detection();
        ctx.bus.publish(
            &command_topic(&ctx.config.topic_header, "camera/start"),
            &json!({
                "frequency": ctx.config.camera.frequency,
                "angle": ctx.config.camera.angle,
                "width": ctx.config.camera.resolution_width,
                "height": ctx.config.camera.resolution_height,
            }),
        );
        self.started_at = Instant::now();
        debug!("fall detection sweep started");
        Ok(())
    }

    pub(super) fn poll(&mut self, ctx: &Ctx) -> Result<Status, LeafError> {
        let state = ctx.board.person_state();
        if state != PersonState::Nobody {
            info!(person_state = %state, "detection concluded");
            self.stop(ctx);
            return Ok(Status::Success);
        }
        if self.started_at.elapsed() >= Duration::from_millis(ctx.config.timers.detect_ms) {
            info!("detection window closed with nobody in view");
            self.stop(ctx);
            return Ok(Status::Success);
        }
        Ok(Status::Running)
    }

    fn stop(&self, ctx: &Ctx) {
        ctx.bus.publish(
            &command_topic(&ctx.config.topic_header, "camera/stop"),
            &json!({}),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{command_tails, rig};
    use super::super::Action;
    use crate::core::tick::Tick;
    use crate::plan::{Leaf, Status};
    use serde_json::json;
    use std::thread;
    use std::time::Duration;

    fn condition_leaf(field: &str, expected: &str) -> Leaf {
        Leaf::Condition {
            name: "branch".to_string(),
            field: field.to_string(),
            expected: expected.to_string(),
        }
    }

    #[test]
    fn condition_matches_the_field() {
        let rig = rig();
        rig.ctx.board.set_answer("yes");
        let mut action = Action::from_leaf(&condition_leaf("answer", "yes"), rig.ctx.clone());

        action.initialise();
        assert_eq!(action.update(), Status::Success);
    }

    #[test]
    fn condition_mismatch_fails_without_a_record() {
        let rig = rig();
        rig.ctx.board.set_answer("no");
        let mut action = Action::from_leaf(&condition_leaf("answer", "yes"), rig.ctx.clone());

        action.initialise();
        assert_eq!(action.update(), Status::Failure);
        assert!(rig.ctx.board.failure().is_none());
    }

    #[test]
    fn condition_on_unknown_field_is_an_error() {
        let rig = rig();
        let mut action = Action::from_leaf(&condition_leaf("battery", "full"), rig.ctx.clone());

        action.initialise();
        assert_eq!(action.update(), Status::Failure);

        let failure = rig.ctx.board.failure().expect("recorded");
        assert!(failure.message.contains("unknown context field"));
    }

    #[test]
    fn detection_latches_a_fallen_person() {
        let rig = rig();
        let leaf = Leaf::DetectFall {
            name: "sweep".to_string(),
        };
        let mut action = Action::from_leaf(&leaf, rig.ctx.clone());

        action.initialise();
        assert_eq!(action.update(), Status::Running);

        rig.ctx
            .board
            .apply_signal("fall", &json!({"fallen": 2, "not_fallen": 0}));
        assert_eq!(action.update(), Status::Success);
        assert_eq!(
            rig.ctx.board.field("person_state").as_deref(),
            Some("fallen")
        );
        assert_eq!(command_tails(&rig), vec!["camera/start", "camera/stop"]);
    }

    #[test]
    fn detection_window_closes_on_nobody() {
        let rig = rig();
        let leaf = Leaf::DetectFall {
            name: "sweep".to_string(),
        };
        let mut action = Action::from_leaf(&leaf, rig.ctx.clone());

        action.initialise();
        thread::sleep(Duration::from_millis(60));
        assert_eq!(action.update(), Status::Success);
        assert_eq!(
            rig.ctx.board.field("person_state").as_deref(),
            Some("nobody")
        );
        assert_eq!(command_tails(&rig), vec!["camera/start", "camera/stop"]);
    }
}
