//! Movement leaf: drive to a destination and hold out for arrival.

use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{debug, info};

use crate::error::LeafError;
use crate::io::blackboard::{CODE_PAUSED, CODE_UNREACHABLE, MoveStatus};
use crate::io::bus::command_topic;
use crate::plan::Status;

use super::Ctx;

/// Poll interval inside the bounded pause wait.
const PAUSE_POLL: Duration = Duration::from_millis(20);

pub(super) struct MoveState {
    destination: String,
    issued_at: Instant,
    obstacle_since: Instant,
}

impl MoveState {
    pub(super) fn new(destination: &str) -> Self {
        Self {
            destination: destination.to_string(),
            issued_at: Instant::now(),
            obstacle_since: Instant::now(),
        }
    }

    pub(super) fn start(&mut self, ctx: &Ctx) -> Result<(), LeafError> {
        self.issue(ctx);
        Ok(())
    }

    fn issue(&mut self, ctx: &Ctx) {
        ctx.board.begin_move();
        ctx.bus.publish(
            &command_topic(&ctx.config.topic_header, "move"),
            &json!({
                "destination": self.destination,
                "speed": ctx.config.movement.speed,
            }),
        );
        self.issued_at = Instant::now();
        self.obstacle_since = Instant::now();
        debug!(destination = %self.destination, "move issued");
    }

    pub(super) fn poll(&mut self, ctx: &Ctx) -> Result<Status, LeafError> {
        // The user picked the robot up; start over with fresh timers.
        if ctx.board.take_interaction() {
            info!(destination = %self.destination, "repositioned by user, reissuing move");
            self.issue(ctx);
            return Ok(Status::Running);
        }

        if ctx.board.move_status() == Some(MoveStatus::Complete) {
            return Ok(Status::Success);
        }

        if let Some(code) = ctx.board.take_move_code() {
            if code == CODE_UNREACHABLE {
                return Err(LeafError::ExternalSignal(format!(
                    "destination '{}' unreachable (code {code})",
                    self.destination
                )));
            }
            if code == CODE_PAUSED {
                return self.pause_wait(ctx);
            }
        }

        if ctx.board.move_status() == Some(MoveStatus::ObstacleDetected) {
            if self.obstacle_since.elapsed()
                >= Duration::from_millis(ctx.config.timers.no_progress_ms)
            {
                return Err(LeafError::EffectTimeout(format!(
                    "no progress past an obstacle for {}ms",
                    ctx.config.timers.no_progress_ms
                )));
            }
        } else {
            self.obstacle_since = Instant::now();
        }

        if self.issued_at.elapsed() >= Duration::from_millis(ctx.config.timers.move_ms) {
            return Err(LeafError::EffectTimeout(format!(
                "no arrival at '{}' within {}ms",
                self.destination, ctx.config.timers.move_ms
            )));
        }

        Ok(Status::Running)
    }

    /// Bounded three-outcome wait after the robot reports a user pause.
    ///
    /// Blocks inside the tick on purpose: the pause dialog is modal for this
    /// plan, and the window is bounded by `timers.pause_ms`.
    fn pause_wait(&mut self, ctx: &Ctx) -> Result<Status, LeafError> {
        info!(destination = %self.destination, "move paused by user");
        ctx.bus.publish(
            &command_topic(&ctx.config.topic_header, "pause"),
            &json!({"options": ["yes", "no", "end"]}),
        );
        let deadline = Instant::now() + Duration::from_millis(ctx.config.timers.pause_ms);
        loop {
            if let Some(reply) = ctx.board.take_response() {
                let reply = reply.to_lowercase();
                if reply.contains("yes") || reply.contains("yeah") {
                    return Ok(Status::Success);
                }
                if reply.contains("no") {
                    self.issue(ctx);
                    return Ok(Status::Running);
                }
                if reply.contains("end") || reply.contains("finish") {
                    return Err(LeafError::ExternalSignal(
                        "run ended from the pause menu".to_string(),
                    ));
                }
            }
            if Instant::now() >= deadline {
                return Err(LeafError::EffectTimeout(format!(
                    "no pause decision within {}ms",
                    ctx.config.timers.pause_ms
                )));
            }
            thread::sleep(PAUSE_POLL);
        }
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

    fn move_leaf() -> Leaf {
        Leaf::Move {
            name: "go_kitchen".to_string(),
            destination: "kitchen".to_string(),
        }
    }

    #[test]
    fn succeeds_on_arrival_signal() {
        let rig = rig();
        let mut action = Action::from_leaf(&move_leaf(), rig.ctx.clone());

        action.initialise();
        assert_eq!(action.update(), Status::Running);

        rig.ctx
            .board
            .apply_signal("move", &json!({"status": "complete"}));
        assert_eq!(action.update(), Status::Success);
        assert_eq!(command_tails(&rig), vec!["move"]);
        assert!(rig.ctx.board.failure().is_none());
    }

    #[test]
    fn fails_and_records_on_overall_timeout() {
        let rig = rig();
        let mut action = Action::from_leaf(&move_leaf(), rig.ctx.clone());

        action.initialise();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(action.update(), Status::Failure);

        let failure = rig.ctx.board.failure().expect("recorded");
        assert_eq!(failure.leaf, "go_kitchen");
        assert!(failure.message.contains("no arrival"));
    }

    #[test]
    fn fails_when_an_obstacle_blocks_progress() {
        let rig = rig();
        let mut action = Action::from_leaf(&move_leaf(), rig.ctx.clone());

        action.initialise();
        rig.ctx
            .board
            .apply_signal("move", &json!({"status": "obstacle detected"}));
        thread::sleep(Duration::from_millis(40));
        assert_eq!(action.update(), Status::Failure);

        let failure = rig.ctx.board.failure().expect("recorded");
        assert!(failure.message.contains("obstacle"));
    }

    #[test]
    fn fails_on_unreachable_code() {
        let rig = rig();
        let mut action = Action::from_leaf(&move_leaf(), rig.ctx.clone());

        action.initialise();
        rig.ctx
            .board
            .apply_signal("move", &json!({"status": "going", "code": "1003"}));
        assert_eq!(action.update(), Status::Failure);

        let failure = rig.ctx.board.failure().expect("recorded");
        assert!(failure.message.contains("unreachable"));
    }

    #[test]
    fn interaction_signal_reissues_the_move() {
        let rig = rig();
        let mut action = Action::from_leaf(&move_leaf(), rig.ctx.clone());

        action.initialise();
        rig.ctx.board.apply_signal("interaction", &json!({}));
        assert_eq!(action.update(), Status::Running);
        assert_eq!(command_tails(&rig), vec!["move", "move"]);
    }

    #[test]
    fn pause_resume_answer_succeeds() {
        let rig = rig();
        let mut action = Action::from_leaf(&move_leaf(), rig.ctx.clone());

        action.initialise();
        rig.ctx
            .board
            .apply_signal("move", &json!({"status": "going", "code": "1005"}));
        rig.ctx
            .board
            .apply_signal("response", &json!({"text": "Yes"}));
        assert_eq!(action.update(), Status::Success);
        assert_eq!(command_tails(&rig), vec!["move", "pause"]);
    }

    #[test]
    fn pause_decline_reissues_and_keeps_running() {
        let rig = rig();
        let mut action = Action::from_leaf(&move_leaf(), rig.ctx.clone());

        action.initialise();
        rig.ctx
            .board
            .apply_signal("move", &json!({"status": "going", "code": "1005"}));
        rig.ctx
            .board
            .apply_signal("response", &json!({"text": "no"}));
        assert_eq!(action.update(), Status::Running);
        assert_eq!(command_tails(&rig), vec!["move", "pause", "move"]);
        assert!(rig.ctx.board.failure().is_none());
    }

    #[test]
    fn pause_end_request_fails() {
        let rig = rig();
        let mut action = Action::from_leaf(&move_leaf(), rig.ctx.clone());

        action.initialise();
        rig.ctx
            .board
            .apply_signal("move", &json!({"status": "going", "code": "1005"}));
        rig.ctx
            .board
            .apply_signal("response", &json!({"text": "end it"}));
        assert_eq!(action.update(), Status::Failure);

        let failure = rig.ctx.board.failure().expect("recorded");
        assert!(failure.message.contains("pause menu"));
    }

    #[test]
    fn pause_window_timeout_fails() {
        let rig = rig();
        let mut action = Action::from_leaf(&move_leaf(), rig.ctx.clone());

        action.initialise();
        rig.ctx
            .board
            .apply_signal("move", &json!({"status": "going", "code": "1005"}));
        assert_eq!(action.update(), Status::Failure);

        let failure = rig.ctx.board.failure().expect("recorded");
        assert!(failure.message.contains("pause decision"));
    }
}
