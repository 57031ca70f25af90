//! Speech leaves: say a phrase, or ask and capture the reply.

use std::time::{Duration, Instant};

use serde_json::json;
use tracing::{debug, info};

use crate::error::LeafError;
use crate::io::blackboard::NO_ANSWER;
use crate::io::bus::command_topic;
use crate::plan::Status;

use super::Ctx;

pub(super) struct SpeakState {
    message: String,
    issued_at: Instant,
}

impl SpeakState {
    pub(super) fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            issued_at: Instant::now(),
        }
    }

    pub(super) fn start(&mut self, ctx: &Ctx) -> Result<(), LeafError> {
        ctx.board.begin_speech();
        ctx.bus.publish(
            &command_topic(&ctx.config.topic_header, "speak"),
            &super::speak_payload(&ctx.config, &self.message),
        );
        self.issued_at = Instant::now();
        debug!(message = %self.message, "speak issued");
        Ok(())
    }

    pub(super) fn poll(&mut self, ctx: &Ctx) -> Result<Status, LeafError> {
        if ctx.board.speech_done() {
            return Ok(Status::Success);
        }
        if self.issued_at.elapsed() >= Duration::from_millis(ctx.config.timers.speak_ms) {
            return Err(LeafError::EffectTimeout(format!(
                "no speech completion within {}ms",
                ctx.config.timers.speak_ms
            )));
        }
        Ok(Status::Running)
    }
}

/// Asking never fails: a silent user yields the `no answer` sentinel so a
/// later condition leaf can branch on it.
pub(super) struct AskState {
    question: String,
    issued_at: Instant,
}

impl AskState {
    pub(super) fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
            issued_at: Instant::now(),
        }
    }

    pub(super) fn start(&mut self, ctx: &Ctx) -> Result<(), LeafError> {
        ctx.board.clear_response();
        ctx.bus.publish(
            &command_topic(&ctx.config.topic_header, "listen"),
            &json!({"text": self.question}),
        );
        self.issued_at = Instant::now();
        debug!(question = %self.question, "listening for an answer");
        Ok(())
    }

    pub(super) fn poll(&mut self, ctx: &Ctx) -> Result<Status, LeafError> {
        if let Some(reply) = ctx.board.take_response() {
            info!(answer = %reply, "answer captured");
            ctx.board.set_answer(&reply);
            return Ok(Status::Success);
        }
        if self.issued_at.elapsed() >= Duration::from_millis(ctx.config.timers.answer_ms) {
            info!("answer window closed without a reply");
            ctx.board.set_answer(NO_ANSWER);
            return Ok(Status::Success);
        }
        Ok(Status::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{command_tails, rig};
    use super::super::Action;
    use crate::core::tick::Tick;
    use crate::io::blackboard::NO_ANSWER;
    use crate::plan::{Leaf, Status};
    use serde_json::json;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn speak_succeeds_on_finished_signal() {
        let rig = rig();
        let leaf = Leaf::Speak {
            name: "greet".to_string(),
            message: "hello there".to_string(),
        };
        let mut action = Action::from_leaf(&leaf, rig.ctx.clone());

        action.initialise();
        assert_eq!(action.update(), Status::Running);

        rig.ctx.board.apply_signal("speech", &json!({"status": "0"}));
        assert_eq!(action.update(), Status::Success);
        assert_eq!(command_tails(&rig), vec!["speak"]);
    }

    #[test]
    fn speak_times_out_to_failure() {
        let rig = rig();
        let leaf = Leaf::Speak {
            name: "greet".to_string(),
            message: "hello there".to_string(),
        };
        let mut action = Action::from_leaf(&leaf, rig.ctx.clone());

        action.initialise();
        thread::sleep(Duration::from_millis(60));
        assert_eq!(action.update(), Status::Failure);

        let failure = rig.ctx.board.failure().expect("recorded");
        assert_eq!(failure.leaf, "greet");
        assert!(failure.message.contains("speech completion"));
    }

    #[test]
    fn ask_captures_the_reply() {
        let rig = rig();
        let leaf = Leaf::Ask {
            name: "check_in".to_string(),
            question: "how are you".to_string(),
        };
        let mut action = Action::from_leaf(&leaf, rig.ctx.clone());

        action.initialise();
        rig.ctx
            .board
            .apply_signal("response", &json!({"text": "fine thanks"}));
        assert_eq!(action.update(), Status::Success);
        assert_eq!(rig.ctx.board.field("answer").as_deref(), Some("fine thanks"));
        assert_eq!(command_tails(&rig), vec!["listen"]);
    }

    #[test]
    fn ask_closes_silently_with_the_sentinel() {
        let rig = rig();
        let leaf = Leaf::Ask {
            name: "check_in".to_string(),
            question: "how are you".to_string(),
        };
        let mut action = Action::from_leaf(&leaf, rig.ctx.clone());

        action.initialise();
        thread::sleep(Duration::from_millis(60));
        assert_eq!(action.update(), Status::Success);
        assert_eq!(rig.ctx.board.field("answer").as_deref(), Some(NO_ANSWER));
        assert!(rig.ctx.board.failure().is_none());
    }
}
