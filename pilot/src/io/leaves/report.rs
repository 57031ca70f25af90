//! Run summary leaf: speak a reminder, then relay the run outcome.

use std::fs;

use rand::seq::SliceRandom;
use tracing::{info, warn};

use crate::error::LeafError;
use crate::io::bus::command_topic;
use crate::plan::Status;

use super::Ctx;

/// Terminal leaf of every plan. Speaks one phrase drawn from the reminders
/// file, then mirrors the run: FAILURE when any earlier leaf recorded a
/// failure, SUCCESS otherwise.
pub(super) struct RemindState;

impl RemindState {
    pub(super) fn new() -> Self {
        Self
    }

    pub(super) fn start(&mut self, ctx: &Ctx) -> Result<(), LeafError> {
        let path = &ctx.config.reminders.file;
        let contents = fs::read_to_string(path).map_err(|err| {
            LeafError::Initialization(format!("read reminders file {path}: {err}"))
        })?;
        let phrases: Vec<&str> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        let phrase = phrases.choose(&mut rand::thread_rng()).ok_or_else(|| {
            LeafError::Initialization(format!("reminders file {path} is empty"))
        })?;
        ctx.bus.publish(
            &command_topic(&ctx.config.topic_header, "speak"),
            &super::speak_payload(&ctx.config, phrase),
        );
        info!(phrase, "reminder spoken");
        Ok(())
    }

    pub(super) fn poll(&mut self, ctx: &Ctx) -> Result<Status, LeafError> {
        match ctx.board.failure() {
            Some(record) => {
                warn!(leaf = %record.leaf, cause = %record.message, "run finished with a failure");
                Ok(Status::Failure)
            }
            None => Ok(Status::Success),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::{command_tails, rig_with};
    use super::super::Action;
    use crate::core::tick::Tick;
    use crate::plan::{Leaf, Status};
    use crate::test_support::reminders_file;

    fn remind_leaf() -> Leaf {
        Leaf::Remind {
            name: "wrap_up".to_string(),
        }
    }

    #[test]
    fn clean_run_reports_success() {
        let (dir, path) = reminders_file(&["drink some water", "stretch your legs"]);
        let mut cfg = super::super::testutil::fast_config();
        cfg.reminders.file = path;
        let rig = rig_with(cfg);
        let mut action = Action::from_leaf(&remind_leaf(), rig.ctx.clone());

        action.initialise();
        assert_eq!(action.update(), Status::Success);
        assert_eq!(command_tails(&rig), vec!["speak"]);
        drop(dir);
    }

    #[test]
    fn failed_run_reports_failure() {
        let (dir, path) = reminders_file(&["drink some water"]);
        let mut cfg = super::super::testutil::fast_config();
        cfg.reminders.file = path;
        let rig = rig_with(cfg);
        rig.ctx.board.record_failure("go_kitchen", "no arrival");
        let mut action = Action::from_leaf(&remind_leaf(), rig.ctx.clone());

        action.initialise();
        assert_eq!(action.update(), Status::Failure);
        drop(dir);
    }

    #[test]
    fn missing_reminders_file_fails_the_leaf() {
        let mut cfg = super::super::testutil::fast_config();
        cfg.reminders.file = "/nonexistent/reminders.txt".to_string();
        let rig = rig_with(cfg);
        let mut action = Action::from_leaf(&remind_leaf(), rig.ctx.clone());

        action.initialise();
        assert_eq!(action.update(), Status::Failure);

        let failure = rig.ctx.board.failure().expect("recorded");
        assert!(failure.message.contains("reminders file"));
    }
}
