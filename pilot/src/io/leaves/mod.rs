//! Leaf action state machines.
//!
//! One closed kind enum dispatched through a single tick boundary. The
//! boundary owns the failure contract: any leaf error becomes FAILURE and is
//! recorded once on the shared context, never propagated upward.

mod contact;
mod motion;
mod report;
mod speech;
mod watch;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::tick::Tick;
use crate::error::LeafError;
use crate::io::blackboard::Blackboard;
use crate::io::bus::Bus;
use crate::io::config::RobotConfig;
use crate::io::notify::Notifier;
use crate::plan::{Leaf, Status};

use contact::{AlertState, CallState};
use motion::MoveState;
use report::RemindState;
use speech::{AskState, SpeakState};
use watch::{ConditionState, DetectFallState};

/// Shared handles every action works through.
#[derive(Clone)]
pub struct Ctx {
    pub bus: Arc<Bus>,
    pub board: Arc<Blackboard>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Arc<RobotConfig>,
}

/// Payload for a speak command, with the configured delivery parameters.
fn speak_payload(config: &RobotConfig, text: &str) -> serde_json::Value {
    serde_json::json!({
        "text": text,
        "volume": config.speech.volume,
        "animated": config.speech.animated,
    })
}

/// One leaf at runtime: declared name plus its state machine.
pub struct Action {
    name: String,
    ctx: Ctx,
    setup_failed: bool,
    kind: Kind,
}

enum Kind {
    Move(MoveState),
    Speak(SpeakState),
    Ask(AskState),
    Condition(ConditionState),
    Call(CallState),
    Alert(AlertState),
    DetectFall(DetectFallState),
    Remind(RemindState),
}

impl Action {
    /// Instantiate the state machine a plan leaf declares.
    pub fn from_leaf(leaf: &Leaf, ctx: Ctx) -> Self {
        let kind = match leaf {
            Leaf::Move { destination, .. } => Kind::Move(MoveState::new(destination)),
            Leaf::Speak { message, .. } => Kind::Speak(SpeakState::new(message)),
            Leaf::Ask { question, .. } => Kind::Ask(AskState::new(question)),
            Leaf::Condition {
                field, expected, ..
            } => Kind::Condition(ConditionState::new(field, expected)),
            Leaf::Call { contact, .. } => Kind::Call(CallState::new(contact)),
            Leaf::Alert {
                contact, message, ..
            } => Kind::Alert(AlertState::new(contact, message)),
            Leaf::DetectFall { .. } => Kind::DetectFall(DetectFallState::new()),
            Leaf::Remind { .. } => Kind::Remind(RemindState::new()),
        };
        Action {
            name: leaf.name().to_string(),
            ctx,
            setup_failed: false,
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Kind {
    fn start(&mut self, ctx: &Ctx) -> Result<(), LeafError> {
        match self {
            Kind::Move(state) => state.start(ctx),
            Kind::Speak(state) => state.start(ctx),
            Kind::Ask(state) => state.start(ctx),
            Kind::Condition(_) | Kind::Alert(_) => Ok(()),
            Kind::Call(state) => state.start(ctx),
            Kind::DetectFall(state) => state.start(ctx),
            Kind::Remind(state) => state.start(ctx),
        }
    }

    fn poll(&mut self, ctx: &Ctx) -> Result<Status, LeafError> {
        match self {
            Kind::Move(state) => state.poll(ctx),
            Kind::Speak(state) => state.poll(ctx),
            Kind::Ask(state) => state.poll(ctx),
            Kind::Condition(state) => state.poll(ctx),
            Kind::Call(state) => state.poll(ctx),
            Kind::Alert(state) => state.poll(ctx),
            Kind::DetectFall(state) => state.poll(ctx),
            Kind::Remind(state) => state.poll(ctx),
        }
    }
}

impl Tick for Action {
    fn initialise(&mut self) {
        debug!(leaf = %self.name, "initialise");
        self.setup_failed = false;
        if let Err(err) = self.kind.start(&self.ctx) {
            warn!(leaf = %self.name, error = %err, "leaf setup failed");
            self.ctx.board.record_failure(&self.name, &err.to_string());
            self.setup_failed = true;
        }
    }

    fn update(&mut self) -> Status {
        if self.setup_failed {
            return Status::Failure;
        }
        match self.kind.poll(&self.ctx) {
            Ok(status) => status,
            Err(err) => {
                warn!(leaf = %self.name, error = %err, "leaf failed");
                self.ctx.board.record_failure(&self.name, &err.to_string());
                Status::Failure
            }
        }
    }
}
