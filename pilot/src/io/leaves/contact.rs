//! Contact leaves: video calls and out-of-band alerts.

use std::time::{Duration, Instant};

use serde_json::json;
use tracing::info;

use crate::error::LeafError;
use crate::io::bus::command_topic;
use crate::io::notify::{ALERT_SUBJECT, resolve_address, resolve_name};
use crate::plan::Status;

use super::Ctx;

pub(super) struct CallState {
    contact: String,
    peer: String,
    started_at: Instant,
}

impl CallState {
    pub(super) fn new(contact: &str) -> Self {
        Self {
            contact: contact.to_string(),
            peer: String::new(),
            started_at: Instant::now(),
        }
    }

    pub(super) fn start(&mut self, ctx: &Ctx) -> Result<(), LeafError> {
        self.peer = resolve_name(&ctx.config.contacts, &self.contact).to_string();
        ctx.board.begin_call();
        ctx.bus.publish(
            &command_topic(&ctx.config.topic_header, "call/start"),
            &json!({"peer": self.peer}),
        );
        self.started_at = Instant::now();
        info!(peer = %self.peer, "video call started");
        Ok(())
    }

    pub(super) fn poll(&mut self, ctx: &Ctx) -> Result<Status, LeafError> {
        if ctx.board.call_ended() {
            self.stop(ctx);
            return Ok(Status::Success);
        }
        if self.started_at.elapsed() >= Duration::from_millis(ctx.config.timers.call_ms) {
            info!(peer = %self.peer, "call window elapsed, hanging up");
            self.stop(ctx);
            return Ok(Status::Success);
        }
        Ok(Status::Running)
    }

    fn stop(&self, ctx: &Ctx) {
        ctx.bus.publish(
            &command_topic(&ctx.config.topic_header, "call/stop"),
            &json!({"peer": self.peer}),
        );
    }
}

/// One-shot alert through the notifier. Resolution problems and transport
/// problems both fail the leaf, with the cause recorded for the run summary.
pub(super) struct AlertState {
    contact: String,
    message: String,
}

impl AlertState {
    pub(super) fn new(contact: &str, message: &str) -> Self {
        Self {
            contact: contact.to_string(),
            message: message.to_string(),
        }
    }

    pub(super) fn poll(&mut self, ctx: &Ctx) -> Result<Status, LeafError> {
        let address = resolve_address(&ctx.config.contacts, &self.contact)
            .map_err(|err| LeafError::Initialization(err.to_string()))?;
        ctx.notifier
            .send(&address, ALERT_SUBJECT, &self.message)
            .map_err(|err| {
                LeafError::ExternalSignal(format!("notification send failed: {err:#}"))
            })?;
        info!(contact = %self.contact, "alert delivered");
        Ok(Status::Success)
    }
}
