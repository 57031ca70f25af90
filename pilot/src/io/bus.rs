//! In-process message fabric.
//!
//! Topic-addressed publish/subscribe over std channels. This stands in for
//! the site broker: the runtime, the dispatcher, and tests all exchange JSON
//! envelopes through it, and a deployment transport would replace it behind
//! the same calls. Transport security and delivery guarantees are out of
//! scope here.

use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tracing::trace;

/// One published message.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub topic: String,
    pub payload: Value,
}

/// Topic bus with prefix subscriptions.
///
/// Publishing never blocks; subscriptions whose receiver was dropped are
/// pruned on the next matching publish.
#[derive(Default)]
pub struct Bus {
    subscriptions: Mutex<Vec<(String, Sender<Envelope>)>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `payload` to every subscriber whose prefix matches `topic`.
    pub fn publish(&self, topic: &str, payload: &Value) {
        trace!(topic, "publish");
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscriptions.retain(|(prefix, sender)| {
            if !topic.starts_with(prefix.as_str()) {
                return true;
            }
            sender
                .send(Envelope {
                    topic: topic.to_string(),
                    payload: payload.clone(),
                })
                .is_ok()
        });
    }

    /// Receive every future message whose topic starts with `prefix`.
    pub fn subscribe(&self, prefix: &str) -> Receiver<Envelope> {
        let (sender, receiver) = channel();
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((prefix.to_string(), sender));
        receiver
    }
}

/// Command topic (runtime to robot) under a robot's header.
pub fn command_topic(header: &str, tail: &str) -> String {
    format!("{header}/command/{tail}")
}

/// Signal topic (robot to runtime) under a robot's header.
pub fn signal_topic(header: &str, tail: &str) -> String {
    format!("{header}/signal/{tail}")
}
