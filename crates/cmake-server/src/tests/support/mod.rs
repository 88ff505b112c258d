//! Shared fixtures and helpers for session and transport tests.

mod fake_server;
mod loopback;
mod recording_listener;

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use serde_json::{Value, json};

use crate::transport::MessageConsumer;

pub use fake_server::FakeServer;
pub use loopback::LoopbackTransport;
pub use recording_listener::{ListenerEvent, RecordingListener};

/// Consumer that records every value and lets tests wait for a count.
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Mutex<Vec<Value>>,
    arrived: Condvar,
}

impl MessageConsumer for MessageLog {
    fn consume(&self, message: Value) {
        self.messages
            .lock()
            .expect("message log mutex poisoned")
            .push(message);
        self.arrived.notify_all();
    }
}

impl MessageLog {
    /// Waits until at least `count` messages arrived or `timeout` elapsed,
    /// returning whatever was recorded.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<Value> {
        let guard = self.messages.lock().expect("message log mutex poisoned");
        let (messages, _) = self
            .arrived
            .wait_timeout_while(guard, timeout, |messages| messages.len() < count)
            .expect("message log mutex poisoned");
        messages.clone()
    }
}

/// The reply a well-behaved server sends for `request`.
#[must_use]
pub fn echo_reply(request: &Value) -> Value {
    json!({
        "type": "reply",
        "cookie": request["cookie"],
        "inReplyTo": request["type"],
    })
}

/// An error reply to `request` carrying `message`.
#[must_use]
pub fn error_reply(request: &Value, message: &str) -> Value {
    json!({
        "type": "error",
        "cookie": request["cookie"],
        "inReplyTo": request["type"],
        "errorMessage": message,
    })
}
