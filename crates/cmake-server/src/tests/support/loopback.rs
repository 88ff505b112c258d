//! In-memory transport answering requests through a closure.

use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::OnceCell;
use serde_json::{Value, json};

use crate::errors::TransportError;
use crate::protocol::ServerMessage;
use crate::transport::{MessageConsumer, Transport};

type Responder = dyn Fn(&Value) -> Vec<Value> + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Closed,
}

/// Transport that delivers scripted messages without a child process.
///
/// Replies produced by the responder are delivered on the sending thread
/// before `send` returns.
pub struct LoopbackTransport {
    consumer: OnceCell<Arc<dyn MessageConsumer>>,
    greeting: Vec<Value>,
    responder: Box<Responder>,
    sent: Mutex<Vec<Value>>,
    lifecycle: Mutex<Lifecycle>,
}

impl LoopbackTransport {
    /// A transport that sends nothing on start and never replies.
    #[must_use]
    pub fn new() -> Self {
        Self {
            consumer: OnceCell::new(),
            greeting: Vec::new(),
            responder: Box::new(|_| Vec::new()),
            sent: Mutex::new(Vec::new()),
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    /// A transport that greets with protocol version 1.1.
    #[must_use]
    pub fn greeting_v1() -> Self {
        Self::new().greeting([json!({
            "type": "hello",
            "supportedProtocolVersions": [{"major": 1, "minor": 1}]
        })])
    }

    /// Messages delivered as soon as the transport starts.
    #[must_use]
    pub fn greeting(mut self, messages: impl IntoIterator<Item = Value>) -> Self {
        self.greeting.extend(messages);
        self
    }

    /// Computes the messages delivered in response to each sent request.
    #[must_use]
    pub fn respond_with(
        mut self,
        responder: impl Fn(&Value) -> Vec<Value> + Send + Sync + 'static,
    ) -> Self {
        self.responder = Box::new(responder);
        self
    }

    /// Delivers `message` as if the server had sent it.
    pub fn deliver(&self, message: Value) {
        if let Some(consumer) = self.consumer.get() {
            consumer.consume(message);
        }
    }

    /// Every request sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Value> {
        self.sent.lock().expect("sent mutex poisoned").clone()
    }

    /// Whether `close` has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.lock_lifecycle() == Lifecycle::Closed
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().expect("lifecycle mutex poisoned")
    }
}

impl Transport for LoopbackTransport {
    fn set_consumer(&self, consumer: Arc<dyn MessageConsumer>) -> Result<(), TransportError> {
        self.consumer
            .set(consumer)
            .map_err(|_| TransportError::ConsumerAlreadyInstalled)
    }

    fn start(&self) -> Result<(), TransportError> {
        {
            let mut lifecycle = self.lock_lifecycle();
            if *lifecycle != Lifecycle::Idle {
                return Err(TransportError::AlreadyStarted);
            }
            if self.consumer.get().is_none() {
                return Err(TransportError::ConsumerMissing);
            }
            *lifecycle = Lifecycle::Running;
        }
        for message in &self.greeting {
            self.deliver(message.clone());
        }
        Ok(())
    }

    fn send(&self, message: &Value) -> Result<(), TransportError> {
        if *self.lock_lifecycle() != Lifecycle::Running {
            return Err(TransportError::NotRunning);
        }
        self.sent
            .lock()
            .expect("sent mutex poisoned")
            .push(message.clone());
        for reply in (self.responder)(message) {
            self.deliver(reply);
        }
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        let previous = std::mem::replace(&mut *self.lock_lifecycle(), Lifecycle::Closed);
        if previous == Lifecycle::Running {
            self.deliver(ServerMessage::closed_value());
        }
        Ok(())
    }
}

impl std::fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("greeting", &self.greeting)
            .field("lifecycle", &*self.lock_lifecycle())
            .finish_non_exhaustive()
    }
}
