//! Process transport for the CMake server protocol.
//!
//! The transport owns the server process and the line framing. It knows
//! nothing about requests and replies: it writes framed JSON to the child's
//! stdin and hands every JSON value decoded from stdout to a single
//! [`MessageConsumer`], followed by one synthetic `{"type":"closed"}` value
//! when the stream ends.
//!
//! # Architecture
//!
//! - [`Transport`]: the contract the session layer is written against
//! - [`ProcessTransport`]: the implementation backed by a child process
//! - `reader`: the background thread decoding frames from stdout
//! - `lifecycle`: bounded termination of the child process

mod lifecycle;
mod process;
mod reader;

use std::sync::Arc;

use serde_json::Value;

use crate::errors::TransportError;

pub use process::ProcessTransport;

/// Log target for transport operations.
pub(crate) const TRANSPORT_TARGET: &str = "cmake_server::transport";

/// Receives every JSON value decoded by a transport.
///
/// Called on the transport's reader thread, in wire order.
pub trait MessageConsumer: Send + Sync {
    /// Handles one decoded value.
    fn consume(&self, message: Value);
}

impl<F> MessageConsumer for F
where
    F: Fn(Value) + Send + Sync,
{
    fn consume(&self, message: Value) {
        self(message);
    }
}

/// Moves framed JSON between the session and the server.
pub trait Transport: Send + Sync {
    /// Installs the consumer receiving decoded values.
    ///
    /// Must be called once, before [`Transport::start`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ConsumerAlreadyInstalled`] when a consumer
    /// is already present.
    fn set_consumer(&self, consumer: Arc<dyn MessageConsumer>) -> Result<(), TransportError>;

    /// Launches the server and begins delivering messages.
    ///
    /// # Errors
    ///
    /// Returns an error when the server cannot be launched, no consumer is
    /// installed, or the transport was already started.
    fn start(&self) -> Result<(), TransportError>;

    /// Frames and writes one message.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotRunning`] when the server or the reader
    /// has stopped, or an I/O error when the write fails.
    fn send(&self, message: &Value) -> Result<(), TransportError>;

    /// Stops the server and the reader. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error when the reader thread cannot be joined.
    fn close(&self) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn set_consumer(&self, consumer: Arc<dyn MessageConsumer>) -> Result<(), TransportError> {
        (**self).set_consumer(consumer)
    }

    fn start(&self) -> Result<(), TransportError> {
        (**self).start()
    }

    fn send(&self, message: &Value) -> Result<(), TransportError> {
        (**self).send(message)
    }

    fn close(&self) -> Result<(), TransportError> {
        (**self).close()
    }
}
