//! Error types for the transport, wire protocol, and session layers.

use std::io;

use thiserror::Error;

use crate::protocol::RequestKind;

/// Errors raised while managing the server process and its stdio pipes.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server executable could not be found.
    #[error("cmake server binary not found: {command}")]
    BinaryNotFound {
        /// The command that was not found.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The server process could not be launched.
    #[error("failed to launch cmake server process: {message}")]
    Launch {
        /// Description of the launch failure.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The reader thread or the server process has already terminated.
    #[error("cmake server is not running")]
    NotRunning,

    /// `start` was called on a transport that was already started.
    #[error("transport has already been started")]
    AlreadyStarted,

    /// `start` was called before a message consumer was installed.
    #[error("no message consumer installed before start")]
    ConsumerMissing,

    /// A second message consumer was offered.
    #[error("a message consumer is already installed")]
    ConsumerAlreadyInstalled,

    /// Reading from or writing to the server pipes failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An outbound message could not be serialised.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    /// The background reader thread panicked.
    #[error("reader thread panicked")]
    ReaderPanicked,
}

/// Errors raised while decoding frames received from the server.
///
/// These never reach callers of session verbs; the reader and dispatcher log
/// them and skip the offending frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The framed payload was not valid JSON.
    #[error("frame does not contain valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The message lacks a string `type` field.
    #[error("message has no string `type` field")]
    MissingType,

    /// The message has a known type but an unexpected shape.
    #[error("malformed `{kind}` message: {source}")]
    InvalidMessage {
        /// The `type` of the message.
        kind: String,
        /// The decoding failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors returned by [`crate::CMakeSession`] operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// No hello arrived within the handshake timeout.
    #[error("no hello from cmake server within {timeout_ms}ms")]
    HandshakeTimeout {
        /// The bound that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// The server never advertised a usable protocol version.
    #[error("cmake server handshake failed: {reason}")]
    HandshakeFailed {
        /// Why startup could not complete.
        reason: String,
    },

    /// The server answered the request with an `error` reply.
    #[error("cmake server rejected {request}: {message}")]
    Server {
        /// The request that failed.
        request: RequestKind,
        /// The server's literal `errorMessage`.
        message: String,
    },

    /// The connection closed while the request was outstanding.
    #[error("connection to cmake server closed while waiting for {request}")]
    ConnectionClosed {
        /// The request that was orphaned.
        request: RequestKind,
    },

    /// No reply arrived within the configured request timeout.
    #[error("{request} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request that timed out.
        request: RequestKind,
        /// The bound that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// Request parameters did not serialise to a JSON object, or used the
    /// reserved `cookie` or `type` fields.
    #[error("parameters for {request} must serialise to a JSON object without `cookie` or `type`")]
    InvalidParams {
        /// The request being built.
        request: RequestKind,
    },

    /// Request parameters could not be serialised.
    #[error("failed to encode {request} parameters: {source}")]
    Encode {
        /// The request being built.
        request: RequestKind,
        /// The serialisation failure.
        #[source]
        source: serde_json::Error,
    },

    /// The reply could not be decoded into the expected result type.
    #[error("failed to decode {request} reply: {source}")]
    Decode {
        /// The request whose reply was malformed.
        request: RequestKind,
        /// The decoding failure.
        #[source]
        source: serde_json::Error,
    },
}

impl SessionError {
    /// Returns the server's error text when the failure is a server rejection.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Server { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}
