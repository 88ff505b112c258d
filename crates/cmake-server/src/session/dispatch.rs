//! Routes decoded server messages to waiters and listeners.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::SESSION_TARGET;
use super::handshake::{HandshakeSignal, Release};
use super::pending::PendingTable;
use crate::listener::ListenerRegistry;
use crate::protocol::ServerMessage;
use crate::transport::MessageConsumer;

/// State shared between a session and its dispatcher.
#[derive(Debug, Default)]
pub(crate) struct SessionShared {
    pub(crate) pending: PendingTable,
    pub(crate) handshake: HandshakeSignal,
    pub(crate) listeners: ListenerRegistry,
}

/// The consumer a session installs on its transport.
pub(crate) struct Dispatcher {
    shared: Arc<SessionShared>,
}

impl Dispatcher {
    pub(crate) const fn new(shared: Arc<SessionShared>) -> Self {
        Self { shared }
    }

    fn dispatch(&self, message: ServerMessage) {
        match message {
            ServerMessage::Closed => {
                self.shared.handshake.release(Release::Closed);
                let failed = self.shared.pending.close_all();
                debug!(
                    target: SESSION_TARGET,
                    failed,
                    "connection closed; failed outstanding requests"
                );
            }
            ServerMessage::Hello {
                supported_protocol_versions,
            } => {
                debug!(
                    target: SESSION_TARGET,
                    versions = ?supported_protocol_versions,
                    "received hello"
                );
                self.shared
                    .handshake
                    .record_versions(&supported_protocol_versions);
                self.shared.handshake.release(Release::Hello);
            }
            ServerMessage::Error {
                cookie,
                error_message,
                body,
            } => {
                self.shared
                    .handshake
                    .release(Release::ServerError(error_message));
                self.resolve(cookie, body);
            }
            ServerMessage::Reply { cookie, body } => self.resolve(cookie, body),
            ServerMessage::Message { title, message } => {
                self.shared.listeners.notify("message", |listener| {
                    listener.on_message(title.as_deref(), &message);
                });
            }
            ServerMessage::Progress(progress) => {
                self.shared.listeners.notify("progress", |listener| {
                    listener.on_progress(&progress);
                });
            }
            ServerMessage::FileChange { path, properties } => {
                self.shared.listeners.notify("fileChange", |listener| {
                    listener.on_file_change(&path, &properties);
                });
            }
            ServerMessage::Signal { name } => {
                self.shared.listeners.notify("signal", |listener| {
                    listener.on_signal(&name);
                });
            }
            ServerMessage::Unknown { kind } => {
                trace!(target: SESSION_TARGET, %kind, "ignoring unhandled message type");
            }
        }
    }

    fn resolve(&self, cookie: Option<String>, body: Value) {
        let Some(cookie) = cookie else {
            debug!(target: SESSION_TARGET, "dropping reply without cookie");
            return;
        };
        if !self.shared.pending.resolve(&cookie, body) {
            debug!(
                target: SESSION_TARGET,
                %cookie,
                "dropping reply for unknown or stale cookie"
            );
        }
    }
}

impl MessageConsumer for Dispatcher {
    fn consume(&self, message: Value) {
        match ServerMessage::parse(message) {
            Ok(parsed) => self.dispatch(parsed),
            Err(error) => warn!(
                target: SESSION_TARGET,
                %error,
                "skipping undecodable server message"
            ),
        }
    }
}
