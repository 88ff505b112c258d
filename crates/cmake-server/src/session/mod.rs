//! Request/reply session on top of a [`Transport`].
//!
//! A session installs a dispatcher on its transport, waits for the server's
//! `hello`, and then exposes one blocking method per protocol verb. Each verb
//! tags its request with a fresh cookie, registers it in the pending table
//! before sending, and blocks until the reply carrying that cookie arrives,
//! the connection closes, or the optional request timeout elapses.
//!
//! Unsolicited events (`message`, `progress`, `signal`) are fanned out to
//! every registered [`ServerListener`].

mod dispatch;
mod handshake;
mod pending;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use self::dispatch::{Dispatcher, SessionShared};
use self::handshake::{HandshakeOutcome, Release};
use self::pending::{Resolution, TableClosed};
use crate::config::{ServerConfig, SessionConfig};
use crate::errors::SessionError;
use crate::listener::{ListenerId, ServerListener};
use crate::protocol::{
    CMakeCache, CMakeInputs, CodeModel, FileSystemWatchers, GlobalSettings, HandshakeParams,
    HandshakeRequest, ProtocolVersion, RequestKind,
};
use crate::transport::{ProcessTransport, Transport};

/// Log target for session operations.
pub(crate) const SESSION_TARGET: &str = "cmake_server::session";

/// A connected CMake server session.
///
/// Every method takes `&self`; a session may be shared between threads and
/// used by several callers at once. Replies are matched to callers by cookie,
/// so concurrent requests complete in whatever order the server answers them.
#[derive(Debug)]
pub struct CMakeSession<T: Transport = ProcessTransport> {
    transport: T,
    shared: Arc<SessionShared>,
    config: SessionConfig,
    protocol_versions: Vec<ProtocolVersion>,
}

impl CMakeSession<ProcessTransport> {
    /// Spawns the server described by `server` and starts a session on it.
    ///
    /// # Errors
    ///
    /// See [`CMakeSession::start_with_config`].
    pub fn spawn(server: ServerConfig, config: SessionConfig) -> Result<Self, SessionError> {
        Self::start_with_config(ProcessTransport::new(server), config)
    }
}

impl<T: Transport> CMakeSession<T> {
    /// Starts `transport` and waits for the server's greeting using the
    /// default [`SessionConfig`].
    ///
    /// # Errors
    ///
    /// See [`CMakeSession::start_with_config`].
    pub fn start(transport: T) -> Result<Self, SessionError> {
        Self::start_with_config(transport, SessionConfig::default())
    }

    /// Starts `transport` and waits up to the configured handshake timeout
    /// for the server to advertise its protocol versions.
    ///
    /// The transport is closed before any error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transport`] when the transport cannot start,
    /// [`SessionError::HandshakeTimeout`] when nothing arrives in time, and
    /// [`SessionError::HandshakeFailed`] when the connection closes, the
    /// server reports an error, or no protocol version is advertised.
    pub fn start_with_config(transport: T, config: SessionConfig) -> Result<Self, SessionError> {
        let shared = Arc::new(SessionShared::default());
        transport.set_consumer(Arc::new(Dispatcher::new(Arc::clone(&shared))))?;
        if let Err(error) = transport.start() {
            shutdown_quietly(&transport);
            return Err(error.into());
        }

        let versions = match shared.handshake.wait(config.handshake_timeout) {
            HandshakeOutcome::Released { versions, .. } if !versions.is_empty() => versions,
            HandshakeOutcome::Released { cause, .. } => {
                shutdown_quietly(&transport);
                return Err(SessionError::HandshakeFailed {
                    reason: describe_failed_release(&cause),
                });
            }
            HandshakeOutcome::TimedOut => {
                shutdown_quietly(&transport);
                return Err(SessionError::HandshakeTimeout {
                    timeout_ms: millis(config.handshake_timeout),
                });
            }
        };

        debug!(
            target: SESSION_TARGET,
            versions = ?versions,
            "cmake server session ready"
        );

        Ok(Self {
            transport,
            shared,
            config,
            protocol_versions: versions,
        })
    }

    /// Protocol versions from the server's `hello`, in the order advertised.
    #[must_use]
    pub fn supported_protocol_versions(&self) -> &[ProtocolVersion] {
        &self.protocol_versions
    }

    /// The transport this session drives.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// The configuration this session was started with.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of requests currently awaiting a reply.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    /// Selects the protocol version and the project to work on.
    ///
    /// The first version the server advertised is requested.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Server`] when the server rejects the
    /// directories or generator, or any error described on
    /// [`CMakeSession::configure`].
    pub fn handshake(&self, params: &HandshakeParams) -> Result<(), SessionError> {
        let version = self.protocol_versions.first().copied().ok_or_else(|| {
            SessionError::HandshakeFailed {
                reason: String::from("server advertised no protocol versions"),
            }
        })?;
        self.execute_unit(
            RequestKind::Handshake,
            &HandshakeRequest::new(version, params),
        )
    }

    /// Reads the server's global settings.
    ///
    /// # Errors
    ///
    /// See [`CMakeSession::configure`].
    pub fn global_settings(&self) -> Result<GlobalSettings, SessionError> {
        self.execute(RequestKind::GlobalSettings, &())
    }

    /// Sets one boolean global setting, e.g. `debugOutput` or `trace`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidParams`] when `name` is `cookie` or
    /// `type`, which the request envelope reserves. Otherwise see
    /// [`CMakeSession::configure`].
    pub fn set_global_setting(&self, name: &str, value: bool) -> Result<(), SessionError> {
        let mut body = Map::new();
        body.insert(name.to_owned(), Value::Bool(value));
        self.execute_unit(RequestKind::SetGlobalSettings, &body)
    }

    /// Runs the configure step.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Server`] carrying the server's error text when
    /// the request is rejected, [`SessionError::ConnectionClosed`] when the
    /// server goes away first, [`SessionError::RequestTimeout`] when a request
    /// timeout is configured and elapses, and [`SessionError::Transport`] when
    /// the request cannot be sent.
    pub fn configure(&self) -> Result<(), SessionError> {
        self.execute_unit(RequestKind::Configure, &())
    }

    /// Runs the configure step with cache overrides, sent as `-Dname=value`
    /// arguments ordered by name.
    ///
    /// # Errors
    ///
    /// See [`CMakeSession::configure`].
    pub fn configure_with<I, K, V>(&self, overrides: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let request = ConfigureRequest {
            cache_arguments: cache_arguments(overrides),
        };
        self.execute_unit(RequestKind::Configure, &request)
    }

    /// Runs the generate step.
    ///
    /// # Errors
    ///
    /// See [`CMakeSession::configure`].
    pub fn compute(&self) -> Result<(), SessionError> {
        self.execute_unit(RequestKind::Compute, &())
    }

    /// Fetches the code model of the computed project.
    ///
    /// # Errors
    ///
    /// See [`CMakeSession::configure`]; additionally
    /// [`SessionError::Decode`] when the reply has an unexpected shape.
    pub fn code_model(&self) -> Result<CodeModel, SessionError> {
        self.execute(RequestKind::CodeModel, &())
    }

    /// Fetches the files CMake read while configuring.
    ///
    /// # Errors
    ///
    /// See [`CMakeSession::code_model`].
    pub fn cmake_inputs(&self) -> Result<CMakeInputs, SessionError> {
        self.execute(RequestKind::CMakeInputs, &())
    }

    /// Fetches the cache contents.
    ///
    /// # Errors
    ///
    /// See [`CMakeSession::code_model`].
    pub fn cmake_cache(&self) -> Result<CMakeCache, SessionError> {
        self.execute(RequestKind::Cache, &())
    }

    /// Fetches the files and directories the server is watching.
    ///
    /// # Errors
    ///
    /// See [`CMakeSession::code_model`].
    pub fn file_system_watchers(&self) -> Result<FileSystemWatchers, SessionError> {
        self.execute(RequestKind::FileSystemWatchers, &())
    }

    /// Registers a listener for unsolicited events.
    pub fn add_listener(&self, listener: Arc<dyn ServerListener>) -> ListenerId {
        self.shared.listeners.add(listener)
    }

    /// Removes a listener. Returns `false` when `id` was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.shared.listeners.remove(id)
    }

    /// Closes the transport and fails every request still waiting.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Transport`] when the transport fails to close
    /// cleanly. Outstanding requests are failed either way.
    pub fn close(&self) -> Result<(), SessionError> {
        debug!(target: SESSION_TARGET, "closing cmake server session");
        let result = self.transport.close();
        self.shared.pending.close_all();
        result.map_err(SessionError::from)
    }

    fn execute_unit<P>(&self, kind: RequestKind, params: &P) -> Result<(), SessionError>
    where
        P: Serialize + ?Sized,
    {
        self.execute::<P, IgnoredAny>(kind, params).map(|_| ())
    }

    /// Sends one request and decodes its reply into `R`.
    ///
    /// `params` must serialise to a JSON object or to `null`, and must not
    /// set the envelope fields `cookie` or `type`.
    pub(crate) fn execute<P, R>(&self, kind: RequestKind, params: &P) -> Result<R, SessionError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let reply = self.round_trip(kind, build_body(kind, params)?)?;
        serde_json::from_value(reply).map_err(|source| SessionError::Decode {
            request: kind,
            source,
        })
    }

    fn round_trip(
        &self,
        kind: RequestKind,
        mut body: Map<String, Value>,
    ) -> Result<Value, SessionError> {
        let cookie = Uuid::new_v4().to_string();
        body.insert(String::from("cookie"), Value::String(cookie.clone()));
        body.insert(String::from("type"), Value::String(kind.as_str().to_owned()));

        let request = self
            .shared
            .pending
            .register(&cookie)
            .map_err(|TableClosed| SessionError::ConnectionClosed { request: kind })?;

        debug!(
            target: SESSION_TARGET,
            request = %kind,
            %cookie,
            "sending request"
        );
        if let Err(error) = self.transport.send(&Value::Object(body)) {
            self.shared.pending.remove(&cookie);
            return Err(error.into());
        }

        let resolution = request.wait(self.config.request_timeout);
        self.shared.pending.remove(&cookie);

        match resolution {
            Some(Resolution::Reply(reply)) => check_reply(kind, &cookie, reply),
            Some(Resolution::Closed) => Err(SessionError::ConnectionClosed { request: kind }),
            None => {
                let timeout_ms = self.config.request_timeout.map_or(0, millis);
                warn!(
                    target: SESSION_TARGET,
                    request = %kind,
                    %cookie,
                    timeout_ms,
                    "request timed out"
                );
                Err(SessionError::RequestTimeout {
                    request: kind,
                    timeout_ms,
                })
            }
        }
    }
}

/// Envelope fields every request carries.
const RESERVED_FIELDS: [&str; 2] = ["cookie", "type"];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigureRequest {
    cache_arguments: Vec<String>,
}

fn build_body<P>(kind: RequestKind, params: &P) -> Result<Map<String, Value>, SessionError>
where
    P: Serialize + ?Sized,
{
    let encoded = serde_json::to_value(params).map_err(|source| SessionError::Encode {
        request: kind,
        source,
    })?;
    match encoded {
        Value::Object(map) if RESERVED_FIELDS.iter().any(|field| map.contains_key(*field)) => {
            Err(SessionError::InvalidParams { request: kind })
        }
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(SessionError::InvalidParams { request: kind }),
    }
}

fn check_reply(kind: RequestKind, cookie: &str, reply: Value) -> Result<Value, SessionError> {
    if reply.get("type").and_then(Value::as_str) != Some("error") {
        debug!(target: SESSION_TARGET, request = %kind, cookie, "request completed");
        return Ok(reply);
    }
    let message = reply
        .get("errorMessage")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    debug!(
        target: SESSION_TARGET,
        request = %kind,
        cookie,
        error = %message,
        "server rejected request"
    );
    Err(SessionError::Server {
        request: kind,
        message,
    })
}

/// Renders cache overrides as `-Dname=value`, ordered by name.
fn cache_arguments<I, K, V>(overrides: I) -> Vec<String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    overrides
        .into_iter()
        .map(|(name, value)| (name.into(), value.into()))
        .collect::<BTreeMap<String, String>>()
        .into_iter()
        .map(|(name, value)| format!("-D{name}={value}"))
        .collect()
}

fn describe_failed_release(cause: &Release) -> String {
    match cause {
        Release::Hello => String::from("server advertised no protocol versions"),
        Release::ServerError(message) => {
            format!("server reported an error before greeting: {message}")
        }
        Release::Closed => String::from("connection closed before the server greeted"),
    }
}

fn shutdown_quietly<T: Transport>(transport: &T) {
    if let Err(error) = transport.close() {
        warn!(
            target: SESSION_TARGET,
            %error,
            "failed to close transport after failed startup"
        );
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
