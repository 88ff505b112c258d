//! Configuration for the server process and the session built on top of it.

use std::path::PathBuf;
use std::time::Duration;

/// Bound on the wait for the server's hello when none is configured.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Time a server is given to exit after its stdin closes before it is killed.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Configuration for spawning a CMake server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// The executable path or command name.
    pub command: PathBuf,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
    /// Working directory for the spawned process.
    pub working_dir: Option<PathBuf>,
    /// How long `close` waits for the process to exit before killing it.
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    /// Configuration running `command` without arguments.
    #[must_use]
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Default configuration: `cmake -E server --experimental --debug`.
    ///
    /// Expects `cmake` to be available in PATH.
    #[must_use]
    pub fn cmake_default() -> Self {
        Self::cmake_at("cmake")
    }

    /// Server-mode invocation of the given `cmake` executable.
    #[must_use]
    pub fn cmake_at(command: impl Into<PathBuf>) -> Self {
        Self::new(command).with_args(["-E", "server", "--experimental", "--debug"])
    }

    /// Replaces the argument list.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets a custom working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Sets how long `close` waits for a clean exit.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::cmake_default()
    }
}

/// Timeouts applied by a [`crate::CMakeSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Bound on the wait for the server's hello during startup.
    pub handshake_timeout: Duration,
    /// Bound on each request's wait for its reply; `None` waits until the
    /// reply arrives or the connection closes.
    pub request_timeout: Option<Duration>,
}

impl SessionConfig {
    /// Sets the startup bound.
    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Bounds every request's wait for a reply.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            request_timeout: None,
        }
    }
}
