//! Transport backed by a spawned `cmake -E server` process.

use std::io::{self, BufReader, BufWriter, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::OnceCell;
use serde_json::Value;
use tracing::debug;

use super::lifecycle::{kill_child, terminate_child};
use super::reader::ReaderHandle;
use super::{MessageConsumer, TRANSPORT_TARGET, Transport};
use crate::config::ServerConfig;
use crate::errors::TransportError;
use crate::framing::encode_frame;

/// A transport that spawns the server and talks to it over stdio.
///
/// # Example
///
/// ```no_run
/// use cmake_server::{CMakeSession, ProcessTransport, ServerConfig};
///
/// let transport = ProcessTransport::new(ServerConfig::cmake_default());
/// let session = CMakeSession::start(transport)?;
/// # Ok::<(), cmake_server::SessionError>(())
/// ```
pub struct ProcessTransport {
    config: ServerConfig,
    consumer: OnceCell<Arc<dyn MessageConsumer>>,
    state: Mutex<TransportState>,
}

enum TransportState {
    NotStarted,
    Running(RunningServer),
    Closed,
}

struct RunningServer {
    child: Child,
    writer: BufWriter<ChildStdin>,
    reader: ReaderHandle,
}

impl ProcessTransport {
    /// Creates a transport that will run the configured command on `start`.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            consumer: OnceCell::new(),
            state: Mutex::new(TransportState::NotStarted),
        }
    }

    /// The configuration this transport launches.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Process id of the running server.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        match &*self.lock_state() {
            TransportState::Running(server) => Some(server.child.id()),
            TransportState::NotStarted | TransportState::Closed => None,
        }
    }

    /// Whether the server process and the reader are both still alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        match &mut *self.lock_state() {
            TransportState::Running(server) => server.is_alive(),
            TransportState::NotStarted | TransportState::Closed => false,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, TransportState> {
        // Recover from poisoning so close and drop still reach the child.
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    fn spawn_process(&self) -> Result<(Child, ChildStdin, ChildStdout), TransportError> {
        debug!(
            target: TRANSPORT_TARGET,
            command = %self.config.command.display(),
            args = ?self.config.args,
            "spawning cmake server process"
        );

        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                TransportError::BinaryNotFound {
                    command: self.config.command.display().to_string(),
                    source,
                }
            } else {
                TransportError::Launch {
                    message: format!("failed to start {}", self.config.command.display()),
                    source,
                }
            }
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            kill_child(&mut child);
            return Err(TransportError::Launch {
                message: String::from("failed to capture server stdio"),
                source: io::Error::other("stdio pipes unavailable"),
            });
        };

        debug!(
            target: TRANSPORT_TARGET,
            pid = child.id(),
            "cmake server process spawned"
        );

        Ok((child, stdin, stdout))
    }
}

impl RunningServer {
    fn is_alive(&mut self) -> bool {
        self.reader.is_alive() && matches!(self.child.try_wait(), Ok(None))
    }
}

impl Transport for ProcessTransport {
    fn set_consumer(&self, consumer: Arc<dyn MessageConsumer>) -> Result<(), TransportError> {
        self.consumer
            .set(consumer)
            .map_err(|_| TransportError::ConsumerAlreadyInstalled)
    }

    fn start(&self) -> Result<(), TransportError> {
        let mut state = self.lock_state();
        if !matches!(*state, TransportState::NotStarted) {
            return Err(TransportError::AlreadyStarted);
        }
        let consumer = self
            .consumer
            .get()
            .cloned()
            .ok_or(TransportError::ConsumerMissing)?;

        let (mut child, stdin, stdout) = self.spawn_process()?;
        let reader = match ReaderHandle::spawn(BufReader::new(stdout), consumer) {
            Ok(reader) => reader,
            Err(error) => {
                kill_child(&mut child);
                return Err(TransportError::Io(error));
            }
        };

        *state = TransportState::Running(RunningServer {
            child,
            writer: BufWriter::new(stdin),
            reader,
        });
        Ok(())
    }

    fn send(&self, message: &Value) -> Result<(), TransportError> {
        let mut state = self.lock_state();
        let TransportState::Running(server) = &mut *state else {
            return Err(TransportError::NotRunning);
        };
        if !server.is_alive() {
            return Err(TransportError::NotRunning);
        }

        let frame = encode_frame(message)?;
        debug!(
            target: TRANSPORT_TARGET,
            bytes = frame.len(),
            "sending frame"
        );
        server.writer.write_all(frame.as_bytes())?;
        server.writer.flush()?;
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        let previous = std::mem::replace(&mut *self.lock_state(), TransportState::Closed);
        let TransportState::Running(server) = previous else {
            return Ok(());
        };
        let RunningServer {
            mut child,
            writer,
            reader,
        } = server;

        debug!(
            target: TRANSPORT_TARGET,
            pid = child.id(),
            "closing cmake server stdin"
        );
        // Dropping the writer closes stdin, which asks the server to exit.
        drop(writer);
        terminate_child(&mut child, self.config.shutdown_grace);
        reader.shutdown();
        reader.join()
    }
}

impl Drop for ProcessTransport {
    fn drop(&mut self) {
        let state = match self.state.get_mut() {
            Ok(state) => state,
            Err(poison) => poison.into_inner(),
        };
        if let TransportState::Running(server) =
            std::mem::replace(state, TransportState::Closed)
        {
            let RunningServer {
                mut child, writer, ..
            } = server;
            drop(writer);
            kill_child(&mut child);
        }
    }
}

impl std::fmt::Debug for ProcessTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state.try_lock() {
            Ok(guard) => match &*guard {
                TransportState::NotStarted => String::from("not_started"),
                TransportState::Running(server) => format!("running (pid: {})", server.child.id()),
                TransportState::Closed => String::from("closed"),
            },
            Err(_) => String::from("busy"),
        };

        f.debug_struct("ProcessTransport")
            .field("command", &self.config.command)
            .field("state", &state)
            .finish_non_exhaustive()
    }
}
