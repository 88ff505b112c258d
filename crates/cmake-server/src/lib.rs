//! Client for the CMake server protocol.
//!
//! `cmake -E server --experimental --debug` speaks framed JSON over stdio.
//! This crate launches that process, performs the startup greeting, matches
//! replies to requests by cookie, and forwards unsolicited progress, message
//! and signal events to registered listeners.
//!
//! The crate has two layers. The transport ([`Transport`],
//! [`ProcessTransport`]) owns the child process and the line framing and
//! hands every decoded value to a single consumer. The session
//! ([`CMakeSession`]) installs that consumer and turns the message stream into
//! blocking, typed verbs that may be called from several threads at once.
//!
//! # Example
//!
//! ```no_run
//! use cmake_server::{CMakeSession, HandshakeParams, ServerConfig, SessionConfig};
//!
//! let session = CMakeSession::spawn(ServerConfig::cmake_default(), SessionConfig::default())?;
//! session.handshake(&HandshakeParams::new("/src/app", "/src/app/build", "Ninja"))?;
//! session.configure_with([("CMAKE_BUILD_TYPE", "Debug")])?;
//! session.compute()?;
//! for configuration in session.code_model()?.configurations {
//!     for project in configuration.projects {
//!         println!("{}: {} targets", project.name, project.targets.len());
//!     }
//! }
//! session.close()?;
//! # Ok::<(), cmake_server::SessionError>(())
//! ```

mod config;
mod errors;
pub mod framing;
mod listener;
pub mod protocol;
mod session;
pub mod transport;

#[cfg(test)]
mod tests;

pub use config::{DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_SHUTDOWN_GRACE, ServerConfig, SessionConfig};
pub use errors::{ProtocolError, SessionError, TransportError};
pub use listener::{ListenerId, ServerListener};
pub use protocol::{
    BuildFiles, CMakeCache, CMakeInputs, CacheEntry, CodeModel, Configuration, FileGroup,
    FileSystemWatchers, GlobalSettings, HandshakeParams, IncludePath, ProgressData, Project,
    ProtocolVersion, RequestKind, ServerMessage, Target,
};
pub use session::CMakeSession;
pub use transport::{MessageConsumer, ProcessTransport, Transport};
