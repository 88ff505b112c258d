//! One-shot signal released by the server's greeting.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::protocol::ProtocolVersion;

/// What released the startup wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Release {
    /// A hello message arrived.
    Hello,
    /// The server replied with an error before greeting.
    ServerError(String),
    /// The connection closed before greeting.
    Closed,
}

/// Result of waiting for the greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HandshakeOutcome {
    /// The wait was released; `versions` holds everything advertised so far.
    Released {
        /// The first event that released the wait.
        cause: Release,
        /// Advertised protocol versions in server order.
        versions: Vec<ProtocolVersion>,
    },
    /// Nothing released the wait within the bound.
    TimedOut,
}

#[derive(Debug, Default)]
struct State {
    cause: Option<Release>,
    versions: Vec<ProtocolVersion>,
}

/// Collects advertised versions and wakes the thread waiting in startup.
#[derive(Debug, Default)]
pub(crate) struct HandshakeSignal {
    state: Mutex<State>,
    released: Condvar,
}

impl HandshakeSignal {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Appends advertised versions.
    pub(crate) fn record_versions(&self, versions: &[ProtocolVersion]) {
        self.lock_state().versions.extend_from_slice(versions);
    }

    /// Releases the wait. Only the first cause is kept.
    pub(crate) fn release(&self, cause: Release) {
        let mut state = self.lock_state();
        if state.cause.is_none() {
            state.cause = Some(cause);
        }
        self.released.notify_all();
    }

    /// Blocks until released or until `timeout` elapses.
    pub(crate) fn wait(&self, timeout: Duration) -> HandshakeOutcome {
        let guard = self.lock_state();
        let (state, _) = self
            .released
            .wait_timeout_while(guard, timeout, |pending| pending.cause.is_none())
            .unwrap_or_else(|poison| poison.into_inner());
        match &state.cause {
            Some(cause) => HandshakeOutcome::Released {
                cause: cause.clone(),
                versions: state.versions.clone(),
            },
            None => HandshakeOutcome::TimedOut,
        }
    }
}
