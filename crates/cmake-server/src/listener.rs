//! Listeners for unsolicited server events.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::protocol::ProgressData;
use crate::session::SESSION_TARGET;

/// Receives events the server sends outside any request/reply exchange.
///
/// Every method defaults to a no-op. Callbacks run on the transport's reader
/// thread, so long-running work blocks delivery of later messages, including
/// replies.
///
/// A callback must not call [`crate::CMakeSession::close`] or any blocking
/// request method on the session that delivered the event. Closing joins the
/// reader thread, which cannot join itself, and a request would wait for a
/// reply only that same thread can deliver. Hand such work to another thread.
pub trait ServerListener: Send + Sync {
    /// A diagnostic `message`, with its optional title.
    fn on_message(&self, title: Option<&str>, message: &str) {
        let _ = (title, message);
    }

    /// A `progress` update.
    fn on_progress(&self, progress: &ProgressData) {
        let _ = progress;
    }

    /// A `signal` other than `fileChange`.
    fn on_signal(&self, name: &str) {
        let _ = name;
    }

    /// A `fileChange` signal for `path`.
    fn on_file_change(&self, path: &str, properties: &[String]) {
        let _ = (path, properties);
    }
}

/// Handle returned by [`crate::CMakeSession::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Entries = Arc<Vec<(ListenerId, Arc<dyn ServerListener>)>>;

/// Copy-on-write set of listeners.
///
/// Delivery iterates a snapshot, so listeners may be added or removed while
/// an event is being delivered.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    entries: RwLock<Entries>,
    next_id: AtomicU64,
}

impl ListenerRegistry {
    pub(crate) fn add(&self, listener: Arc<dyn ServerListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poison| poison.into_inner());
        let mut updated = Vec::with_capacity(entries.len() + 1);
        updated.extend(entries.iter().cloned());
        updated.push((id, listener));
        *entries = Arc::new(updated);
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poison| poison.into_inner());
        if !entries.iter().any(|(entry_id, _)| *entry_id == id) {
            return false;
        }
        let updated = entries
            .iter()
            .filter(|(entry_id, _)| *entry_id != id)
            .cloned()
            .collect();
        *entries = Arc::new(updated);
        true
    }

    pub(crate) fn snapshot(&self) -> Entries {
        Arc::clone(
            &self
                .entries
                .read()
                .unwrap_or_else(|poison| poison.into_inner()),
        )
    }

    pub(crate) fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Calls `deliver` on every listener, isolating panics per listener.
    pub(crate) fn notify(&self, event: &str, deliver: impl Fn(&dyn ServerListener)) {
        for (id, listener) in self.snapshot().iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| deliver(listener.as_ref())));
            if outcome.is_err() {
                warn!(
                    target: SESSION_TARGET,
                    listener = id.0,
                    event,
                    "listener panicked; continuing delivery"
                );
            }
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish_non_exhaustive()
    }
}
