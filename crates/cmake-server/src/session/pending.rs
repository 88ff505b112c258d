//! Table of requests awaiting their reply.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;

/// How an outstanding request ended.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Resolution {
    /// The reply (or error reply) carrying the request's cookie.
    Reply(Value),
    /// The connection closed before a reply arrived.
    Closed,
}

/// One outstanding round-trip, resolved at most once.
#[derive(Debug, Default)]
pub(crate) struct PendingRequest {
    slot: Mutex<Option<Resolution>>,
    resolved: Condvar,
}

impl PendingRequest {
    fn lock_slot(&self) -> MutexGuard<'_, Option<Resolution>> {
        self.slot
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Stores `resolution` and wakes the waiter. Returns `false` when the
    /// request was already resolved, leaving the first resolution in place.
    pub(crate) fn resolve(&self, resolution: Resolution) -> bool {
        let mut slot = self.lock_slot();
        if slot.is_some() {
            return false;
        }
        *slot = Some(resolution);
        self.resolved.notify_all();
        true
    }

    /// Blocks until resolved, or until `timeout` elapses when one is given.
    pub(crate) fn wait(&self, timeout: Option<Duration>) -> Option<Resolution> {
        let guard = self.lock_slot();
        let mut resolved = match timeout {
            None => self
                .resolved
                .wait_while(guard, |slot| slot.is_none())
                .unwrap_or_else(|poison| poison.into_inner()),
            Some(limit) => {
                self.resolved
                    .wait_timeout_while(guard, limit, |slot| slot.is_none())
                    .unwrap_or_else(|poison| poison.into_inner())
                    .0
            }
        };
        resolved.take()
    }
}

/// Returned when registering on a table that has already been swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TableClosed;

#[derive(Debug, Default)]
struct TableState {
    requests: HashMap<String, Arc<PendingRequest>>,
    closed: bool,
}

/// Outstanding requests keyed by cookie.
#[derive(Debug, Default)]
pub(crate) struct PendingTable {
    state: Mutex<TableState>,
}

impl PendingTable {
    fn lock_state(&self) -> MutexGuard<'_, TableState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Registers a new request under `cookie`.
    pub(crate) fn register(&self, cookie: &str) -> Result<Arc<PendingRequest>, TableClosed> {
        let mut state = self.lock_state();
        if state.closed {
            return Err(TableClosed);
        }
        let request = Arc::new(PendingRequest::default());
        state
            .requests
            .insert(cookie.to_owned(), Arc::clone(&request));
        Ok(request)
    }

    /// Removes and resolves the request registered under `cookie`.
    ///
    /// Returns `false` when no such request is outstanding.
    pub(crate) fn resolve(&self, cookie: &str, reply: Value) -> bool {
        let request = self.lock_state().requests.remove(cookie);
        request.is_some_and(|request| request.resolve(Resolution::Reply(reply)))
    }

    /// Forgets the request registered under `cookie`, if still present.
    pub(crate) fn remove(&self, cookie: &str) {
        self.lock_state().requests.remove(cookie);
    }

    /// Fails every outstanding request and rejects later registrations.
    ///
    /// Returns the number of requests that were waiting.
    pub(crate) fn close_all(&self) -> usize {
        let drained: Vec<Arc<PendingRequest>> = {
            let mut state = self.lock_state();
            state.closed = true;
            state.requests.drain().map(|(_, request)| request).collect()
        };
        drained
            .iter()
            .filter(|request| request.resolve(Resolution::Closed))
            .count()
    }

    /// Number of outstanding requests.
    pub(crate) fn len(&self) -> usize {
        self.lock_state().requests.len()
    }
}
