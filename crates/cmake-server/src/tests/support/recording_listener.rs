//! Listener recording every callback it receives.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::listener::ServerListener;
use crate::protocol::ProgressData;

/// One recorded listener callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerEvent {
    /// `on_message`.
    Message(Option<String>, String),
    /// `on_progress`.
    Progress(ProgressData),
    /// `on_signal`.
    Signal(String),
    /// `on_file_change`.
    FileChange(String, Vec<String>),
}

/// Records callbacks in arrival order.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ListenerEvent>>,
    arrived: Condvar,
}

impl RecordingListener {
    fn push(&self, event: ListenerEvent) {
        self.events
            .lock()
            .expect("listener mutex poisoned")
            .push(event);
        self.arrived.notify_all();
    }

    /// Everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<ListenerEvent> {
        self.events.lock().expect("listener mutex poisoned").clone()
    }

    /// Waits until at least `count` events arrived or `timeout` elapsed.
    #[must_use]
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<ListenerEvent> {
        let guard = self.events.lock().expect("listener mutex poisoned");
        let (events, _) = self
            .arrived
            .wait_timeout_while(guard, timeout, |events| events.len() < count)
            .expect("listener mutex poisoned");
        events.clone()
    }
}

impl ServerListener for RecordingListener {
    fn on_message(&self, title: Option<&str>, message: &str) {
        self.push(ListenerEvent::Message(
            title.map(str::to_owned),
            message.to_owned(),
        ));
    }

    fn on_progress(&self, progress: &ProgressData) {
        self.push(ListenerEvent::Progress(progress.clone()));
    }

    fn on_signal(&self, name: &str) {
        self.push(ListenerEvent::Signal(name.to_owned()));
    }

    fn on_file_change(&self, path: &str, properties: &[String]) {
        self.push(ListenerEvent::FileChange(
            path.to_owned(),
            properties.to_vec(),
        ));
    }
}
