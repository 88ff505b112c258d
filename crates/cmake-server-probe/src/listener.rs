//! Forwards server events to the log.

use cmake_server::{ProgressData, ServerListener};
use tracing::{debug, info};

const EVENTS_TARGET: &str = "cmake_server_probe::events";

/// Logs every unsolicited event the server sends.
#[derive(Debug, Default)]
pub(crate) struct LoggingListener;

impl ServerListener for LoggingListener {
    fn on_message(&self, title: Option<&str>, message: &str) {
        info!(target: EVENTS_TARGET, title = title.unwrap_or_default(), "{message}");
    }

    fn on_progress(&self, progress: &ProgressData) {
        debug!(
            target: EVENTS_TARGET,
            request = progress.in_reply_to.as_deref().unwrap_or_default(),
            current = progress.progress_current,
            maximum = progress.progress_maximum,
            "{}",
            progress.progress_message
        );
    }

    fn on_signal(&self, name: &str) {
        info!(target: EVENTS_TARGET, signal = name, "server signal");
    }

    fn on_file_change(&self, path: &str, properties: &[String]) {
        info!(
            target: EVENTS_TARGET,
            path,
            properties = ?properties,
            "watched file changed"
        );
    }
}
