//! Background reader decoding frames from the server's stdout.

use std::io::{self, BufRead};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use super::{MessageConsumer, TRANSPORT_TARGET};
use crate::errors::TransportError;
use crate::framing::FrameDecoder;
use crate::protocol::ServerMessage;

const READER_THREAD_NAME: &str = "cmake-server-reader";

/// Handle to the reader thread.
pub(super) struct ReaderHandle {
    alive: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReaderHandle {
    /// Starts reading `input` on a dedicated thread.
    ///
    /// The thread delivers `{"type":"closed"}` to `consumer` as its last act,
    /// after [`ReaderHandle::is_alive`] has turned false.
    pub(super) fn spawn<R>(input: R, consumer: Arc<dyn MessageConsumer>) -> io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let alive = Arc::new(AtomicBool::new(true));
        let shutdown = Arc::new(AtomicBool::new(false));
        let thread_alive = Arc::clone(&alive);
        let thread_shutdown = Arc::clone(&shutdown);

        let handle = thread::Builder::new()
            .name(READER_THREAD_NAME.to_owned())
            .spawn(move || {
                read_frames(input, consumer.as_ref(), &thread_shutdown);
                thread_alive.store(false, Ordering::SeqCst);
                consumer.consume(ServerMessage::closed_value());
            })?;

        Ok(Self {
            alive,
            shutdown,
            handle: Some(handle),
        })
    }

    /// Whether the reader is still consuming the stream.
    pub(super) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Asks the reader to stop after the line it is reading.
    pub(super) fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the reader thread to finish.
    pub(super) fn join(mut self) -> Result<(), TransportError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| TransportError::ReaderPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for ReaderHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

/// Decodes frames from `input` until end of stream, an I/O error, or
/// `shutdown` is raised.
pub(super) fn read_frames<R: BufRead>(
    mut input: R,
    consumer: &dyn MessageConsumer,
    shutdown: &AtomicBool,
) {
    let mut decoder = FrameDecoder::new();
    let mut line = Vec::new();
    loop {
        if shutdown.load(Ordering::SeqCst) {
            debug!(target: TRANSPORT_TARGET, "reader stopping on request");
            break;
        }

        line.clear();
        match input.read_until(b'\n', &mut line) {
            Ok(0) => {
                debug!(target: TRANSPORT_TARGET, "server closed its output stream");
                break;
            }
            Ok(_) => match decoder.push_line(&String::from_utf8_lossy(&line)) {
                Some(Ok(message)) => consumer.consume(message),
                Some(Err(error)) => {
                    warn!(
                        target: TRANSPORT_TARGET,
                        %error,
                        "skipping malformed frame"
                    );
                }
                None => {}
            },
            Err(error) => {
                warn!(
                    target: TRANSPORT_TARGET,
                    %error,
                    "failed to read from server"
                );
                break;
            }
        }
    }
}
