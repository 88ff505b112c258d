//! Bounded termination of the server process.

use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::TRANSPORT_TARGET;

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Polls the child until it exits or `grace` elapses.
///
/// A grace too large to represent as an [`Instant`] waits without a deadline.
fn wait_with_grace(child: &mut Child, grace: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now().checked_add(grace);
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {}
            Err(error) => {
                warn!(
                    target: TRANSPORT_TARGET,
                    pid = child.id(),
                    %error,
                    "failed to check server status"
                );
                return None;
            }
        }
        if deadline.is_some_and(|limit| Instant::now() >= limit) {
            return None;
        }
        thread::sleep(EXIT_POLL_INTERVAL);
    }
}

/// Waits for a child whose stdin has been closed to exit, killing it when it
/// outlives `grace`.
pub(super) fn terminate_child(child: &mut Child, grace: Duration) {
    if let Some(status) = wait_with_grace(child, grace) {
        debug!(
            target: TRANSPORT_TARGET,
            pid = child.id(),
            ?status,
            "cmake server exited"
        );
        return;
    }

    warn!(
        target: TRANSPORT_TARGET,
        pid = child.id(),
        grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
        "cmake server did not exit after stdin closed, killing it"
    );
    kill_child(child);
}

/// Kills the child and reaps it.
pub(super) fn kill_child(child: &mut Child) {
    if let Err(error) = child.kill() {
        debug!(
            target: TRANSPORT_TARGET,
            pid = child.id(),
            %error,
            "kill failed; process has likely exited"
        );
    }
    match child.wait() {
        Ok(status) => debug!(
            target: TRANSPORT_TARGET,
            pid = child.id(),
            ?status,
            "cmake server reaped"
        ),
        Err(error) => warn!(
            target: TRANSPORT_TARGET,
            pid = child.id(),
            %error,
            "failed to reap cmake server"
        ),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::process::{Command, Stdio};

    use rstest::rstest;

    use super::*;

    fn spawn_sh(script: &str) -> Child {
        Command::new("sh")
            .args(["-c", script])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .expect("failed to spawn sh")
    }

    #[rstest]
    fn returns_promptly_for_exited_process() {
        let mut child = spawn_sh("exit 0");
        let started = Instant::now();

        terminate_child(&mut child, Duration::from_secs(5));

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(child.try_wait().expect("status check failed").is_some());
    }

    #[rstest]
    fn unbounded_grace_waits_for_exit() {
        let mut child = spawn_sh("sleep 0.2; exit 0");
        let started = Instant::now();

        terminate_child(&mut child, Duration::MAX);

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(child.try_wait().expect("status check failed").is_some());
    }

    #[rstest]
    fn kills_process_that_outlives_grace() {
        let mut child = spawn_sh("exec sleep 30");
        let started = Instant::now();

        terminate_child(&mut child, Duration::from_millis(100));

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(child.try_wait().expect("status check failed").is_some());
    }
}
