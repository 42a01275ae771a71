//! Idle supervision of a launched child process.
//!
//! The child has no readiness signal, so it is treated as done once its
//! output has been quiet for `idle_timeout`. A watchdog task keeps a single
//! idle deadline that every activity pulse pushes forward; when the deadline
//! passes the supervisor kills the child. If the child exits first, the
//! watchdog is cancelled.

use super::relay::{self, StreamKind};
use super::BootstrapError;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Capacity of the activity channel shared by both relays
const ACTIVITY_BUFFER: usize = 64;

/// How long to wait for buffered output once the child is gone
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// How a supervised child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisedExit {
    /// The child exited on its own
    Exited(ExitStatus),
    /// The child went quiet for the whole idle window and was killed
    IdleKilled,
}

/// Why the watchdog returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchdogOutcome {
    Idle,
    Stopped,
}

/// Spawn `cmd` with piped output, relay its output, and wait until it
/// exits or stays silent for `idle_timeout`.
pub async fn run_until_idle(
    mut cmd: Command,
    idle_timeout: Duration,
) -> Result<SupervisedExit, BootstrapError> {
    let program = cmd.as_std().get_program().to_string_lossy().to_string();

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|source| BootstrapError::Spawn { program: program.clone(), source })?;

    log::info!("Started {} (pid {})", program, child.id().unwrap_or_default());

    let stdout = child
        .stdout
        .take()
        .ok_or(BootstrapError::MissingStream(StreamKind::Stdout))?;
    let stderr = child
        .stderr
        .take()
        .ok_or(BootstrapError::MissingStream(StreamKind::Stderr))?;

    let (activity_tx, activity_rx) = mpsc::channel(ACTIVITY_BUFFER);
    let relays = relay::spawn_relay_tasks(stdout, stderr, activity_tx);

    let shutdown = CancellationToken::new();
    let mut watchdog = tokio::spawn(watch_for_idle(activity_rx, idle_timeout, shutdown.clone()));

    let exit = tokio::select! {
        status = child.wait() => {
            shutdown.cancel();
            let status = status.map_err(BootstrapError::Wait)?;
            log::info!("{} exited ({})", program, status);
            Ok(SupervisedExit::Exited(status))
        }
        outcome = &mut watchdog => {
            match outcome.map_err(BootstrapError::Watchdog)? {
                WatchdogOutcome::Idle => {
                    log::info!(
                        "No output from {} for {}s, stopping it",
                        program,
                        idle_timeout.as_secs_f32()
                    );
                    child.kill().await.map_err(BootstrapError::Kill)?;
                    Ok(SupervisedExit::IdleKilled)
                }
                // Nothing else cancels the token before the child exits.
                WatchdogOutcome::Stopped => {
                    let status = child.wait().await.map_err(BootstrapError::Wait)?;
                    Ok(SupervisedExit::Exited(status))
                }
            }
        }
    };

    drain_relays(relays).await;
    exit
}

/// Give the relays a moment to forward what is left in the pipes. Helper
/// processes may keep the pipes open after the child is gone, so the relays
/// are not awaited past the grace period. Returns how many relays failed.
async fn drain_relays(relays: [JoinHandle<()>; 2]) -> usize {
    let [stdout, stderr] = relays;
    let drained = tokio::time::timeout(DRAIN_GRACE, async {
        let mut failed = 0;
        for (kind, relay) in [(StreamKind::Stdout, stdout), (StreamKind::Stderr, stderr)] {
            if let Err(e) = relay.await {
                log::warn!("Relay for {} failed: {}", kind, e);
                failed += 1;
            }
        }
        failed
    })
    .await;

    match drained {
        Ok(failed) => failed,
        Err(_) => {
            log::debug!("Child output still open after {:?}, detaching relays", DRAIN_GRACE);
            0
        }
    }
}

/// Wait until no activity has arrived for `idle_timeout`, or until
/// `shutdown` is cancelled.
async fn watch_for_idle(
    mut activity: mpsc::Receiver<StreamKind>,
    idle_timeout: Duration,
    shutdown: CancellationToken,
) -> WatchdogOutcome {
    let mut deadline = Instant::now() + idle_timeout;
    let mut streams_open = true;

    loop {
        tokio::select! {
            pulse = activity.recv(), if streams_open => match pulse {
                Some(kind) => {
                    log::trace!("Activity on {}, idle timer reset", kind);
                    deadline = Instant::now() + idle_timeout;
                }
                None => {
                    log::debug!("Child output closed");
                    streams_open = false;
                }
            },
            _ = tokio::time::sleep_until(deadline) => return WatchdogOutcome::Idle,
            _ = shutdown.cancelled() => return WatchdogOutcome::Stopped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn test_child_that_exits_is_not_killed() {
        let exit = run_until_idle(sh("echo hello; echo oops >&2; exit 3"), Duration::from_secs(5))
            .await
            .unwrap();

        match exit {
            SupervisedExit::Exited(status) => assert_eq!(status.code(), Some(3)),
            other => panic!("expected exit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_silent_child_is_killed_after_idle_window() {
        let started = std::time::Instant::now();
        let exit = run_until_idle(sh("exec sleep 30"), Duration::from_millis(300))
            .await
            .unwrap();

        assert_eq!(exit, SupervisedExit::IdleKilled);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300), "killed too early: {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(10), "killed too late: {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_output_postpones_idle_kill() {
        // Talks every 100ms for ~1s, then goes quiet.
        let script = "i=0; while [ $i -lt 10 ]; do echo tick $i; i=$((i+1)); sleep 0.1; done; exec sleep 30";
        let started = std::time::Instant::now();
        let exit = run_until_idle(sh(script), Duration::from_millis(400))
            .await
            .unwrap();

        assert_eq!(exit, SupervisedExit::IdleKilled);
        assert!(
            started.elapsed() >= Duration::from_millis(900),
            "activity did not reset the idle timer: {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn test_stderr_activity_counts() {
        let script = "i=0; while [ $i -lt 10 ]; do echo warn $i >&2; i=$((i+1)); sleep 0.1; done; exec sleep 30";
        let started = std::time::Instant::now();
        let exit = run_until_idle(sh(script), Duration::from_millis(400))
            .await
            .unwrap();

        assert_eq!(exit, SupervisedExit::IdleKilled);
        assert!(started.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let cmd = Command::new("/nonexistent/obsidian-binary");
        let err = run_until_idle(cmd, Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Spawn { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_drain_reports_failed_relay() {
        let stdout = tokio::spawn(async {});
        let stderr = tokio::spawn(async { panic!("relay blew up") });

        assert_eq!(drain_relays([stdout, stderr]).await, 1);
    }

    #[tokio::test]
    async fn test_drain_of_finished_relays_reports_none() {
        let relays = [tokio::spawn(async {}), tokio::spawn(async {})];
        assert_eq!(drain_relays(relays).await, 0);
    }

    #[tokio::test]
    async fn test_watchdog_stops_on_shutdown() {
        let (_tx, rx) = mpsc::channel(1);
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let outcome = watch_for_idle(rx, Duration::from_secs(30), shutdown).await;
        assert_eq!(outcome, WatchdogOutcome::Stopped);
    }

    #[tokio::test]
    async fn test_watchdog_times_out_after_streams_close() {
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        let outcome = watch_for_idle(rx, Duration::from_millis(50), CancellationToken::new()).await;
        assert_eq!(outcome, WatchdogOutcome::Idle);
    }
}
