//! Child output relay.
//!
//! One task per stream reads the child's stdout or stderr line by line,
//! forwards each line to the parent's matching stream with an `[OBSIDIAN]`
//! prefix so the launch stays visible, and sends an activity pulse to the
//! watchdog after every line.

use crate::config::defaults;
use std::fmt;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Which child stream a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

pub type ActivitySender = mpsc::Sender<StreamKind>;

/// Spawn one relay task per child stream. Both tasks share `activity`;
/// the channel closes once both streams reach end-of-file.
pub fn spawn_relay_tasks(
    stdout: ChildStdout,
    stderr: ChildStderr,
    activity: ActivitySender,
) -> [JoinHandle<()>; 2] {
    let out_activity = activity.clone();
    let out = tokio::spawn(async move {
        relay_lines(stdout, std::io::stdout(), StreamKind::Stdout, out_activity).await;
    });
    let err = tokio::spawn(async move {
        relay_lines(stderr, std::io::stderr(), StreamKind::Stderr, activity).await;
    });
    [out, err]
}

/// Copy `reader` to `sink` line by line with the output tag, pulsing
/// `activity` once per line. Returns the number of lines relayed.
///
/// Lines are decoded lossily and a trailing `\r` is dropped. A final
/// unterminated line is still relayed. Read errors end the relay.
pub async fn relay_lines<R, W>(
    reader: R,
    mut sink: W,
    kind: StreamKind,
    activity: ActivitySender,
) -> usize
where
    R: AsyncRead + Unpin,
    W: Write,
{
    let mut segments = BufReader::new(reader).split(b'\n');
    let mut count = 0;

    loop {
        match segments.next_segment().await {
            Ok(Some(raw)) => {
                let decoded = String::from_utf8_lossy(&raw);
                let line = decoded.strip_suffix('\r').unwrap_or(&decoded);
                if let Err(e) = writeln!(sink, "{} {}", defaults::OUTPUT_TAG, line) {
                    log::warn!("Error forwarding {}: {}", kind, e);
                }
                count += 1;
                // The watchdog may already be gone after a kill; keep draining.
                let _ = activity.send(kind).await;
            }
            Ok(None) => break,
            Err(e) => {
                log::warn!("Error reading {}: {}", kind, e);
                break;
            }
        }
    }

    let _ = sink.flush();
    count
}
