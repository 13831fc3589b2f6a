//! Spawning and supervising the daemon process.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Matches the bracketed timestamp prefix intcoind puts on console lines.
static LOG_PREFIX_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[\d+\]\s+").unwrap());

/// A spawned daemon with its output forwarded to tracing.
pub(crate) struct DaemonProcess {
    child: Child,
    index: usize,
    pid: u32,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl DaemonProcess {
    /// Spawns `binary` with `args`. The child is killed if this value is
    /// dropped without being stopped.
    pub(crate) fn spawn(binary: &Path, args: &[String], index: usize) -> Result<Self> {
        let mut cmd = Command::new(binary);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(node = index, "spawning daemon: {:?}", cmd);

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Io("failed to spawn daemon", e))?;
        let pid = child.id().ok_or(Error::MissingPid { index })?;

        info!(node = index, pid, "daemon spawned");

        let shutdown_token = CancellationToken::new();
        let task_tracker = TaskTracker::new();

        if let Some(stdout) = child.stdout.take() {
            task_tracker.spawn(forward_lines(stdout, index, false, shutdown_token.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            task_tracker.spawn(forward_lines(stderr, index, true, shutdown_token.clone()));
        }
        task_tracker.close();

        Ok(Self {
            child,
            index,
            pid,
            shutdown_token,
            task_tracker,
        })
    }

    /// Returns the process ID.
    pub(crate) const fn pid(&self) -> u32 {
        self.pid
    }

    /// Returns the exit status if the process has already exited.
    pub(crate) fn try_exit_status(&mut self) -> Result<Option<ExitStatus>> {
        self.child
            .try_wait()
            .map_err(|e| Error::Io("failed to poll daemon status", e))
    }

    /// Waits up to `timeout` for the process to exit, reaping it if it does.
    pub(crate) async fn wait_for_exit(&mut self, timeout: Duration) -> Result<Option<ExitStatus>> {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => Ok(Some(status)),
            Ok(Err(e)) => Err(Error::Io("failed to wait for daemon", e)),
            Err(_) => Ok(None),
        }
    }

    /// Sends `signal` to the process. A process that is already gone is not
    /// an error.
    pub(crate) fn signal(&self, signal: Signal) -> Result<()> {
        // Reaped children have no id; their pid may already be reused.
        let Some(raw_pid) = self.child.id() else {
            return Ok(());
        };
        #[allow(clippy::cast_possible_wrap)]
        let pid = Pid::from_raw(raw_pid as i32);

        match signal::kill(pid, signal) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(source) => Err(Error::Signal {
                index: self.index,
                source,
            }),
        }
    }

    /// Sends `SIGKILL` and reaps the process.
    pub(crate) async fn kill(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.try_exit_status()? {
            return Ok(status);
        }

        self.child
            .kill()
            .await
            .map_err(|e| Error::Io("failed to kill daemon", e))?;

        self.child
            .wait()
            .await
            .map_err(|e| Error::Io("failed to wait for daemon", e))
    }

    /// Stops forwarding output and waits for the forwarding tasks to finish.
    pub(crate) async fn finish_output(&self) {
        self.shutdown_token.cancel();
        self.task_tracker.wait().await;
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

async fn forward_lines<R>(reader: R, index: usize, is_stderr: bool, token: CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    loop {
        let line = tokio::select! {
            () = token.cancelled() => break,
            line = lines.next_line() => line,
        };

        let Ok(Some(line)) = line else {
            break;
        };

        let message = LOG_PREFIX_REGEX.replace(&line, "");
        if is_stderr {
            warn!(target: "intcoind", node = index, "{}", message);
        } else {
            info!(target: "intcoind", node = index, "{}", message);
        }
    }
}
