//! Starting and closing a session.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use termshot_pty::{PtyControl, PtyError, PtySignal, UnixPtyChild, signal_process_group};

use super::{Phase, Running, Session};
use crate::engine::TerminalEngine;
use crate::error::{CleanupError, CleanupFailure, Result, SessionError, StartupError};
use crate::reader::{ReaderHandle, TermState, spawn_reader};

impl<E: TerminalEngine> Session<E> {
    /// Spawn the configured program on a new pty and start reading its
    /// output.
    ///
    /// Cancelling `token` kills the child's whole process group. It does not
    /// interrupt reads or waits in progress; call [`Session::close`] to
    /// release the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] unless the session is configured and
    /// not yet started, and [`SessionError::Startup`] if the pty, the child
    /// or the engine cannot be set up. A failed start releases everything it
    /// acquired and leaves the session configured.
    pub async fn start(&mut self, token: CancellationToken) -> Result<()> {
        let config = match (self.phase, &self.config) {
            (Phase::Configured, Some(config)) => config.clone(),
            (phase, _) => {
                return Err(SessionError::config(format!(
                    "cannot start a {phase} session"
                )));
            }
        };
        let (rows, cols) = (config.rows(), config.cols());

        let (master, mut child) =
            termshot_pty::spawn(config.command(), config.args(), &config.pty_config())
                .map_err(|e| StartupError::from_pty(e, config.command(), rows, cols))?;

        let engine = match E::open(rows, cols) {
            Ok(engine) => engine,
            Err(e) => {
                discard_child(&mut child, config.wait().reader_join_timeout).await;
                return Err(StartupError::Engine(e).into());
            }
        };

        *self.state.lock().await = TermState::new(engine, config.collect_raw_bytes());

        let (reader, writer) = master.into_split();
        let reader = spawn_reader(reader, writer.clone(), Arc::clone(&self.state));
        let shutdown = CancellationToken::new();
        let watcher = spawn_watcher(child.pid(), token, shutdown.clone());

        tracing::debug!(
            pid = child.pid(),
            command = config.command(),
            rows,
            cols,
            "session started"
        );

        self.running = Some(Running {
            writer,
            child,
            reader,
            shutdown,
            watcher,
        });
        self.phase = Phase::Running;
        Ok(())
    }

    /// Close the session. Safe to call more than once and after a failed
    /// start.
    ///
    /// Every step runs even if an earlier one failed: close the pty, kill
    /// the child, wait for it, wait for the output reader, drop the engine.
    /// Waits are bounded by the configured join timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Cleanup`] listing every step that failed.
    pub async fn close(&mut self) -> Result<()> {
        let previous = self.phase;
        self.phase = Phase::Closed;
        let Some(running) = self.running.take() else {
            if previous != Phase::Closed {
                tracing::debug!(phase = %previous, "closing session that never ran");
            }
            return Ok(());
        };

        let join_timeout = self.wait_config().reader_join_timeout;
        let Running {
            writer,
            mut child,
            reader,
            shutdown,
            watcher,
        } = running;
        let pid = child.pid();
        let mut failures = Vec::new();

        shutdown.cancel();
        watcher.abort();

        writer.close();
        drop(writer);
        tracing::debug!(pid, "pty closed");

        match child.kill() {
            Ok(()) | Err(PtyError::AlreadyExited) => {}
            Err(e) => {
                tracing::warn!(pid, error = %e, "failed to kill child");
                failures.push(CleanupFailure::Kill(e));
            }
        }

        match tokio::time::timeout(join_timeout, child.wait()).await {
            Ok(Ok(status)) => tracing::debug!(pid, %status, "child exited"),
            Ok(Err(e)) => failures.push(CleanupFailure::Wait(e)),
            Err(_) => {
                tracing::warn!(pid, ?join_timeout, "child did not exit in time");
                failures.push(CleanupFailure::WaitTimeout(join_timeout));
            }
        }

        let ReaderHandle { task, done } = reader;
        if tokio::time::timeout(join_timeout, done).await.is_err() {
            tracing::warn!(pid, ?join_timeout, "output reader did not finish, aborting");
            task.abort();
            failures.push(CleanupFailure::ReaderTimeout(join_timeout));
        }

        self.state.lock().await.engine = None;
        tracing::debug!(pid, failures = failures.len(), "session closed");

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CleanupError { failures }.into())
        }
    }
}

/// Kill a child whose session failed to start, waiting a bounded time.
async fn discard_child(child: &mut UnixPtyChild, timeout: Duration) {
    if let Err(e) = child.kill() {
        tracing::debug!(pid = child.pid(), error = %e, "rollback kill failed");
    }
    if tokio::time::timeout(timeout, child.wait()).await.is_err() {
        tracing::warn!(pid = child.pid(), "child did not exit during rollback");
    }
}

/// Kill the child's process group when `token` is cancelled, unless the
/// session shuts down first.
fn spawn_watcher(pid: u32, token: CancellationToken, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = token.cancelled() => {
                tracing::debug!(pid, "cancellation requested, killing process group");
                match signal_process_group(pid, PtySignal::Kill) {
                    Ok(()) | Err(PtyError::AlreadyExited) => {}
                    Err(e) => tracing::warn!(pid, error = %e, "failed to kill process group"),
                }
            }
            () = shutdown.cancelled() => {}
        }
    })
}
