//! The session controller.
//!
//! A [`Session`] owns one child process on one pty, one output reader and
//! one terminal engine. It moves through [`Phase`]s:
//!
//! ```text
//! Unconfigured -> Configured -> Running -> Closed
//! ```
//!
//! A failed start leaves the session `Configured`; `Closed` is final.
//!
//! # Example
//!
//! ```rust,no_run
//! use termshot::{Session, SessionConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), termshot::SessionError> {
//!     let config = SessionConfig::builder("sh").build();
//!     let mut session = Session::with_config(config)?;
//!     session.start(CancellationToken::new()).await?;
//!
//!     session.key_press_str("echo hello<Enter><WaitFor hello>").await?;
//!     session.assert_screen_contains("hello").await;
//!
//!     session.close().await
//! }
//! ```

mod assertions;
mod lifecycle;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use termshot_pty::{PtyControl, PtyWriter, UnixPtyChild, WindowSize};

use crate::config::{SessionConfig, WaitConfig};
use crate::engine::{TerminalEngine, VtEngine};
use crate::error::{Result, SessionError};
use crate::keys::{self, KeyToken, ParseOptions};
use crate::reader::{ReaderExit, ReaderHandle, TermState};
use crate::retry::{FailureHook, PanicHook, Retrier, RetryPolicy};
use crate::snapshot::ScreenSnapshot;
use crate::stability::{SnapshotSource, StabilityDetector};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Created without a configuration.
    Unconfigured,
    /// Configured and ready to start.
    Configured,
    /// The child is attached and the reader is running.
    Running,
    /// Closed. No further operations are possible.
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconfigured => "unconfigured",
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Resources held only while running.
struct Running {
    writer: PtyWriter,
    child: UnixPtyChild,
    reader: ReaderHandle,
    /// Stops the cancellation watcher when the session closes first.
    shutdown: CancellationToken,
    watcher: JoinHandle<()>,
}

/// A terminal program under test.
pub struct Session<E: TerminalEngine = VtEngine> {
    phase: Phase,
    config: Option<SessionConfig>,
    parse_options: ParseOptions,
    state: Arc<Mutex<TermState<E>>>,
    running: Option<Running>,
}

impl<E: TerminalEngine> fmt::Debug for Session<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("phase", &self.phase)
            .field("pid", &self.pid())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<E: TerminalEngine> Default for Session<E> {
    fn default() -> Self {
        Self {
            phase: Phase::Unconfigured,
            config: None,
            parse_options: ParseOptions::default(),
            state: Arc::new(Mutex::new(TermState::detached())),
            running: None,
        }
    }
}

impl Session {
    /// Create an unconfigured session using the default engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configured session using the default engine.
    pub fn with_config(config: SessionConfig) -> Result<Self> {
        let mut session = Self::new();
        session.configure(config)?;
        Ok(session)
    }
}

impl<E: TerminalEngine> Session<E> {
    /// Store the configuration used by the next start.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the session is running or closed,
    /// or if the configuration is invalid.
    pub fn configure(&mut self, config: SessionConfig) -> Result<()> {
        match self.phase {
            Phase::Running | Phase::Closed => {
                return Err(SessionError::config(format!(
                    "cannot configure a {} session",
                    self.phase
                )));
            }
            Phase::Unconfigured | Phase::Configured => {}
        }
        config.validate()?;
        self.parse_options = config.parse_options()?;
        self.config = Some(config);
        self.phase = Phase::Configured;
        Ok(())
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// The configuration, once set.
    #[must_use]
    pub const fn config(&self) -> Option<&SessionConfig> {
        self.config.as_ref()
    }

    /// Process id of the child while running.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.running.as_ref().map(|r| r.child.pid())
    }

    fn wait_config(&self) -> WaitConfig {
        self.config.as_ref().map(SessionConfig::wait).unwrap_or_default()
    }

    fn detector(&self) -> StabilityDetector {
        StabilityDetector::new(self.wait_config().poll_interval)
    }

    fn retrier(&self) -> Retrier {
        Retrier::new(self.retry_policy())
    }

    fn failure_hook(&self) -> Arc<dyn FailureHook> {
        self.config.as_ref().map_or_else(
            || Arc::new(PanicHook) as Arc<dyn FailureHook>,
            |c| Arc::clone(c.failure_hook()),
        )
    }

    /// Retry policy assertions use.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.config.as_ref().map(SessionConfig::retry).unwrap_or_default()
    }

    fn running_mut(&mut self, operation: &'static str) -> Result<&mut Running> {
        self.running
            .as_mut()
            .ok_or(SessionError::NotRunning { operation })
    }

    /// Change the terminal size of both the pty and the engine.
    ///
    /// Both are updated under the session lock, so no snapshot observes one
    /// without the other.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for a zero dimension,
    /// [`SessionError::NotRunning`] if the session is not running and
    /// [`SessionError::Resize`] if the pty rejects the size.
    pub async fn resize(&mut self, rows: u16, cols: u16) -> Result<()> {
        if rows == 0 || cols == 0 {
            return Err(SessionError::config(format!(
                "terminal size must be non-zero, got {rows}x{cols}"
            )));
        }
        let state = Arc::clone(&self.state);
        let running = self.running_mut("resize")?;

        let mut st = state.lock().await;
        running
            .writer
            .resize(WindowSize::new(cols, rows))
            .map_err(SessionError::Resize)?;
        if let Some(engine) = st.engine.as_mut() {
            engine.resize(rows, cols);
        }
        st.touch();
        drop(st);

        tracing::debug!(rows, cols, "terminal resized");
        Ok(())
    }

    async fn write_input(&mut self, operation: &'static str, bytes: &[u8]) -> Result<()> {
        let running = self.running_mut(operation)?;
        running
            .writer
            .write_all(bytes)
            .await
            .map_err(|source| SessionError::Write { source })?;
        tracing::trace!(bytes = bytes.len(), "key input");
        Ok(())
    }

    /// Write raw key sequences in order, stopping at the first failure.
    ///
    /// ```rust,no_run
    /// # async fn demo(session: &mut termshot::Session) -> termshot::Result<()> {
    /// use termshot::Keys;
    /// session.key_press([Keys::UP, Keys::ENTER]).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn key_press<I, B>(&mut self, events: I) -> Result<()>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        self.running_mut("press keys")?;
        for event in events {
            self.write_input("press keys", event.as_ref()).await?;
        }
        Ok(())
    }

    /// Compile a keystroke DSL string with the configured delimiters and
    /// run it.
    pub async fn key_press_str(&mut self, dsl: &str) -> Result<()> {
        let options = self.parse_options;
        self.key_press_str_with(dsl, options).await
    }

    /// Compile a keystroke DSL string with explicit delimiters and run it.
    ///
    /// Nothing is sent if the string fails to compile. Wait directives use
    /// the configured quiet period and timeout; the first error stops the
    /// run.
    pub async fn key_press_str_with(&mut self, dsl: &str, options: ParseOptions) -> Result<()> {
        self.running_mut("press keys")?;
        let tokens = keys::compile_with(dsl, options)?;
        let wait = self.wait_config();
        let detector = self.detector();

        for token in tokens {
            match token {
                KeyToken::Bytes(bytes) => self.write_input("press keys", &bytes).await?,
                KeyToken::WaitStable => {
                    let stable = detector
                        .wait_stable(&*self, wait.stable_quiet, wait.wait_timeout)
                        .await;
                    if !stable {
                        return Err(SessionError::timeout(
                            "waiting for screen to stabilize",
                            wait.wait_timeout,
                            self.screen_text().await,
                        ));
                    }
                }
                KeyToken::WaitFor(text) => {
                    detector.wait_for(&*self, &text, wait.wait_timeout).await?;
                }
            }
        }
        Ok(())
    }

    /// Wait until the screen has not changed for `quiet`; `false` if
    /// `timeout` elapses first.
    pub async fn wait_stable(&self, quiet: Duration, timeout: Duration) -> bool {
        self.detector().wait_stable(self, quiet, timeout).await
    }

    /// Wait until the screen contains `text`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Timeout`] with the last screen if `timeout`
    /// elapses first.
    pub async fn wait_for(&self, text: &str, timeout: Duration) -> Result<ScreenSnapshot> {
        self.detector().wait_for(self, text, timeout).await
    }

    /// Capture the current screen. Empty when there is no engine.
    pub async fn snapshot(&self) -> ScreenSnapshot {
        self.state.lock().await.snapshot()
    }

    /// The current screen as text, rows joined with `'\n'`.
    pub async fn screen_text(&self) -> String {
        self.snapshot().await.text()
    }

    /// One row of the current screen; empty past the last row.
    pub async fn line(&self, row: usize) -> String {
        self.snapshot().await.line(row).to_string()
    }

    /// 1-based (row, column) of the terminal cursor, when there is an engine.
    pub async fn cursor_position(&self) -> Option<(u16, u16)> {
        let st = self.state.lock().await;
        st.engine.as_ref().map(|engine| {
            let (row, col) = engine.cursor();
            (row + 1, col + 1)
        })
    }

    /// Every byte read from the pty so far, when raw capture is enabled.
    pub async fn raw_bytes(&self) -> Vec<u8> {
        self.state.lock().await.raw.clone().unwrap_or_default()
    }

    /// How the output reader ended, once it has.
    pub async fn reader_exit(&self) -> Option<ReaderExit> {
        self.state.lock().await.exit.clone()
    }

    /// Time since the reader last fed output, or since the last resize.
    pub async fn idle_time(&self) -> Duration {
        self.state.lock().await.last_activity.elapsed()
    }
}

impl<E: TerminalEngine> SnapshotSource for Session<E> {
    fn snapshot(&self) -> impl std::future::Future<Output = ScreenSnapshot> + Send {
        Self::snapshot(self)
    }
}

impl<E: TerminalEngine> Drop for Session<E> {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.shutdown.cancel();
            running.writer.close();
            running.reader.task.abort();
            running.watcher.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_unconfigured() {
        let session = Session::new();
        assert_eq!(session.phase(), Phase::Unconfigured);
        assert!(session.config().is_none());
        assert!(session.pid().is_none());
    }

    #[test]
    fn configure_rejects_invalid_config() {
        let mut session = Session::new();
        let err = session
            .configure(SessionConfig::builder("").build())
            .unwrap_err();
        assert!(matches!(err, SessionError::Config { .. }));
        assert_eq!(session.phase(), Phase::Unconfigured);
    }

    #[test]
    fn configure_can_be_repeated_before_start() {
        let mut session = Session::with_config(SessionConfig::builder("sh").build()).unwrap();
        session
            .configure(SessionConfig::builder("bash").delimiters("[]").build())
            .unwrap();
        assert_eq!(session.phase(), Phase::Configured);
        assert_eq!(session.config().unwrap().command(), "bash");
        assert_eq!(session.parse_options.open(), '[');
    }

    #[tokio::test]
    async fn runtime_operations_require_running() {
        let mut session = Session::with_config(SessionConfig::builder("sh").build()).unwrap();

        let err = session.key_press([b"x"]).await.unwrap_err();
        assert!(matches!(err, SessionError::NotRunning { .. }));
        let err = session.key_press_str("x<Enter>").await.unwrap_err();
        assert!(matches!(err, SessionError::NotRunning { .. }));
        let err = session.resize(10, 10).await.unwrap_err();
        assert!(matches!(err, SessionError::NotRunning { operation: "resize" }));
        assert!(matches!(
            session.resize(0, 10).await,
            Err(SessionError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn accessors_without_engine() {
        let session = Session::new();
        assert!(session.snapshot().await.is_empty());
        assert_eq!(session.screen_text().await, "");
        assert_eq!(session.line(3).await, "");
        assert_eq!(session.cursor_position().await, None);
        assert!(session.raw_bytes().await.is_empty());
        assert_eq!(session.reader_exit().await, None);
    }

    #[test]
    fn phase_display() {
        assert_eq!(Phase::Running.to_string(), "running");
        assert_eq!(Phase::Closed.to_string(), "closed");
    }
}
