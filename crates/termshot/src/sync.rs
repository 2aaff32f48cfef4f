//! Blocking wrapper around [`Session`].
//!
//! For tests that are not async. Each call drives the session on a private
//! current-thread runtime, so the output reader only makes progress while a
//! call is in flight; waits and assertions are calls too, so they observe
//! everything the program printed.

use std::time::Duration;

use regex::Regex;
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::reader::ReaderExit;
use crate::session::{Phase, Session};
use crate::snapshot::ScreenSnapshot;

/// A session driven by blocking calls.
#[derive(Debug)]
pub struct SyncSession {
    inner: Session,
    token: CancellationToken,
    runtime: Runtime,
}

impl SyncSession {
    /// Configure and start a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be created, the configuration
    /// is invalid or the session fails to start.
    pub fn start(config: SessionConfig) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SessionError::Runtime)?;

        let mut inner = Session::with_config(config)?;
        let token = CancellationToken::new();
        runtime.block_on(inner.start(token.clone()))?;

        Ok(Self {
            inner,
            token,
            runtime,
        })
    }

    /// The wrapped session.
    #[must_use]
    pub const fn inner(&self) -> &Session {
        &self.inner
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.inner.phase()
    }

    /// Child process id while running.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.inner.pid()
    }

    /// Kill the child's process group.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Write raw key sequences.
    pub fn key_press<I, B>(&mut self, events: I) -> Result<()>
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        self.runtime.block_on(self.inner.key_press(events))
    }

    /// Run a keystroke DSL string.
    pub fn key_press_str(&mut self, dsl: &str) -> Result<()> {
        self.runtime.block_on(self.inner.key_press_str(dsl))
    }

    /// Resize the terminal.
    pub fn resize(&mut self, rows: u16, cols: u16) -> Result<()> {
        self.runtime.block_on(self.inner.resize(rows, cols))
    }

    /// Wait until the screen stops changing.
    pub fn wait_stable(&self, quiet: Duration, timeout: Duration) -> bool {
        self.runtime.block_on(self.inner.wait_stable(quiet, timeout))
    }

    /// Wait until the screen contains `text`.
    pub fn wait_for(&self, text: &str, timeout: Duration) -> Result<ScreenSnapshot> {
        self.runtime.block_on(self.inner.wait_for(text, timeout))
    }

    /// Capture the screen.
    #[must_use]
    pub fn snapshot(&self) -> ScreenSnapshot {
        self.runtime.block_on(self.inner.snapshot())
    }

    /// The screen as text.
    #[must_use]
    pub fn screen_text(&self) -> String {
        self.runtime.block_on(self.inner.screen_text())
    }

    /// One row of the screen.
    #[must_use]
    pub fn line(&self, row: usize) -> String {
        self.runtime.block_on(self.inner.line(row))
    }

    /// 1-based cursor position.
    #[must_use]
    pub fn cursor_position(&self) -> Option<(u16, u16)> {
        self.runtime.block_on(self.inner.cursor_position())
    }

    /// Captured raw output.
    #[must_use]
    pub fn raw_bytes(&self) -> Vec<u8> {
        self.runtime.block_on(self.inner.raw_bytes())
    }

    /// How the reader ended, once it has.
    #[must_use]
    pub fn reader_exit(&self) -> Option<ReaderExit> {
        self.runtime.block_on(self.inner.reader_exit())
    }

    /// Assert on one row.
    pub fn assert_line_eq(&self, row: usize, want: &str) -> bool {
        self.runtime.block_on(self.inner.assert_line_eq(row, want))
    }

    /// Assert on the whole screen.
    pub fn assert_screen_eq(&self, want: &str) -> bool {
        self.runtime.block_on(self.inner.assert_screen_eq(want))
    }

    /// Assert that the screen contains `text`.
    pub fn assert_screen_contains(&self, text: &str) -> bool {
        self.runtime.block_on(self.inner.assert_screen_contains(text))
    }

    /// Assert that the screen matches `pattern`.
    pub fn assert_screen_matches(&self, pattern: &Regex) -> bool {
        self.runtime.block_on(self.inner.assert_screen_matches(pattern))
    }

    /// Close the session.
    pub fn close(&mut self) -> Result<()> {
        self.runtime.block_on(self.inner.close())
    }
}
