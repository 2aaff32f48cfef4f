//! Error types for termshot.
//!
//! Every fallible session operation returns [`SessionError`]. Timeouts carry
//! the last observed screen so a failing test shows what was actually
//! rendered. Assertion exhaustion is not an error value: it is reported
//! through the session's [`crate::retry::FailureHook`].

use std::fmt;
use std::time::Duration;

use thiserror::Error;

pub use crate::engine::EngineError;
pub use crate::keys::ParseError;
use termshot_pty::PtyError;

/// Maximum length of screen content to show in full in error messages.
const MAX_SCREEN_DISPLAY: usize = 2000;

/// Rows shown when a large screen is truncated.
const TAIL_ROWS: usize = 12;

/// Format screen content for display, keeping the last rows when large.
pub(crate) fn format_screen_snippet(screen: &str) -> String {
    if screen.trim().is_empty() {
        return "(blank screen)".to_string();
    }

    let lines: Vec<&str> = screen.lines().collect();
    if screen.len() <= MAX_SCREEN_DISPLAY || lines.len() <= TAIL_ROWS {
        return format!(
            "┌─ screen ({} rows) ──────────────────────\n│ {}\n└────────────────────────────────────────",
            lines.len(),
            lines.join("\n│ ")
        );
    }

    let tail = &lines[lines.len() - TAIL_ROWS..];
    format!(
        "┌─ screen ({} rows) ──────────────────────\n│ ... ({} rows hidden)\n│ {}\n└────────────────────────────────────────",
        lines.len(),
        lines.len() - TAIL_ROWS,
        tail.join("\n│ ")
    )
}

fn format_timeout_error(operation: &str, duration: Duration, screen: &str) -> String {
    format!(
        "timeout after {duration:?} {operation}\n\n{}",
        format_screen_snippet(screen)
    )
}

/// The main error type for session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Invalid configuration, or configuration attempted in the wrong phase.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// The session could not be started.
    #[error("failed to start session: {0}")]
    Startup(#[from] StartupError),

    /// A runtime operation was attempted on a session that is not running.
    #[error("cannot {operation}: session is not running")]
    NotRunning {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// Writing to the pty failed.
    #[error("failed to write to pty: {source}")]
    Write {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The pty rejected a resize.
    #[error("failed to resize terminal: {0}")]
    Resize(#[source] PtyError),

    /// A wait ran out of time.
    #[error("{}", format_timeout_error(operation, *duration, screen))]
    Timeout {
        /// What was being waited for.
        operation: String,
        /// The timeout that elapsed.
        duration: Duration,
        /// The last screen observed before giving up.
        screen: String,
    },

    /// A keystroke DSL string failed to compile.
    #[error("invalid key sequence: {0}")]
    Parse(#[from] ParseError),

    /// The runtime behind a blocking session could not be created.
    #[error("failed to create runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// One or more steps of closing the session failed.
    #[error(transparent)]
    Cleanup(#[from] CleanupError),
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a timeout error with the screen observed at expiry.
    pub fn timeout(operation: impl Into<String>, duration: Duration, screen: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
            screen: screen.into(),
        }
    }

    /// Check if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The screen attached to a timeout, if any.
    #[must_use]
    pub fn screen(&self) -> Option<&str> {
        match self {
            Self::Timeout { screen, .. } => Some(screen),
            _ => None,
        }
    }
}

/// Why a session failed to start.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The pty pair could not be allocated.
    #[error("failed to allocate pty: {0}")]
    Pty(#[source] PtyError),

    /// The pty could not be sized to the configured geometry.
    #[error("failed to size pty to {rows}x{cols}: {source}")]
    Sizing {
        /// Requested rows.
        rows: u16,
        /// Requested columns.
        cols: u16,
        /// The underlying pty error.
        #[source]
        source: PtyError,
    },

    /// The child process could not be spawned.
    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        /// The command that was being spawned.
        command: String,
        /// The underlying pty error.
        #[source]
        source: PtyError,
    },

    /// The terminal engine could not be initialized.
    #[error("failed to initialize terminal engine: {0}")]
    Engine(#[from] EngineError),
}

impl StartupError {
    /// Classify a pty-layer failure by the stage that produced it.
    pub(crate) fn from_pty(err: PtyError, command: &str, rows: u16, cols: u16) -> Self {
        match err {
            PtyError::Resize(_) | PtyError::InvalidWindowSize { .. } => Self::Sizing {
                rows,
                cols,
                source: err,
            },
            PtyError::Spawn(_) => Self::Spawn {
                command: command.to_string(),
                source: err,
            },
            other => Self::Pty(other),
        }
    }
}

/// One failed step of closing a session.
#[derive(Debug, Error)]
pub enum CleanupFailure {
    /// Killing the child failed for a reason other than it having exited.
    #[error("failed to kill child: {0}")]
    Kill(#[source] PtyError),

    /// Waiting on the child failed.
    #[error("failed to wait for child: {0}")]
    Wait(#[source] PtyError),

    /// The child did not exit in time.
    #[error("timeout waiting for child to exit after {0:?}")]
    WaitTimeout(Duration),

    /// The output reader did not finish in time and was aborted.
    #[error("timeout waiting for reader to finish after {0:?}")]
    ReaderTimeout(Duration),
}

/// Every failure collected while closing a session.
#[derive(Debug)]
pub struct CleanupError {
    /// The failures, in the order the steps ran.
    pub failures: Vec<CleanupFailure>,
}

impl fmt::Display for CleanupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "close failed: ")?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CleanupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|f| f as &(dyn std::error::Error + 'static))
    }
}
