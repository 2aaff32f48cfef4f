//! Core traits for the pty layer.
//!
//! - [`PtyControl`]: geometry and lifetime control of the master side.
//! - [`ExitStatus`]: how a spawned child finished.

use crate::config::WindowSize;
use crate::error::Result;

/// Control operations on the master side of a pseudo-terminal.
///
/// Implemented by the write half of a split master, so the handle that
/// sends input can also resize and close the terminal.
pub trait PtyControl: Send + Sync {
    /// Resize the pty. The kernel delivers SIGWINCH to the foreground group.
    fn resize(&self, size: WindowSize) -> Result<()>;

    /// Get the current window size.
    fn window_size(&self) -> Result<WindowSize>;

    /// Mark the master side closed.
    ///
    /// Later writes and resizes fail and a read started afterwards reports
    /// EOF. The descriptor itself stays open until every handle is dropped,
    /// so a read already waiting is only released when the child's side of
    /// the pty hangs up.
    fn close(&self);

    /// Check if the pty is still open.
    fn is_open(&self) -> bool;
}

/// Exit status of a child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The process exited normally with the given exit code.
    Exited(i32),

    /// The process was terminated by a signal.
    Signaled(i32),
}

impl ExitStatus {
    /// Check if the process exited successfully (exit code 0).
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Get the exit code, if available.
    #[must_use]
    pub const fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Signaled(_) => None,
        }
    }

    /// Get the signal number that terminated the process.
    #[must_use]
    pub const fn signal(&self) -> Option<i32> {
        match self {
            Self::Signaled(sig) => Some(*sig),
            Self::Exited(_) => None,
        }
    }
}

impl std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited with code {code}"),
            Self::Signaled(sig) => write!(f, "terminated by signal {sig}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_status_accessors() {
        assert!(ExitStatus::Exited(0).success());
        assert!(!ExitStatus::Signaled(9).success());
        assert_eq!(ExitStatus::Exited(3).code(), Some(3));
        assert_eq!(ExitStatus::Signaled(9).signal(), Some(9));
        assert_eq!(ExitStatus::Signaled(9).to_string(), "terminated by signal 9");
    }
}
