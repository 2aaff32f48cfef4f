//! Error types for the termshot-pty crate.
//!
//! Every fallible pty operation returns [`PtyError`]. The variant tells the
//! caller which stage failed (allocation, sizing, spawning, I/O, signalling),
//! which the session layer uses to classify startup failures.

use std::io;

/// The error type for PTY operations.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    /// Failed to allocate the pty pair or open its slave side.
    #[error("failed to create PTY: {0}")]
    Create(#[source] io::Error),

    /// Failed to spawn the child process.
    #[error("failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    /// An I/O error occurred on the master side.
    #[error("PTY I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failed to apply a new window size.
    #[error("failed to resize PTY: {0}")]
    Resize(#[source] io::Error),

    /// The master side has been closed.
    #[error("PTY has been closed")]
    Closed,

    /// The child has already exited, so it cannot be signalled.
    #[error("child process has already exited")]
    AlreadyExited,

    /// Failed to send a signal.
    #[error("failed to send signal: {0}")]
    Signal(#[source] io::Error),

    /// Failed to wait for the child process.
    #[error("failed to wait for child: {0}")]
    Wait(#[source] io::Error),

    /// A window size with a zero dimension was requested.
    #[error("invalid window size: {cols}x{rows}")]
    InvalidWindowSize {
        /// The requested column count.
        cols: u16,
        /// The requested row count.
        rows: u16,
    },
}

/// A specialized Result type for PTY operations.
pub type Result<T> = std::result::Result<T, PtyError>;

impl PtyError {
    /// Returns true when the error is the pty hangup reported after the
    /// slave side has been closed by every process.
    ///
    /// Linux reports this as `EIO` on the master instead of a zero-length read.
    #[must_use]
    pub fn is_hangup(err: &io::Error) -> bool {
        #[cfg(unix)]
        {
            err.raw_os_error() == Some(libc::EIO)
        }
        #[cfg(not(unix))]
        {
            let _ = err;
            false
        }
    }
}

#[cfg(unix)]
impl From<rustix::io::Errno> for PtyError {
    fn from(errno: rustix::io::Errno) -> Self {
        Self::Io(io::Error::from_raw_os_error(errno.raw_os_error()))
    }
}

/// Convert a rustix errno into a std I/O error.
#[cfg(unix)]
pub(crate) fn errno_to_io(errno: rustix::io::Errno) -> io::Error {
    io::Error::from_raw_os_error(errno.raw_os_error())
}
