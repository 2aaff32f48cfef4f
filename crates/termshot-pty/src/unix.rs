//! Unix platform implementation for PTY operations.
//!
//! - pty pair allocation via openpt/grantpt/unlockpt
//! - async I/O through tokio's `AsyncFd`
//! - child spawning as a session leader with a controlling terminal

mod child;
mod pty;

use std::ffi::OsStr;

pub use child::{UnixPtyChild, signal_process_group, spawn_child};
pub use pty::{PtyReader, PtyWriter, UnixPtyMaster, open_slave};

use crate::config::PtyConfig;
use crate::error::Result;

/// Allocate a pty sized from `config` and spawn `program` on it.
///
/// Each stage reports its own [`crate::PtyError`] variant: `Create` for
/// allocation, `Resize` or `InvalidWindowSize` for sizing, `Spawn` for the
/// child. Nothing is leaked when a later stage fails; the master and slave
/// descriptors are dropped and the child is never started.
pub fn spawn<S, I>(program: S, args: I, config: &PtyConfig) -> Result<(UnixPtyMaster, UnixPtyChild)>
where
    S: AsRef<OsStr>,
    I: IntoIterator,
    I::Item: AsRef<OsStr>,
{
    let (master, slave_path) = UnixPtyMaster::open()?;
    master.set_window_size(config.window_size)?;

    let slave_fd = open_slave(&slave_path)?;
    let child = spawn_child(slave_fd, program, args, config)?;

    Ok((master, child))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PtyError;
    use crate::traits::{ExitStatus, PtyControl};

    #[tokio::test]
    async fn spawn_echo() {
        let config = PtyConfig::default();
        let (master, mut child) = spawn("echo", ["hello"], &config).unwrap();
        let (_reader, writer) = master.into_split();

        assert_eq!(child.wait().await.unwrap(), ExitStatus::Exited(0));
        assert!(writer.is_open());
    }

    #[tokio::test]
    async fn spawn_rejects_zero_geometry() {
        let config = PtyConfig::builder().window_size(0, 24).build();
        let err = spawn("echo", ["hello"], &config).unwrap_err();
        assert!(matches!(err, PtyError::InvalidWindowSize { cols: 0, rows: 24 }));
    }

    #[tokio::test]
    async fn spawn_missing_program() {
        let config = PtyConfig::default();
        let err = spawn("/nonexistent/termshot-binary", Vec::<&str>::new(), &config).unwrap_err();
        assert!(matches!(err, PtyError::Spawn(_)));
    }
}
