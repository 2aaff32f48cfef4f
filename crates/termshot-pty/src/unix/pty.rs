//! Unix PTY allocation and the master-side handles.
//!
//! The master descriptor is shared between a [`PtyReader`], owned by the
//! task draining output, and a cloneable [`PtyWriter`], which sends input and
//! controls geometry. Both sides observe the same open flag.

use std::ffi::OsStr;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{AsRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use rustix::fs::{Mode, OFlags, fcntl_setfl, open};
use rustix::io::{FdFlags, fcntl_setfd};
use rustix::pty::{OpenptFlags, grantpt, openpt, ptsname, unlockpt};
use rustix::termios::{Winsize, tcgetwinsize, tcsetwinsize};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::config::WindowSize;
use crate::error::{PtyError, Result, errno_to_io};
use crate::traits::PtyControl;

/// The shared master descriptor.
struct MasterFd {
    async_fd: AsyncFd<OwnedFd>,
    open: AtomicBool,
}

impl MasterFd {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn poll_read(&self, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        if !self.is_open() {
            return Poll::Ready(Ok(()));
        }

        loop {
            let mut guard = match self.async_fd.poll_read_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            let unfilled = buf.initialize_unfilled();
            match rustix::io::read(self.async_fd.get_ref(), unfilled) {
                Ok(n) => {
                    buf.advance(n);
                    return Poll::Ready(Ok(()));
                }
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                Err(rustix::io::Errno::INTR) => {}
                Err(e) => return Poll::Ready(Err(errno_to_io(e))),
            }
        }
    }

    fn poll_write(&self, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        if !self.is_open() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "PTY closed",
            )));
        }

        loop {
            let mut guard = match self.async_fd.poll_write_ready(cx) {
                Poll::Ready(Ok(guard)) => guard,
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            };

            match rustix::io::write(self.async_fd.get_ref(), buf) {
                Ok(n) => return Poll::Ready(Ok(n)),
                Err(rustix::io::Errno::AGAIN) => {
                    guard.clear_ready();
                }
                Err(rustix::io::Errno::INTR) => {}
                Err(e) => return Poll::Ready(Err(errno_to_io(e))),
            }
        }
    }

    fn set_window_size(&self, size: WindowSize) -> Result<()> {
        if !self.is_open() {
            return Err(PtyError::Closed);
        }
        let size = size.validate()?;

        let winsize = Winsize {
            ws_col: size.cols,
            ws_row: size.rows,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };

        tcsetwinsize(self.async_fd.get_ref(), winsize)
            .map_err(|e| PtyError::Resize(errno_to_io(e)))
    }

    fn window_size(&self) -> Result<WindowSize> {
        if !self.is_open() {
            return Err(PtyError::Closed);
        }

        let winsize = tcgetwinsize(self.async_fd.get_ref())?;

        Ok(WindowSize::new(winsize.ws_col, winsize.ws_row))
    }
}

/// Unix PTY master.
///
/// Owns the master side of a freshly allocated pseudo-terminal. Call
/// [`UnixPtyMaster::into_split`] to hand the read side to a background task.
pub struct UnixPtyMaster {
    fd: Arc<MasterFd>,
}

impl std::fmt::Debug for UnixPtyMaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixPtyMaster")
            .field("fd", &self.fd.async_fd.as_raw_fd())
            .field("open", &self.fd.is_open())
            .finish()
    }
}

impl UnixPtyMaster {
    /// Allocate a new pty pair and return the master plus the slave path.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open() -> Result<(Self, PathBuf)> {
        let master_fd = openpt(OpenptFlags::RDWR | OpenptFlags::NOCTTY)
            .map_err(|e| PtyError::Create(errno_to_io(e)))?;

        grantpt(&master_fd).map_err(|e| PtyError::Create(errno_to_io(e)))?;
        unlockpt(&master_fd).map_err(|e| PtyError::Create(errno_to_io(e)))?;

        let slave_name =
            ptsname(&master_fd, Vec::new()).map_err(|e| PtyError::Create(errno_to_io(e)))?;
        let slave_path = PathBuf::from(OsStr::from_bytes(slave_name.as_bytes()));

        // The child must not inherit the master.
        fcntl_setfd(&master_fd, FdFlags::CLOEXEC)
            .map_err(|e| PtyError::Create(errno_to_io(e)))?;
        fcntl_setfl(&master_fd, OFlags::NONBLOCK)
            .map_err(|e| PtyError::Create(errno_to_io(e)))?;

        let async_fd = AsyncFd::new(master_fd).map_err(PtyError::Create)?;

        Ok((
            Self {
                fd: Arc::new(MasterFd {
                    async_fd,
                    open: AtomicBool::new(true),
                }),
            },
            slave_path,
        ))
    }

    /// Split into a read half and a cloneable write/control half.
    #[must_use]
    pub fn into_split(self) -> (PtyReader, PtyWriter) {
        (
            PtyReader {
                fd: Arc::clone(&self.fd),
            },
            PtyWriter { fd: self.fd },
        )
    }

    /// Set the window size before the child starts.
    pub fn set_window_size(&self, size: WindowSize) -> Result<()> {
        self.fd.set_window_size(size)
    }
}

impl AsRawFd for UnixPtyMaster {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.async_fd.as_raw_fd()
    }
}

/// Read half of a split master.
pub struct PtyReader {
    fd: Arc<MasterFd>,
}

impl std::fmt::Debug for PtyReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyReader")
            .field("fd", &self.fd.async_fd.as_raw_fd())
            .finish()
    }
}

impl AsyncRead for PtyReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.fd.poll_read(cx, buf)
    }
}

/// Write and control half of a split master.
///
/// Clones share the descriptor, so the output task can answer terminal
/// queries while the session keeps its own handle for key input.
#[derive(Clone)]
pub struct PtyWriter {
    fd: Arc<MasterFd>,
}

impl std::fmt::Debug for PtyWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtyWriter")
            .field("fd", &self.fd.async_fd.as_raw_fd())
            .field("open", &self.fd.is_open())
            .finish()
    }
}

impl AsyncWrite for PtyWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.fd.poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl PtyControl for PtyWriter {
    fn resize(&self, size: WindowSize) -> Result<()> {
        self.fd.set_window_size(size)
    }

    fn window_size(&self) -> Result<WindowSize> {
        self.fd.window_size()
    }

    fn close(&self) {
        self.fd.close();
    }

    fn is_open(&self) -> bool {
        self.fd.is_open()
    }
}

/// Open the slave side of a pty for a child's stdio.
pub fn open_slave(path: &Path) -> Result<OwnedFd> {
    open(
        path,
        OFlags::RDWR | OFlags::NOCTTY | OFlags::CLOEXEC,
        Mode::empty(),
    )
    .map_err(|e| PtyError::Create(errno_to_io(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn open_pty() {
        let (master, slave_path) = UnixPtyMaster::open().unwrap();
        let (_reader, writer) = master.into_split();
        assert!(writer.is_open());
        let path = slave_path.to_string_lossy();
        assert!(path.starts_with("/dev/pts/") || path.starts_with("/dev/tty"));
    }

    #[tokio::test]
    async fn window_size_operations() {
        let (master, _) = UnixPtyMaster::open().unwrap();

        master.set_window_size(WindowSize::new(120, 40)).unwrap();
        let err = master.set_window_size(WindowSize::new(0, 40)).unwrap_err();
        assert!(matches!(err, PtyError::InvalidWindowSize { .. }));

        let (_reader, writer) = master.into_split();
        assert_eq!(writer.window_size().unwrap(), WindowSize::new(120, 40));
    }

    #[tokio::test]
    async fn split_halves_share_state() {
        let (master, _) = UnixPtyMaster::open().unwrap();
        let (_reader, writer) = master.into_split();
        let other = writer.clone();

        other.resize(WindowSize::new(100, 30)).unwrap();
        assert_eq!(writer.window_size().unwrap(), WindowSize::new(100, 30));

        writer.close();
        assert!(!other.is_open());
        assert!(matches!(other.resize(WindowSize::default()), Err(PtyError::Closed)));
    }

    #[tokio::test]
    async fn slave_output_reaches_reader() {
        let (master, slave_path) = UnixPtyMaster::open().unwrap();
        let slave = open_slave(&slave_path).unwrap();
        let (mut reader, _writer) = master.into_split();

        rustix::io::write(&slave, b"ping").unwrap();

        let mut buf = [0u8; 16];
        let n = reader.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"ping");
    }

    #[tokio::test]
    async fn write_after_close_fails() {
        let (master, _) = UnixPtyMaster::open().unwrap();
        let (_reader, mut writer) = master.into_split();
        writer.close();
        let err = writer.write_all(b"x").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn read_after_close_reports_eof() {
        let (master, slave_path) = UnixPtyMaster::open().unwrap();
        let slave = open_slave(&slave_path).unwrap();
        let (mut reader, writer) = master.into_split();
        rustix::io::write(&slave, b"pending").unwrap();

        writer.close();
        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(std::time::Duration::from_secs(1), reader.read(&mut buf))
            .await
            .expect("closed reader does not wait for output")
            .unwrap();
        assert_eq!(n, 0);
        assert!(matches!(writer.window_size(), Err(PtyError::Closed)));
    }
}
