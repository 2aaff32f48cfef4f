//! Unix child process management for PTY.
//!
//! The child is spawned as the leader of a new session with the pty slave as
//! its controlling terminal, so its process id doubles as its process group.

use std::ffi::OsStr;
use std::io;
use std::os::unix::io::OwnedFd;
use std::process::ExitStatus as StdExitStatus;

use rustix::process::{Pid, Signal, kill_process, kill_process_group};
use tokio::process::Child as TokioChild;

use crate::config::{PtyConfig, PtySignal};
use crate::error::{PtyError, Result, errno_to_io};
use crate::traits::ExitStatus;

/// Unix child process handle.
pub struct UnixPtyChild {
    child: TokioChild,
    pid: u32,
    exit_status: Option<ExitStatus>,
}

impl std::fmt::Debug for UnixPtyChild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnixPtyChild")
            .field("pid", &self.pid)
            .field("exit_status", &self.exit_status)
            .finish()
    }
}

impl UnixPtyChild {
    /// Wrap a freshly spawned tokio child.
    pub fn new(child: TokioChild) -> Result<Self> {
        let pid = child.id().ok_or_else(|| {
            PtyError::Spawn(io::Error::other("child exited before its pid was read"))
        })?;
        Ok(Self {
            child,
            pid,
            exit_status: None,
        })
    }

    /// Get the process ID.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Wait for the child process to exit.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        if let Some(status) = self.exit_status {
            return Ok(status);
        }

        let status = self.child.wait().await.map_err(PtyError::Wait)?;
        let status = convert_exit_status(status);
        self.exit_status = Some(status);
        Ok(status)
    }

    fn raw_pid(&self) -> Result<Pid> {
        raw_pid(self.pid)
    }

    /// Send a signal to the child process.
    ///
    /// Fails with [`PtyError::AlreadyExited`] once [`Self::wait`] has reaped it.
    pub fn signal(&self, signal: PtySignal) -> Result<()> {
        if self.exit_status.is_some() {
            return Err(PtyError::AlreadyExited);
        }
        kill_process(self.raw_pid()?, to_rustix(signal)?).map_err(map_kill_error)
    }

    /// Kill the child process (SIGKILL).
    pub fn kill(&mut self) -> Result<()> {
        self.signal(PtySignal::Kill)
    }
}

fn raw_pid(pid: u32) -> Result<Pid> {
    i32::try_from(pid)
        .ok()
        .and_then(Pid::from_raw)
        .ok_or_else(|| PtyError::Signal(io::Error::new(io::ErrorKind::InvalidInput, "invalid pid")))
}

/// Send a signal to the process group led by `pid`.
///
/// Children spawned by [`spawn_child`] lead their own group, so this reaches
/// the child and everything it started without holding its handle.
pub fn signal_process_group(pid: u32, signal: PtySignal) -> Result<()> {
    kill_process_group(raw_pid(pid)?, to_rustix(signal)?).map_err(map_kill_error)
}

fn to_rustix(signal: PtySignal) -> Result<Signal> {
    Signal::from_named_raw(signal.as_unix_signal()).ok_or_else(|| {
        PtyError::Signal(io::Error::new(
            io::ErrorKind::InvalidInput,
            "invalid signal",
        ))
    })
}

fn map_kill_error(errno: rustix::io::Errno) -> PtyError {
    if errno == rustix::io::Errno::SRCH {
        PtyError::AlreadyExited
    } else {
        PtyError::Signal(errno_to_io(errno))
    }
}

/// Convert `std::process::ExitStatus` to our `ExitStatus`.
fn convert_exit_status(status: StdExitStatus) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    if let Some(code) = status.code() {
        ExitStatus::Exited(code)
    } else if let Some(signal) = status.signal() {
        ExitStatus::Signaled(signal)
    } else {
        ExitStatus::Exited(-1)
    }
}

/// Spawn a child process on the slave side of a pty.
///
/// The slave descriptor becomes the child's stdin, stdout and stderr. The
/// child calls `setsid` and then claims stdin as its controlling terminal.
pub fn spawn_child<S, I>(
    slave_fd: OwnedFd,
    program: S,
    args: I,
    config: &PtyConfig,
) -> Result<UnixPtyChild>
where
    S: AsRef<OsStr>,
    I: IntoIterator,
    I::Item: AsRef<OsStr>,
{
    use std::process::Stdio;
    use tokio::process::Command;

    let mut cmd = Command::new(program.as_ref());
    cmd.args(args);
    cmd.env_clear();
    cmd.envs(config.effective_env());
    cmd.kill_on_drop(true);

    if let Some(ref dir) = config.working_directory {
        cmd.current_dir(dir);
    }

    cmd.stdin(Stdio::from(dup_fd(&slave_fd)?));
    cmd.stdout(Stdio::from(dup_fd(&slave_fd)?));
    cmd.stderr(Stdio::from(slave_fd));

    // SAFETY: setsid and ioctl are async-signal-safe.
    #[allow(unsafe_code)]
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            if libc::ioctl(0, libc::TIOCSCTTY, 0) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let child = cmd.spawn().map_err(PtyError::Spawn)?;
    tracing::debug!(pid = child.id(), "spawned child on pty");
    UnixPtyChild::new(child)
}

fn dup_fd(fd: &OwnedFd) -> Result<OwnedFd> {
    rustix::io::fcntl_dupfd_cloexec(fd, 0).map_err(|e| PtyError::Spawn(errno_to_io(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unix::pty::{UnixPtyMaster, open_slave};

    fn spawn_sh(script: &str) -> (UnixPtyMaster, UnixPtyChild) {
        let (master, slave_path) = UnixPtyMaster::open().unwrap();
        let slave = open_slave(&slave_path).unwrap();
        let child = spawn_child(slave, "sh", ["-c", script], &PtyConfig::default()).unwrap();
        (master, child)
    }

    #[tokio::test]
    async fn wait_reports_exit_code() {
        let (_master, mut child) = spawn_sh("exit 3");
        let status = child.wait().await.unwrap();
        assert_eq!(status, ExitStatus::Exited(3));
        assert_eq!(child.wait().await.unwrap(), status);
        assert!(matches!(
            child.signal(PtySignal::Terminate),
            Err(PtyError::AlreadyExited)
        ));
    }

    #[tokio::test]
    async fn kill_then_wait_is_signaled() {
        let (_master, mut child) = spawn_sh("sleep 30");
        child.kill().unwrap();
        let status = child.wait().await.unwrap();
        assert_eq!(status.signal(), Some(libc::SIGKILL));
        assert!(matches!(child.kill(), Err(PtyError::AlreadyExited)));
    }

    #[tokio::test]
    async fn group_signal_reaches_leader() {
        let (_master, mut child) = spawn_sh("sleep 30");
        signal_process_group(child.pid(), PtySignal::Kill).unwrap();
        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }
}
