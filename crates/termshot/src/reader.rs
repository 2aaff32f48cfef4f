//! Output reader task.
//!
//! One task per running session drains the pty, feeding every chunk to the
//! engine under the session lock. Replies the engine queues are written back
//! to the pty once the lock is released. The task reports how it ended on a
//! oneshot channel exactly once.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use termshot_pty::PtyError;

use crate::engine::TerminalEngine;
use crate::snapshot::ScreenSnapshot;

/// Size of each pty read.
const READ_BUFFER_SIZE: usize = 4096;

/// How the output reader ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    /// The pty reported end of stream.
    Eof,
    /// The child side of the pty closed (`EIO` on Linux).
    Hangup,
    /// A read failed with some other error.
    Failed(String),
}

impl ReaderExit {
    /// True for the normal ways a reader ends.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        matches!(self, Self::Eof | Self::Hangup)
    }
}

/// Terminal state shared by the session and its reader.
#[derive(Debug)]
pub(crate) struct TermState<E> {
    pub(crate) engine: Option<E>,
    pub(crate) raw: Option<Vec<u8>>,
    pub(crate) last_activity: Instant,
    pub(crate) exit: Option<ReaderExit>,
}

impl<E: TerminalEngine> TermState<E> {
    pub(crate) fn new(engine: E, collect_raw: bool) -> Self {
        Self {
            engine: Some(engine),
            raw: collect_raw.then(Vec::new),
            last_activity: Instant::now(),
            exit: None,
        }
    }

    /// A state with no engine, for sessions that are not running.
    pub(crate) fn detached() -> Self {
        Self {
            engine: None,
            raw: None,
            last_activity: Instant::now(),
            exit: None,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Record a chunk of output. Returns any replies the engine queued.
    pub(crate) fn absorb(&mut self, bytes: &[u8]) -> Vec<u8> {
        if let Some(raw) = self.raw.as_mut() {
            raw.extend_from_slice(bytes);
        }
        self.touch();
        let Some(engine) = self.engine.as_mut() else {
            return Vec::new();
        };
        engine.feed(bytes);
        engine.flush();
        engine.take_replies()
    }

    pub(crate) fn snapshot(&self) -> ScreenSnapshot {
        self.engine
            .as_ref()
            .map_or_else(ScreenSnapshot::empty, ScreenSnapshot::capture)
    }
}

/// Handle to a spawned reader.
#[derive(Debug)]
pub(crate) struct ReaderHandle {
    pub(crate) task: JoinHandle<()>,
    pub(crate) done: oneshot::Receiver<ReaderExit>,
}

/// Spawn the reader loop on the current runtime.
pub(crate) fn spawn_reader<E, R, W>(
    mut source: R,
    mut replies: W,
    state: Arc<Mutex<TermState<E>>>,
) -> ReaderHandle
where
    E: TerminalEngine,
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (done_tx, done) = oneshot::channel();

    let task = tokio::spawn(async move {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let exit = loop {
            match source.read(&mut buf).await {
                Ok(0) => break ReaderExit::Eof,
                Ok(n) => {
                    tracing::trace!(bytes = n, "pty output");
                    let pending = state.lock().await.absorb(&buf[..n]);
                    if !pending.is_empty() {
                        tracing::trace!(bytes = pending.len(), "terminal reply");
                        if let Err(e) = replies.write_all(&pending).await {
                            tracing::warn!(error = %e, "failed to write terminal reply");
                        }
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) if PtyError::is_hangup(&e) => break ReaderExit::Hangup,
                Err(e) => {
                    tracing::warn!(error = %e, "pty read failed");
                    break ReaderExit::Failed(e.to_string());
                }
            }
        };

        tracing::debug!(?exit, "output reader finished");
        state.lock().await.exit = Some(exit.clone());
        let _ = done_tx.send(exit);
    });

    ReaderHandle { task, done }
}
