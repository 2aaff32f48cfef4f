//! termshot: drive terminal programs through a pty and assert on their
//! rendered screen.
//!
//! A [`Session`] spawns a program on a pseudo-terminal, feeds everything it
//! prints to a virtual terminal engine and lets tests send keystrokes and
//! check what is on screen. Because screen contents race the program,
//! assertions retry with backoff before failing.
//!
//! # Features
//!
//! - **Async-first design** with the Tokio runtime, plus [`SyncSession`]
//! - **Keystroke DSL**: `"ls -l<Enter><WaitStable>"`, see [`keys`]
//! - **Pluggable engine** behind [`engine::TerminalEngine`]
//! - **Retrying assertions** on lines, whole screens, substrings and regexes
//! - **Configuration** in code, TOML files or `TERMSHOT_*` variables
//!
//! # Example
//!
//! ```rust,no_run
//! use termshot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = SessionConfig::builder("printf")
//!         .arg("line1\\nline2")
//!         .build();
//!     let mut session = Session::with_config(config)?;
//!     session.start(CancellationToken::new()).await?;
//!
//!     session.assert_line_eq(0, "line1").await;
//!     session.assert_line_eq(1, "line2").await;
//!
//!     session.close().await
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod keys;
pub mod prelude;
pub mod retry;
pub mod snapshot;
pub mod stability;

#[cfg(unix)]
pub mod reader;
#[cfg(unix)]
pub mod session;
#[cfg(unix)]
pub mod sync;

pub use config::{SessionConfig, SessionConfigBuilder, WaitConfig};
pub use engine::{EngineError, TerminalEngine, VtEngine};
pub use error::{CleanupError, CleanupFailure, Result, SessionError, StartupError};
pub use keys::{KeyToken, Keys, ParseError, ParseErrorKind, ParseOptions};
pub use retry::{FailureHook, PanicHook, Retrier, RetryExhausted, RetryPolicy};
pub use snapshot::ScreenSnapshot;
pub use stability::{SnapshotSource, StabilityDetector};

#[cfg(unix)]
pub use reader::ReaderExit;
#[cfg(unix)]
pub use session::{Phase, Session};
#[cfg(unix)]
pub use sync::SyncSession;

pub use tokio_util::sync::CancellationToken;
