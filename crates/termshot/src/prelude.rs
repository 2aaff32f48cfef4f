//! Convenient re-exports for common termshot usage.
//!
//! ```rust
//! use termshot::prelude::*;
//! ```

// Configuration
pub use crate::config::{SessionConfig, SessionConfigBuilder, WaitConfig};

// Error handling
pub use crate::error::{Result, SessionError};

// Keys
pub use crate::keys::{KeyToken, Keys, ParseOptions};

// Screen
pub use crate::snapshot::ScreenSnapshot;

// Assertions
pub use crate::retry::{FailureHook, RetryPolicy};

// Session types
#[cfg(unix)]
pub use crate::session::{Phase, Session};
#[cfg(unix)]
pub use crate::sync::SyncSession;

pub use regex::Regex;
pub use tokio_util::sync::CancellationToken;
