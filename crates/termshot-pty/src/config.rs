//! Configuration types for spawning a child under a pty.
//!
//! [`PtyConfig`] describes the child's environment and the initial window,
//! [`WindowSize`] is the geometry handed to the kernel and [`PtySignal`]
//! names the signals the session layer sends.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::{PtyError, Result};

/// Configuration for spawning a child process on a new pty.
///
/// # Example
///
/// ```
/// use termshot_pty::PtyConfig;
///
/// let config = PtyConfig::builder()
///     .working_directory("/tmp")
///     .env("LANG", "C.UTF-8")
///     .window_size(80, 24)
///     .build();
/// assert_eq!(config.window_size.rows, 24);
/// ```
#[derive(Debug, Clone)]
pub struct PtyConfig {
    /// Working directory for the child process.
    pub working_directory: Option<PathBuf>,

    /// Variables added on top of the inherited environment.
    pub env_add: Vec<(OsString, OsString)>,

    /// Variables removed from the inherited environment.
    pub env_remove: Vec<OsString>,

    /// Initial window size.
    pub window_size: WindowSize,
}

impl Default for PtyConfig {
    fn default() -> Self {
        Self {
            working_directory: None,
            env_add: Vec::new(),
            env_remove: Vec::new(),
            window_size: WindowSize::default(),
        }
    }
}

impl PtyConfig {
    /// Create a new builder for `PtyConfig`.
    #[must_use]
    pub fn builder() -> PtyConfigBuilder {
        PtyConfigBuilder::new()
    }

    /// Compute the environment the child will see, starting from this
    /// process's own.
    ///
    /// Added variables are applied in order, so a later entry for the same
    /// key wins. Removals are applied last.
    #[must_use]
    pub fn effective_env(&self) -> HashMap<OsString, OsString> {
        let mut env: HashMap<OsString, OsString> = std::env::vars_os().collect();

        for (key, value) in &self.env_add {
            env.insert(key.clone(), value.clone());
        }

        for key in &self.env_remove {
            env.remove(key);
        }

        env
    }
}

/// Builder for [`PtyConfig`].
#[derive(Debug, Clone, Default)]
pub struct PtyConfigBuilder {
    config: PtyConfig,
}

impl PtyConfigBuilder {
    /// Create a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory for the child process.
    #[must_use]
    pub fn working_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.working_directory = Some(path.into());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.config.env_add.push((key.into(), value.into()));
        self
    }

    /// Remove an environment variable.
    #[must_use]
    pub fn env_remove(mut self, key: impl Into<OsString>) -> Self {
        self.config.env_remove.push(key.into());
        self
    }

    /// Set the initial window size.
    #[must_use]
    pub const fn window_size(mut self, cols: u16, rows: u16) -> Self {
        self.config.window_size = WindowSize::new(cols, rows);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> PtyConfig {
        self.config
    }
}

/// Signals the session layer delivers to a child or its process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PtySignal {
    /// SIGTERM.
    Terminate,
    /// SIGKILL.
    Kill,
}

impl PtySignal {
    /// Get the Unix signal number.
    #[cfg(unix)]
    #[must_use]
    pub const fn as_unix_signal(self) -> i32 {
        match self {
            Self::Terminate => libc::SIGTERM,
            Self::Kill => libc::SIGKILL,
        }
    }
}

/// Window size for the PTY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    /// Number of columns (characters per line).
    pub cols: u16,
    /// Number of rows (lines).
    pub rows: u16,
}

impl WindowSize {
    /// Create a new window size with the given dimensions.
    #[must_use]
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Reject geometries the kernel would accept but no screen can render.
    pub const fn validate(self) -> Result<Self> {
        if self.cols == 0 || self.rows == 0 {
            return Err(PtyError::InvalidWindowSize {
                cols: self.cols,
                rows: self.rows,
            });
        }
        Ok(self)
    }
}

impl Default for WindowSize {
    fn default() -> Self {
        Self::new(80, 24)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn config_builder() {
        let config = PtyConfig::builder()
            .working_directory("/tmp")
            .env("FOO", "bar")
            .window_size(120, 40)
            .build();

        assert_eq!(config.working_directory, Some(PathBuf::from("/tmp")));
        assert_eq!(config.window_size, WindowSize::new(120, 40));
        assert_eq!(config.env_add.len(), 1);
    }

    #[test]
    fn effective_env_applies_adds_then_removals() {
        let config = PtyConfig::builder()
            .env("TERMSHOT_PTY_A", "1")
            .env("TERMSHOT_PTY_A", "2")
            .env("TERMSHOT_PTY_B", "3")
            .env_remove("TERMSHOT_PTY_B")
            .env_remove("PATH")
            .build();

        let env = config.effective_env();
        assert_eq!(env.get(&OsString::from("TERMSHOT_PTY_A")), Some(&OsString::from("2")));
        assert!(!env.contains_key(&OsString::from("TERMSHOT_PTY_B")));
        assert!(!env.contains_key(&OsString::from("PATH")));
    }

    #[test]
    fn window_size_default() {
        let size = WindowSize::default();
        assert_eq!(size.cols, 80);
        assert_eq!(size.rows, 24);
    }

    proptest! {
        #[test]
        fn validate_rejects_only_zero_dimensions(cols in 0u16..512, rows in 0u16..512) {
            let result = WindowSize::new(cols, rows).validate();
            prop_assert_eq!(result.is_ok(), cols > 0 && rows > 0);
        }
    }
}
