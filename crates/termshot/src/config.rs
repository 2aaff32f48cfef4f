//! Session configuration.
//!
//! A [`SessionConfig`] is an immutable value built before a session starts.
//! It can be assembled in code with [`SessionConfig::builder`], from a TOML
//! file through [`file::FileConfig`], and adjusted from `TERMSHOT_*`
//! environment variables with [`SessionConfigBuilder::apply_env`].

pub mod env;
pub mod file;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use termshot_pty::PtyConfig;

use crate::error::{Result, SessionError};
use crate::keys::ParseOptions;
use crate::retry::{FailureHook, PanicHook, RetryPolicy};

/// Default terminal height.
pub const DEFAULT_ROWS: u16 = 24;

/// Default terminal width.
pub const DEFAULT_COLS: u16 = 80;

/// Default DSL tag delimiters.
pub const DEFAULT_DELIMITERS: &str = "<>";

/// TERM given to the child unless the caller sets or removes it.
pub const DEFAULT_TERM: &str = "xterm-256color";

/// Timing of polls and bounded waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Interval between snapshots in stability and text waits.
    pub poll_interval: Duration,
    /// Quiet period a `<WaitStable>` directive requires.
    pub stable_quiet: Duration,
    /// Timeout of `<WaitStable>` and `<WaitFor ...>` directives.
    pub wait_timeout: Duration,
    /// How long close waits for the child and for the output reader.
    pub reader_join_timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            stable_quiet: Duration::from_millis(100),
            wait_timeout: Duration::from_secs(5),
            reader_join_timeout: Duration::from_secs(2),
        }
    }
}

/// Everything needed to start a session.
#[derive(Clone)]
pub struct SessionConfig {
    pub(crate) command: String,
    pub(crate) args: Vec<String>,
    pub(crate) env: Vec<(String, String)>,
    pub(crate) env_remove: Vec<String>,
    pub(crate) dir: Option<PathBuf>,
    pub(crate) rows: u16,
    pub(crate) cols: u16,
    pub(crate) delimiters: String,
    pub(crate) retry: RetryPolicy,
    pub(crate) wait: WaitConfig,
    pub(crate) collect_raw_bytes: bool,
    pub(crate) failure_hook: Arc<dyn FailureHook>,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("command", &self.command)
            .field("args", &self.args)
            .field("env", &self.env)
            .field("env_remove", &self.env_remove)
            .field("dir", &self.dir)
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("delimiters", &self.delimiters)
            .field("retry", &self.retry)
            .field("wait", &self.wait)
            .field("collect_raw_bytes", &self.collect_raw_bytes)
            .finish_non_exhaustive()
    }
}

impl SessionConfig {
    /// Start building a configuration for `command`.
    #[must_use]
    pub fn builder(command: impl Into<String>) -> SessionConfigBuilder {
        SessionConfigBuilder::new(command)
    }

    /// The program to run.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Program arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Variables added to the inherited environment.
    #[must_use]
    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    /// Variables removed from the inherited environment.
    #[must_use]
    pub fn env_remove(&self) -> &[String] {
        &self.env_remove
    }

    /// Working directory, if not the current one.
    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Terminal height.
    #[must_use]
    pub const fn rows(&self) -> u16 {
        self.rows
    }

    /// Terminal width.
    #[must_use]
    pub const fn cols(&self) -> u16 {
        self.cols
    }

    /// DSL tag delimiters as configured.
    #[must_use]
    pub fn delimiters(&self) -> &str {
        &self.delimiters
    }

    /// Retry policy for assertions.
    #[must_use]
    pub const fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Poll and wait timing.
    #[must_use]
    pub const fn wait(&self) -> WaitConfig {
        self.wait
    }

    /// Whether every byte read from the pty is kept.
    #[must_use]
    pub const fn collect_raw_bytes(&self) -> bool {
        self.collect_raw_bytes
    }

    /// Where exhausted assertions are reported.
    #[must_use]
    pub fn failure_hook(&self) -> &Arc<dyn FailureHook> {
        &self.failure_hook
    }

    /// Parse options for the configured delimiters.
    pub fn parse_options(&self) -> Result<ParseOptions> {
        ParseOptions::from_delimiters(&self.delimiters)
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] for an empty command, a zero
    /// dimension or delimiters that are not two distinct characters.
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(SessionError::config("no command configured"));
        }
        if self.rows == 0 || self.cols == 0 {
            return Err(SessionError::config(format!(
                "terminal size must be non-zero, got {}x{}",
                self.rows, self.cols
            )));
        }
        self.parse_options()?;
        Ok(())
    }

    /// The pty settings for this configuration.
    pub(crate) fn pty_config(&self) -> PtyConfig {
        let mut builder = PtyConfig::builder().window_size(self.cols, self.rows);
        let sets_term = self.env.iter().any(|(k, _)| k == "TERM");
        let removes_term = self.env_remove.iter().any(|k| k == "TERM");
        if !sets_term && !removes_term {
            builder = builder.env("TERM", DEFAULT_TERM);
        }
        for (key, value) in &self.env {
            builder = builder.env(key, value);
        }
        for key in &self.env_remove {
            builder = builder.env_remove(key);
        }
        if let Some(dir) = &self.dir {
            builder = builder.working_directory(dir);
        }
        builder.build()
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug, Clone)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Create a builder with defaults for everything but the command.
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            config: SessionConfig {
                command: command.into(),
                args: Vec::new(),
                env: Vec::new(),
                env_remove: Vec::new(),
                dir: None,
                rows: DEFAULT_ROWS,
                cols: DEFAULT_COLS,
                delimiters: DEFAULT_DELIMITERS.to_string(),
                retry: RetryPolicy::default(),
                wait: WaitConfig::default(),
                collect_raw_bytes: false,
                failure_hook: Arc::new(PanicHook),
            },
        }
    }

    /// Replace the command.
    #[must_use]
    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.config.command = command.into();
        self
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.config.args.push(arg.into());
        self
    }

    /// Append arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an environment variable on top of the inherited environment.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env.push((key.into(), value.into()));
        self
    }

    /// Remove an inherited environment variable.
    #[must_use]
    pub fn env_remove(mut self, key: impl Into<String>) -> Self {
        self.config.env_remove.push(key.into());
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.dir = Some(dir.into());
        self
    }

    /// Set the terminal size.
    #[must_use]
    pub const fn size(mut self, rows: u16, cols: u16) -> Self {
        self.config.rows = rows;
        self.config.cols = cols;
        self
    }

    /// Set the DSL tag delimiters, e.g. `"[]"`.
    #[must_use]
    pub fn delimiters(mut self, delimiters: impl Into<String>) -> Self {
        self.config.delimiters = delimiters.into();
        self
    }

    /// Set the whole retry policy.
    #[must_use]
    pub const fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Set the number of assertion attempts.
    #[must_use]
    pub const fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = Some(attempts);
        self
    }

    /// Set the delay after the first failed assertion attempt.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.config.retry.initial_delay = Some(delay);
        self
    }

    /// Set the assertion backoff factor.
    #[must_use]
    pub const fn backoff_factor(mut self, factor: f64) -> Self {
        self.config.retry.backoff_factor = Some(factor);
        self
    }

    /// Set all wait timing at once.
    #[must_use]
    pub const fn wait(mut self, wait: WaitConfig) -> Self {
        self.config.wait = wait;
        self
    }

    /// Set the snapshot poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.wait.poll_interval = interval;
        self
    }

    /// Set the quiet period of `<WaitStable>`.
    #[must_use]
    pub const fn stable_quiet(mut self, quiet: Duration) -> Self {
        self.config.wait.stable_quiet = quiet;
        self
    }

    /// Set the timeout of DSL wait directives.
    #[must_use]
    pub const fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.config.wait.wait_timeout = timeout;
        self
    }

    /// Set how long close waits for the child and the reader.
    #[must_use]
    pub const fn reader_join_timeout(mut self, timeout: Duration) -> Self {
        self.config.wait.reader_join_timeout = timeout;
        self
    }

    /// Keep a copy of every byte read from the pty.
    #[must_use]
    pub const fn collect_raw_bytes(mut self, collect: bool) -> Self {
        self.config.collect_raw_bytes = collect;
        self
    }

    /// Report exhausted assertions to `hook` instead of panicking.
    #[must_use]
    pub fn failure_hook(mut self, hook: impl FailureHook + 'static) -> Self {
        self.config.failure_hook = Arc::new(hook);
        self
    }

    /// Finish building. Validation happens when the config is applied to a
    /// session, or explicitly with [`SessionConfig::validate`].
    #[must_use]
    pub fn build(self) -> SessionConfig {
        self.config
    }
}
