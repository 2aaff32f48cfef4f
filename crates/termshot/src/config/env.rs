//! Environment-based configuration.
//!
//! Test suites tune assertion retries and wait timing without code changes
//! through `TERMSHOT_*` variables, read by [`EnvConfig`] and applied with
//! [`SessionConfigBuilder::apply_env`].

use std::collections::HashMap;
use std::time::Duration;

use super::SessionConfigBuilder;

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "TERMSHOT";

/// Variable names, without the prefix.
pub mod vars {
    /// Assertion attempts.
    pub const ASSERT_MAX_ATTEMPTS: &str = "ASSERT_MAX_ATTEMPTS";
    /// Delay after the first failed assertion attempt, in milliseconds.
    pub const ASSERT_INITIAL_DELAY_MS: &str = "ASSERT_INITIAL_DELAY_MS";
    /// Assertion backoff factor.
    pub const ASSERT_BACKOFF_FACTOR: &str = "ASSERT_BACKOFF_FACTOR";
    /// Snapshot poll interval, in milliseconds.
    pub const POLL_INTERVAL_MS: &str = "POLL_INTERVAL_MS";
    /// `<WaitStable>` quiet period, in milliseconds.
    pub const STABLE_QUIET_MS: &str = "STABLE_QUIET_MS";
    /// DSL wait timeout, in milliseconds.
    pub const WAIT_TIMEOUT_MS: &str = "WAIT_TIMEOUT_MS";
    /// Close join timeout, in milliseconds.
    pub const READER_JOIN_TIMEOUT_MS: &str = "READER_JOIN_TIMEOUT_MS";
}

/// Environment variable reader.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    prefix: String,
    /// Fixed values used instead of the process environment.
    fixed: Option<HashMap<String, String>>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Read variables named `<prefix>_<NAME>` from the process environment.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            fixed: None,
        }
    }

    /// Read from the given full-name pairs instead of the process
    /// environment.
    #[must_use]
    pub fn from_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            fixed: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let var_name = self.var_name(name);
        match &self.fixed {
            Some(map) => map.get(&var_name).cloned(),
            None => std::env::var(&var_name).ok(),
        }
    }

    /// Get a parsed value. Unparsable values are ignored with a warning.
    #[must_use]
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        let raw = self.get(name)?;
        match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(var = %self.var_name(name), value = %raw, "ignoring unparsable variable");
                None
            }
        }
    }

    /// Get a duration in milliseconds.
    #[must_use]
    pub fn duration_millis(&self, name: &str) -> Option<Duration> {
        self.parse::<u64>(name).map(Duration::from_millis)
    }
}

impl SessionConfigBuilder {
    /// Override retry and wait settings from environment variables.
    ///
    /// Unset and unparsable variables leave the current value alone.
    #[must_use]
    pub fn apply_env(mut self, env: &EnvConfig) -> Self {
        if let Some(attempts) = env.parse(vars::ASSERT_MAX_ATTEMPTS) {
            self = self.max_attempts(attempts);
        }
        if let Some(delay) = env.duration_millis(vars::ASSERT_INITIAL_DELAY_MS) {
            self = self.initial_delay(delay);
        }
        if let Some(factor) = env.parse(vars::ASSERT_BACKOFF_FACTOR) {
            self = self.backoff_factor(factor);
        }
        if let Some(interval) = env.duration_millis(vars::POLL_INTERVAL_MS) {
            self = self.poll_interval(interval);
        }
        if let Some(quiet) = env.duration_millis(vars::STABLE_QUIET_MS) {
            self = self.stable_quiet(quiet);
        }
        if let Some(timeout) = env.duration_millis(vars::WAIT_TIMEOUT_MS) {
            self = self.wait_timeout(timeout);
        }
        if let Some(timeout) = env.duration_millis(vars::READER_JOIN_TIMEOUT_MS) {
            self = self.reader_join_timeout(timeout);
        }
        self
    }
}
