//! File-based configuration loading.
//!
//! A session can be described in TOML:
//!
//! ```toml
//! [process]
//! command = "sh"
//! args = ["-c", "echo hi"]
//! env = { LANG = "C.UTF-8" }
//!
//! [terminal]
//! rows = 30
//! cols = 100
//!
//! [keys]
//! delimiters = "[]"
//!
//! [retry]
//! max_attempts = 10
//! initial_delay_ms = 5
//!
//! [wait]
//! timeout_ms = 2000
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::SessionConfigBuilder;
use crate::error::{Result, SessionError};

/// `[process]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessSection {
    /// Program to run.
    pub command: Option<String>,
    /// Program arguments.
    pub args: Vec<String>,
    /// Variables added to the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Variables removed from the inherited environment.
    pub env_remove: Vec<String>,
    /// Working directory.
    pub dir: Option<PathBuf>,
}

/// `[terminal]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TerminalSection {
    /// Height.
    pub rows: Option<u16>,
    /// Width.
    pub cols: Option<u16>,
    /// Keep every byte read from the pty.
    pub collect_raw_bytes: Option<bool>,
}

/// `[keys]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeysSection {
    /// Two-character tag delimiter string.
    pub delimiters: Option<String>,
}

/// `[retry]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySection {
    /// Assertion attempts.
    pub max_attempts: Option<u32>,
    /// Delay after the first failed attempt.
    pub initial_delay_ms: Option<u64>,
    /// Delay multiplier.
    pub backoff_factor: Option<f64>,
}

/// `[wait]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaitSection {
    /// Snapshot poll interval.
    pub poll_interval_ms: Option<u64>,
    /// `<WaitStable>` quiet period.
    pub stable_quiet_ms: Option<u64>,
    /// DSL wait timeout.
    pub timeout_ms: Option<u64>,
    /// Close join timeout.
    pub reader_join_timeout_ms: Option<u64>,
}

/// A session description loaded from TOML. Every table is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    /// Process settings.
    pub process: ProcessSection,
    /// Terminal settings.
    pub terminal: TerminalSection,
    /// DSL settings.
    pub keys: KeysSection,
    /// Assertion retry settings.
    pub retry: RetrySection,
    /// Wait timing.
    pub wait: WaitSection,
}

impl FileConfig {
    /// Parse TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SessionError::config(format!("invalid config: {e}")))
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SessionError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| SessionError::config(format!("invalid config {}: {e}", path.display())))
    }

    /// Start a builder from this file. The file must name a command.
    pub fn into_builder(self) -> Result<SessionConfigBuilder> {
        let command = self
            .process
            .command
            .clone()
            .ok_or_else(|| SessionError::config("config file has no [process] command"))?;
        Ok(self.apply(SessionConfigBuilder::new(command)))
    }

    /// Apply every value present in the file to `builder`.
    #[must_use]
    pub fn apply(self, mut builder: SessionConfigBuilder) -> SessionConfigBuilder {
        let Self {
            process,
            terminal,
            keys,
            retry,
            wait,
        } = self;

        if let Some(command) = process.command {
            builder = builder.command(command);
        }
        builder = builder.args(process.args);
        for (key, value) in process.env {
            builder = builder.env(key, value);
        }
        for key in process.env_remove {
            builder = builder.env_remove(key);
        }
        if let Some(dir) = process.dir {
            builder = builder.dir(dir);
        }

        if terminal.rows.is_some() || terminal.cols.is_some() {
            let rows = terminal.rows.unwrap_or(builder.config.rows);
            let cols = terminal.cols.unwrap_or(builder.config.cols);
            builder = builder.size(rows, cols);
        }
        if let Some(collect) = terminal.collect_raw_bytes {
            builder = builder.collect_raw_bytes(collect);
        }

        if let Some(delimiters) = keys.delimiters {
            builder = builder.delimiters(delimiters);
        }

        if let Some(attempts) = retry.max_attempts {
            builder = builder.max_attempts(attempts);
        }
        if let Some(ms) = retry.initial_delay_ms {
            builder = builder.initial_delay(Duration::from_millis(ms));
        }
        if let Some(factor) = retry.backoff_factor {
            builder = builder.backoff_factor(factor);
        }

        if let Some(ms) = wait.poll_interval_ms {
            builder = builder.poll_interval(Duration::from_millis(ms));
        }
        if let Some(ms) = wait.stable_quiet_ms {
            builder = builder.stable_quiet(Duration::from_millis(ms));
        }
        if let Some(ms) = wait.timeout_ms {
            builder = builder.wait_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = wait.reader_join_timeout_ms {
            builder = builder.reader_join_timeout(Duration::from_millis(ms));
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_file_round_trips_into_config() {
        let file = FileConfig::from_toml_str(
            r#"
            [process]
            command = "sh"
            args = ["-c", "echo hi"]
            env = { LANG = "C.UTF-8" }
            env_remove = ["PROMPT_COMMAND"]
            dir = "/tmp"

            [terminal]
            rows = 30
            collect_raw_bytes = true

            [keys]
            delimiters = "[]"

            [retry]
            max_attempts = 10
            initial_delay_ms = 5

            [wait]
            timeout_ms = 2000
            "#,
        )
        .unwrap();

        let config = file.into_builder().unwrap().build();
        assert_eq!(config.command(), "sh");
        assert_eq!(config.args(), ["-c", "echo hi"]);
        assert_eq!(config.env(), [("LANG".to_string(), "C.UTF-8".to_string())]);
        assert_eq!(config.env_remove(), ["PROMPT_COMMAND"]);
        assert_eq!(config.dir(), Some(Path::new("/tmp")));
        assert_eq!((config.rows(), config.cols()), (30, 80));
        assert!(config.collect_raw_bytes());
        assert_eq!(config.delimiters(), "[]");
        assert_eq!(config.retry().max_attempts, Some(10));
        assert_eq!(config.retry().initial_delay, Some(Duration::from_millis(5)));
        assert_eq!(config.wait().wait_timeout, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_command_is_an_error() {
        let file = FileConfig::from_toml_str("[terminal]\nrows = 10\n").unwrap();
        assert!(file.into_builder().is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = FileConfig::from_toml_str("[process]\ncommand = \"sh\"\ncolour = true\n").unwrap_err();
        assert!(err.to_string().contains("invalid config"));
    }

    #[test]
    fn apply_keeps_builder_values_not_in_file() {
        let builder = SessionConfigBuilder::new("bash").size(10, 40);
        let config = FileConfig::from_toml_str("[terminal]\ncols = 50\n")
            .unwrap()
            .apply(builder)
            .build();
        assert_eq!(config.command(), "bash");
        assert_eq!((config.rows(), config.cols()), (10, 50));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = FileConfig::load("/nonexistent/termshot.toml").unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
