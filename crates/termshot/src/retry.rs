//! Assertion retry engine.
//!
//! Screen assertions race the program under test, so each one polls: a
//! [`Retrier`] evaluates a predicate up to `max_attempts` times with
//! exponential backoff between attempts. When every attempt fails the last
//! diagnostic is reported through a [`FailureHook`].

use std::future::Future;
use std::time::Duration;

use regex::Regex;

use crate::snapshot::ScreenSnapshot;

/// Default number of attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 6;

/// Default delay after the first failed attempt.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(20);

/// Default delay multiplier.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Retry settings. Every field is optional; `None` means the default.
///
/// A `max_attempts` of zero and a non-positive or non-finite
/// `backoff_factor` are treated as unset. An explicit zero delay is
/// honoured.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RetryPolicy {
    /// Number of attempts, at least one.
    pub max_attempts: Option<u32>,
    /// Delay after the first failed attempt.
    pub initial_delay: Option<Duration>,
    /// Multiplier applied to the delay after each sleep.
    pub backoff_factor: Option<f64>,
}

impl RetryPolicy {
    /// A policy with every field unset.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts: None,
            initial_delay: None,
            backoff_factor: None,
        }
    }

    /// Set the number of attempts.
    #[must_use]
    pub const fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Set the initial delay.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set the backoff factor.
    #[must_use]
    pub const fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = Some(factor);
        self
    }

    /// Fill unset fields from `other`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self {
            max_attempts: self.max_attempts.or(other.max_attempts),
            initial_delay: self.initial_delay.or(other.initial_delay),
            backoff_factor: self.backoff_factor.or(other.backoff_factor),
        }
    }

    /// Effective number of attempts.
    #[must_use]
    pub fn effective_max_attempts(&self) -> u32 {
        self.max_attempts
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS)
    }

    /// Effective initial delay.
    #[must_use]
    pub fn effective_initial_delay(&self) -> Duration {
        self.initial_delay.unwrap_or(DEFAULT_INITIAL_DELAY)
    }

    /// Effective backoff factor.
    #[must_use]
    pub fn effective_backoff_factor(&self) -> f64 {
        self.backoff_factor
            .filter(|f| f.is_finite() && *f > 0.0)
            .unwrap_or(DEFAULT_BACKOFF_FACTOR)
    }
}

/// Receives the message of an exhausted assertion.
pub trait FailureHook: Send + Sync {
    /// Report a failed assertion.
    fn fail(&self, message: &str);
}

/// The default hook: panics, which fails the surrounding Rust test.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicHook;

impl FailureHook for PanicHook {
    fn fail(&self, message: &str) {
        panic!("{message}");
    }
}

impl<F> FailureHook for F
where
    F: Fn(&str) + Send + Sync,
{
    fn fail(&self, message: &str) {
        self(message);
    }
}

/// Every attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("assertion failed after {attempts} attempts: {diagnostic}")]
pub struct RetryExhausted {
    /// How many attempts ran.
    pub attempts: u32,
    /// The diagnostic from the last attempt.
    pub diagnostic: String,
}

/// Runs a predicate with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct Retrier {
    max_attempts: u32,
    initial_delay: Duration,
    backoff_factor: f64,
}

impl Default for Retrier {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl Retrier {
    /// Create a retrier, resolving unset fields to their defaults.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            max_attempts: policy.effective_max_attempts(),
            initial_delay: policy.effective_initial_delay(),
            backoff_factor: policy.effective_backoff_factor(),
        }
    }

    /// Number of attempts this retrier makes.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The sleep before attempt `n + 1`, for `n` starting at 1.
    fn next_delay(delay: Duration, factor: f64) -> Duration {
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    }

    /// Evaluate `predicate` until it succeeds or attempts run out.
    ///
    /// # Errors
    ///
    /// Returns [`RetryExhausted`] with the last diagnostic when every attempt
    /// fails.
    pub async fn run<F, Fut>(&self, mut predicate: F) -> Result<(), RetryExhausted>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        let mut delay = self.initial_delay;
        let mut attempt = 1;
        loop {
            match predicate().await {
                Ok(()) => return Ok(()),
                Err(diagnostic) if attempt >= self.max_attempts => {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        diagnostic,
                    });
                }
                Err(diagnostic) => {
                    tracing::trace!(attempt, ?delay, %diagnostic, "assertion attempt failed");
                    tokio::time::sleep(delay).await;
                    delay = Self::next_delay(delay, self.backoff_factor);
                    attempt += 1;
                }
            }
        }
    }

    /// Like [`Retrier::run`], but reports exhaustion through `hook`.
    ///
    /// Returns whether the assertion passed, for hooks that do not panic.
    pub async fn assert<F, Fut>(&self, predicate: F, hook: &dyn FailureHook) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), String>>,
    {
        match self.run(predicate).await {
            Ok(()) => true,
            Err(exhausted) => {
                hook.fail(&exhausted.to_string());
                false
            }
        }
    }
}

/// Check that `row` equals `want` exactly.
///
/// # Errors
///
/// Returns a diagnostic naming the row and showing both values.
pub fn line_matches(snapshot: &ScreenSnapshot, row: usize, want: &str) -> Result<(), String> {
    let got = snapshot.line(row);
    if got == want {
        Ok(())
    } else {
        Err(format!("line {row} mismatch:\nwant: {want:?}\ngot: {got:?}"))
    }
}

/// Check that the whole screen equals `want`, ignoring leading and trailing
/// whitespace on both sides. Blank rows below the last output do not count.
///
/// # Errors
///
/// Returns a diagnostic showing both screens.
pub fn screen_matches(snapshot: &ScreenSnapshot, want: &str) -> Result<(), String> {
    let want = want.trim();
    let text = snapshot.text();
    let got = text.trim();
    if got == want {
        Ok(())
    } else {
        Err(format!("screen mismatch:\nwant:\n{want}\ngot:\n{got}"))
    }
}

/// Check that the screen contains `needle`.
///
/// # Errors
///
/// Returns a diagnostic with the screen.
pub fn screen_contains(snapshot: &ScreenSnapshot, needle: &str) -> Result<(), String> {
    if snapshot.contains(needle) {
        Ok(())
    } else {
        Err(format!(
            "screen does not contain {needle:?}:\n{}",
            snapshot.text()
        ))
    }
}

/// Check that the screen text matches `pattern`.
///
/// # Errors
///
/// Returns a diagnostic with the screen.
pub fn screen_is_match(snapshot: &ScreenSnapshot, pattern: &Regex) -> Result<(), String> {
    if pattern.is_match(&snapshot.text()) {
        Ok(())
    } else {
        Err(format!(
            "screen does not match /{pattern}/:\n{}",
            snapshot.text()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[test]
    fn unset_fields_use_defaults() {
        let policy = RetryPolicy::new();
        assert_eq!(policy.effective_max_attempts(), 6);
        assert_eq!(policy.effective_initial_delay(), Duration::from_millis(20));
        assert!((policy.effective_backoff_factor() - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn deliberate_zero_delay_is_kept_but_zero_attempts_is_not() {
        let policy = RetryPolicy::new()
            .max_attempts(0)
            .initial_delay(Duration::ZERO)
            .backoff_factor(-1.0);
        assert_eq!(policy.effective_max_attempts(), 6);
        assert_eq!(policy.effective_initial_delay(), Duration::ZERO);
        assert!((policy.effective_backoff_factor() - 2.0).abs() < f64::EPSILON);
        assert!(
            (RetryPolicy::new().backoff_factor(f64::NAN).effective_backoff_factor() - 2.0).abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn or_fills_unset_fields_only() {
        let base = RetryPolicy::new().max_attempts(3);
        let merged = base.or(RetryPolicy::new().max_attempts(9).backoff_factor(1.5));
        assert_eq!(merged.max_attempts, Some(3));
        assert_eq!(merged.backoff_factor, Some(1.5));
        assert_eq!(merged.initial_delay, None);
    }

    #[tokio::test(start_paused = true)]
    async fn delays_grow_and_last_attempt_does_not_sleep() {
        let retrier = Retrier::new(RetryPolicy::new().max_attempts(4));
        let stamps = Mutex::new(Vec::new());
        let start = Instant::now();

        let err = retrier
            .run(|| {
                stamps.lock().unwrap().push(start.elapsed());
                async { Err::<(), _>("nope".to_string()) }
            })
            .await
            .unwrap_err();

        assert_eq!(err.attempts, 4);
        assert_eq!(err.diagnostic, "nope");
        let stamps = stamps.into_inner().unwrap();
        let gaps: Vec<Duration> = stamps.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(
            gaps,
            vec![
                Duration::from_millis(20),
                Duration::from_millis(40),
                Duration::from_millis(80)
            ]
        );
        assert_eq!(start.elapsed(), Duration::from_millis(140));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_later_attempt() {
        let calls = AtomicU32::new(0);
        let retrier = Retrier::default();
        let result = retrier
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n >= 2 { Ok(()) } else { Err(format!("attempt {n}")) } }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn assert_reports_through_hook() {
        let messages = std::sync::Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = messages.clone();
        let hook = move |msg: &str| sink.lock().unwrap().push(msg.to_string());

        let retrier = Retrier::new(RetryPolicy::new().max_attempts(2));
        let passed = retrier
            .assert(|| async { Err("line 0 mismatch".to_string()) }, &hook)
            .await;

        assert!(!passed);
        assert_eq!(
            messages.lock().unwrap().as_slice(),
            ["assertion failed after 2 attempts: line 0 mismatch"]
        );
    }

    #[tokio::test]
    #[should_panic(expected = "assertion failed after 1 attempts")]
    async fn panic_hook_panics() {
        let retrier = Retrier::new(RetryPolicy::new().max_attempts(1));
        retrier
            .assert(|| async { Err("boom".to_string()) }, &PanicHook)
            .await;
    }

    #[test]
    fn line_diagnostic_format() {
        let snap = ScreenSnapshot::from_rows(vec!["hello".into()]);
        assert!(line_matches(&snap, 0, "hello").is_ok());
        assert_eq!(
            line_matches(&snap, 0, "help").unwrap_err(),
            "line 0 mismatch:\nwant: \"help\"\ngot: \"hello\""
        );
    }

    #[test]
    fn screen_match_trims_both_sides() {
        let snap = ScreenSnapshot::from_rows(vec!["a".into(), "b".into()]);
        assert!(screen_matches(&snap, "\n  a\nb  \n").is_ok());
        assert!(screen_matches(&snap, "a \nb").is_err());

        let padded = ScreenSnapshot::from_rows(vec!["a".into(), String::new(), String::new()]);
        assert!(screen_matches(&padded, "a").is_ok());
        assert!(screen_matches(&padded, "a\n\n").is_ok());

        let blank_first = ScreenSnapshot::from_rows(vec![String::new(), "a".into(), String::new()]);
        assert!(screen_matches(&blank_first, "a").is_ok());

        let inner_gap = ScreenSnapshot::from_rows(vec!["a".into(), String::new(), "b".into()]);
        assert!(screen_matches(&inner_gap, "a\nb").is_err());
        assert!(screen_matches(&inner_gap, "a\n\nb").is_ok());
    }

    #[test]
    fn contains_and_regex() {
        let snap = ScreenSnapshot::from_rows(vec!["$ ls".into(), "file.txt".into()]);
        assert!(screen_contains(&snap, "file").is_ok());
        assert!(screen_contains(&snap, "missing").is_err());
        let re = Regex::new(r"file\.\w+").unwrap();
        assert!(screen_is_match(&snap, &re).is_ok());
        let re = Regex::new(r"^\d+$").unwrap();
        assert!(screen_is_match(&snap, &re).unwrap_err().contains("does not match"));
    }
}
