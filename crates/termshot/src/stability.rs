//! Screen stability detection.
//!
//! A [`StabilityDetector`] polls a [`SnapshotSource`] and decides when output
//! has settled ([`StabilityDetector::wait_stable`]) or when some text has
//! appeared ([`StabilityDetector::wait_for`]). Both are content-diff based:
//! only the rendered text is compared, never byte activity.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{Result, SessionError};
use crate::snapshot::ScreenSnapshot;

/// Default interval between snapshots.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shortest poll interval accepted; zero would spin on the session lock.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Anything that can produce a screen snapshot on demand.
pub trait SnapshotSource: Sync {
    /// Capture the current screen.
    fn snapshot(&self) -> impl Future<Output = ScreenSnapshot> + Send;
}

/// A point in time after which polling stops.
#[derive(Debug, Clone, Copy)]
struct Deadline(Instant);

impl Deadline {
    fn from_now(duration: Duration) -> Self {
        Self(Instant::now() + duration)
    }

    fn is_expired(self) -> bool {
        Instant::now() >= self.0
    }

    fn remaining(self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }
}

/// Polls snapshots at a fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct StabilityDetector {
    poll_interval: Duration,
}

impl Default for StabilityDetector {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl StabilityDetector {
    /// Create a detector polling at `poll_interval` (at least 1ms).
    #[must_use]
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    /// The effective poll interval.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    async fn pause(&self, deadline: Deadline) {
        tokio::time::sleep(self.poll_interval.min(deadline.remaining())).await;
    }

    /// Wait until the screen has not changed for `quiet`.
    ///
    /// Returns `false` if `timeout` elapses first.
    pub async fn wait_stable<S>(&self, source: &S, quiet: Duration, timeout: Duration) -> bool
    where
        S: SnapshotSource + ?Sized,
    {
        let deadline = Deadline::from_now(timeout);
        let mut previous = source.snapshot().await;
        let mut quiet_since = Instant::now();

        loop {
            if deadline.is_expired() {
                tracing::debug!(?quiet, ?timeout, "screen did not stabilize");
                return false;
            }
            self.pause(deadline).await;

            let current = source.snapshot().await;
            let now = Instant::now();
            if current == previous {
                if now.duration_since(quiet_since) >= quiet {
                    return true;
                }
            } else {
                previous = current;
                quiet_since = now;
            }
        }
    }

    /// Wait until the screen contains `text`, returning the matching snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Timeout`] carrying the last observed screen
    /// when `timeout` elapses first.
    pub async fn wait_for<S>(&self, source: &S, text: &str, timeout: Duration) -> Result<ScreenSnapshot>
    where
        S: SnapshotSource + ?Sized,
    {
        let deadline = Deadline::from_now(timeout);
        loop {
            let snapshot = source.snapshot().await;
            if snapshot.contains(text) {
                return Ok(snapshot);
            }
            if deadline.is_expired() {
                return Err(SessionError::timeout(
                    format!("waiting for {text:?}"),
                    timeout,
                    snapshot.text(),
                ));
            }
            self.pause(deadline).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// A screen whose content is a function of elapsed time.
    struct Scripted {
        start: Instant,
        frames: Box<dyn Fn(Duration) -> String + Send + Sync>,
        polls: Mutex<usize>,
    }

    impl Scripted {
        fn new(frames: impl Fn(Duration) -> String + Send + Sync + 'static) -> Self {
            Self {
                start: Instant::now(),
                frames: Box::new(frames),
                polls: Mutex::new(0),
            }
        }
    }

    impl SnapshotSource for Scripted {
        async fn snapshot(&self) -> ScreenSnapshot {
            *self.polls.lock().unwrap() += 1;
            let text = (self.frames)(self.start.elapsed());
            ScreenSnapshot::from_rows(vec![text])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stable_after_output_stops() {
        let source = Scripted::new(|t| {
            let ms = t.as_millis().min(30);
            format!("tick {ms}")
        });
        let detector = StabilityDetector::default();
        let started = Instant::now();

        let stable = detector
            .wait_stable(&source, Duration::from_millis(50), Duration::from_secs(2))
            .await;

        let elapsed = started.elapsed();
        assert!(stable);
        assert!(elapsed >= Duration::from_millis(50), "{elapsed:?}");
        assert!(elapsed <= Duration::from_millis(100), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn never_settles_returns_false() {
        let source = Scripted::new(|t| format!("{}", t.as_millis()));
        let detector = StabilityDetector::default();
        let started = Instant::now();

        let stable = detector
            .wait_stable(&source, Duration::from_millis(50), Duration::from_millis(500))
            .await;

        assert!(!stable);
        assert!(started.elapsed() >= Duration::from_millis(500));
        assert!(started.elapsed() < Duration::from_millis(520));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_returns_matching_snapshot() {
        let source = Scripted::new(|t| {
            if t >= Duration::from_millis(40) {
                "$ ready".to_string()
            } else {
                "$ loading".to_string()
            }
        });
        let detector = StabilityDetector::new(Duration::from_millis(10));

        let snap = detector
            .wait_for(&source, "ready", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(snap.line(0), "$ ready");
        assert!(*source.polls.lock().unwrap() >= 5);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_timeout_carries_last_screen() {
        let source = Scripted::new(|_| "nothing here".to_string());
        let detector = StabilityDetector::default();

        let err = detector
            .wait_for(&source, "ready", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.screen(), Some("nothing here"));
        assert!(err.to_string().contains("waiting for \"ready\""));
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let detector = StabilityDetector::new(Duration::ZERO);
        assert_eq!(detector.poll_interval(), MIN_POLL_INTERVAL);
    }
}
