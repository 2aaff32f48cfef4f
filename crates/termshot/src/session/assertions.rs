//! Retrying screen assertions.
//!
//! Each assertion polls the screen with the session's retry policy and
//! reports exhaustion through its failure hook, which panics by default.
//! The returned `bool` only matters for hooks that do not panic.

use regex::Regex;

use super::Session;
use crate::engine::TerminalEngine;
use crate::retry::{line_matches, screen_contains, screen_is_match, screen_matches};

impl<E: TerminalEngine> Session<E> {
    /// Assert that row `row` (0-based) equals `want` exactly.
    pub async fn assert_line_eq(&self, row: usize, want: &str) -> bool {
        let hook = self.failure_hook();
        self.retrier()
            .assert(
                move || async move { line_matches(&self.snapshot().await, row, want) },
                hook.as_ref(),
            )
            .await
    }

    /// Assert that the whole screen equals `want`. Leading and trailing
    /// whitespace is trimmed from both, so blank rows at the bottom of the
    /// screen never have to be spelled out.
    pub async fn assert_screen_eq(&self, want: &str) -> bool {
        let hook = self.failure_hook();
        self.retrier()
            .assert(
                move || async move { screen_matches(&self.snapshot().await, want) },
                hook.as_ref(),
            )
            .await
    }

    /// Assert that the screen contains `text`.
    pub async fn assert_screen_contains(&self, text: &str) -> bool {
        let hook = self.failure_hook();
        self.retrier()
            .assert(
                move || async move { screen_contains(&self.snapshot().await, text) },
                hook.as_ref(),
            )
            .await
    }

    /// Assert that the screen text matches `pattern`.
    pub async fn assert_screen_matches(&self, pattern: &Regex) -> bool {
        let hook = self.failure_hook();
        self.retrier()
            .assert(
                move || async move { screen_is_match(&self.snapshot().await, pattern) },
                hook.as_ref(),
            )
            .await
    }
}
