//! Plain-text screen snapshots.
//!
//! A [`ScreenSnapshot`] is the rendered screen reduced to one string per row:
//! empty cells become spaces, wide characters advance by their display width
//! and trailing blanks are trimmed.

use std::fmt;

use unicode_width::UnicodeWidthChar;

use crate::engine::TerminalEngine;

/// The visible screen as text, one entry per row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenSnapshot {
    rows: Vec<String>,
}

impl ScreenSnapshot {
    /// Extract the current screen of an engine.
    ///
    /// The returned snapshot always has exactly `engine.rows()` rows.
    #[must_use]
    pub fn capture<E: TerminalEngine + ?Sized>(engine: &E) -> Self {
        let cols = engine.cols();
        let rows = (0..engine.rows())
            .map(|row| extract_row(engine, row, cols))
            .collect();
        Self { rows }
    }

    /// Build a snapshot from already-extracted rows.
    #[must_use]
    pub fn from_rows(rows: Vec<String>) -> Self {
        Self { rows }
    }

    /// A snapshot with no rows, for a session without a terminal.
    #[must_use]
    pub const fn empty() -> Self {
        Self { rows: Vec::new() }
    }

    /// All rows joined with `'\n'`.
    #[must_use]
    pub fn text(&self) -> String {
        self.rows.join("\n")
    }

    /// A single row, or the empty string when out of range.
    #[must_use]
    pub fn line(&self, row: usize) -> &str {
        self.rows.get(row).map_or("", String::as_str)
    }

    /// The rows.
    #[must_use]
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// True when any part of the screen text contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.text().contains(needle)
    }
}

impl fmt::Display for ScreenSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

fn extract_row<E: TerminalEngine + ?Sized>(engine: &E, row: u16, cols: u16) -> String {
    let mut line = String::with_capacity(usize::from(cols));
    let mut col = 0u16;
    while col < cols {
        match engine.read_cell(row, col) {
            Some(c) => {
                line.push(c);
                let width = c.width().unwrap_or(1).max(1);
                col = col.saturating_add(u16::try_from(width).unwrap_or(1));
            }
            None => {
                line.push(' ');
                col += 1;
            }
        }
    }
    line.truncate(line.trim_end_matches(' ').len());
    line
}
