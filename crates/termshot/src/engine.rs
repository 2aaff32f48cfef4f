//! Virtual terminal engine boundary.
//!
//! A [`TerminalEngine`] interprets the bytes a program writes to its terminal
//! and maintains a character grid. The session only ever talks to this trait;
//! [`VtEngine`] is the engine used by default.
//!
//! # Example
//!
//! ```rust
//! use termshot::engine::{TerminalEngine, VtEngine};
//!
//! let mut engine = VtEngine::open(24, 80).unwrap();
//! engine.feed(b"Hello, World!\x1b[2J\x1b[HNew");
//! engine.flush();
//! assert_eq!(engine.read_cell(0, 0), Some('N'));
//! ```

pub mod grid;
pub mod vt;

pub use grid::{Cell, Grid};
pub use vt::VtEngine;

/// An engine failed to initialize.
#[derive(Debug, Clone, thiserror::Error)]
#[error("terminal engine error: {message}")]
pub struct EngineError {
    /// Description of the failure.
    pub message: String,
}

impl EngineError {
    /// Create an engine error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A terminal emulator that turns output bytes into a character grid.
///
/// Rows and columns are 0-based. Implementations must keep
/// `read_cell(row, col)` answering `None` for any position outside the
/// current geometry.
pub trait TerminalEngine: Send + 'static {
    /// Create an engine with the given geometry.
    fn open(rows: u16, cols: u16) -> Result<Self, EngineError>
    where
        Self: Sized;

    /// Interpret output bytes. Partial escape or UTF-8 sequences are kept
    /// until the rest arrives.
    fn feed(&mut self, bytes: &[u8]);

    /// Change the geometry.
    fn resize(&mut self, rows: u16, cols: u16);

    /// The character in a cell. Blank cells, continuation cells of wide
    /// characters and out-of-range positions all return `None`.
    fn read_cell(&self, row: u16, col: u16) -> Option<char>;

    /// Make everything fed so far visible to `read_cell`.
    fn flush(&mut self) {}

    /// Current row count.
    fn rows(&self) -> u16;

    /// Current column count.
    fn cols(&self) -> u16;

    /// Current cursor position.
    fn cursor(&self) -> (u16, u16);

    /// Bytes the terminal owes the program, such as answers to status
    /// queries. Drained by the output reader and written back to the pty.
    fn take_replies(&mut self) -> Vec<u8> {
        Vec::new()
    }
}
