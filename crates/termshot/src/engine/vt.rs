//! Default terminal engine: a `vte` parser driving a [`Grid`].
//!
//! Handles cursor movement, erasing, scrolling, line and character
//! insertion/deletion, the alternate screen and status reports. Colors and
//! attributes are parsed and discarded.

use std::fmt::Write as _;

use unicode_width::UnicodeWidthChar;
use vte::{Params, Parser, Perform};

use super::grid::{Cell, Grid};
use super::{EngineError, TerminalEngine};

/// The default [`TerminalEngine`].
pub struct VtEngine {
    parser: Parser,
    term: Term,
}

impl std::fmt::Debug for VtEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VtEngine")
            .field("grid", &self.term.grid)
            .field("alternate", &self.term.primary.is_some())
            .finish_non_exhaustive()
    }
}

struct Term {
    grid: Grid,
    /// The primary screen while the alternate screen is active.
    primary: Option<Grid>,
    last_printed: Option<char>,
    replies: Vec<u8>,
}

impl Term {
    fn enter_alternate(&mut self) {
        if self.primary.is_some() {
            return;
        }
        let mut alternate = Grid::new(self.grid.rows(), self.grid.cols());
        let (row, col) = self.grid.cursor();
        alternate.goto(row, col);
        self.grid.save_cursor();
        self.primary = Some(std::mem::replace(&mut self.grid, alternate));
    }

    fn leave_alternate(&mut self) {
        if let Some(mut primary) = self.primary.take() {
            if (primary.rows(), primary.cols()) != (self.grid.rows(), self.grid.cols()) {
                primary.resize(self.grid.rows(), self.grid.cols());
            }
            primary.restore_cursor();
            self.grid = primary;
        }
    }

    fn reset(&mut self) {
        self.primary = None;
        self.grid = Grid::new(self.grid.rows(), self.grid.cols());
        self.last_printed = None;
    }

    fn set_private_mode(&mut self, mode: u16, enable: bool) {
        match (mode, enable) {
            (47 | 1047 | 1049, true) => self.enter_alternate(),
            (47 | 1047 | 1049, false) => self.leave_alternate(),
            _ => {}
        }
    }

    fn device_status(&mut self, kind: u16) {
        match kind {
            5 => self.replies.extend_from_slice(b"\x1b[0n"),
            6 => {
                let (row, col) = self.grid.cursor();
                let mut reply = String::new();
                let _ = write!(reply, "\x1b[{};{}R", row + 1, col + 1);
                self.replies.extend_from_slice(reply.as_bytes());
            }
            _ => {}
        }
    }
}

/// Parameter `index`, with 0 or absent replaced by `default`.
fn arg(params: &[u16], index: usize, default: u16) -> usize {
    match params.get(index) {
        Some(&v) if v != 0 => usize::from(v),
        _ => usize::from(default),
    }
}

impl Perform for Term {
    fn print(&mut self, c: char) {
        let width = c.width().unwrap_or(1);
        self.grid.put(c, width);
        if width > 0 {
            self.last_printed = Some(c);
        }
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            0x08 => self.grid.backspace(),
            0x09 => self.grid.tab(),
            0x0a..=0x0c => self.grid.line_feed(),
            0x0d => self.grid.carriage_return(),
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, action: char) {
        if ignore {
            return;
        }
        let args: Vec<u16> = params.iter().map(|p| p.first().copied().unwrap_or(0)).collect();
        let n = arg(&args, 0, 1);
        let signed = n as isize;

        if intermediates == b"?" {
            match action {
                'h' => args.iter().for_each(|&m| self.set_private_mode(m, true)),
                'l' => args.iter().for_each(|&m| self.set_private_mode(m, false)),
                _ => {}
            }
            return;
        }
        if !intermediates.is_empty() {
            return;
        }

        let grid = &mut self.grid;
        match action {
            'A' => grid.move_by(-signed, 0),
            'B' | 'e' => grid.move_by(signed, 0),
            'C' | 'a' => grid.move_by(0, signed),
            'D' => grid.move_by(0, -signed),
            'E' => {
                grid.move_by(signed, 0);
                grid.carriage_return();
            }
            'F' => {
                grid.move_by(-signed, 0);
                grid.carriage_return();
            }
            'G' | '`' => {
                let row = grid.cursor().0;
                grid.goto(row, n - 1);
            }
            'd' => {
                let col = grid.cursor().1;
                grid.goto(n - 1, col);
            }
            'H' | 'f' => grid.goto(n - 1, arg(&args, 1, 1) - 1),
            'J' => grid.erase_display(args.first().copied().unwrap_or(0)),
            'K' => grid.erase_line(args.first().copied().unwrap_or(0)),
            'L' => grid.insert_lines(n),
            'M' => grid.delete_lines(n),
            'P' => grid.delete_chars(n),
            '@' => grid.insert_blanks(n),
            'X' => grid.erase_chars(n),
            'S' => grid.scroll_up(n),
            'T' => grid.scroll_down(n),
            'r' => {
                let bottom = arg(&args, 1, u16::try_from(grid.rows()).unwrap_or(u16::MAX));
                grid.set_scroll_region(n - 1, bottom - 1);
            }
            's' => grid.save_cursor(),
            'u' => grid.restore_cursor(),
            'b' => {
                if let Some(c) = self.last_printed {
                    for _ in 0..n.min(grid.rows() * grid.cols()) {
                        self.print(c);
                    }
                }
            }
            'n' => self.device_status(args.first().copied().unwrap_or(0)),
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], ignore: bool, byte: u8) {
        if ignore || !intermediates.is_empty() {
            return;
        }
        match byte {
            b'7' => self.grid.save_cursor(),
            b'8' => self.grid.restore_cursor(),
            b'D' => self.grid.line_feed(),
            b'E' => {
                self.grid.carriage_return();
                self.grid.line_feed();
            }
            b'M' => self.grid.reverse_index(),
            b'c' => self.reset(),
            _ => {}
        }
    }
}

impl TerminalEngine for VtEngine {
    fn open(rows: u16, cols: u16) -> Result<Self, EngineError> {
        if rows == 0 || cols == 0 {
            return Err(EngineError::new(format!(
                "invalid geometry {rows}x{cols}"
            )));
        }
        Ok(Self {
            parser: Parser::new(),
            term: Term {
                grid: Grid::new(usize::from(rows), usize::from(cols)),
                primary: None,
                last_printed: None,
                replies: Vec::new(),
            },
        })
    }

    fn feed(&mut self, bytes: &[u8]) {
        self.parser.advance(&mut self.term, bytes);
    }

    fn resize(&mut self, rows: u16, cols: u16) {
        if rows == 0 || cols == 0 {
            return;
        }
        self.term.grid.resize(usize::from(rows), usize::from(cols));
    }

    fn read_cell(&self, row: u16, col: u16) -> Option<char> {
        match self.term.grid.cell(usize::from(row), usize::from(col))? {
            Cell::Char(c) => Some(c),
            Cell::Blank | Cell::Continuation => None,
        }
    }

    fn rows(&self) -> u16 {
        u16::try_from(self.term.grid.rows()).unwrap_or(u16::MAX)
    }

    fn cols(&self) -> u16 {
        u16::try_from(self.term.grid.cols()).unwrap_or(u16::MAX)
    }

    fn cursor(&self) -> (u16, u16) {
        let (row, col) = self.term.grid.cursor();
        (
            u16::try_from(row).unwrap_or(u16::MAX),
            u16::try_from(col).unwrap_or(u16::MAX),
        )
    }

    fn take_replies(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.term.replies)
    }
}
