//! Keystroke encodings and the keystroke DSL.
//!
//! [`Keys`] holds the byte sequences a terminal sends for named keys, for use
//! with [`crate::Session::key_press`]. The [`parser`] submodule compiles DSL
//! strings such as `"ls -l<Enter><WaitStable>"` into [`KeyToken`]s.

pub mod parser;

pub use parser::{ParseError, ParseErrorKind, ParseOptions, compile, compile_with};

/// A compiled keystroke instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyToken {
    /// Bytes to write to the pty.
    Bytes(Vec<u8>),
    /// Wait until the rendered screen stops changing.
    WaitStable,
    /// Wait until the rendered screen contains the text.
    WaitFor(String),
}

impl KeyToken {
    /// Create a bytes token from text.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Bytes(s.into().into_bytes())
    }

    /// Returns the bytes carried by this token, if it is a bytes token.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(data) => Some(data),
            _ => None,
        }
    }
}

/// Byte sequences for named keys, as an xterm-compatible terminal sends them.
pub struct Keys;

impl Keys {
    /// Tab.
    pub const TAB: &'static [u8] = b"\t";
    /// Enter (carriage return).
    pub const ENTER: &'static [u8] = b"\r";
    /// Backspace (DEL).
    pub const BACKSPACE: &'static [u8] = b"\x7f";
    /// Delete.
    pub const DELETE: &'static [u8] = b"\x1b[3~";
    /// Escape.
    pub const ESCAPE: &'static [u8] = b"\x1b";
    /// Space.
    pub const SPACE: &'static [u8] = b" ";
    /// Cursor up.
    pub const UP: &'static [u8] = b"\x1b[A";
    /// Cursor down.
    pub const DOWN: &'static [u8] = b"\x1b[B";
    /// Cursor right.
    pub const RIGHT: &'static [u8] = b"\x1b[C";
    /// Cursor left.
    pub const LEFT: &'static [u8] = b"\x1b[D";
    /// Home.
    pub const HOME: &'static [u8] = b"\x1b[H";
    /// End.
    pub const END: &'static [u8] = b"\x1b[F";
    /// Page up.
    pub const PAGE_UP: &'static [u8] = b"\x1b[5~";
    /// Page down.
    pub const PAGE_DOWN: &'static [u8] = b"\x1b[6~";
    /// Device status report request (cursor position query).
    pub const DSR: &'static [u8] = b"\x1b[6n";

    /// F1 through F24. F13-F24 use the xterm shifted F1-F12 encodings.
    const FUNCTION: [&'static [u8]; 24] = [
        b"\x1bOP",
        b"\x1bOQ",
        b"\x1bOR",
        b"\x1bOS",
        b"\x1b[15~",
        b"\x1b[17~",
        b"\x1b[18~",
        b"\x1b[19~",
        b"\x1b[20~",
        b"\x1b[21~",
        b"\x1b[23~",
        b"\x1b[24~",
        b"\x1b[1;2P",
        b"\x1b[1;2Q",
        b"\x1b[1;2R",
        b"\x1b[1;2S",
        b"\x1b[15;2~",
        b"\x1b[17;2~",
        b"\x1b[18;2~",
        b"\x1b[19;2~",
        b"\x1b[20;2~",
        b"\x1b[21;2~",
        b"\x1b[23;2~",
        b"\x1b[24;2~",
    ];

    /// The sequence for function key `n`, if `n` is in `1..=24`.
    #[must_use]
    pub fn function(n: u32) -> Option<&'static [u8]> {
        let index = usize::try_from(n.checked_sub(1)?).ok()?;
        Self::FUNCTION.get(index).copied()
    }

    /// The control byte for an ASCII letter, `a` (or `A`) giving 1.
    #[must_use]
    pub const fn ctrl(letter: char) -> Option<u8> {
        if letter.is_ascii_alphabetic() {
            Some(letter.to_ascii_lowercase() as u8 - b'a' + 1)
        } else {
            None
        }
    }

    /// Escape-prefixed sequence for Alt plus an ASCII letter, case preserved.
    #[must_use]
    pub fn alt(letter: char) -> Option<Vec<u8>> {
        letter
            .is_ascii_alphabetic()
            .then(|| vec![0x1b, letter as u8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_keys_cover_one_through_twenty_four() {
        assert_eq!(Keys::function(1), Some(&b"\x1bOP"[..]));
        assert_eq!(Keys::function(12), Some(&b"\x1b[24~"[..]));
        assert_eq!(Keys::function(24), Some(&b"\x1b[24;2~"[..]));
        assert_eq!(Keys::function(0), None);
        assert_eq!(Keys::function(25), None);
    }

    #[test]
    fn ctrl_maps_alphabet_position() {
        assert_eq!(Keys::ctrl('a'), Some(1));
        assert_eq!(Keys::ctrl('C'), Some(3));
        assert_eq!(Keys::ctrl('z'), Some(26));
        assert_eq!(Keys::ctrl('1'), None);
    }

    #[test]
    fn alt_preserves_case() {
        assert_eq!(Keys::alt('x'), Some(vec![0x1b, b'x']));
        assert_eq!(Keys::alt('X'), Some(vec![0x1b, b'X']));
        assert_eq!(Keys::alt('-'), None);
    }

    #[test]
    fn dsr_is_cursor_position_query() {
        assert_eq!(Keys::DSR, &[0x1b, b'[', b'6', b'n']);
    }
}
