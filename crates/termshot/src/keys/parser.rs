//! Compiler for the keystroke DSL.
//!
//! Plain text is sent as-is. Tags between the delimiters name keys or
//! directives: `<Enter>`, `<C-c>`, `<A-x>`, `<F5>`, `<WaitStable>`,
//! `<WaitFor ready>`. A doubled opening delimiter (`<<`) is a literal `<`.
//! Compilation is all-or-nothing: any malformed tag fails the whole input.

use std::fmt;

use super::{KeyToken, Keys};
use crate::error::{Result, SessionError};

/// Tag delimiters for the DSL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    open: char,
    close: char,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            open: '<',
            close: '>',
        }
    }
}

impl ParseOptions {
    /// Create options with a custom delimiter pair.
    pub fn new(open: char, close: char) -> Result<Self> {
        if open == close {
            return Err(SessionError::config(format!(
                "tag delimiters must differ, got '{open}{close}'"
            )));
        }
        Ok(Self { open, close })
    }

    /// Parse a two-character delimiter string such as `"<>"` or `"[]"`.
    pub fn from_delimiters(delimiters: &str) -> Result<Self> {
        let mut chars = delimiters.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(open), Some(close), None) => Self::new(open, close),
            _ => Err(SessionError::config(format!(
                "delimiter must be exactly 2 characters, got {delimiters:?}"
            ))),
        }
    }

    /// The opening delimiter.
    #[must_use]
    pub const fn open(&self) -> char {
        self.open
    }

    /// The closing delimiter.
    #[must_use]
    pub const fn close(&self) -> char {
        self.close
    }
}

/// Why a tag failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// No closing delimiter before end of input.
    Unclosed,
    /// The tag names no known key or directive.
    UnknownKey(String),
    /// A `C-` tag not followed by exactly one ASCII letter.
    InvalidCtrl(String),
    /// An `A-` tag not followed by exactly one ASCII letter.
    InvalidAlt(String),
    /// An `F` tag whose suffix is not a number.
    InvalidFunctionKey(String),
    /// An `F` tag outside F1-F24.
    FunctionKeyOutOfRange(String),
}

/// A DSL compilation failure, positioned at the offending tag's opening
/// delimiter (a character offset into the input).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Character offset of the tag's opening delimiter.
    pub offset: usize,
    /// What went wrong.
    pub kind: ParseErrorKind,
    options: ParseOptions,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close) = (self.options.open, self.options.close);
        match &self.kind {
            ParseErrorKind::Unclosed => {
                write!(f, "unclosed '{open}' at position {}", self.offset)
            }
            ParseErrorKind::UnknownKey(name) => write!(
                f,
                "at position {}: unknown key: {open}{name}{close}",
                self.offset
            ),
            ParseErrorKind::InvalidCtrl(name) => write!(
                f,
                "at position {}: invalid ctrl key: {open}{name}{close}",
                self.offset
            ),
            ParseErrorKind::InvalidAlt(name) => write!(
                f,
                "at position {}: invalid alt key: {open}{name}{close}",
                self.offset
            ),
            ParseErrorKind::InvalidFunctionKey(name) => write!(
                f,
                "at position {}: invalid function key: {open}{name}{close}",
                self.offset
            ),
            ParseErrorKind::FunctionKeyOutOfRange(name) => write!(
                f,
                "at position {}: function key out of range: {open}{name}{close} (valid: F1-F24)",
                self.offset
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Compile a DSL string with the default `<` `>` delimiters.
pub fn compile(dsl: &str) -> std::result::Result<Vec<KeyToken>, ParseError> {
    compile_with(dsl, ParseOptions::default())
}

/// Compile a DSL string with custom delimiters.
pub fn compile_with(
    dsl: &str,
    options: ParseOptions,
) -> std::result::Result<Vec<KeyToken>, ParseError> {
    let chars: Vec<char> = dsl.chars().collect();
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != options.open {
            text.push(c);
            i += 1;
            continue;
        }

        if chars.get(i + 1) == Some(&options.open) {
            text.push(options.open);
            i += 2;
            continue;
        }

        let Some(len) = chars[i + 1..].iter().position(|&ch| ch == options.close) else {
            return Err(ParseError {
                offset: i,
                kind: ParseErrorKind::Unclosed,
                options,
            });
        };

        if !text.is_empty() {
            tokens.push(KeyToken::text(std::mem::take(&mut text)));
        }

        let name: String = chars[i + 1..i + 1 + len].iter().collect();
        let token = resolve_tag(&name).map_err(|kind| ParseError {
            offset: i,
            kind,
            options,
        })?;
        tokens.push(token);
        i += len + 2;
    }

    if !text.is_empty() {
        tokens.push(KeyToken::text(text));
    }

    Ok(tokens)
}

/// Resolve the text between the delimiters.
fn resolve_tag(name: &str) -> std::result::Result<KeyToken, ParseErrorKind> {
    let lower = name.to_ascii_lowercase();

    let named = match lower.as_str() {
        "tab" => Some(Keys::TAB),
        "enter" | "cr" => Some(Keys::ENTER),
        "backspace" | "bs" => Some(Keys::BACKSPACE),
        "delete" | "del" => Some(Keys::DELETE),
        "escape" | "esc" => Some(Keys::ESCAPE),
        "space" => Some(Keys::SPACE),
        "up" => Some(Keys::UP),
        "down" => Some(Keys::DOWN),
        "left" => Some(Keys::LEFT),
        "right" => Some(Keys::RIGHT),
        "home" => Some(Keys::HOME),
        "end" => Some(Keys::END),
        "pageup" => Some(Keys::PAGE_UP),
        "pagedown" => Some(Keys::PAGE_DOWN),
        "waitstable" => return Ok(KeyToken::WaitStable),
        _ => None,
    };
    if let Some(bytes) = named {
        return Ok(KeyToken::Bytes(bytes.to_vec()));
    }

    // ASCII lowercasing keeps byte offsets, so slicing `name` is safe here.
    if lower.starts_with("waitfor ") {
        return Ok(KeyToken::WaitFor(name["waitfor ".len()..].to_string()));
    }

    if lower.starts_with("c-") {
        return single_letter(&name[2..])
            .and_then(Keys::ctrl)
            .map(|byte| KeyToken::Bytes(vec![byte]))
            .ok_or_else(|| ParseErrorKind::InvalidCtrl(name.to_string()));
    }

    if lower.starts_with("a-") {
        return single_letter(&name[2..])
            .and_then(Keys::alt)
            .map(KeyToken::Bytes)
            .ok_or_else(|| ParseErrorKind::InvalidAlt(name.to_string()));
    }

    if lower.starts_with('f') {
        let digits = &name[1..];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseErrorKind::InvalidFunctionKey(name.to_string()));
        }
        return digits
            .parse::<u32>()
            .ok()
            .and_then(Keys::function)
            .map(|seq| KeyToken::Bytes(seq.to_vec()))
            .ok_or_else(|| ParseErrorKind::FunctionKeyOutOfRange(name.to_string()));
    }

    Err(ParseErrorKind::UnknownKey(name.to_string()))
}

fn single_letter(rest: &str) -> Option<char> {
    let mut chars = rest.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}
