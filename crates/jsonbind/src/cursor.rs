//! Pull-style decode cursor over an in-memory input buffer.
//!
//! The cursor has no type knowledge: decoders pull primitives, iterate
//! objects and arrays, or skip values they are not interested in. Failures
//! are latched in a single error slot; after the first error every read is a
//! no-op that returns `None` (or `false`), so a decoder can unwind normally
//! and the top-level call reports the stored error.
use std::{borrow::Cow, fmt, str::FromStr};

use bstr::{BStr, ByteSlice};

use crate::{
    error::{Error, Position, SyntaxError},
    escape,
    number::{self, NumberLexeme},
};

/// Nesting limit applied when a cursor is created without a configuration.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// The kind of the next JSON value, judged from its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Invalid,
    String,
    Number,
    Null,
    Bool,
    Array,
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Invalid => "invalid input",
            Self::String => "string",
            Self::Number => "number",
            Self::Null => "null",
            Self::Bool => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        })
    }
}

/// A read cursor with a latched error slot.
///
/// # Examples
///
/// ```rust
/// use jsonbind::Cursor;
///
/// let mut cursor = Cursor::new(br#"{"id": 7, "meta": {"x": [1, {"y": null}]}, "name": "n"}"#);
/// let mut seen = Vec::new();
/// cursor.read_object(|cursor, key| {
///     match key.as_ref() {
///         "id" => seen.push(cursor.read_i64().unwrap().to_string()),
///         "name" => seen.push(cursor.read_string().unwrap()),
///         _ => cursor.skip(),
///     }
///     true
/// });
/// assert!(cursor.error().is_none());
/// assert_eq!(seen, ["7", "n"]);
/// ```
pub struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
    depth: usize,
    max_depth: usize,
    error: Option<Error>,
}

impl<'a> Cursor<'a> {
    #[must_use]
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            error: None,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Points the cursor at a new input, clearing the error slot.
    pub fn reset(&mut self, input: &'a [u8]) {
        self.input = input;
        self.pos = 0;
        self.depth = 0;
        self.error = None;
    }

    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Latches `err` unless an earlier error is already stored.
    pub fn report_error(&mut self, err: Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    /// Byte offset of the next unread byte.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.pos
    }

    #[must_use]
    pub fn position(&self) -> Position {
        Position::locate(self.input, self.pos)
    }

    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos.min(self.input.len())..]
    }

    fn syntax_at(&mut self, kind: SyntaxError, offset: usize) {
        let position = Position::locate(self.input, offset);
        self.report_error(Error::Syntax { kind, position });
    }

    fn syntax(&mut self, kind: SyntaxError) {
        self.syntax_at(kind, self.pos);
    }

    /// Reports whatever is wrong with the byte under the cursor.
    fn unexpected(&mut self) {
        match self.input.get(self.pos) {
            None => self.syntax(SyntaxError::UnexpectedEndOfInput),
            Some(_) => {
                let c = self.input[self.pos..]
                    .chars()
                    .next()
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                self.syntax(SyntaxError::InvalidCharacter(c));
            }
        }
    }

    /// Latches a type mismatch for the value under the cursor.
    pub fn report_mismatch(&mut self, expected: &'static str) {
        match self.next_kind() {
            ValueKind::Invalid => self.unexpected(),
            found => {
                let position = self.position();
                self.report_error(Error::TypeMismatch {
                    expected,
                    found,
                    position,
                });
            }
        }
    }

    #[inline]
    fn skip_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.input.get(self.pos) {
            self.pos += 1;
        }
    }

    #[inline]
    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.input.get(self.pos).copied()
    }

    fn expect_byte(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            if self.input.get(self.pos).is_none() {
                self.syntax(SyntaxError::UnexpectedEndOfInput);
            } else {
                self.syntax(SyntaxError::Expected(b as char));
            }
            false
        }
    }

    /// Kind of the next value. Does not consume anything but whitespace.
    pub fn next_kind(&mut self) -> ValueKind {
        match self.peek() {
            Some(b'"') => ValueKind::String,
            Some(b'-' | b'0'..=b'9') => ValueKind::Number,
            Some(b'n') => ValueKind::Null,
            Some(b't' | b'f') => ValueKind::Bool,
            Some(b'[') => ValueKind::Array,
            Some(b'{') => ValueKind::Object,
            _ => ValueKind::Invalid,
        }
    }

    fn read_literal(&mut self, literal: &[u8]) -> bool {
        let rest = &self.input[self.pos..];
        if rest.starts_with(literal) {
            self.pos += literal.len();
            return true;
        }
        let matched = rest
            .iter()
            .zip(literal)
            .take_while(|(a, b)| a == b)
            .count();
        self.pos += matched;
        self.unexpected();
        false
    }

    /// Consumes a `null` if one is next; returns whether it did.
    pub fn read_null(&mut self) -> bool {
        if self.error.is_some() || self.peek() != Some(b'n') {
            return false;
        }
        self.read_literal(b"null")
    }

    pub fn read_bool(&mut self) -> Option<bool> {
        if self.error.is_some() {
            return None;
        }
        match self.peek() {
            Some(b't') => self.read_literal(b"true").then_some(true),
            Some(b'f') => self.read_literal(b"false").then_some(false),
            _ => {
                self.report_mismatch("boolean");
                None
            }
        }
    }

    fn scan_number(&mut self) -> Option<(usize, NumberLexeme<'a>)> {
        if self.error.is_some() {
            return None;
        }
        if self.next_kind() != ValueKind::Number {
            self.report_mismatch("number");
            return None;
        }
        let start = self.pos;
        while self
            .input
            .get(self.pos)
            .is_some_and(|b| number::is_number_byte(*b))
        {
            self.pos += 1;
        }
        let input: &'a [u8] = self.input;
        // Number bytes are ASCII.
        let token = std::str::from_utf8(&input[start..self.pos]).unwrap_or_default();
        match NumberLexeme::classify(token) {
            Some(lexeme) => Some((start, lexeme)),
            None => {
                self.syntax_at(SyntaxError::InvalidNumber(token.to_owned()), start);
                None
            }
        }
    }

    fn out_of_range(&mut self, literal: &str, target: &'static str, offset: usize) {
        let position = Position::locate(self.input, offset);
        self.report_error(Error::NumberOutOfRange {
            literal: literal.to_owned(),
            target,
            position,
        });
    }

    /// Reads an integer of any width. Fractions, exponents and values that do
    /// not fit `T` latch [`Error::NumberOutOfRange`].
    pub fn read_int<T: FromStr>(&mut self) -> Option<T> {
        let (start, lexeme) = self.scan_number()?;
        let parsed = match lexeme {
            NumberLexeme::Integer(s) => s.parse::<T>().ok(),
            NumberLexeme::Float(_) => None,
        };
        if parsed.is_none() {
            self.out_of_range(lexeme.as_str(), std::any::type_name::<T>(), start);
        }
        parsed
    }

    pub fn read_i64(&mut self) -> Option<i64> {
        self.read_int()
    }

    pub fn read_u64(&mut self) -> Option<u64> {
        self.read_int()
    }

    pub fn read_f64(&mut self) -> Option<f64> {
        let (start, lexeme) = self.scan_number()?;
        match lexeme.as_str().parse::<f64>() {
            Ok(v) if v.is_finite() => Some(v),
            _ => {
                self.out_of_range(lexeme.as_str(), "f64", start);
                None
            }
        }
    }

    pub fn read_f32(&mut self) -> Option<f32> {
        let (start, lexeme) = self.scan_number()?;
        match lexeme.as_str().parse::<f32>() {
            Ok(v) if v.is_finite() => Some(v),
            _ => {
                self.out_of_range(lexeme.as_str(), "f32", start);
                None
            }
        }
    }

    /// Reads a string, borrowing from the input when it contains no escapes.
    pub fn read_str(&mut self) -> Option<Cow<'a, str>> {
        if self.error.is_some() {
            return None;
        }
        if self.peek() != Some(b'"') {
            self.report_mismatch("string");
            return None;
        }
        self.pos += 1;
        let input: &'a [u8] = self.input;
        let start = self.pos;
        loop {
            match input.get(self.pos) {
                Some(b'"') => {
                    let raw = &input[start..self.pos];
                    self.pos += 1;
                    return match std::str::from_utf8(raw) {
                        Ok(s) => Some(Cow::Borrowed(s)),
                        Err(e) => {
                            self.syntax_at(SyntaxError::InvalidUtf8, start + e.valid_up_to());
                            None
                        }
                    };
                }
                Some(b'\\') => break,
                Some(b) if *b < 0x20 => {
                    self.syntax(SyntaxError::ControlCharacter);
                    return None;
                }
                Some(_) => self.pos += 1,
                None => {
                    self.syntax(SyntaxError::UnexpectedEndOfInput);
                    return None;
                }
            }
        }
        let mut owned = input[start..self.pos].to_vec();
        loop {
            match input.get(self.pos) {
                Some(b'"') => {
                    self.pos += 1;
                    return match String::from_utf8(owned) {
                        Ok(s) => Some(Cow::Owned(s)),
                        Err(_) => {
                            self.syntax_at(SyntaxError::InvalidUtf8, start);
                            None
                        }
                    };
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let c = self.read_escape()?;
                    let mut utf8 = [0u8; 4];
                    owned.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
                }
                Some(b) if *b < 0x20 => {
                    self.syntax(SyntaxError::ControlCharacter);
                    return None;
                }
                Some(b) => {
                    owned.push(*b);
                    self.pos += 1;
                }
                None => {
                    self.syntax(SyntaxError::UnexpectedEndOfInput);
                    return None;
                }
            }
        }
    }

    pub fn read_string(&mut self) -> Option<String> {
        self.read_str().map(Cow::into_owned)
    }

    /// Decodes one escape; the cursor sits just past the backslash.
    fn read_escape(&mut self) -> Option<char> {
        let Some(&e) = self.input.get(self.pos) else {
            self.syntax(SyntaxError::UnexpectedEndOfInput);
            return None;
        };
        self.pos += 1;
        if let Some(c) = escape::simple_escape(e) {
            return Some(c);
        }
        if e != b'u' {
            self.syntax_at(SyntaxError::InvalidEscape(e as char), self.pos - 1);
            return None;
        }
        let unit = self.read_hex4()?;
        if escape::is_high_surrogate(unit) {
            if self.input[self.pos..].starts_with(b"\\u") {
                let resume = self.pos;
                self.pos += 2;
                let low = self.read_hex4()?;
                if escape::is_low_surrogate(low) {
                    return Some(escape::combine_surrogates(unit, low));
                }
                // Not a pair: leave the second escape to be decoded on its own.
                self.pos = resume;
            }
            return Some(char::REPLACEMENT_CHARACTER);
        }
        Some(char::from_u32(u32::from(unit)).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn read_hex4(&mut self) -> Option<u16> {
        let end = (self.pos + 4).min(self.input.len());
        match escape::hex4(&self.input[self.pos..end]) {
            Some(unit) => {
                self.pos = end;
                Some(unit)
            }
            None => {
                self.syntax(SyntaxError::InvalidUnicodeEscape);
                None
            }
        }
    }

    fn skip_str(&mut self) {
        // Caller checked the opening quote.
        self.pos += 1;
        loop {
            match self.input.get(self.pos) {
                Some(b'"') => {
                    self.pos += 1;
                    return;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    if self.read_escape().is_none() {
                        return;
                    }
                }
                Some(b) if *b < 0x20 => {
                    self.syntax(SyntaxError::ControlCharacter);
                    return;
                }
                Some(_) => self.pos += 1,
                None => {
                    self.syntax(SyntaxError::UnexpectedEndOfInput);
                    return;
                }
            }
        }
    }

    fn enter(&mut self) -> bool {
        self.depth += 1;
        if self.depth > self.max_depth {
            let position = self.position();
            self.report_error(Error::DepthLimitExceeded {
                limit: self.max_depth,
                position,
            });
            return false;
        }
        true
    }

    fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Iterates the members of an object, calling `on_field` with each key
    /// while the cursor sits at the member's value.
    ///
    /// `on_field` must consume the value (decode or [`skip`](Self::skip) it)
    /// and return `true` to continue. Returns `true` once the closing brace
    /// was consumed; `false` for `null`, on error, or when `on_field` stopped
    /// early.
    pub fn read_object<F>(&mut self, mut on_field: F) -> bool
    where
        F: FnMut(&mut Self, Cow<'a, str>) -> bool,
    {
        if self.error.is_some() {
            return false;
        }
        match self.peek() {
            Some(b'{') => {}
            Some(b'n') => {
                self.read_null();
                return false;
            }
            _ => {
                self.report_mismatch("object");
                return false;
            }
        }
        if !self.enter() {
            return false;
        }
        self.pos += 1;
        let complete = self.read_members(&mut on_field);
        self.leave();
        complete
    }

    fn read_members<F>(&mut self, on_field: &mut F) -> bool
    where
        F: FnMut(&mut Self, Cow<'a, str>) -> bool,
    {
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return true;
        }
        loop {
            let Some(key) = self.read_str() else {
                return false;
            };
            if !self.expect_byte(b':') || !on_field(self, key) || self.error.is_some() {
                return false;
            }
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return true;
                }
                _ => {
                    self.unexpected();
                    return false;
                }
            }
        }
    }

    /// Iterates the elements of an array; `on_element` must consume each
    /// element. Same return convention as [`read_object`](Self::read_object).
    pub fn read_array<F>(&mut self, mut on_element: F) -> bool
    where
        F: FnMut(&mut Self) -> bool,
    {
        if self.error.is_some() {
            return false;
        }
        match self.peek() {
            Some(b'[') => {}
            Some(b'n') => {
                self.read_null();
                return false;
            }
            _ => {
                self.report_mismatch("array");
                return false;
            }
        }
        if !self.enter() {
            return false;
        }
        self.pos += 1;
        let complete = self.read_elements(&mut on_element);
        self.leave();
        complete
    }

    fn read_elements<F>(&mut self, on_element: &mut F) -> bool
    where
        F: FnMut(&mut Self) -> bool,
    {
        if self.peek() == Some(b']') {
            self.pos += 1;
            return true;
        }
        loop {
            if !on_element(self) || self.error.is_some() {
                return false;
            }
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return true;
                }
                _ => {
                    self.unexpected();
                    return false;
                }
            }
        }
    }

    /// Consumes one well-formed value of any kind without decoding it.
    pub fn skip(&mut self) {
        if self.error.is_some() {
            return;
        }
        match self.next_kind() {
            ValueKind::Object => {
                self.read_object(|cursor, _| {
                    cursor.skip();
                    true
                });
            }
            ValueKind::Array => {
                self.read_array(|cursor| {
                    cursor.skip();
                    true
                });
            }
            ValueKind::String => self.skip_str(),
            ValueKind::Number => {
                self.scan_number();
            }
            ValueKind::Bool => {
                self.read_bool();
            }
            ValueKind::Null => {
                self.read_null();
            }
            ValueKind::Invalid => self.unexpected(),
        }
    }

    /// Skips one value and returns its exact input bytes (without
    /// surrounding whitespace).
    pub fn skip_and_return_bytes(&mut self) -> Option<&'a [u8]> {
        self.skip_whitespace();
        let start = self.pos;
        self.skip();
        if self.error.is_some() {
            return None;
        }
        let input: &'a [u8] = self.input;
        Some(&input[start..self.pos])
    }

    /// Checks that only whitespace is left.
    pub fn expect_end(&mut self) {
        if self.error.is_none() && self.peek().is_some() {
            self.syntax(SyntaxError::TrailingCharacters);
        }
    }
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("remaining", &BStr::new(self.remaining()))
            .field("depth", &self.depth)
            .field("error", &self.error)
            .finish()
    }
}
