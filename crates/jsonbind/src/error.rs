use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::cursor::ValueKind;

/// Line and column (both 1-based) of the byte a decode error was raised at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    /// Computes the position of `offset` within `input`.
    pub(crate) fn locate(input: &[u8], offset: usize) -> Self {
        let offset = offset.min(input.len());
        let upto = &input[..offset];
        let line = 1 + upto.iter().filter(|b| **b == b'\n').count();
        let line_start = upto.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
        Self {
            line,
            column: 1 + offset - line_start,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Every failure an encode, decode or resolve call can report.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("syntax error: {kind} at {position}")]
    Syntax {
        kind: SyntaxError,
        position: Position,
    },
    #[error("type mismatch: expected {expected}, found {found} at {position}")]
    TypeMismatch {
        expected: &'static str,
        found: ValueKind,
        position: Position,
    },
    #[error("unknown field `{name}` at {position}")]
    UnknownField { name: String, position: Position },
    #[error("number `{literal}` out of range for {target} at {position}")]
    NumberOutOfRange {
        literal: String,
        target: &'static str,
        position: Position,
    },
    #[error("nesting deeper than {limit} levels at {position}")]
    DepthLimitExceeded { limit: usize, position: Position },
    #[error("map key `{key}` is not a valid {target}")]
    InvalidMapKey { key: String, target: &'static str },
    #[error("unsupported value: {0}")]
    UnsupportedValue(String),
    #[error("codec bound to `{expected}` received a value of another type")]
    BindingMismatch { expected: &'static str },
    #[error("custom codec failed: {0}")]
    Custom(#[source] CustomError),
}

impl Error {
    /// Wraps a user failure so it propagates verbatim.
    pub fn custom(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Custom(CustomError::new(err))
    }

    /// Position of a decode error, if the error was raised by a cursor.
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        match self {
            Self::Syntax { position, .. }
            | Self::TypeMismatch { position, .. }
            | Self::UnknownField { position, .. }
            | Self::NumberOutOfRange { position, .. }
            | Self::DepthLimitExceeded { position, .. } => Some(*position),
            _ => None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("invalid character '{0}'")]
    InvalidCharacter(char),
    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),
    #[error("invalid unicode escape sequence")]
    InvalidUnicodeEscape,
    #[error("unescaped control character in string")]
    ControlCharacter,
    #[error("invalid number literal `{0}`")]
    InvalidNumber(String),
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,
    #[error("expected '{0}'")]
    Expected(char),
    #[error("trailing characters after value")]
    TrailingCharacters,
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
}

/// A type's shape cannot be turned into a codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("cannot build codec for `{type_name}`: {reason}")]
pub struct BuildError {
    pub type_name: &'static str,
    pub reason: BuildErrorReason,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildErrorReason {
    #[error("type has no JSON representation ({0})")]
    Unsupported(&'static str),
    #[error("wire name `{name}` is emitted by both `{first}` and `{second}`")]
    DuplicateWireName {
        name: String,
        first: &'static str,
        second: &'static str,
    },
    #[error("field `{0}` is not declared")]
    UnknownField(String),
}

/// An error reported by a user-provided codec, marshaler or unmarshaler.
#[derive(Clone)]
pub struct CustomError(Arc<dyn std::error::Error + Send + Sync>);

impl CustomError {
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(Arc::from(err.into()))
    }

    /// The wrapped error, exactly as the user produced it.
    #[must_use]
    pub fn inner(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.0
    }
}

impl fmt::Debug for CustomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for CustomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for CustomError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}
