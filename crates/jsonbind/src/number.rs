//! Number lexemes and float formatting.
//!
//! Decoding only needs to know whether a scanned token is a valid JSON number
//! and whether it carries a fraction or exponent; the actual conversion is left
//! to `str::parse`. Encoding offers the two precision modes selectable through
//! [`FloatPrecision`](crate::FloatPrecision).
use std::io::Write;

/// Lexical hint so decoders can distinguish ints vs floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NumberLexeme<'a> {
    Integer(&'a str), // no '.' and no exponent
    Float(&'a str),   // has '.' or exponent
}

impl<'a> NumberLexeme<'a> {
    /// Validates `token` against the JSON number grammar.
    pub(crate) fn classify(token: &'a str) -> Option<Self> {
        let bytes = token.as_bytes();
        let mut i = 0;
        if bytes.first() == Some(&b'-') {
            i += 1;
        }
        match bytes.get(i) {
            Some(b'0') => i += 1,
            Some(b'1'..=b'9') => {
                while bytes.get(i).is_some_and(u8::is_ascii_digit) {
                    i += 1;
                }
            }
            _ => return None,
        }
        let mut float = false;
        if bytes.get(i) == Some(&b'.') {
            float = true;
            i += 1;
            let start = i;
            while bytes.get(i).is_some_and(u8::is_ascii_digit) {
                i += 1;
            }
            if i == start {
                return None;
            }
        }
        if matches!(bytes.get(i), Some(b'e' | b'E')) {
            float = true;
            i += 1;
            if matches!(bytes.get(i), Some(b'+' | b'-')) {
                i += 1;
            }
            let start = i;
            while bytes.get(i).is_some_and(u8::is_ascii_digit) {
                i += 1;
            }
            if i == start {
                return None;
            }
        }
        if i != bytes.len() {
            return None;
        }
        Some(if float {
            Self::Float(token)
        } else {
            Self::Integer(token)
        })
    }

    pub(crate) fn as_str(self) -> &'a str {
        match self {
            Self::Integer(s) | Self::Float(s) => s,
        }
    }
}

/// Bytes that may appear inside a number token.
pub(crate) fn is_number_byte(b: u8) -> bool {
    matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
}

// Outside this range the plain decimal form gets unwieldy, so the shortest
// exponent form is used instead.
const EXPONENT_ABOVE: f64 = 1e21;
const EXPONENT_BELOW: f64 = 1e-6;

fn wants_exponent(abs: f64) -> bool {
    abs != 0.0 && !(EXPONENT_BELOW..EXPONENT_ABOVE).contains(&abs)
}

/// Shortest representation that round-trips through `f64`.
pub(crate) fn write_f64(buf: &mut Vec<u8>, value: f64) {
    // Writing into a Vec cannot fail.
    let _ = if wants_exponent(value.abs()) {
        write!(buf, "{value:e}")
    } else {
        write!(buf, "{value}")
    };
}

/// Shortest representation that round-trips through `f32`.
pub(crate) fn write_f32(buf: &mut Vec<u8>, value: f32) {
    let _ = if wants_exponent(f64::from(value.abs())) {
        write!(buf, "{value:e}")
    } else {
        write!(buf, "{value}")
    };
}

/// Rounds to six fractional digits and trims trailing zeros, so magnitudes
/// below `5e-7` come out as `0`. Values from `1e21` up keep the shortest
/// representation.
pub(crate) fn write_six_digits(buf: &mut Vec<u8>, value: f64) {
    if value.abs() >= EXPONENT_ABOVE {
        write_f64(buf, value);
        return;
    }
    let start = buf.len();
    let _ = write!(buf, "{value:.6}");
    while buf.last() == Some(&b'0') {
        buf.pop();
    }
    if buf.last() == Some(&b'.') {
        buf.pop();
    }
    if &buf[start..] == b"-0" {
        buf.truncate(start);
        buf.push(b'0');
    }
}
