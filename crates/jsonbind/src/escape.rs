//! Escape handling shared by [`Cursor`](crate::Cursor) and
//! [`Stream`](crate::Stream).
//!
//! Decoding accepts the JSON escape set including `\uXXXX` with UTF-16
//! surrogate pairs. A surrogate that is not part of a well-formed pair decodes
//! to U+FFFD. Encoding escapes quotes, backslashes, control characters and the
//! two Unicode line separators, optionally also `<`, `>` and `&`.

/// Convert a single ASCII hex digit into its 0..=15 value.
#[inline]
fn hex_val(b: u8) -> Option<u16> {
    match b {
        b'0'..=b'9' => Some(u16::from(b - b'0')),
        b'a'..=b'f' => Some(u16::from(b - b'a' + 10)),
        b'A'..=b'F' => Some(u16::from(b - b'A' + 10)),
        _ => None,
    }
}

/// Decodes exactly four hex digits into a UTF-16 code unit.
pub(crate) fn hex4(digits: &[u8]) -> Option<u16> {
    if digits.len() != 4 {
        return None;
    }
    digits
        .iter()
        .try_fold(0u16, |acc, b| Some((acc << 4) | hex_val(*b)?))
}

pub(crate) fn is_high_surrogate(unit: u16) -> bool {
    (0xD800..0xDC00).contains(&unit)
}

pub(crate) fn is_low_surrogate(unit: u16) -> bool {
    (0xDC00..0xE000).contains(&unit)
}

/// Joins a high and low surrogate into the scalar value they encode.
pub(crate) fn combine_surrogates(high: u16, low: u16) -> char {
    let code = 0x10000 + ((u32::from(high) - 0xD800) << 10) + (u32::from(low) - 0xDC00);
    char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Maps the character after a backslash to the byte it stands for.
pub(crate) fn simple_escape(b: u8) -> Option<char> {
    Some(match b {
        b'"' => '"',
        b'\\' => '\\',
        b'/' => '/',
        b'b' => '\u{0008}',
        b'f' => '\u{000C}',
        b'n' => '\n',
        b'r' => '\r',
        b't' => '\t',
        _ => return None,
    })
}

const HEX: &[u8; 16] = b"0123456789abcdef";

fn push_unicode_escape(dst: &mut Vec<u8>, unit: u32) {
    dst.extend_from_slice(b"\\u");
    for shift in [12, 8, 4, 0] {
        dst.push(HEX[((unit >> shift) & 0xF) as usize]);
    }
}

enum Escape {
    Short(&'static [u8]),
    Unicode,
}

/// Appends `src` to `dst` as the contents of a JSON string literal (without
/// the surrounding quotes).
pub(crate) fn write_escaped(dst: &mut Vec<u8>, src: &str, escape_html: bool) {
    let bytes = src.as_bytes();
    let mut flushed = 0;
    for (i, c) in src.char_indices() {
        let escape = match c {
            '"' => Escape::Short(b"\\\""),
            '\\' => Escape::Short(b"\\\\"),
            '\n' => Escape::Short(b"\\n"),
            '\r' => Escape::Short(b"\\r"),
            '\t' => Escape::Short(b"\\t"),
            '\u{0008}' => Escape::Short(b"\\b"),
            '\u{000C}' => Escape::Short(b"\\f"),
            '<' | '>' | '&' if escape_html => Escape::Unicode,
            // Escape Unicode line separators which pre-2019 JSON parsers may not handle correctly
            '\u{2028}' | '\u{2029}' => Escape::Unicode,
            c if c.is_ascii_control() => Escape::Unicode,
            _ => continue,
        };
        dst.extend_from_slice(&bytes[flushed..i]);
        match escape {
            Escape::Short(seq) => dst.extend_from_slice(seq),
            Escape::Unicode => push_unicode_escape(dst, c as u32),
        }
        flushed = i + c.len_utf8();
    }
    dst.extend_from_slice(&bytes[flushed..]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escaped(src: &str, html: bool) -> String {
        let mut out = Vec::new();
        write_escaped(&mut out, src, html);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn hex4_decodes_mixed_case() {
        assert_eq!(hex4(b"0041"), Some(0x41));
        assert_eq!(hex4(b"AbCd"), Some(0xABCD));
        assert_eq!(hex4(b"00G1"), None);
        assert_eq!(hex4(b"004"), None);
    }

    #[test]
    fn surrogate_pair_combines() {
        assert!(is_high_surrogate(0xD83D));
        assert!(is_low_surrogate(0xDE00));
        assert_eq!(combine_surrogates(0xD83D, 0xDE00), '😀');
    }

    #[test]
    fn escapes_quotes_and_controls() {
        assert_eq!(escaped("a\"b\\c", false), r#"a\"b\\c"#);
        assert_eq!(escaped("line\nbreak\u{1}", false), r"line\nbreak\u0001");
        assert_eq!(escaped("sep\u{2028}", false), r"sep\u2028");
        assert_eq!(escaped("héllo 👍", false), "héllo 👍");
    }

    #[test]
    fn html_escaping_is_optional() {
        assert_eq!(escaped("<a&b>", false), "<a&b>");
        assert_eq!(escaped("<a&b>", true), r"\u003ca\u0026b\u003e");
    }
}
