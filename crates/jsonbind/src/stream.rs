//! Push-style output buffer used by every encoder.
use std::{fmt, io::Write};

use bstr::BStr;

use crate::{Error, escape, number};

/// A growable JSON output buffer with a latched error slot.
///
/// Once an error is reported, every further write is a no-op and the encode
/// call that owns the stream returns the stored error. The stream knows
/// nothing about types; codecs decide what to write.
///
/// # Examples
///
/// ```rust
/// use jsonbind::Stream;
///
/// let mut stream = Stream::new();
/// stream.write_object_start();
/// stream.write_object_field("id");
/// stream.write_i64(7);
/// stream.write_more();
/// stream.write_object_field("tags");
/// stream.write_array_start();
/// stream.write_string("a\"b");
/// stream.write_array_end();
/// stream.write_object_end();
/// assert_eq!(stream.as_str(), Some(r#"{"id":7,"tags":["a\"b"]}"#));
/// ```
#[derive(Default)]
pub struct Stream {
    buf: Vec<u8>,
    error: Option<Error>,
}

impl Stream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            error: None,
        }
    }

    /// The first error reported on this stream, if any.
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

    /// Whether an error is stored; encoders stop visiting children once set.
    #[must_use]
    pub(crate) fn is_latched(&self) -> bool {
        self.error.is_some()
    }

    pub fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buf
    }

    /// The buffer as text. `None` only if a raw write inserted invalid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.buf).ok()
    }

    /// Clears both the buffer and the error slot, keeping the allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.error = None;
    }

    /// Consumes the stream, returning the bytes or the latched error.
    ///
    /// # Errors
    ///
    /// Returns the first error reported while writing.
    pub fn into_result(self) -> Result<Vec<u8>, Error> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.buf),
        }
    }

    #[inline]
    fn live(&mut self) -> Option<&mut Vec<u8>> {
        if self.error.is_some() {
            None
        } else {
            Some(&mut self.buf)
        }
    }

    /// Appends bytes verbatim. The caller is responsible for their validity.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        if let Some(buf) = self.live() {
            buf.extend_from_slice(bytes);
        }
    }

    pub fn write_byte(&mut self, b: u8) {
        if let Some(buf) = self.live() {
            buf.push(b);
        }
    }

    pub fn write_null(&mut self) {
        self.write_raw(b"null");
    }

    pub fn write_bool(&mut self, value: bool) {
        if value {
            self.write_raw(b"true");
        } else {
            self.write_raw(b"false");
        }
    }

    pub fn write_i64(&mut self, value: i64) {
        if let Some(buf) = self.live() {
            let _ = write!(buf, "{value}");
        }
    }

    pub fn write_u64(&mut self, value: u64) {
        if let Some(buf) = self.live() {
            let _ = write!(buf, "{value}");
        }
    }

    pub fn write_i128(&mut self, value: i128) {
        if let Some(buf) = self.live() {
            let _ = write!(buf, "{value}");
        }
    }

    /// Writes any integer through its `Display` form.
    pub(crate) fn write_display<T: fmt::Display>(&mut self, value: T) {
        if let Some(buf) = self.live() {
            let _ = write!(buf, "{value}");
        }
    }

    /// Writes the shortest representation that round-trips. Non-finite values
    /// latch [`Error::UnsupportedValue`].
    pub fn write_f64(&mut self, value: f64) {
        if !self.check_finite(value) {
            return;
        }
        if let Some(buf) = self.live() {
            number::write_f64(buf, value);
        }
    }

    pub fn write_f32(&mut self, value: f32) {
        if !self.check_finite(f64::from(value)) {
            return;
        }
        if let Some(buf) = self.live() {
            number::write_f32(buf, value);
        }
    }

    /// Writes `value` rounded to six fractional digits.
    pub fn write_f64_six_digits(&mut self, value: f64) {
        if !self.check_finite(value) {
            return;
        }
        if let Some(buf) = self.live() {
            number::write_six_digits(buf, value);
        }
    }

    pub fn write_f32_six_digits(&mut self, value: f32) {
        self.write_f64_six_digits(f64::from(value));
    }

    fn check_finite(&mut self, value: f64) -> bool {
        if value.is_finite() {
            true
        } else {
            self.report_error(Error::UnsupportedValue(format!(
                "{value} has no JSON representation"
            )));
            false
        }
    }

    /// Writes a quoted, escaped string.
    pub fn write_string(&mut self, value: &str) {
        self.write_string_with(value, false);
    }

    /// Like [`write_string`](Self::write_string) but also escapes `<`, `>`
    /// and `&`.
    pub fn write_string_html_safe(&mut self, value: &str) {
        self.write_string_with(value, true);
    }

    pub(crate) fn write_string_with(&mut self, value: &str, escape_html: bool) {
        if let Some(buf) = self.live() {
            buf.reserve(value.len() + 2);
            buf.push(b'"');
            escape::write_escaped(buf, value, escape_html);
            buf.push(b'"');
        }
    }

    pub fn write_object_start(&mut self) {
        self.write_byte(b'{');
    }

    /// Writes `"name":`.
    pub fn write_object_field(&mut self, name: &str) {
        self.write_string(name);
        self.write_byte(b':');
    }

    pub fn write_object_end(&mut self) {
        self.write_byte(b'}');
    }

    pub fn write_empty_object(&mut self) {
        self.write_raw(b"{}");
    }

    pub fn write_array_start(&mut self) {
        self.write_byte(b'[');
    }

    pub fn write_array_end(&mut self) {
        self.write_byte(b']');
    }

    pub fn write_empty_array(&mut self) {
        self.write_raw(b"[]");
    }

    /// Writes the `,` separating members.
    pub fn write_more(&mut self) {
        self.write_byte(b',');
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("buf", &BStr::new(&self.buf))
            .field("error", &self.error)
            .finish()
    }
}
