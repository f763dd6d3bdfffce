//! Codecs for scalar types.
//!
//! A `null` decoded into a scalar leaves the destination unchanged.
use std::{any::Any, fmt::Display, marker::PhantomData, str::FromStr, sync::Arc};

use crate::{
    Error,
    codec::{Decoder, Encoder},
    config::{Config, FloatPrecision},
    cursor::{Cursor, ValueKind},
    descriptor::Primitive,
    stream::Stream,
};

/// Selects the codec variant for `primitive` under `config`.
pub(crate) fn codec(primitive: Primitive, config: &Config) -> (Arc<dyn Encoder>, Arc<dyn Decoder>) {
    fn pair<C: Encoder + Decoder + 'static>(c: C) -> (Arc<dyn Encoder>, Arc<dyn Decoder>) {
        let c = Arc::new(c);
        (c.clone(), c)
    }
    let six_digits = config.float_precision == FloatPrecision::SixDigits;
    match primitive {
        Primitive::Bool => pair(BoolCodec),
        Primitive::I8 => pair(IntCodec::<i8>::new()),
        Primitive::I16 => pair(IntCodec::<i16>::new()),
        Primitive::I32 => pair(IntCodec::<i32>::new()),
        Primitive::I64 => pair(IntCodec::<i64>::new()),
        Primitive::I128 => pair(IntCodec::<i128>::new()),
        Primitive::Isize => pair(IntCodec::<isize>::new()),
        Primitive::U8 => pair(IntCodec::<u8>::new()),
        Primitive::U16 => pair(IntCodec::<u16>::new()),
        Primitive::U32 => pair(IntCodec::<u32>::new()),
        Primitive::U64 => pair(IntCodec::<u64>::new()),
        Primitive::U128 => pair(IntCodec::<u128>::new()),
        Primitive::Usize => pair(IntCodec::<usize>::new()),
        Primitive::F32 => pair(F32Codec { six_digits }),
        Primitive::F64 => pair(F64Codec { six_digits }),
        Primitive::Char => pair(CharCodec {
            escape_html: config.escape_html,
        }),
        Primitive::String => pair(StringCodec {
            escape_html: config.escape_html,
        }),
    }
}

fn latch_mismatch<T>(stream: &mut Stream) {
    stream.report_error(Error::BindingMismatch {
        expected: std::any::type_name::<T>(),
    });
}

fn report_mismatch<T>(cursor: &mut Cursor<'_>) {
    cursor.report_error(Error::BindingMismatch {
        expected: std::any::type_name::<T>(),
    });
}

struct BoolCodec;

impl Encoder for BoolCodec {
    fn encode(&self, value: &dyn Any, stream: &mut Stream) {
        match value.downcast_ref::<bool>() {
            Some(v) => stream.write_bool(*v),
            None => latch_mismatch::<bool>(stream),
        }
    }

    fn is_empty(&self, value: &dyn Any) -> bool {
        value.downcast_ref::<bool>().is_some_and(|v| !v)
    }
}

impl Decoder for BoolCodec {
    fn decode(&self, value: &mut dyn Any, cursor: &mut Cursor<'_>) {
        if cursor.read_null() {
            return;
        }
        let Some(slot) = value.downcast_mut::<bool>() else {
            report_mismatch::<bool>(cursor);
            return;
        };
        if let Some(v) = cursor.read_bool() {
            *slot = v;
        }
    }
}

struct IntCodec<T>(PhantomData<fn() -> T>);

impl<T> IntCodec<T> {
    fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Encoder for IntCodec<T>
where
    T: Any + Display + Default + PartialEq,
{
    fn encode(&self, value: &dyn Any, stream: &mut Stream) {
        match value.downcast_ref::<T>() {
            Some(v) => stream.write_display(v),
            None => latch_mismatch::<T>(stream),
        }
    }

    fn is_empty(&self, value: &dyn Any) -> bool {
        value.downcast_ref::<T>().is_some_and(|v| *v == T::default())
    }
}

impl<T> Decoder for IntCodec<T>
where
    T: Any + FromStr,
{
    fn decode(&self, value: &mut dyn Any, cursor: &mut Cursor<'_>) {
        if cursor.read_null() {
            return;
        }
        let Some(slot) = value.downcast_mut::<T>() else {
            report_mismatch::<T>(cursor);
            return;
        };
        if let Some(v) = cursor.read_int::<T>() {
            *slot = v;
        }
    }
}

struct F32Codec {
    six_digits: bool,
}

impl Encoder for F32Codec {
    fn encode(&self, value: &dyn Any, stream: &mut Stream) {
        match value.downcast_ref::<f32>() {
            Some(v) if self.six_digits => stream.write_f32_six_digits(*v),
            Some(v) => stream.write_f32(*v),
            None => latch_mismatch::<f32>(stream),
        }
    }

    fn is_empty(&self, value: &dyn Any) -> bool {
        value.downcast_ref::<f32>().is_some_and(|v| *v == 0.0)
    }
}

impl Decoder for F32Codec {
    fn decode(&self, value: &mut dyn Any, cursor: &mut Cursor<'_>) {
        if cursor.read_null() {
            return;
        }
        let Some(slot) = value.downcast_mut::<f32>() else {
            report_mismatch::<f32>(cursor);
            return;
        };
        if let Some(v) = cursor.read_f32() {
            *slot = v;
        }
    }
}

struct F64Codec {
    six_digits: bool,
}

impl Encoder for F64Codec {
    fn encode(&self, value: &dyn Any, stream: &mut Stream) {
        match value.downcast_ref::<f64>() {
            Some(v) if self.six_digits => stream.write_f64_six_digits(*v),
            Some(v) => stream.write_f64(*v),
            None => latch_mismatch::<f64>(stream),
        }
    }

    fn is_empty(&self, value: &dyn Any) -> bool {
        value.downcast_ref::<f64>().is_some_and(|v| *v == 0.0)
    }
}

impl Decoder for F64Codec {
    fn decode(&self, value: &mut dyn Any, cursor: &mut Cursor<'_>) {
        if cursor.read_null() {
            return;
        }
        let Some(slot) = value.downcast_mut::<f64>() else {
            report_mismatch::<f64>(cursor);
            return;
        };
        if let Some(v) = cursor.read_f64() {
            *slot = v;
        }
    }
}

struct StringCodec {
    escape_html: bool,
}

impl Encoder for StringCodec {
    fn encode(&self, value: &dyn Any, stream: &mut Stream) {
        match value.downcast_ref::<String>() {
            Some(v) => stream.write_string_with(v, self.escape_html),
            None => latch_mismatch::<String>(stream),
        }
    }

    fn is_empty(&self, value: &dyn Any) -> bool {
        value.downcast_ref::<String>().is_some_and(String::is_empty)
    }
}

impl Decoder for StringCodec {
    fn decode(&self, value: &mut dyn Any, cursor: &mut Cursor<'_>) {
        if cursor.read_null() {
            return;
        }
        let Some(slot) = value.downcast_mut::<String>() else {
            report_mismatch::<String>(cursor);
            return;
        };
        if let Some(s) = cursor.read_str() {
            slot.clear();
            slot.push_str(&s);
        }
    }
}

/// A `char` travels as a one-character string.
struct CharCodec {
    escape_html: bool,
}

impl Encoder for CharCodec {
    fn encode(&self, value: &dyn Any, stream: &mut Stream) {
        match value.downcast_ref::<char>() {
            Some(c) => {
                let mut utf8 = [0u8; 4];
                stream.write_string_with(c.encode_utf8(&mut utf8), self.escape_html);
            }
            None => latch_mismatch::<char>(stream),
        }
    }

    fn is_empty(&self, value: &dyn Any) -> bool {
        value.downcast_ref::<char>().is_some_and(|c| *c == '\0')
    }
}

impl Decoder for CharCodec {
    fn decode(&self, value: &mut dyn Any, cursor: &mut Cursor<'_>) {
        if cursor.read_null() {
            return;
        }
        let Some(slot) = value.downcast_mut::<char>() else {
            report_mismatch::<char>(cursor);
            return;
        };
        cursor.next_kind();
        let position = cursor.position();
        let Some(s) = cursor.read_str() else {
            return;
        };
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => *slot = c,
            _ => cursor.report_error(Error::TypeMismatch {
                expected: "single-character string",
                found: ValueKind::String,
                position,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn encode(primitive: Primitive, config: &Config, value: &dyn Any) -> String {
        let (encoder, _) = codec(primitive, config);
        let mut stream = Stream::new();
        encoder.encode(value, &mut stream);
        String::from_utf8(stream.into_result().unwrap()).unwrap()
    }

    #[rstest]
    #[case(Primitive::I8, &-5_i8, "-5")]
    #[case(Primitive::U128, &u128::MAX, "340282366920938463463374607431768211455")]
    #[case(Primitive::Char, &'"', r#""\"""#)]
    #[case(Primitive::F64, &0.1_f64, "0.1")]
    fn encodes_scalars(
        #[case] primitive: Primitive,
        #[case] value: &dyn Any,
        #[case] expected: &str,
    ) {
        assert_eq!(encode(primitive, &Config::default(), value), expected);
    }

    #[test]
    fn precision_follows_config() {
        let config = Config {
            float_precision: FloatPrecision::SixDigits,
            ..Config::default()
        };
        assert_eq!(encode(Primitive::F32, &config, &1.234_567_89_f32), "1.234568");
        assert_eq!(
            encode(Primitive::F32, &Config::default(), &1.234_567_89_f32),
            "1.2345679"
        );
    }

    #[test]
    fn null_leaves_scalar_unchanged() {
        let (_, decoder) = codec(Primitive::I32, &Config::default());
        let mut v = 17_i32;
        let mut cursor = Cursor::new(b"null");
        decoder.decode(&mut v, &mut cursor);
        assert!(cursor.error().is_none());
        assert_eq!(v, 17);
    }

    #[test]
    fn char_requires_one_character() {
        let (_, decoder) = codec(Primitive::Char, &Config::default());
        let mut c = 'x';
        let mut cursor = Cursor::new(br#""ab""#);
        decoder.decode(&mut c, &mut cursor);
        assert!(matches!(cursor.error(), Some(Error::TypeMismatch { .. })));
        assert_eq!(c, 'x');
    }

    #[test]
    fn wrong_value_type_is_latched() {
        let (encoder, _) = codec(Primitive::Bool, &Config::default());
        let mut stream = Stream::new();
        encoder.encode(&1_u8, &mut stream);
        assert!(matches!(
            stream.error(),
            Some(Error::BindingMismatch { expected: "bool" })
        ));
    }
}
