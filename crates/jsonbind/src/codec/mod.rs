//! Compiled codecs and the traits user overrides implement.
use std::{any::Any, fmt, sync::Arc};

use crate::{
    Error,
    cursor::Cursor,
    descriptor::TypeIdentity,
    reflect::{Reflect, downcast_mut, downcast_ref},
    stream::Stream,
};

pub(crate) mod container;
pub(crate) mod custom;
pub(crate) mod primitive;
pub(crate) mod record;

/// Writes one value of a fixed type.
///
/// `value` is the value itself (for a field-level encoder: the field). An
/// encoder reports failures by latching them on the stream.
pub trait Encoder: Send + Sync {
    fn encode(&self, value: &dyn Any, stream: &mut Stream);

    /// Whether `value` counts as empty for fields marked `omit_empty`.
    fn is_empty(&self, value: &dyn Any) -> bool {
        let _ = value;
        false
    }
}

/// Reads one value of a fixed type into existing storage.
pub trait Decoder: Send + Sync {
    fn decode(&self, value: &mut dyn Any, cursor: &mut Cursor<'_>);
}

type EncodeFn = dyn Fn(&dyn Any, &mut Stream) + Send + Sync;
type IsEmptyFn = dyn Fn(&dyn Any) -> bool + Send + Sync;
type DecodeFn = dyn Fn(&mut dyn Any, &mut Cursor<'_>) + Send + Sync;

/// An [`Encoder`] backed by a closure over the erased value.
pub struct FnEncoder {
    encode: Box<EncodeFn>,
    is_empty: Option<Box<IsEmptyFn>>,
}

impl FnEncoder {
    pub fn new(encode: impl Fn(&dyn Any, &mut Stream) + Send + Sync + 'static) -> Self {
        Self {
            encode: Box::new(encode),
            is_empty: None,
        }
    }

    /// Supplies the emptiness test used by `omit_empty`; without one the value
    /// is never empty.
    #[must_use]
    pub fn with_is_empty(
        mut self,
        is_empty: impl Fn(&dyn Any) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.is_empty = Some(Box::new(is_empty));
        self
    }
}

impl Encoder for FnEncoder {
    fn encode(&self, value: &dyn Any, stream: &mut Stream) {
        (self.encode)(value, stream);
    }

    fn is_empty(&self, value: &dyn Any) -> bool {
        self.is_empty.as_ref().is_some_and(|f| f(value))
    }
}

/// A [`Decoder`] backed by a closure over the erased value.
pub struct FnDecoder(Box<DecodeFn>);

impl FnDecoder {
    pub fn new(decode: impl Fn(&mut dyn Any, &mut Cursor<'_>) + Send + Sync + 'static) -> Self {
        Self(Box::new(decode))
    }
}

impl Decoder for FnDecoder {
    fn decode(&self, value: &mut dyn Any, cursor: &mut Cursor<'_>) {
        (self.0)(value, cursor);
    }
}

/// Typed encoder override: `f` receives the value as a `&T`.
///
/// A value of another type latches [`Error::BindingMismatch`].
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
///
/// use jsonbind::{Config, Registry, encoder_fn};
///
/// let registry = Arc::new(Registry::new());
/// registry.register_type_encoder_for::<bool>(encoder_fn(|v: &bool, stream| {
///     stream.write_string(if *v { "yes" } else { "no" });
/// }));
/// let json = Config::default().freeze_with(registry);
/// assert_eq!(json.marshal_to_string(&vec![true, false]).unwrap(), r#"["yes","no"]"#);
/// ```
pub fn encoder_fn<T: Reflect>(f: impl Fn(&T, &mut Stream) + Send + Sync + 'static) -> FnEncoder {
    FnEncoder::new(move |value, stream| match downcast_ref::<T>(value) {
        Ok(value) => f(value, stream),
        Err(err) => stream.report_error(err),
    })
}

/// Typed decoder override: `f` receives the destination as a `&mut T`.
pub fn decoder_fn<T: Reflect>(
    f: impl Fn(&mut T, &mut Cursor<'_>) + Send + Sync + 'static,
) -> FnDecoder {
    FnDecoder::new(move |value, cursor| match downcast_mut::<T>(value) {
        Ok(value) => f(value, cursor),
        Err(err) => cursor.report_error(err),
    })
}

/// An encoder/decoder pair bound to one type under one frozen configuration.
#[derive(Clone)]
pub struct CompiledCodec {
    identity: TypeIdentity,
    encoder: Arc<dyn Encoder>,
    decoder: Arc<dyn Decoder>,
}

impl CompiledCodec {
    pub(crate) fn new(
        identity: TypeIdentity,
        encoder: Arc<dyn Encoder>,
        decoder: Arc<dyn Decoder>,
    ) -> Self {
        Self {
            identity,
            encoder,
            decoder,
        }
    }

    #[must_use]
    pub fn identity(&self) -> TypeIdentity {
        self.identity
    }

    #[must_use]
    pub fn encoder(&self) -> &Arc<dyn Encoder> {
        &self.encoder
    }

    #[must_use]
    pub fn decoder(&self) -> &Arc<dyn Decoder> {
        &self.decoder
    }

    pub fn encode(&self, value: &dyn Any, stream: &mut Stream) {
        self.encoder.encode(value, stream);
    }

    pub fn decode(&self, value: &mut dyn Any, cursor: &mut Cursor<'_>) {
        self.decoder.decode(value, cursor);
    }

    /// Whether both codecs are the very same objects as `other`'s.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.encoder, &other.encoder) && Arc::ptr_eq(&self.decoder, &other.decoder)
    }
}

impl fmt::Debug for CompiledCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledCodec")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// Error latched by codecs that were handed a value of the wrong type.
pub(crate) fn mismatch(identity: TypeIdentity) -> Error {
    Error::BindingMismatch {
        expected: identity.name(),
    }
}
