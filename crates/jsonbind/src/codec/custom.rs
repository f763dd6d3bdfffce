//! Codecs for types that marshal themselves, and the placeholder used to
//! break cycles while a codec graph is under construction.
use std::{
    any::Any,
    sync::{Arc, OnceLock},
};

use crate::{
    Error,
    codec::{CompiledCodec, Decoder, Encoder},
    cursor::Cursor,
    descriptor::TypeIdentity,
    error::{BuildError, BuildErrorReason},
    stream::Stream,
};

/// Copies a [`Marshaler`](crate::Marshaler)'s output verbatim.
pub(crate) struct MarshalerEncoder {
    pub(crate) marshal: fn(&dyn Any) -> Result<Vec<u8>, Error>,
}

impl Encoder for MarshalerEncoder {
    fn encode(&self, value: &dyn Any, stream: &mut Stream) {
        match (self.marshal)(value) {
            Ok(bytes) => stream.write_raw(&bytes),
            Err(err) => stream.report_error(err),
        }
    }
}

/// Hands the raw bytes of one value to an
/// [`Unmarshaler`](crate::Unmarshaler).
pub(crate) struct UnmarshalerDecoder {
    pub(crate) unmarshal: fn(&mut dyn Any, &[u8]) -> Result<(), Error>,
}

impl Decoder for UnmarshalerDecoder {
    fn decode(&self, value: &mut dyn Any, cursor: &mut Cursor<'_>) {
        let Some(raw) = cursor.skip_and_return_bytes() else {
            return;
        };
        if let Err(err) = (self.unmarshal)(value, raw) {
            cursor.report_error(err);
        }
    }
}

/// Stands in for the direction a custom-marshaled type cannot serve.
pub(crate) struct Unavailable {
    pub(crate) identity: TypeIdentity,
    pub(crate) reason: &'static str,
}

impl Unavailable {
    fn error(&self) -> Error {
        Error::Build(BuildError {
            type_name: self.identity.name(),
            reason: BuildErrorReason::Unsupported(self.reason),
        })
    }
}

impl Encoder for Unavailable {
    fn encode(&self, _: &dyn Any, stream: &mut Stream) {
        stream.report_error(self.error());
    }
}

impl Decoder for Unavailable {
    fn decode(&self, _: &mut dyn Any, cursor: &mut Cursor<'_>) {
        cursor.report_error(self.error());
    }
}

/// Placeholder for a type whose codec is still being compiled.
///
/// Nested references to the type see the placeholder; it is pointed at the
/// finished codec before anything is published to a cache.
pub(crate) struct Deferred {
    identity: TypeIdentity,
    target: OnceLock<CompiledCodec>,
}

impl Deferred {
    pub(crate) fn new(identity: TypeIdentity) -> Arc<Self> {
        Arc::new(Self {
            identity,
            target: OnceLock::new(),
        })
    }

    pub(crate) fn resolve(&self, codec: CompiledCodec) {
        let _ = self.target.set(codec);
    }

    pub(crate) fn codec(self: &Arc<Self>) -> CompiledCodec {
        CompiledCodec::new(self.identity, self.clone(), self.clone())
    }

    fn unresolved(&self) -> Error {
        Error::Build(BuildError {
            type_name: self.identity.name(),
            reason: BuildErrorReason::Unsupported("codec used before it was compiled"),
        })
    }
}

impl Encoder for Deferred {
    fn encode(&self, value: &dyn Any, stream: &mut Stream) {
        match self.target.get() {
            Some(codec) => codec.encode(value, stream),
            None => stream.report_error(self.unresolved()),
        }
    }

    fn is_empty(&self, value: &dyn Any) -> bool {
        self.target
            .get()
            .is_some_and(|codec| codec.encoder().is_empty(value))
    }
}

impl Decoder for Deferred {
    fn decode(&self, value: &mut dyn Any, cursor: &mut Cursor<'_>) {
        match self.target.get() {
            Some(codec) => codec.decode(value, cursor),
            None => cursor.report_error(self.unresolved()),
        }
    }
}
