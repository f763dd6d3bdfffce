//! A JSON codec engine with a cached, extensible codec registry.
//!
//! Types describe their shape once through [`Reflect`]; a frozen [`Config`]
//! ([`Json`]) compiles that shape into an encoder/decoder pair, caches it, and
//! runs it against a [`Stream`] or a [`Cursor`]. Behavior can be overridden
//! per type, per record field, or through an ordered chain of
//! [`Extension`]s kept in a [`Registry`].
//!
//! ```rust
//! use jsonbind::record;
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct User {
//!     name: String,
//!     age: Option<u32>,
//!     email: String,
//! }
//!
//! record! {
//!     User {
//!         name: String,
//!         #[omit_empty]
//!         age: Option<u32>,
//!         #[omit_empty]
//!         email: String => "mail",
//!     }
//! }
//!
//! let user = User { name: "ada".into(), age: None, email: "ada@example.com".into() };
//! let text = jsonbind::marshal_to_string(&user).unwrap();
//! assert_eq!(text, r#"{"name":"ada","mail":"ada@example.com"}"#);
//!
//! let mut back = User::default();
//! jsonbind::unmarshal_from_str(&text, &mut back).unwrap();
//! assert_eq!(back, user);
//! ```

#![allow(missing_docs)]

mod codec;
mod compiler;
mod config;
mod cursor;
mod descriptor;
mod error;
mod escape;
mod extension;
mod json;
mod number;
mod reflect;
mod registry;
mod stream;

#[cfg(test)]
mod tests;

use std::sync::LazyLock;

pub use codec::{CompiledCodec, Decoder, Encoder, FnDecoder, FnEncoder, decoder_fn, encoder_fn};
pub use config::{Config, FloatPrecision, NamingStrategy};
pub use cursor::{Cursor, DEFAULT_MAX_DEPTH, ValueKind};
pub use descriptor::{
    CustomShape, Descriptor, FieldAccess, FieldBinding, Kind, MappingShape, OptionalShape,
    Primitive, Projection, RecordBuilder, SequenceShape, StructDescriptor, TypeIdentity, TypeRef,
};
pub use error::{BuildError, BuildErrorReason, CustomError, Error, Position, SyntaxError};
pub use extension::{Extension, ExtensionChain};
pub use json::Json;
pub use reflect::{MapKey, Marshaler, Reflect, Unmarshaler, downcast_mut, downcast_ref};
pub use registry::Registry;
pub use stream::Stream;

static DEFAULT: LazyLock<Json> = LazyLock::new(|| Config::default().freeze());

/// The default configuration, frozen against [`Registry::global`].
#[must_use]
pub fn default_json() -> &'static Json {
    &DEFAULT
}

/// Encodes `value` with the default configuration.
///
/// # Errors
///
/// See [`Json::marshal`].
pub fn marshal<T: Reflect>(value: &T) -> Result<Vec<u8>, Error> {
    DEFAULT.marshal(value)
}

/// # Errors
///
/// See [`Json::marshal_to_string`].
pub fn marshal_to_string<T: Reflect>(value: &T) -> Result<String, Error> {
    DEFAULT.marshal_to_string(value)
}

/// Decodes `input` into `value` with the default configuration.
///
/// # Errors
///
/// See [`Json::unmarshal`].
pub fn unmarshal<T: Reflect>(input: &[u8], value: &mut T) -> Result<(), Error> {
    DEFAULT.unmarshal(input, value)
}

/// # Errors
///
/// See [`Json::unmarshal`].
pub fn unmarshal_from_str<T: Reflect>(input: &str, value: &mut T) -> Result<(), Error> {
    DEFAULT.unmarshal_from_str(input, value)
}

/// # Errors
///
/// See [`Json::resolve_type`].
pub fn resolve<T: Reflect>() -> Result<CompiledCodec, BuildError> {
    DEFAULT.resolve::<T>()
}

/// Registers a type encoder on [`Registry::global`].
pub fn register_type_encoder(type_name: &str, encoder: impl Encoder + 'static) {
    Registry::global().register_type_encoder(type_name, encoder);
}

pub fn register_type_decoder(type_name: &str, decoder: impl Decoder + 'static) {
    Registry::global().register_type_decoder(type_name, decoder);
}

pub fn register_field_encoder(type_name: &str, field: &str, encoder: impl Encoder + 'static) {
    Registry::global().register_field_encoder(type_name, field, encoder);
}

pub fn register_field_decoder(type_name: &str, field: &str, decoder: impl Decoder + 'static) {
    Registry::global().register_field_decoder(type_name, field, decoder);
}

pub fn register_extension(extension: impl Extension + 'static) {
    Registry::global().register_extension(extension);
}

pub fn clear_encoders() {
    Registry::global().clear_encoders();
}

pub fn clear_decoders() {
    Registry::global().clear_decoders();
}

pub fn clear_extensions() {
    Registry::global().clear_extensions();
}

/// Clears everything registered on [`Registry::global`].
pub fn reset() {
    Registry::global().reset();
}

/// Implements [`Reflect`] for a struct, field by field.
///
/// Each field is `name: Type`, optionally followed by `=> "wire-name"` and
/// preceded by markers: `#[omit_empty]`, `#[private]` or `#[skip]`. Fields
/// that are not listed are not bound. The struct must implement `Default` to
/// be decoded inside containers.
///
/// ```rust
/// use jsonbind::record;
///
/// #[derive(Default)]
/// struct Event {
///     kind: String,
///     at: u64,
///     cache: Vec<u8>,
/// }
///
/// record! {
///     Event {
///         kind: String => "type",
///         at: u64,
///         #[skip]
///         cache: Vec<u8>,
///     }
/// }
///
/// let event = Event { kind: "click".into(), at: 9, cache: vec![1] };
/// assert_eq!(jsonbind::marshal_to_string(&event).unwrap(), r#"{"type":"click","at":9}"#);
/// ```
#[macro_export]
macro_rules! record {
    ($ty:ident { $( $(#[$marker:ident])* $field:ident : $fty:ty $(=> $wire:literal)? ),* $(,)? }) => {
        impl $crate::Reflect for $ty {
            fn type_name() -> &'static str {
                concat!(module_path!(), "::", stringify!($ty))
            }

            fn describe() -> $crate::Descriptor {
                $crate::Descriptor::record::<Self>()
                    $(
                        .field::<$fty>(stringify!($field), |r| &r.$field, |r| &mut r.$field)
                        $( .rename($wire) )?
                        $( .$marker() )*
                    )*
                    .build()
            }
        }
    };
}
