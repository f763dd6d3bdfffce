//! Extensions: ordered, registry-wide hooks into codec compilation.
use std::{fmt, sync::Arc};

use crate::{
    codec::{Decoder, Encoder},
    descriptor::{StructDescriptor, TypeIdentity},
};

/// Hooks called while compiling codecs. Every method defaults to a no-op.
///
/// Extensions run in registration order. `update_struct_descriptor` sees the
/// descriptor after the naming strategy and private-field policy were applied
/// and may rename fields, hide them, or install field-level codecs.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
///
/// use jsonbind::{Config, Extension, Registry, StructDescriptor, record};
///
/// #[derive(Default)]
/// struct Order {
///     order_id: u64,
/// }
/// record! { Order { order_id: u64 } }
///
/// struct Upper;
///
/// impl Extension for Upper {
///     fn update_struct_descriptor(&self, descriptor: &mut StructDescriptor) {
///         for field in &mut descriptor.fields {
///             let wire = field.name.to_uppercase();
///             field.rename(wire);
///         }
///     }
/// }
///
/// let registry = Arc::new(Registry::new());
/// registry.register_extension(Upper);
/// let json = Config::default().freeze_with(registry);
/// assert_eq!(json.marshal_to_string(&Order { order_id: 7 }).unwrap(), r#"{"ORDER_ID":7}"#);
/// ```
pub trait Extension: Send + Sync {
    fn update_struct_descriptor(&self, descriptor: &mut StructDescriptor) {
        let _ = descriptor;
    }

    /// Supplies a whole-type encoder. Consulted after explicitly registered
    /// type encoders; the first extension returning `Some` wins.
    fn create_encoder(&self, identity: TypeIdentity) -> Option<Arc<dyn Encoder>> {
        let _ = identity;
        None
    }

    fn create_decoder(&self, identity: TypeIdentity) -> Option<Arc<dyn Decoder>> {
        let _ = identity;
        None
    }

    /// Wraps an encoder the compiler built. Overrides are never decorated.
    fn decorate_encoder(
        &self,
        identity: TypeIdentity,
        encoder: Arc<dyn Encoder>,
    ) -> Arc<dyn Encoder> {
        let _ = identity;
        encoder
    }

    fn decorate_decoder(
        &self,
        identity: TypeIdentity,
        decoder: Arc<dyn Decoder>,
    ) -> Arc<dyn Decoder> {
        let _ = identity;
        decoder
    }
}

/// Where a chain entry came from; clearing operations filter on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    User,
    FieldEncoder,
    FieldDecoder,
}

/// The ordered list of registered extensions.
#[derive(Clone, Default)]
pub struct ExtensionChain {
    links: Vec<(Origin, Arc<dyn Extension>)>,
}

impl ExtensionChain {
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Extension>> {
        self.links.iter().map(|(_, ext)| ext)
    }

    /// Folds every extension over `descriptor` in registration order.
    #[must_use]
    pub fn apply_all(&self, mut descriptor: StructDescriptor) -> StructDescriptor {
        self.apply_in_place(&mut descriptor);
        descriptor
    }

    pub(crate) fn apply_in_place(&self, descriptor: &mut StructDescriptor) {
        for ext in self.iter() {
            ext.update_struct_descriptor(descriptor);
        }
    }

    pub(crate) fn create_encoder(&self, identity: TypeIdentity) -> Option<Arc<dyn Encoder>> {
        self.iter().find_map(|ext| ext.create_encoder(identity))
    }

    pub(crate) fn create_decoder(&self, identity: TypeIdentity) -> Option<Arc<dyn Decoder>> {
        self.iter().find_map(|ext| ext.create_decoder(identity))
    }

    pub(crate) fn decorate_encoder(
        &self,
        identity: TypeIdentity,
        encoder: Arc<dyn Encoder>,
    ) -> Arc<dyn Encoder> {
        self.iter()
            .fold(encoder, |enc, ext| ext.decorate_encoder(identity, enc))
    }

    pub(crate) fn decorate_decoder(
        &self,
        identity: TypeIdentity,
        decoder: Arc<dyn Decoder>,
    ) -> Arc<dyn Decoder> {
        self.iter()
            .fold(decoder, |dec, ext| ext.decorate_decoder(identity, dec))
    }

    pub(crate) fn push(&mut self, origin: Origin, extension: Arc<dyn Extension>) {
        self.links.push((origin, extension));
    }

    pub(crate) fn retain(&mut self, keep: impl Fn(Origin) -> bool) {
        self.links.retain(|(origin, _)| keep(*origin));
    }
}

impl fmt::Debug for ExtensionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.links.iter().map(|(origin, _)| origin))
            .finish()
    }
}

/// Installs a codec on one declared field of one record type.
pub(crate) struct FieldOverride {
    pub(crate) type_name: String,
    pub(crate) field: String,
    pub(crate) encoder: Option<Arc<dyn Encoder>>,
    pub(crate) decoder: Option<Arc<dyn Decoder>>,
}

impl Extension for FieldOverride {
    fn update_struct_descriptor(&self, descriptor: &mut StructDescriptor) {
        if descriptor.identity.name() != self.type_name {
            return;
        }
        let Some(binding) = descriptor.field_mut(&self.field) else {
            tracing::debug!(
                type_name = %self.type_name,
                field = %self.field,
                "field override names an undeclared field"
            );
            return;
        };
        if let Some(encoder) = &self.encoder {
            binding.encoder = Some(Arc::clone(encoder));
        }
        if let Some(decoder) = &self.decoder {
            binding.decoder = Some(Arc::clone(decoder));
        }
    }
}
