//! Registered overrides and extensions.
//!
//! Registry state is an immutable snapshot behind an [`ArcSwap`]. Readers
//! load one snapshot per resolution and never block; every mutation swaps in
//! a copy with a bumped generation, which is how frozen configurations notice
//! that their cached codecs are stale.
use std::{
    fmt,
    sync::{Arc, LazyLock},
};

use arc_swap::ArcSwap;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{
    codec::{Decoder, Encoder},
    extension::{Extension, ExtensionChain, FieldOverride, Origin},
    reflect::Reflect,
};

#[derive(Clone, Default)]
pub(crate) struct RegistrySnapshot {
    pub(crate) generation: u64,
    pub(crate) extensions: ExtensionChain,
    pub(crate) type_encoders: FxHashMap<String, Arc<dyn Encoder>>,
    pub(crate) type_decoders: FxHashMap<String, Arc<dyn Decoder>>,
}

/// Type-level overrides, field-level overrides and extensions.
///
/// [`Registry::global`] is the process-wide instance used by
/// [`Config::freeze`](crate::Config::freeze) and the free functions of this
/// crate; tests and embedders can freeze against their own instance with
/// [`Config::freeze_with`](crate::Config::freeze_with).
///
/// Registration is meant for startup. A registration racing the resolution
/// of the same type may or may not be seen by that resolution; the next
/// resolution always sees it.
pub struct Registry {
    snap: ArcSwap<RegistrySnapshot>,
}

static GLOBAL: LazyLock<Arc<Registry>> = LazyLock::new(|| Arc::new(Registry::new()));

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            snap: ArcSwap::from_pointee(RegistrySnapshot::default()),
        }
    }

    #[must_use]
    pub fn global() -> &'static Arc<Registry> {
        &GLOBAL
    }

    #[inline]
    pub(crate) fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.snap.load_full()
    }

    /// Counter bumped by every mutation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.snap.load().generation
    }

    /// Snapshot of the registered extensions, in application order.
    #[must_use]
    pub fn extensions(&self) -> ExtensionChain {
        self.snap.load().extensions.clone()
    }

    fn update(&self, op: &'static str, mutate: impl Fn(&mut RegistrySnapshot)) {
        loop {
            let cur = self.snap.load_full();
            let mut next = (*cur).clone();
            mutate(&mut next);
            next.generation = cur.generation + 1;
            let generation = next.generation;
            let prev = self.snap.compare_and_swap(&cur, Arc::new(next));
            if Arc::ptr_eq(&prev, &cur) {
                debug!(op, generation, "registry updated");
                return;
            }
        }
    }

    /// Overrides encoding of the type whose [`Reflect::type_name`] is
    /// `type_name`, wherever it appears.
    pub fn register_type_encoder(&self, type_name: &str, encoder: impl Encoder + 'static) {
        let encoder: Arc<dyn Encoder> = Arc::new(encoder);
        self.update("register_type_encoder", |snap| {
            snap.type_encoders
                .insert(type_name.to_owned(), Arc::clone(&encoder));
        });
    }

    pub fn register_type_encoder_for<T: Reflect>(&self, encoder: impl Encoder + 'static) {
        self.register_type_encoder(T::type_name(), encoder);
    }

    pub fn register_type_decoder(&self, type_name: &str, decoder: impl Decoder + 'static) {
        let decoder: Arc<dyn Decoder> = Arc::new(decoder);
        self.update("register_type_decoder", |snap| {
            snap.type_decoders
                .insert(type_name.to_owned(), Arc::clone(&decoder));
        });
    }

    pub fn register_type_decoder_for<T: Reflect>(&self, decoder: impl Decoder + 'static) {
        self.register_type_decoder(T::type_name(), decoder);
    }

    /// Overrides encoding of one field, named as declared, of one record
    /// type. The encoder receives the field value.
    pub fn register_field_encoder(
        &self,
        type_name: &str,
        field: &str,
        encoder: impl Encoder + 'static,
    ) {
        let link: Arc<dyn Extension> = Arc::new(FieldOverride {
            type_name: type_name.to_owned(),
            field: field.to_owned(),
            encoder: Some(Arc::new(encoder)),
            decoder: None,
        });
        self.update("register_field_encoder", |snap| {
            snap.extensions
                .push(Origin::FieldEncoder, Arc::clone(&link));
        });
    }

    pub fn register_field_encoder_for<T: Reflect>(
        &self,
        field: &str,
        encoder: impl Encoder + 'static,
    ) {
        self.register_field_encoder(T::type_name(), field, encoder);
    }

    pub fn register_field_decoder(
        &self,
        type_name: &str,
        field: &str,
        decoder: impl Decoder + 'static,
    ) {
        let link: Arc<dyn Extension> = Arc::new(FieldOverride {
            type_name: type_name.to_owned(),
            field: field.to_owned(),
            encoder: None,
            decoder: Some(Arc::new(decoder)),
        });
        self.update("register_field_decoder", |snap| {
            snap.extensions
                .push(Origin::FieldDecoder, Arc::clone(&link));
        });
    }

    pub fn register_field_decoder_for<T: Reflect>(
        &self,
        field: &str,
        decoder: impl Decoder + 'static,
    ) {
        self.register_field_decoder(T::type_name(), field, decoder);
    }

    /// Appends an extension to the chain.
    pub fn register_extension(&self, extension: impl Extension + 'static) {
        let link: Arc<dyn Extension> = Arc::new(extension);
        self.update("register_extension", |snap| {
            snap.extensions.push(Origin::User, Arc::clone(&link));
        });
    }

    /// Removes every type-level and field-level encoder override.
    pub fn clear_encoders(&self) {
        self.update("clear_encoders", |snap| {
            snap.type_encoders.clear();
            snap.extensions
                .retain(|origin| origin != Origin::FieldEncoder);
        });
    }

    /// Removes every type-level and field-level decoder override.
    pub fn clear_decoders(&self) {
        self.update("clear_decoders", |snap| {
            snap.type_decoders.clear();
            snap.extensions
                .retain(|origin| origin != Origin::FieldDecoder);
        });
    }

    /// Removes extensions registered with
    /// [`register_extension`](Self::register_extension). Field overrides stay.
    pub fn clear_extensions(&self) {
        self.update("clear_extensions", |snap| {
            snap.extensions.retain(|origin| origin != Origin::User);
        });
    }

    /// Removes everything. The generation keeps counting up.
    pub fn reset(&self) {
        self.update("reset", |snap| {
            snap.type_encoders.clear();
            snap.type_decoders.clear();
            snap.extensions = ExtensionChain::default();
        });
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snap = self.snap.load();
        let mut encoders: Vec<_> = snap.type_encoders.keys().collect();
        let mut decoders: Vec<_> = snap.type_decoders.keys().collect();
        encoders.sort();
        decoders.sort();
        f.debug_struct("Registry")
            .field("generation", &snap.generation)
            .field("type_encoders", &encoders)
            .field("type_decoders", &decoders)
            .field("extensions", &snap.extensions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FnDecoder, FnEncoder};

    struct Noop;

    impl Extension for Noop {}

    #[test]
    fn every_mutation_bumps_generation() {
        let registry = Registry::new();
        assert_eq!(registry.generation(), 0);
        registry.register_type_encoder("x", FnEncoder::new(|_, _| {}));
        registry.clear_decoders();
        registry.clear_decoders();
        assert_eq!(registry.generation(), 3);
    }

    #[test]
    fn clearing_is_selective() {
        let registry = Registry::new();
        registry.register_extension(Noop);
        registry.register_field_encoder("T", "a", FnEncoder::new(|_, _| {}));
        registry.register_field_decoder("T", "a", FnDecoder::new(|_, _| {}));
        registry.register_type_decoder("T", FnDecoder::new(|_, _| {}));
        assert_eq!(registry.extensions().len(), 3);

        registry.clear_decoders();
        assert_eq!(registry.extensions().len(), 2);
        assert!(registry.snapshot().type_decoders.is_empty());

        registry.clear_extensions();
        assert_eq!(registry.extensions().len(), 1);

        registry.reset();
        assert!(registry.extensions().is_empty());
    }
}
