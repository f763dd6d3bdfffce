//! Turns type references into compiled codecs.
//!
//! One [`Compiler`] serves one top-level resolution against one registry
//! snapshot. Types already under construction are represented by
//! [`Deferred`] placeholders so self-referential types terminate; the whole
//! graph is handed back to the caller for publishing only after the root is
//! finished.
use std::{any::TypeId, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use rustc_hash::{FxBuildHasher, FxHashMap};
use tracing::{debug, trace};

use crate::{
    codec::{
        CompiledCodec, Decoder, Encoder,
        container::{MapCodec, OptionalCodec, SequenceCodec},
        custom::{Deferred, MarshalerEncoder, Unavailable, UnmarshalerDecoder},
        primitive,
        record::{DecodedField, EncodedField, RecordDecoder, RecordEncoder},
    },
    config::{Config, NamingStrategy},
    descriptor::{CustomShape, Descriptor, Kind, StructDescriptor, TypeIdentity, TypeRef},
    error::{BuildError, BuildErrorReason},
    registry::RegistrySnapshot,
};

type CodecPair = (Arc<dyn Encoder>, Arc<dyn Decoder>);

fn pair<C: Encoder + Decoder + 'static>(codec: C) -> CodecPair {
    let codec = Arc::new(codec);
    (codec.clone(), codec)
}

struct CacheEntry {
    generation: u64,
    codec: CompiledCodec,
}

/// Codecs of one frozen configuration, tagged with the registry generation
/// they were built under.
#[derive(Default)]
pub(crate) struct CodecCache {
    entries: DashMap<TypeId, CacheEntry, FxBuildHasher>,
}

impl CodecCache {
    pub(crate) fn get(&self, id: TypeId, generation: u64) -> Option<CompiledCodec> {
        let entry = self.entries.get(&id)?;
        (entry.generation == generation).then(|| entry.codec.clone())
    }

    /// Stores `codec` unless a codec for the same generation got there first,
    /// and returns whichever is stored for that generation.
    pub(crate) fn publish(&self, codec: CompiledCodec, generation: u64) -> CompiledCodec {
        match self.entries.entry(codec.identity().id()) {
            Entry::Occupied(mut entry) => {
                let current = entry.get();
                if current.generation == generation {
                    return current.codec.clone();
                }
                if current.generation < generation {
                    trace!(
                        type_name = codec.identity().name(),
                        stale = current.generation,
                        generation,
                        "replacing stale codec"
                    );
                    entry.insert(CacheEntry {
                        generation,
                        codec: codec.clone(),
                    });
                }
                codec
            }
            Entry::Vacant(entry) => {
                entry.insert(CacheEntry {
                    generation,
                    codec: codec.clone(),
                });
                codec
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

pub(crate) struct Compiler<'a> {
    config: &'a Config,
    snapshot: &'a RegistrySnapshot,
    cache: &'a CodecCache,
    pending: FxHashMap<TypeId, Arc<Deferred>>,
    finished: FxHashMap<TypeId, CompiledCodec>,
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(
        config: &'a Config,
        snapshot: &'a RegistrySnapshot,
        cache: &'a CodecCache,
    ) -> Self {
        Self {
            config,
            snapshot,
            cache,
            pending: FxHashMap::default(),
            finished: FxHashMap::default(),
        }
    }

    /// Codecs compiled by this resolution, ready to publish.
    pub(crate) fn into_finished(self) -> impl Iterator<Item = CompiledCodec> {
        self.finished.into_values()
    }

    pub(crate) fn resolve(&mut self, ty: TypeRef) -> Result<CompiledCodec, BuildError> {
        let identity = ty.identity();
        let id = identity.id();
        if let Some(codec) = self.finished.get(&id) {
            return Ok(codec.clone());
        }
        if let Some(codec) = self.cache.get(id, self.snapshot.generation) {
            return Ok(codec);
        }
        if let Some(deferred) = self.pending.get(&id) {
            trace!(type_name = identity.name(), "recursive reference");
            return Ok(deferred.codec());
        }

        let deferred = Deferred::new(identity);
        self.pending.insert(id, Arc::clone(&deferred));
        let result = self.compile(ty);
        self.pending.remove(&id);
        let codec = result?;
        deferred.resolve(codec.clone());
        debug!(
            type_name = identity.name(),
            generation = self.snapshot.generation,
            "compiled codec"
        );
        self.finished.insert(id, codec.clone());
        Ok(codec)
    }

    fn compile(&mut self, ty: TypeRef) -> Result<CompiledCodec, BuildError> {
        let identity = ty.identity();
        let snapshot = self.snapshot;
        let chain = &snapshot.extensions;
        let encoder = snapshot
            .type_encoders
            .get(identity.name())
            .cloned()
            .or_else(|| chain.create_encoder(identity));
        let decoder = snapshot
            .type_decoders
            .get(identity.name())
            .cloned()
            .or_else(|| chain.create_decoder(identity));

        let (encoder, decoder) = match (encoder, decoder) {
            (Some(encoder), Some(decoder)) => (encoder, decoder),
            (encoder, decoder) => {
                let mut descriptor = ty.describe();
                self.prepare(&mut descriptor)?;
                let covered = encoder.is_some() || decoder.is_some();
                let (built_encoder, built_decoder) = match &descriptor.kind {
                    // The other direction is overridden; only fail if used.
                    Kind::Unsupported(reason) if covered => pair(Unavailable {
                        identity,
                        reason: *reason,
                    }),
                    _ => self.assemble(&descriptor)?,
                };
                (
                    encoder.unwrap_or_else(|| chain.decorate_encoder(identity, built_encoder)),
                    decoder.unwrap_or_else(|| chain.decorate_decoder(identity, built_decoder)),
                )
            }
        };
        Ok(CompiledCodec::new(identity, encoder, decoder))
    }

    /// Applies configuration and extensions to record descriptors.
    fn prepare(&self, descriptor: &mut Descriptor) -> Result<(), BuildError> {
        match &mut descriptor.kind {
            Kind::Record(record) => self.prepare_record(record),
            Kind::Custom(shape) => self.prepare(&mut shape.structural),
            _ => Ok(()),
        }
    }

    fn prepare_record(&self, record: &mut StructDescriptor) -> Result<(), BuildError> {
        for field in &mut record.fields {
            if !field.renamed && self.config.naming != NamingStrategy::Identity {
                let wire = self.config.naming.apply(field.name);
                for name in field.from_names.iter_mut().chain(field.to_names.iter_mut()) {
                    name.clone_from(&wire);
                }
            }
            if !field.exported && !self.config.support_private_fields {
                field.hide();
            }
        }
        self.snapshot.extensions.apply_in_place(record);

        let mut emitted: FxHashMap<&str, &'static str> = FxHashMap::default();
        for field in &record.fields {
            for name in &field.to_names {
                if let Some(first) = emitted.insert(name, field.name) {
                    return Err(BuildError {
                        type_name: record.identity.name(),
                        reason: BuildErrorReason::DuplicateWireName {
                            name: name.clone(),
                            first,
                            second: field.name,
                        },
                    });
                }
            }
        }
        Ok(())
    }

    fn assemble(&mut self, descriptor: &Descriptor) -> Result<CodecPair, BuildError> {
        let identity = descriptor.identity;
        match &descriptor.kind {
            Kind::Primitive(primitive) => Ok(primitive::codec(*primitive, self.config)),
            Kind::Sequence(shape) => {
                let element = self.resolve(shape.element)?;
                Ok(pair(SequenceCodec {
                    shape: *shape,
                    element_encoder: Arc::clone(element.encoder()),
                    element_decoder: Arc::clone(element.decoder()),
                }))
            }
            Kind::Mapping(shape) => {
                let value = self.resolve(shape.value)?;
                Ok(pair(MapCodec {
                    shape: *shape,
                    value_encoder: Arc::clone(value.encoder()),
                    value_decoder: Arc::clone(value.decoder()),
                    sort_keys: self.config.sort_map_keys,
                    escape_html: self.config.escape_html,
                }))
            }
            Kind::Optional(shape) => {
                let inner = self.resolve(shape.inner)?;
                Ok(pair(OptionalCodec {
                    shape: *shape,
                    inner_encoder: Arc::clone(inner.encoder()),
                    inner_decoder: Arc::clone(inner.decoder()),
                }))
            }
            Kind::Record(record) => self.assemble_record(record),
            Kind::Custom(shape) => self.assemble_custom(identity, shape),
            Kind::Unsupported(reason) => Err(BuildError {
                type_name: identity.name(),
                reason: BuildErrorReason::Unsupported(*reason),
            }),
        }
    }

    fn assemble_custom(
        &mut self,
        identity: TypeIdentity,
        shape: &CustomShape,
    ) -> Result<CodecPair, BuildError> {
        let fallback = match (&shape.structural.kind, shape.marshal.zip(shape.unmarshal)) {
            (_, Some(_)) | (Kind::Unsupported(_), None) => None,
            (_, None) => Some(self.assemble(&shape.structural)?),
        };
        let unavailable = |reason| Unavailable { identity, reason };
        let encoder: Arc<dyn Encoder> = match (shape.marshal, &fallback) {
            (Some(marshal), _) => Arc::new(MarshalerEncoder { marshal }),
            (None, Some((encoder, _))) => Arc::clone(encoder),
            (None, None) => Arc::new(unavailable("type can only be decoded")),
        };
        let decoder: Arc<dyn Decoder> = match (shape.unmarshal, &fallback) {
            (Some(unmarshal), _) => Arc::new(UnmarshalerDecoder { unmarshal }),
            (None, Some((_, decoder))) => Arc::clone(decoder),
            (None, None) => Arc::new(unavailable("type can only be encoded")),
        };
        Ok((encoder, decoder))
    }

    /// Field-level codecs win over the codec of the field's type.
    fn assemble_record(&mut self, record: &StructDescriptor) -> Result<CodecPair, BuildError> {
        let mut encoded = Vec::new();
        let mut decoded = Vec::new();
        for field in &record.fields {
            let encodes = !field.to_names.is_empty();
            let decodes = !field.from_names.is_empty();
            let needs_type =
                (encodes && field.encoder.is_none()) || (decodes && field.decoder.is_none());
            let resolved = if needs_type {
                Some(self.resolve(field.field_type)?)
            } else {
                None
            };
            let encoder = field
                .encoder
                .clone()
                .or_else(|| resolved.as_ref().map(|c| Arc::clone(c.encoder())));
            let decoder = field
                .decoder
                .clone()
                .or_else(|| resolved.as_ref().map(|c| Arc::clone(c.decoder())));
            if let (true, Some(encoder)) = (encodes, encoder) {
                encoded.push(EncodedField::new(
                    &field.to_names,
                    Arc::clone(&field.access),
                    encoder,
                    field.omit_empty,
                    self.config.escape_html,
                ));
            }
            if let (true, Some(decoder)) = (decodes, decoder) {
                decoded.push((
                    field.from_names.clone(),
                    DecodedField {
                        access: Arc::clone(&field.access),
                        decoder,
                    },
                ));
            }
        }
        let encoder = RecordEncoder {
            identity: record.identity,
            fields: encoded,
        };
        let decoder = RecordDecoder::new(
            record.identity,
            decoded,
            self.config.case_sensitive,
            self.config.disallow_unknown_fields,
        );
        Ok((Arc::new(encoder), Arc::new(decoder)))
    }
}
