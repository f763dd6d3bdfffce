//! Record codecs: loops over pre-resolved field codecs.
use std::{any::Any, sync::Arc};

use rustc_hash::FxHashMap;

use crate::{
    Error,
    codec::{Decoder, Encoder, mismatch},
    cursor::{Cursor, ValueKind},
    descriptor::{FieldAccess, TypeIdentity},
    escape,
    stream::Stream,
};

pub(crate) struct EncodedField {
    /// Pre-escaped `"name":` for every emitted wire name.
    pub(crate) prefixes: Vec<Box<[u8]>>,
    pub(crate) access: Arc<dyn FieldAccess>,
    pub(crate) encoder: Arc<dyn Encoder>,
    pub(crate) omit_empty: bool,
}

impl EncodedField {
    pub(crate) fn new(
        to_names: &[String],
        access: Arc<dyn FieldAccess>,
        encoder: Arc<dyn Encoder>,
        omit_empty: bool,
        escape_html: bool,
    ) -> Self {
        let prefixes = to_names
            .iter()
            .map(|name| {
                let mut prefix = Vec::with_capacity(name.len() + 3);
                prefix.push(b'"');
                escape::write_escaped(&mut prefix, name, escape_html);
                prefix.extend_from_slice(b"\":");
                prefix.into_boxed_slice()
            })
            .collect();
        Self {
            prefixes,
            access,
            encoder,
            omit_empty,
        }
    }
}

pub(crate) struct RecordEncoder {
    pub(crate) identity: TypeIdentity,
    pub(crate) fields: Vec<EncodedField>,
}

impl Encoder for RecordEncoder {
    fn encode(&self, value: &dyn Any, stream: &mut Stream) {
        if value.type_id() != self.identity.id() {
            stream.report_error(mismatch(self.identity));
            return;
        }
        stream.write_object_start();
        let mut first = true;
        for field in &self.fields {
            if stream.is_latched() {
                break;
            }
            let Some(slot) = field.access.get(value) else {
                stream.report_error(mismatch(self.identity));
                return;
            };
            if field.omit_empty && field.encoder.is_empty(slot) {
                continue;
            }
            for prefix in &field.prefixes {
                if stream.is_latched() {
                    break;
                }
                if !first {
                    stream.write_more();
                }
                first = false;
                stream.write_raw(prefix);
                field.encoder.encode(slot, stream);
            }
        }
        stream.write_object_end();
    }
}

pub(crate) struct DecodedField {
    pub(crate) access: Arc<dyn FieldAccess>,
    pub(crate) decoder: Arc<dyn Decoder>,
}

pub(crate) struct RecordDecoder {
    identity: TypeIdentity,
    fields: Vec<DecodedField>,
    exact: FxHashMap<String, usize>,
    /// Lowercased names; present unless matching is case-sensitive.
    folded: Option<FxHashMap<String, usize>>,
    disallow_unknown_fields: bool,
}

impl RecordDecoder {
    /// `fields` pairs each decoded field with the names it accepts. When two
    /// fields accept the same name the earlier one keeps it.
    pub(crate) fn new(
        identity: TypeIdentity,
        fields: Vec<(Vec<String>, DecodedField)>,
        case_sensitive: bool,
        disallow_unknown_fields: bool,
    ) -> Self {
        let mut exact = FxHashMap::default();
        let mut folded = (!case_sensitive).then(FxHashMap::default);
        let mut decoded = Vec::with_capacity(fields.len());
        for (index, (names, field)) in fields.into_iter().enumerate() {
            for name in names {
                if let Some(folded) = &mut folded {
                    folded.entry(name.to_lowercase()).or_insert(index);
                }
                exact.entry(name).or_insert(index);
            }
            decoded.push(field);
        }
        Self {
            identity,
            fields: decoded,
            exact,
            folded,
            disallow_unknown_fields,
        }
    }

    fn lookup(&self, key: &str) -> Option<&DecodedField> {
        let index = self.exact.get(key).or_else(|| {
            self.folded
                .as_ref()
                .and_then(|folded| folded.get(&key.to_lowercase()))
        })?;
        self.fields.get(*index)
    }
}

impl Decoder for RecordDecoder {
    fn decode(&self, value: &mut dyn Any, cursor: &mut Cursor<'_>) {
        match cursor.next_kind() {
            ValueKind::Null => {
                cursor.read_null();
                return;
            }
            ValueKind::Object => {}
            _ => {
                cursor.report_mismatch("object");
                return;
            }
        }
        if (*value).type_id() != self.identity.id() {
            cursor.report_error(mismatch(self.identity));
            return;
        }
        cursor.read_object(|cursor, key| {
            if let Some(field) = self.lookup(&key) {
                let Some(slot) = field.access.get_mut(value) else {
                    cursor.report_error(mismatch(self.identity));
                    return false;
                };
                field.decoder.decode(slot, cursor);
            } else if self.disallow_unknown_fields {
                let position = cursor.position();
                cursor.report_error(Error::UnknownField {
                    name: key.into_owned(),
                    position,
                });
                return false;
            } else {
                cursor.skip();
            }
            true
        });
    }
}
