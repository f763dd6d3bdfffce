//! Codecs for sequences, maps and optional values.
use std::{any::Any, sync::Arc};

use crate::{
    codec::{Decoder, Encoder},
    cursor::{Cursor, ValueKind},
    descriptor::{MappingShape, OptionalShape, SequenceShape},
    stream::Stream,
};

pub(crate) struct SequenceCodec {
    pub(crate) shape: SequenceShape,
    pub(crate) element_encoder: Arc<dyn Encoder>,
    pub(crate) element_decoder: Arc<dyn Decoder>,
}

impl Encoder for SequenceCodec {
    fn encode(&self, value: &dyn Any, stream: &mut Stream) {
        stream.write_array_start();
        let mut first = true;
        let result = (self.shape.for_each)(value, &mut |element| {
            if stream.is_latched() {
                return;
            }
            if !first {
                stream.write_more();
            }
            first = false;
            self.element_encoder.encode(element, stream);
        });
        if let Err(err) = result {
            stream.report_error(err);
        }
        stream.write_array_end();
    }

    fn is_empty(&self, value: &dyn Any) -> bool {
        (self.shape.len)(value).is_ok_and(|len| len == 0)
    }
}

impl Decoder for SequenceCodec {
    fn decode(&self, value: &mut dyn Any, cursor: &mut Cursor<'_>) {
        if cursor.next_kind() == ValueKind::Null {
            cursor.read_null();
            if self.shape.fixed_len.is_none() {
                if let Err(err) = (self.shape.clear)(value) {
                    cursor.report_error(err);
                }
            }
            return;
        }
        if cursor.next_kind() != ValueKind::Array {
            cursor.report_mismatch("array");
            return;
        }
        if let Err(err) = (self.shape.clear)(value) {
            cursor.report_error(err);
            return;
        }
        let mut index = 0;
        cursor.read_array(|cursor| {
            match (self.shape.element_mut)(value, index) {
                Ok(Some(slot)) => self.element_decoder.decode(slot, cursor),
                Ok(None) => cursor.skip(),
                Err(err) => {
                    cursor.report_error(err);
                    return false;
                }
            }
            index += 1;
            true
        });
    }
}

pub(crate) struct MapCodec {
    pub(crate) shape: MappingShape,
    pub(crate) value_encoder: Arc<dyn Encoder>,
    pub(crate) value_decoder: Arc<dyn Decoder>,
    pub(crate) sort_keys: bool,
    pub(crate) escape_html: bool,
}

impl Encoder for MapCodec {
    fn encode(&self, value: &dyn Any, stream: &mut Stream) {
        let mut entries = match (self.shape.entries)(value) {
            Ok(entries) => entries,
            Err(err) => {
                stream.report_error(err);
                return;
            }
        };
        if self.sort_keys && !self.shape.ordered {
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        }
        stream.write_object_start();
        for (i, (key, entry)) in entries.iter().enumerate() {
            if stream.is_latched() {
                break;
            }
            if i > 0 {
                stream.write_more();
            }
            stream.write_string_with(key, self.escape_html);
            stream.write_byte(b':');
            self.value_encoder.encode(*entry, stream);
        }
        stream.write_object_end();
    }

    fn is_empty(&self, value: &dyn Any) -> bool {
        (self.shape.len)(value).is_ok_and(|len| len == 0)
    }
}

impl Decoder for MapCodec {
    fn decode(&self, value: &mut dyn Any, cursor: &mut Cursor<'_>) {
        if cursor.next_kind() == ValueKind::Null {
            cursor.read_null();
            if let Err(err) = (self.shape.clear)(value) {
                cursor.report_error(err);
            }
            return;
        }
        cursor.read_object(|cursor, key| match (self.shape.insert_default)(value, &key) {
            Ok(slot) => {
                self.value_decoder.decode(slot, cursor);
                true
            }
            Err(err) => {
                cursor.report_error(err);
                false
            }
        });
    }
}

pub(crate) struct OptionalCodec {
    pub(crate) shape: OptionalShape,
    pub(crate) inner_encoder: Arc<dyn Encoder>,
    pub(crate) inner_decoder: Arc<dyn Decoder>,
}

impl Encoder for OptionalCodec {
    fn encode(&self, value: &dyn Any, stream: &mut Stream) {
        match (self.shape.get)(value) {
            Ok(Some(inner)) => self.inner_encoder.encode(inner, stream),
            Ok(None) => stream.write_null(),
            Err(err) => stream.report_error(err),
        }
    }

    fn is_empty(&self, value: &dyn Any) -> bool {
        match (self.shape.get)(value) {
            Ok(Some(inner)) if !self.shape.nullable => self.inner_encoder.is_empty(inner),
            Ok(Some(_)) | Err(_) => false,
            Ok(None) => true,
        }
    }
}

impl Decoder for OptionalCodec {
    fn decode(&self, value: &mut dyn Any, cursor: &mut Cursor<'_>) {
        if self.shape.nullable && cursor.next_kind() == ValueKind::Null {
            cursor.read_null();
            if let Err(err) = (self.shape.set_none)(value) {
                cursor.report_error(err);
            }
            return;
        }
        match (self.shape.get_or_insert)(value) {
            Ok(inner) => self.inner_decoder.decode(inner, cursor),
            Err(err) => cursor.report_error(err),
        }
    }
}
