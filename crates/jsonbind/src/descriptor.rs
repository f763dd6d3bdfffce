//! Structural descriptors: what a type looks like, independent of any
//! configuration or registered override.
//!
//! A [`Descriptor`] is produced by [`Reflect::describe`] and consumed by the
//! codec compiler. Nested types are referenced through [`TypeRef`], which
//! carries the nested type's `describe` function instead of its descriptor, so
//! building a descriptor never recurses and self-referential types are fine.
//!
//! Shapes reach into values through plain function pointers over `&dyn Any`.
//! Each one checks the concrete type and reports
//! [`Error::BindingMismatch`] instead of panicking.
use std::{
    any::{Any, TypeId},
    borrow::Cow,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    sync::Arc,
};

use crate::{
    Error,
    codec::{Decoder, Encoder},
    reflect::{Marshaler, Reflect, Unmarshaler},
};

/// Identity of a reflected type: its `TypeId` plus the name used for
/// name-keyed registrations.
///
/// Equality and hashing only look at the `TypeId`.
#[derive(Clone, Copy)]
pub struct TypeIdentity {
    id: TypeId,
    name: &'static str,
}

impl TypeIdentity {
    #[must_use]
    pub fn of<T: Reflect>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: T::type_name(),
        }
    }

    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The declared name overrides are registered under.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeIdentity {}

impl Hash for TypeIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A lazily described type.
#[derive(Clone, Copy)]
pub struct TypeRef {
    identity: TypeIdentity,
    describe: fn() -> Descriptor,
}

impl TypeRef {
    #[must_use]
    pub fn of<T: Reflect>() -> Self {
        Self {
            identity: TypeIdentity::of::<T>(),
            describe: T::describe,
        }
    }

    #[must_use]
    pub fn identity(&self) -> TypeIdentity {
        self.identity
    }

    /// Builds the descriptor. Pure: the same type always yields the same
    /// shape.
    #[must_use]
    pub fn describe(&self) -> Descriptor {
        (self.describe)()
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeRef").field(&self.identity).finish()
    }
}

/// Scalar types with built-in codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Bool,
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    F32,
    F64,
    Char,
    String,
}

/// Erased access to a growable or fixed-length sequence.
#[derive(Clone, Copy)]
pub struct SequenceShape {
    pub element: TypeRef,
    /// `Some(n)` for arrays; decoding never changes their length.
    pub fixed_len: Option<usize>,
    pub len: fn(&dyn Any) -> Result<usize, Error>,
    pub for_each: fn(&dyn Any, &mut dyn FnMut(&dyn Any)) -> Result<(), Error>,
    /// Empties a vector, or resets every array element to its default.
    pub clear: fn(&mut dyn Any) -> Result<(), Error>,
    /// Slot for element `index`. Vectors grow by one default element when
    /// `index` equals their length; `None` means the element is dropped.
    pub element_mut: fn(&mut dyn Any, usize) -> Result<Option<&mut dyn Any>, Error>,
}

/// Erased access to a keyed map.
#[derive(Clone, Copy)]
pub struct MappingShape {
    pub key_type: &'static str,
    pub value: TypeRef,
    /// Whether iteration already yields keys in sorted order.
    pub ordered: bool,
    pub len: fn(&dyn Any) -> Result<usize, Error>,
    pub entries: fn(&dyn Any) -> Result<Vec<(Cow<'_, str>, &dyn Any)>, Error>,
    pub clear: fn(&mut dyn Any) -> Result<(), Error>,
    /// Parses `key`, stores a default value under it (replacing any previous
    /// value) and returns the slot.
    pub insert_default: for<'a> fn(&'a mut dyn Any, &str) -> Result<&'a mut dyn Any, Error>,
}

/// Erased access to an optional or boxed value.
#[derive(Clone, Copy)]
pub struct OptionalShape {
    pub inner: TypeRef,
    /// `false` for boxes: `null` is handed to the inner decoder.
    pub nullable: bool,
    pub get: fn(&dyn Any) -> Result<Option<&dyn Any>, Error>,
    pub get_or_insert: fn(&mut dyn Any) -> Result<&mut dyn Any, Error>,
    pub set_none: fn(&mut dyn Any) -> Result<(), Error>,
}

/// A type that writes or reads its own JSON text.
///
/// The direction without a capability falls back to `structural`.
#[derive(Clone)]
pub struct CustomShape {
    pub marshal: Option<fn(&dyn Any) -> Result<Vec<u8>, Error>>,
    pub unmarshal: Option<fn(&mut dyn Any, &[u8]) -> Result<(), Error>>,
    pub structural: Box<Descriptor>,
}

#[derive(Clone)]
pub enum Kind {
    Primitive(Primitive),
    Sequence(SequenceShape),
    Mapping(MappingShape),
    Optional(OptionalShape),
    Record(StructDescriptor),
    Custom(CustomShape),
    /// The type has no JSON representation. Resolving it fails unless an
    /// override covers it.
    Unsupported(&'static str),
}

impl Kind {
    fn label(&self) -> &'static str {
        match self {
            Self::Primitive(_) => "primitive",
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
            Self::Optional(_) => "optional",
            Self::Record(_) => "record",
            Self::Custom(_) => "custom",
            Self::Unsupported(_) => "unsupported",
        }
    }
}

/// The structural shape of one type.
#[derive(Clone)]
pub struct Descriptor {
    pub identity: TypeIdentity,
    pub kind: Kind,
}

impl Descriptor {
    #[must_use]
    pub fn primitive<T: Reflect>(primitive: Primitive) -> Self {
        Self::new::<T>(Kind::Primitive(primitive))
    }

    #[must_use]
    pub fn sequence<T: Reflect>(shape: SequenceShape) -> Self {
        Self::new::<T>(Kind::Sequence(shape))
    }

    #[must_use]
    pub fn mapping<T: Reflect>(shape: MappingShape) -> Self {
        Self::new::<T>(Kind::Mapping(shape))
    }

    #[must_use]
    pub fn optional<T: Reflect>(shape: OptionalShape) -> Self {
        Self::new::<T>(Kind::Optional(shape))
    }

    #[must_use]
    pub fn unsupported<T: Reflect>(reason: &'static str) -> Self {
        Self::new::<T>(Kind::Unsupported(reason))
    }

    /// Starts describing a record type field by field.
    #[must_use]
    pub fn record<R: Reflect>() -> RecordBuilder<R> {
        RecordBuilder {
            identity: TypeIdentity::of::<R>(),
            fields: Vec::new(),
            _record: PhantomData,
        }
    }

    fn new<T: Reflect>(kind: Kind) -> Self {
        Self {
            identity: TypeIdentity::of::<T>(),
            kind,
        }
    }

    /// Declares that `T` encodes itself through [`Marshaler`].
    #[must_use]
    pub fn with_marshaler<T: Reflect + Marshaler>(self) -> Self {
        let mut shape = self.into_custom();
        shape.marshal = Some(marshal_erased::<T>);
        Self::new::<T>(Kind::Custom(shape))
    }

    /// Declares that `T` decodes itself through [`Unmarshaler`].
    #[must_use]
    pub fn with_unmarshaler<T: Reflect + Unmarshaler>(self) -> Self {
        let mut shape = self.into_custom();
        shape.unmarshal = Some(unmarshal_erased::<T>);
        Self::new::<T>(Kind::Custom(shape))
    }

    fn into_custom(self) -> CustomShape {
        match self.kind {
            Kind::Custom(shape) => shape,
            kind => CustomShape {
                marshal: None,
                unmarshal: None,
                structural: Box::new(Self {
                    identity: self.identity,
                    kind,
                }),
            },
        }
    }

    #[must_use]
    pub fn as_record(&self) -> Option<&StructDescriptor> {
        match &self.kind {
            Kind::Record(record) => Some(record),
            _ => None,
        }
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Descriptor");
        s.field("identity", &self.identity)
            .field("kind", &self.kind.label());
        if let Kind::Record(record) = &self.kind {
            s.field("fields", &record.fields);
        }
        s.finish()
    }
}

fn marshal_erased<T: Reflect + Marshaler>(value: &dyn Any) -> Result<Vec<u8>, Error> {
    crate::reflect::downcast_ref::<T>(value)?
        .marshal_json()
        .map_err(Error::Custom)
}

fn unmarshal_erased<T: Reflect + Unmarshaler>(
    value: &mut dyn Any,
    raw: &[u8],
) -> Result<(), Error> {
    crate::reflect::downcast_mut::<T>(value)?
        .unmarshal_json(raw)
        .map_err(Error::Custom)
}

/// Reads and writes one field of a record through the record itself.
pub trait FieldAccess: Send + Sync {
    fn get<'a>(&self, record: &'a dyn Any) -> Option<&'a dyn Any>;
    fn get_mut<'a>(&self, record: &'a mut dyn Any) -> Option<&'a mut dyn Any>;
}

/// Field accessor built from a pair of projection functions.
pub struct Projection<R, F> {
    get: fn(&R) -> &F,
    get_mut: fn(&mut R) -> &mut F,
}

impl<R, F> Projection<R, F> {
    pub fn new(get: fn(&R) -> &F, get_mut: fn(&mut R) -> &mut F) -> Self {
        Self { get, get_mut }
    }
}

impl<R: Any, F: Any> FieldAccess for Projection<R, F> {
    fn get<'a>(&self, record: &'a dyn Any) -> Option<&'a dyn Any> {
        record.downcast_ref::<R>().map(|r| (self.get)(r) as &dyn Any)
    }

    fn get_mut<'a>(&self, record: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        record
            .downcast_mut::<R>()
            .map(|r| (self.get_mut)(r) as &mut dyn Any)
    }
}

/// How one record field is bound to the wire.
#[derive(Clone)]
pub struct FieldBinding {
    /// Name of the field in the record declaration.
    pub name: &'static str,
    /// Keys accepted on decode; empty when the field is never decoded.
    pub from_names: Vec<String>,
    /// Keys written on encode, in order; empty when the field is never
    /// encoded.
    pub to_names: Vec<String>,
    pub field_type: TypeRef,
    pub access: Arc<dyn FieldAccess>,
    /// Replaces the field type's codec for this slot only.
    pub encoder: Option<Arc<dyn Encoder>>,
    pub decoder: Option<Arc<dyn Decoder>>,
    pub omit_empty: bool,
    pub exported: bool,
    /// Set when the wire name was chosen explicitly; naming strategies leave
    /// such fields alone.
    pub renamed: bool,
}

impl FieldBinding {
    /// Sets both the accepted and the emitted name.
    pub fn rename(&mut self, wire: impl Into<String>) {
        let wire = wire.into();
        self.from_names = vec![wire.clone()];
        self.to_names = vec![wire];
        self.renamed = true;
    }

    pub fn hide(&mut self) {
        self.from_names.clear();
        self.to_names.clear();
    }
}

impl fmt::Debug for FieldBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("name", &self.name)
            .field("from_names", &self.from_names)
            .field("to_names", &self.to_names)
            .field("field_type", &self.field_type.identity())
            .field("encoder", &self.encoder.is_some())
            .field("decoder", &self.decoder.is_some())
            .field("omit_empty", &self.omit_empty)
            .field("exported", &self.exported)
            .finish_non_exhaustive()
    }
}

/// Ordered field bindings of a record type.
#[derive(Clone, Debug)]
pub struct StructDescriptor {
    pub identity: TypeIdentity,
    pub fields: Vec<FieldBinding>,
}

impl StructDescriptor {
    /// Looks a field up by its declared name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldBinding> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldBinding> {
        self.fields.iter_mut().find(|f| f.name == name)
    }
}

/// Builder returned by [`Descriptor::record`].
///
/// Modifiers apply to the field added last.
///
/// # Examples
///
/// ```rust
/// use jsonbind::{Descriptor, Reflect};
///
/// #[derive(Default)]
/// struct Point {
///     x: i32,
///     y: i32,
///     label: String,
/// }
///
/// impl Reflect for Point {
///     fn describe() -> Descriptor {
///         Descriptor::record::<Self>()
///             .field::<i32>("x", |p| &p.x, |p| &mut p.x)
///             .field::<i32>("y", |p| &p.y, |p| &mut p.y)
///             .field::<String>("label", |p| &p.label, |p| &mut p.label)
///             .rename("name")
///             .omit_empty()
///             .build()
///     }
/// }
///
/// let json = jsonbind::marshal_to_string(&Point { x: 1, y: 2, label: String::new() }).unwrap();
/// assert_eq!(json, r#"{"x":1,"y":2}"#);
/// ```
pub struct RecordBuilder<R> {
    identity: TypeIdentity,
    fields: Vec<FieldBinding>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Reflect> RecordBuilder<R> {
    #[must_use]
    pub fn field<F: Reflect>(
        mut self,
        name: &'static str,
        get: fn(&R) -> &F,
        get_mut: fn(&mut R) -> &mut F,
    ) -> Self {
        self.fields.push(FieldBinding {
            name,
            from_names: vec![name.to_owned()],
            to_names: vec![name.to_owned()],
            field_type: TypeRef::of::<F>(),
            access: Arc::new(Projection::new(get, get_mut)),
            encoder: None,
            decoder: None,
            omit_empty: false,
            exported: true,
            renamed: false,
        });
        self
    }

    fn last(&mut self) -> Option<&mut FieldBinding> {
        self.fields.last_mut()
    }

    #[must_use]
    pub fn rename(mut self, wire: &str) -> Self {
        if let Some(field) = self.last() {
            field.rename(wire);
        }
        self
    }

    #[must_use]
    pub fn omit_empty(mut self) -> Self {
        if let Some(field) = self.last() {
            field.omit_empty = true;
        }
        self
    }

    /// Marks the field private: only bound when the configuration supports
    /// private fields.
    #[must_use]
    pub fn private(mut self) -> Self {
        if let Some(field) = self.last() {
            field.exported = false;
        }
        self
    }

    /// Never encode or decode the field.
    #[must_use]
    pub fn skip(mut self) -> Self {
        if let Some(field) = self.last() {
            field.hide();
        }
        self
    }

    #[must_use]
    pub fn build(self) -> Descriptor {
        Descriptor {
            identity: self.identity,
            kind: Kind::Record(StructDescriptor {
                identity: self.identity,
                fields: self.fields,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Pair {
        left: i64,
        right: String,
    }

    impl Reflect for Pair {
        fn describe() -> Descriptor {
            Descriptor::record::<Self>()
                .field::<i64>("left", |p| &p.left, |p| &mut p.left)
                .field::<String>("right", |p| &p.right, |p| &mut p.right)
                .rename("r")
                .private()
                .build()
        }
    }

    #[test]
    fn record_fields_keep_declaration_order() {
        let descriptor = Pair::describe();
        let record = descriptor.as_record().unwrap();
        let names: Vec<_> = record.fields.iter().map(|f| f.name).collect();
        assert_eq!(names, ["left", "right"]);
        let right = record.field("right").unwrap();
        assert_eq!(right.to_names, ["r"]);
        assert!(right.renamed);
        assert!(!right.exported);
        assert_eq!(right.field_type.identity(), TypeIdentity::of::<String>());
    }

    #[test]
    fn projection_reads_through_any() {
        let descriptor = Pair::describe();
        let record = descriptor.as_record().unwrap();
        let mut pair = Pair {
            left: 3,
            right: "x".into(),
        };
        let left = record.fields[0].access.get(&pair).unwrap();
        assert_eq!(left.downcast_ref::<i64>(), Some(&3));
        let slot = record.fields[1].access.get_mut(&mut pair).unwrap();
        *slot.downcast_mut::<String>().unwrap() = "y".into();
        assert_eq!(pair.right, "y");
        assert!(record.fields[0].access.get(&7_u8).is_none());
    }

    #[test]
    fn identity_compares_by_type_id() {
        assert_eq!(TypeIdentity::of::<Pair>(), TypeIdentity::of::<Pair>());
        assert_ne!(TypeIdentity::of::<Pair>(), TypeIdentity::of::<i64>());
        assert_eq!(TypeIdentity::of::<Vec<u8>>().name(), "alloc::vec::Vec<u8>");
    }
}
