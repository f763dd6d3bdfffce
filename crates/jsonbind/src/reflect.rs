//! The [`Reflect`] trait and its implementations for standard types.
use std::{
    any::Any,
    borrow::Cow,
    collections::{BTreeMap, HashMap, btree_map, hash_map},
    hash::{BuildHasher, Hash},
};

use crate::{
    Error,
    descriptor::{Descriptor, MappingShape, OptionalShape, Primitive, SequenceShape, TypeRef},
    error::CustomError,
};

/// A type whose structure can be described to the codec compiler.
///
/// Implement it by hand with [`Descriptor::record`] or let the
/// [`record!`](crate::record) macro write it.
pub trait Reflect: Any + Sized {
    /// Name under which overrides for this type are registered.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }

    fn describe() -> Descriptor;
}

/// A type that writes its own JSON text. The bytes are copied to the output
/// verbatim.
pub trait Marshaler {
    /// # Errors
    ///
    /// Any error is latched on the stream and returned from the encode call.
    fn marshal_json(&self) -> Result<Vec<u8>, CustomError>;
}

/// A type that parses its own JSON text. `raw` is exactly one JSON value,
/// without surrounding whitespace.
pub trait Unmarshaler {
    /// # Errors
    ///
    /// Any error is latched on the cursor and returned from the decode call.
    fn unmarshal_json(&mut self, raw: &[u8]) -> Result<(), CustomError>;
}

/// Map keys: JSON object keys are strings, so keys convert to and from text.
pub trait MapKey: Sized + 'static {
    fn to_key(&self) -> Cow<'_, str>;
    fn from_key(key: &str) -> Option<Self>;
}

impl MapKey for String {
    fn to_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }

    fn from_key(key: &str) -> Option<Self> {
        Some(key.to_owned())
    }
}

macro_rules! integer_keys {
    ($($ty:ty),*) => {$(
        impl MapKey for $ty {
            fn to_key(&self) -> Cow<'_, str> {
                Cow::Owned(self.to_string())
            }

            fn from_key(key: &str) -> Option<Self> {
                key.parse().ok()
            }
        }
    )*};
}

integer_keys!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

/// Downcasts an erased value, reporting a binding mismatch on failure.
///
/// # Errors
///
/// [`Error::BindingMismatch`] when `value` is not a `T`.
pub fn downcast_ref<T: Reflect>(value: &dyn Any) -> Result<&T, Error> {
    value.downcast_ref::<T>().ok_or(Error::BindingMismatch {
        expected: T::type_name(),
    })
}

/// Mutable counterpart of [`downcast_ref`].
///
/// # Errors
///
/// [`Error::BindingMismatch`] when `value` is not a `T`.
pub fn downcast_mut<T: Reflect>(value: &mut dyn Any) -> Result<&mut T, Error> {
    value.downcast_mut::<T>().ok_or(Error::BindingMismatch {
        expected: T::type_name(),
    })
}

macro_rules! primitives {
    ($($ty:ty => $primitive:ident),* $(,)?) => {$(
        impl Reflect for $ty {
            fn describe() -> Descriptor {
                Descriptor::primitive::<Self>(Primitive::$primitive)
            }
        }
    )*};
}

primitives! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    i128 => I128,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    u128 => U128,
    usize => Usize,
    f32 => F32,
    f64 => F64,
    char => Char,
    String => String,
}

// Vec<T>

impl<T: Reflect + Default> Reflect for Vec<T> {
    fn describe() -> Descriptor {
        Descriptor::sequence::<Self>(SequenceShape {
            element: TypeRef::of::<T>(),
            fixed_len: None,
            len: |v| Ok(downcast_ref::<Self>(v)?.len()),
            for_each: |v, f| {
                downcast_ref::<Self>(v)?.iter().for_each(|e| f(e));
                Ok(())
            },
            clear: |v| {
                downcast_mut::<Self>(v)?.clear();
                Ok(())
            },
            element_mut: vec_element_mut::<T>,
        })
    }
}

fn vec_element_mut<T: Reflect + Default>(
    v: &mut dyn Any,
    index: usize,
) -> Result<Option<&mut dyn Any>, Error> {
    let v = downcast_mut::<Vec<T>>(v)?;
    if index == v.len() {
        v.push(T::default());
    }
    Ok(v.get_mut(index).map(|e| e as &mut dyn Any))
}

// [T; N]

impl<T: Reflect + Default, const N: usize> Reflect for [T; N] {
    fn describe() -> Descriptor {
        Descriptor::sequence::<Self>(SequenceShape {
            element: TypeRef::of::<T>(),
            fixed_len: Some(N),
            len: |_| Ok(N),
            for_each: |v, f| {
                downcast_ref::<Self>(v)?.iter().for_each(|e| f(e));
                Ok(())
            },
            clear: |v| {
                downcast_mut::<Self>(v)?.fill_with(T::default);
                Ok(())
            },
            element_mut: |v, index| {
                Ok(downcast_mut::<Self>(v)?
                    .get_mut(index)
                    .map(|e| e as &mut dyn Any))
            },
        })
    }
}

// Option<T> and Box<T>

impl<T: Reflect + Default> Reflect for Option<T> {
    fn describe() -> Descriptor {
        Descriptor::optional::<Self>(OptionalShape {
            inner: TypeRef::of::<T>(),
            nullable: true,
            get: |v| Ok(downcast_ref::<Self>(v)?.as_ref().map(|e| e as &dyn Any)),
            get_or_insert: |v| {
                Ok(downcast_mut::<Self>(v)?.get_or_insert_with(T::default) as &mut dyn Any)
            },
            set_none: |v| {
                *downcast_mut::<Self>(v)? = None;
                Ok(())
            },
        })
    }
}

impl<T: Reflect + Default> Reflect for Box<T> {
    fn describe() -> Descriptor {
        Descriptor::optional::<Self>(OptionalShape {
            inner: TypeRef::of::<T>(),
            nullable: false,
            get: |v| Ok(Some(&**downcast_ref::<Self>(v)? as &dyn Any)),
            get_or_insert: |v| Ok(&mut **downcast_mut::<Self>(v)? as &mut dyn Any),
            set_none: |_| Ok(()),
        })
    }
}

// Maps

fn invalid_key<K>(key: &str) -> Error {
    Error::InvalidMapKey {
        key: key.to_owned(),
        target: std::any::type_name::<K>(),
    }
}

impl<K, V> Reflect for BTreeMap<K, V>
where
    K: MapKey + Ord,
    V: Reflect + Default,
{
    fn describe() -> Descriptor {
        Descriptor::mapping::<Self>(MappingShape {
            key_type: std::any::type_name::<K>(),
            value: TypeRef::of::<V>(),
            ordered: true,
            len: |m| Ok(downcast_ref::<Self>(m)?.len()),
            entries: |m| {
                Ok(downcast_ref::<Self>(m)?
                    .iter()
                    .map(|(k, v)| (k.to_key(), v as &dyn Any))
                    .collect())
            },
            clear: |m| {
                downcast_mut::<Self>(m)?.clear();
                Ok(())
            },
            insert_default: btree_insert_default::<K, V>,
        })
    }
}

fn btree_insert_default<'a, K, V>(m: &'a mut dyn Any, key: &str) -> Result<&'a mut dyn Any, Error>
where
    K: MapKey + Ord,
    V: Reflect + Default,
{
    let k = K::from_key(key).ok_or_else(|| invalid_key::<K>(key))?;
    let slot = match downcast_mut::<BTreeMap<K, V>>(m)?.entry(k) {
        btree_map::Entry::Occupied(entry) => {
            let slot = entry.into_mut();
            *slot = V::default();
            slot
        }
        btree_map::Entry::Vacant(entry) => entry.insert(V::default()),
    };
    Ok(slot)
}

impl<K, V, S> Reflect for HashMap<K, V, S>
where
    K: MapKey + Hash + Eq,
    V: Reflect + Default,
    S: BuildHasher + Default + 'static,
{
    fn describe() -> Descriptor {
        Descriptor::mapping::<Self>(MappingShape {
            key_type: std::any::type_name::<K>(),
            value: TypeRef::of::<V>(),
            ordered: false,
            len: |m| Ok(downcast_ref::<Self>(m)?.len()),
            entries: |m| {
                Ok(downcast_ref::<Self>(m)?
                    .iter()
                    .map(|(k, v)| (k.to_key(), v as &dyn Any))
                    .collect())
            },
            clear: |m| {
                downcast_mut::<Self>(m)?.clear();
                Ok(())
            },
            insert_default: hash_insert_default::<K, V, S>,
        })
    }
}

fn hash_insert_default<'a, K, V, S>(
    m: &'a mut dyn Any,
    key: &str,
) -> Result<&'a mut dyn Any, Error>
where
    K: MapKey + Hash + Eq,
    V: Reflect + Default,
    S: BuildHasher + Default + 'static,
{
    let k = K::from_key(key).ok_or_else(|| invalid_key::<K>(key))?;
    let slot = match downcast_mut::<HashMap<K, V, S>>(m)?.entry(k) {
        hash_map::Entry::Occupied(entry) => {
            let slot = entry.into_mut();
            *slot = V::default();
            slot
        }
        hash_map::Entry::Vacant(entry) => entry.insert(V::default()),
    };
    Ok(slot)
}
