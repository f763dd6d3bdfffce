use std::{
    any::Any,
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use super::{Person, isolated};
use crate::{
    BuildErrorReason, Config, CustomError, Descriptor, Encoder, Error, Extension, Marshaler,
    Reflect, Stream, TypeIdentity, decoder_fn, encoder_fn,
};

#[derive(Debug, Default, PartialEq)]
struct Stamp {
    seconds: i64,
}

impl Marshaler for Stamp {
    fn marshal_json(&self) -> Result<Vec<u8>, CustomError> {
        Ok(format!(r#""T+{}""#, self.seconds).into_bytes())
    }
}

impl Reflect for Stamp {
    fn describe() -> Descriptor {
        Descriptor::record::<Self>()
            .field::<i64>("seconds", |s| &s.seconds, |s| &mut s.seconds)
            .build()
            .with_marshaler::<Self>()
    }
}

#[test]
fn marshaler_encodes_and_structure_decodes() {
    let (_, json) = isolated(Config::default());
    assert_eq!(
        json.marshal_to_string(&Stamp { seconds: 5 }).unwrap(),
        r#""T+5""#
    );
    let mut stamp = Stamp::default();
    json.unmarshal_from_str(r#"{"seconds": 9}"#, &mut stamp).unwrap();
    assert_eq!(stamp.seconds, 9);
}

#[test]
fn type_override_beats_marshaler() {
    let (registry, json) = isolated(Config::default());
    registry.register_type_encoder_for::<Stamp>(encoder_fn(|s: &Stamp, stream| {
        stream.write_i64(s.seconds * 1000);
    }));
    assert_eq!(
        json.marshal_to_string(&vec![Stamp { seconds: 2 }]).unwrap(),
        "[2000]"
    );
}

#[test]
fn field_override_beats_type_override() {
    let (registry, json) = isolated(Config::default());
    registry.register_type_encoder_for::<String>(encoder_fn(|s: &String, stream| {
        stream.write_string(&s.to_uppercase());
    }));
    registry.register_field_encoder_for::<Person>(
        "name",
        encoder_fn(|_: &String, stream| stream.write_string("redacted")),
    );
    registry.register_field_decoder_for::<Person>(
        "age",
        decoder_fn(|age: &mut u32, cursor| {
            if let Some(text) = cursor.read_str() {
                *age = text.parse().unwrap_or_default();
            }
        }),
    );

    let person = Person {
        name: "Ada".into(),
        age: 36,
        email: Some("ada@example.com".into()),
        nickname: String::new(),
    };
    assert_eq!(
        json.marshal_to_string(&person).unwrap(),
        r#"{"name":"redacted","age":36,"email":"ADA@EXAMPLE.COM"}"#
    );

    let mut back = Person::default();
    json.unmarshal_from_str(r#"{"age": "41"}"#, &mut back).unwrap();
    assert_eq!(back.age, 41);
}

#[test]
fn field_overrides_use_declared_names() {
    let (registry, json) = isolated(Config::default());
    registry.register_field_encoder_for::<Person>(
        "nickname",
        encoder_fn(|nick: &String, stream| stream.write_string(&format!("~{nick}")))
            .with_is_empty(|v| v.downcast_ref::<String>().is_some_and(String::is_empty)),
    );
    let mut person = Person::default();
    assert_eq!(
        json.marshal_to_string(&person).unwrap(),
        r#"{"name":"","age":0,"email":null}"#
    );
    person.nickname = "ace".into();
    assert_eq!(
        json.marshal_to_string(&person).unwrap(),
        r#"{"name":"","age":0,"email":null,"nick":"~ace"}"#
    );
}

struct Flags;

impl Extension for Flags {
    fn create_encoder(&self, identity: TypeIdentity) -> Option<Arc<dyn Encoder>> {
        (identity == TypeIdentity::of::<bool>()).then(|| {
            Arc::new(encoder_fn(|v: &bool, stream| {
                stream.write_string(if *v { "on" } else { "off" });
            })) as Arc<dyn Encoder>
        })
    }
}

#[test]
fn explicit_override_beats_extension() {
    let (registry, json) = isolated(Config::default());
    registry.register_extension(Flags);
    assert_eq!(json.marshal_to_string(&true).unwrap(), r#""on""#);

    registry.register_type_encoder_for::<bool>(encoder_fn(|v: &bool, stream| {
        stream.write_i64(i64::from(*v));
    }));
    assert_eq!(json.marshal_to_string(&true).unwrap(), "1");

    registry.clear_encoders();
    assert_eq!(json.marshal_to_string(&false).unwrap(), r#""off""#);
    registry.clear_extensions();
    assert_eq!(json.marshal_to_string(&false).unwrap(), "false");
}

struct Bracketed(Arc<dyn Encoder>);

impl Encoder for Bracketed {
    fn encode(&self, value: &dyn Any, stream: &mut Stream) {
        stream.write_array_start();
        self.0.encode(value, stream);
        stream.write_array_end();
    }
}

struct Bracket;

impl Extension for Bracket {
    fn decorate_encoder(
        &self,
        identity: TypeIdentity,
        encoder: Arc<dyn Encoder>,
    ) -> Arc<dyn Encoder> {
        if identity == TypeIdentity::of::<u8>() || identity == TypeIdentity::of::<u16>() {
            Arc::new(Bracketed(encoder))
        } else {
            encoder
        }
    }
}

#[test]
fn decorators_wrap_built_codecs_only() {
    let (registry, json) = isolated(Config::default());
    registry.register_extension(Bracket);
    registry.register_type_encoder_for::<u16>(encoder_fn(|v: &u16, stream| {
        stream.write_string(&format!("{v:#x}"));
    }));
    assert_eq!(json.marshal_to_string(&(7_u8)).unwrap(), "[7]");
    assert_eq!(json.marshal_to_string(&(255_u16)).unwrap(), r#""0xff""#);
}

#[test]
fn registry_changes_invalidate_cached_codecs() {
    let (registry, json) = isolated(Config::default());
    let first = json.resolve::<u8>().unwrap();
    assert!(first.ptr_eq(&json.resolve::<u8>().unwrap()));
    assert_eq!(json.marshal_to_string(&5_u8).unwrap(), "5");

    registry.register_type_encoder_for::<u8>(encoder_fn(|v: &u8, stream| {
        stream.write_string(&"*".repeat(usize::from(*v)));
    }));
    assert!(!first.ptr_eq(&json.resolve::<u8>().unwrap()));
    assert_eq!(json.marshal_to_string(&5_u8).unwrap(), r#""*****""#);

    registry.clear_encoders();
    assert_eq!(json.marshal_to_string(&5_u8).unwrap(), "5");
}

#[test]
fn frozen_handles_keep_separate_caches() {
    let (registry, json) = isolated(Config::default());
    let other = Config::default().freeze_with(Arc::clone(&registry));
    let a = json.resolve::<Person>().unwrap();
    let b = other.resolve::<Person>().unwrap();
    assert!(!a.ptr_eq(&b));
    assert!(a.ptr_eq(&json.clone().resolve::<Person>().unwrap()));
}

#[derive(Default)]
struct Handle(u32);

impl Reflect for Handle {
    fn describe() -> Descriptor {
        Descriptor::unsupported::<Self>("opaque handle")
    }
}

#[derive(Default)]
struct Holder {
    handle: Handle,
}

crate::record! { Holder { handle: Handle } }

#[test]
fn unsupported_types_need_an_override() {
    let (registry, json) = isolated(Config::default());
    let err = json.resolve::<Holder>().unwrap_err();
    assert!(err.type_name.ends_with("Handle"));
    assert_eq!(err.reason, BuildErrorReason::Unsupported("opaque handle"));

    registry.register_type_encoder_for::<Handle>(encoder_fn(|h: &Handle, stream| {
        stream.write_u64(u64::from(h.0));
    }));
    let holder = Holder { handle: Handle(7) };
    assert_eq!(json.marshal_to_string(&holder).unwrap(), r#"{"handle":7}"#);

    let err = json
        .unmarshal_from_str(r#"{"handle": 8}"#, &mut Holder::default())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Build(ref build) if build.reason == BuildErrorReason::Unsupported("opaque handle")
    ));

    registry.register_type_decoder_for::<Handle>(decoder_fn(|h: &mut Handle, cursor| {
        if let Some(v) = cursor.read_int() {
            h.0 = v;
        }
    }));
    let mut back = Holder::default();
    json.unmarshal_from_str(r#"{"handle": 8}"#, &mut back).unwrap();
    assert_eq!(back.handle.0, 8);
}

#[test]
fn wrong_value_type_reports_binding_mismatch() {
    let (_, json) = isolated(Config::default());
    let codec = json.resolve::<Person>().unwrap();
    let mut stream = Stream::new();
    codec.encode(&17_u8, &mut stream);
    let Err(Error::BindingMismatch { expected }) = stream.into_result() else {
        panic!("expected binding mismatch");
    };
    assert!(expected.ends_with("Person"));
}

#[derive(Debug, Default, PartialEq)]
struct Slots {
    field: Option<Box<Stamp>>,
    other: Stamp,
    field2: String,
}

crate::record! {
    Slots {
        field: Option<Box<Stamp>>,
        other: Stamp,
        field2: String,
    }
}

#[test]
fn marshaler_fields_embed_their_output() {
    let (registry, json) = isolated(Config::default());
    let slots = Slots {
        field: Some(Box::new(Stamp { seconds: 1 })),
        other: Stamp { seconds: 2 },
        field2: "x".into(),
    };
    assert_eq!(
        json.marshal_to_string(&slots).unwrap(),
        r#"{"field":"T+1","other":"T+2","field2":"x"}"#
    );

    registry.register_field_encoder_for::<Slots>(
        "other",
        encoder_fn(|_: &Stamp, stream| stream.write_string("field")),
    );
    assert_eq!(
        json.marshal_to_string(&slots).unwrap(),
        r#"{"field":"T+1","other":"field","field2":"x"}"#
    );
}

#[test]
fn type_decoder_reaches_fields_behind_pointers() {
    let (registry, json) = isolated(Config::default());
    registry.register_type_decoder_for::<Stamp>(decoder_fn(|stamp: &mut Stamp, cursor| {
        stamp.seconds = 10;
        cursor.skip();
    }));
    registry.register_field_decoder_for::<Slots>(
        "other",
        decoder_fn(|stamp: &mut Stamp, cursor| {
            if let Some(seconds) = cursor.read_i64() {
                stamp.seconds = seconds;
            }
        }),
    );

    let mut slots = Slots::default();
    json.unmarshal_from_str(
        r#"{"field": {"seconds": 3}, "other": 7, "field2": "y"}"#,
        &mut slots,
    )
    .unwrap();
    assert_eq!(
        slots,
        Slots {
            field: Some(Box::new(Stamp { seconds: 10 })),
            other: Stamp { seconds: 7 },
            field2: "y".into(),
        }
    );
}

#[derive(Debug, Default)]
struct Pair {
    a: u32,
    b: u32,
}

crate::record! { Pair { a: u32, b: u32 } }

#[test]
fn latched_error_skips_sibling_fields() {
    let (registry, json) = isolated(Config::default());
    let calls = Arc::new(AtomicUsize::new(0));
    registry.register_field_encoder_for::<Pair>(
        "a",
        encoder_fn(|_: &u32, stream| stream.report_error(Error::custom("boom"))),
    );
    let counter = Arc::clone(&calls);
    registry.register_field_encoder_for::<Pair>(
        "b",
        encoder_fn(move |b: &u32, stream| {
            counter.fetch_add(1, Ordering::Relaxed);
            stream.write_i64(i64::from(*b));
        }),
    );

    let err = json.marshal(&Pair::default()).unwrap_err();
    assert_eq!(err.to_string(), "custom codec failed: boom");
    assert_eq!(calls.load(Ordering::Relaxed), 0);
}

#[test]
fn latched_error_skips_remaining_elements() {
    let (registry, json) = isolated(Config::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    registry.register_type_encoder_for::<u8>(encoder_fn(move |_: &u8, stream| {
        counter.fetch_add(1, Ordering::Relaxed);
        stream.report_error(Error::custom("boom"));
    }));

    assert!(json.marshal(&vec![1_u8, 2, 3, 4]).is_err());
    assert_eq!(calls.swap(0, Ordering::Relaxed), 1);

    let map = BTreeMap::from([("a".to_owned(), 1_u8), ("b".to_owned(), 2), ("c".to_owned(), 3)]);
    assert!(json.marshal(&map).is_err());
    assert_eq!(calls.load(Ordering::Relaxed), 1);
}
