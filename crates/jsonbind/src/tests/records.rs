use rstest::rstest;

use super::{Chain, Person, Tree, isolated};
use crate::{
    BuildErrorReason, Config, Error, Extension, NamingStrategy, Position, StructDescriptor,
    ValueKind,
};

fn ada() -> Person {
    Person {
        name: "Ada".into(),
        age: 36,
        email: None,
        nickname: String::new(),
    }
}

#[test]
fn fields_follow_declaration_order() {
    let (_, json) = isolated(Config::default());
    assert_eq!(
        json.marshal_to_string(&ada()).unwrap(),
        r#"{"name":"Ada","age":36,"email":null}"#
    );

    let mut person = ada();
    person.nickname = "countess".into();
    person.email = Some("ada@example.com".into());
    assert_eq!(
        json.marshal_to_string(&person).unwrap(),
        r#"{"name":"Ada","age":36,"email":"ada@example.com","nick":"countess"}"#
    );
}

#[test]
fn absent_keys_keep_existing_values() {
    let (_, json) = isolated(Config::default());
    let mut person = ada();
    json.unmarshal_from_str(r#"{"age": 37}"#, &mut person).unwrap();
    assert_eq!(person.name, "Ada");
    assert_eq!(person.age, 37);
}

#[test]
fn null_leaves_record_unchanged() {
    let (_, json) = isolated(Config::default());
    let mut person = ada();
    json.unmarshal_from_str("null", &mut person).unwrap();
    assert_eq!(person, ada());
}

#[test]
fn duplicate_keys_last_wins() {
    let (_, json) = isolated(Config::default());
    let mut person = Person::default();
    json.unmarshal_from_str(r#"{"age": 1, "age": 2}"#, &mut person)
        .unwrap();
    assert_eq!(person.age, 2);
}

#[rstest]
#[case(false, r#"{"NAME": "x", "Age": 5}"#, "x", 5)]
#[case(true, r#"{"NAME": "x", "Age": 5}"#, "", 0)]
#[case(true, r#"{"name": "x", "age": 5}"#, "x", 5)]
fn key_matching_follows_case_policy(
    #[case] case_sensitive: bool,
    #[case] input: &str,
    #[case] name: &str,
    #[case] age: u32,
) {
    let (_, json) = isolated(Config {
        case_sensitive,
        ..Config::default()
    });
    let mut person = Person::default();
    json.unmarshal_from_str(input, &mut person).unwrap();
    assert_eq!(person.name, name);
    assert_eq!(person.age, age);
}

#[test]
fn unknown_fields_are_skipped_or_reported() {
    let input = "{\"name\": \"x\",\n \"extra\": {\"deep\": [1, 2]}}";

    let (_, lenient) = isolated(Config::default());
    let mut person = Person::default();
    lenient.unmarshal_from_str(input, &mut person).unwrap();
    assert_eq!(person.name, "x");

    let (_, strict) = isolated(Config {
        disallow_unknown_fields: true,
        ..Config::default()
    });
    let err = strict
        .unmarshal_from_str(input, &mut Person::default())
        .unwrap_err();
    let Error::UnknownField { name, position } = err else {
        panic!("expected unknown field, got {err:?}");
    };
    assert_eq!(name, "extra");
    assert_eq!(position, Position { line: 2, column: 10 });
}

#[test]
fn naming_strategy_spares_renamed_fields() {
    #[derive(Default)]
    struct Order {
        order_id: u64,
        line_items: Vec<String>,
    }
    crate::record! { Order { order_id: u64, line_items: Vec<String> => "items" } }

    let (_, json) = isolated(Config {
        naming: NamingStrategy::LowerCamel,
        ..Config::default()
    });
    let order = Order {
        order_id: 4,
        line_items: vec!["pen".into()],
    };
    assert_eq!(
        json.marshal_to_string(&order).unwrap(),
        r#"{"orderId":4,"items":["pen"]}"#
    );
    let mut back = Order::default();
    json.unmarshal_from_str(r#"{"orderId": 9}"#, &mut back).unwrap();
    assert_eq!(back.order_id, 9);
}

#[derive(Debug, Default, PartialEq)]
struct Credentials {
    user: String,
    token: String,
}

crate::record! {
    Credentials {
        user: String,
        #[private]
        token: String,
    }
}

#[test]
fn private_fields_need_support() {
    let creds = Credentials {
        user: "u".into(),
        token: "t".into(),
    };
    let (_, hidden) = isolated(Config::default());
    assert_eq!(hidden.marshal_to_string(&creds).unwrap(), r#"{"user":"u"}"#);
    let mut back = Credentials::default();
    hidden
        .unmarshal_from_str(r#"{"user":"v","token":"w"}"#, &mut back)
        .unwrap();
    assert_eq!(back.token, "");

    let (_, visible) = isolated(Config {
        support_private_fields: true,
        ..Config::default()
    });
    assert_eq!(
        visible.marshal_to_string(&creds).unwrap(),
        r#"{"user":"u","token":"t"}"#
    );
}

struct Collide;

impl Extension for Collide {
    fn update_struct_descriptor(&self, descriptor: &mut StructDescriptor) {
        if let Some(field) = descriptor.field_mut("age") {
            field.rename("name");
        }
    }
}

#[test]
fn colliding_wire_names_fail_to_build() {
    let (registry, json) = isolated(Config::default());
    registry.register_extension(Collide);
    let err = json.resolve::<Person>().unwrap_err();
    assert_eq!(
        err.reason,
        BuildErrorReason::DuplicateWireName {
            name: "name".into(),
            first: "name",
            second: "age",
        }
    );
    assert!(matches!(json.marshal(&ada()), Err(Error::Build(_))));
}

#[test]
fn recursive_types_resolve() {
    let (_, json) = isolated(Config::default());
    let tree = Tree {
        value: 1,
        children: vec![
            Tree {
                value: 2,
                children: vec![],
            },
            Tree {
                value: 3,
                children: vec![Tree {
                    value: 4,
                    children: vec![],
                }],
            },
        ],
    };
    let text = json.marshal_to_string(&tree).unwrap();
    assert_eq!(
        text,
        r#"{"value":1,"children":[{"value":2,"children":[]},{"value":3,"children":[{"value":4,"children":[]}]}]}"#
    );
    let mut back = Tree::default();
    json.unmarshal_from_str(&text, &mut back).unwrap();
    assert_eq!(back, tree);

    let chain = Chain {
        id: 1,
        next: Some(Box::new(Chain { id: 2, next: None })),
    };
    let text = json.marshal_to_string(&chain).unwrap();
    assert_eq!(text, r#"{"id":1,"next":{"id":2,"next":null}}"#);
    let mut back = Chain::default();
    json.unmarshal_from_str(&text, &mut back).unwrap();
    assert_eq!(back, chain);
}

#[test]
fn type_mismatch_reports_kind_and_position() {
    let (_, json) = isolated(Config::default());
    let err = json
        .unmarshal_from_str(r#"{"age": "old"}"#, &mut Person::default())
        .unwrap_err();
    let Error::TypeMismatch {
        expected,
        found,
        position,
    } = err
    else {
        panic!("expected mismatch, got {err:?}");
    };
    assert_eq!(expected, "number");
    assert_eq!(found, ValueKind::String);
    assert_eq!(position.column, 9);
}

#[test]
fn first_error_stops_decoding() {
    let (_, json) = isolated(Config::default());
    let mut person = Person::default();
    let err = json
        .unmarshal_from_str(r#"{"name": "a", "age": -1, "email": "e"}"#, &mut person)
        .unwrap_err();
    assert!(matches!(err, Error::NumberOutOfRange { target: "u32", .. }));
    assert_eq!(person.name, "a");
    assert_eq!(person.email, None);
}

#[test]
fn trailing_input_is_rejected() {
    let (_, json) = isolated(Config::default());
    let err = json
        .unmarshal_from_str(r#"{"age": 1} {}"#, &mut Person::default())
        .unwrap_err();
    assert_eq!(err.to_string(), "syntax error: trailing characters after value at 1:12");
}
