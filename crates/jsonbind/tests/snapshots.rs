#![expect(missing_docs)]

use std::{collections::HashMap, fmt::Write, sync::Arc};

use jsonbind::{Config, Json, NamingStrategy, Registry, record};

#[derive(Debug, Default)]
struct Order {
    order_id: u64,
    customer_name: String,
    total: f64,
    discount: f32,
    notes: Option<String>,
    lines: Vec<Line>,
    attributes: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct Line {
    sku: String,
    quantity: u16,
}

record! {
    Order {
        order_id: u64,
        customer_name: String,
        total: f64,
        discount: f32,
        #[omit_empty]
        notes: Option<String>,
        lines: Vec<Line>,
        #[omit_empty]
        attributes: HashMap<String, String>,
    }
}

record! { Line { sku: String => "SKU", quantity: u16 } }

fn order() -> Order {
    Order {
        order_id: 42,
        customer_name: "Ben & Jerry <ice cream>".into(),
        total: 1234.567_890_1,
        discount: 0.1,
        notes: None,
        lines: vec![
            Line {
                sku: "A-1".into(),
                quantity: 2,
            },
            Line {
                sku: "B\"2".into(),
                quantity: 1,
            },
        ],
        attributes: HashMap::from([
            ("gift".to_owned(), "yes".to_owned()),
            ("channel".to_owned(), "web".to_owned()),
        ]),
    }
}

fn frozen(config: Config) -> Json {
    config.freeze_with(Arc::new(Registry::new()))
}

fn render(configs: &[(&str, Config)]) -> String {
    let mut out = String::new();
    for (name, config) in configs {
        let sorted = Config {
            sort_map_keys: true,
            ..*config
        };
        let text = frozen(sorted).marshal_to_string(&order()).unwrap();
        writeln!(out, "{name}: {text}").unwrap();
    }
    out
}

#[test]
fn snapshot_order_encodings() {
    let configs = [
        ("default", Config::default()),
        ("compatible", Config::compatible()),
        ("fastest", Config::fastest()),
        (
            "camel",
            Config {
                naming: NamingStrategy::LowerCamel,
                ..Config::default()
            },
        ),
    ];
    insta::assert_snapshot!(render(&configs), @r#"
    default: {"order_id":42,"customer_name":"Ben & Jerry <ice cream>","total":1234.5678901,"discount":0.1,"lines":[{"SKU":"A-1","quantity":2},{"SKU":"B\"2","quantity":1}],"attributes":{"channel":"web","gift":"yes"}}
    compatible: {"order_id":42,"customer_name":"Ben \u0026 Jerry \u003cice cream\u003e","total":1234.5678901,"discount":0.1,"lines":[{"SKU":"A-1","quantity":2},{"SKU":"B\"2","quantity":1}],"attributes":{"channel":"web","gift":"yes"}}
    fastest: {"order_id":42,"customer_name":"Ben & Jerry <ice cream>","total":1234.56789,"discount":0.1,"lines":[{"SKU":"A-1","quantity":2},{"SKU":"B\"2","quantity":1}],"attributes":{"channel":"web","gift":"yes"}}
    camel: {"orderId":42,"customerName":"Ben & Jerry <ice cream>","total":1234.5678901,"discount":0.1,"lines":[{"SKU":"A-1","quantity":2},{"SKU":"B\"2","quantity":1}],"attributes":{"channel":"web","gift":"yes"}}
    "#);
}

fn decode_error(json: &Json, input: &str) -> String {
    let mut order = Order::default();
    match json.unmarshal_from_str(input, &mut order) {
        Ok(()) => "ok".to_owned(),
        Err(err) => err.to_string(),
    }
}

#[test]
fn snapshot_decode_errors() {
    let strict = frozen(Config {
        disallow_unknown_fields: true,
        ..Config::default()
    });
    let shallow = frozen(Config {
        max_depth: 4,
        ..Config::default()
    });
    let inputs = [
        (&strict, r#"{"order_id": 1}"#),
        (&strict, r#"{"order_id": -1}"#),
        (&strict, r#"{"order_id": 1.5}"#),
        (&strict, r#"{"order_id": "1"}"#),
        (&strict, "{\"lines\": [\n  {\"SKU\": \"x\", \"qty\": 1}\n]}"),
        (&strict, r#"{"customer_name": "\x"}"#),
        (&strict, r#"{"lines": [{"SKU": "x"}]"#),
        (&shallow, r#"{"extra": [[[1]]]}"#),
        (&shallow, r#"{"extra": [[[[1]]]]}"#),
        (&strict, r#"{"total": 1e400}"#),
        (&strict, r#"{} x"#),
    ];
    let mut out = String::new();
    for (json, input) in inputs {
        writeln!(out, "{}", decode_error(json, input)).unwrap();
    }
    insta::assert_snapshot!(out, @r#"
    ok
    number `-1` out of range for u64 at 1:14
    number `1.5` out of range for u64 at 1:14
    type mismatch: expected number, found string at 1:14
    unknown field `qty` at 2:22
    syntax error: invalid escape sequence '\x' at 1:21
    syntax error: unexpected end of input at 1:25
    ok
    nesting deeper than 4 levels at 1:14
    number `1e400` out of range for f64 at 1:11
    syntax error: trailing characters after value at 1:4
    "#);
}
