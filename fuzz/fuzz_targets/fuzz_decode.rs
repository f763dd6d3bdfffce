#![no_main]
use std::{collections::BTreeMap, sync::LazyLock};

use arbitrary::{Arbitrary, Unstructured};
use jsonbind::{Config, Json, NamingStrategy, record};
use libfuzzer_sys::{fuzz_mutator, fuzz_target, fuzzer_mutate};
use serde_json::{Map, Value};

const HEADER: usize = 1; // config flags

#[derive(Debug, Default, PartialEq)]
struct Node {
    id: i64,
    name: String,
    ratio: f64,
    flag: bool,
    tags: Vec<String>,
    attrs: BTreeMap<String, i32>,
    pair: [u8; 2],
    child: Option<Box<Node>>,
    items: Vec<Node>,
}

record! {
    Node {
        id: i64,
        name: String,
        ratio: f64,
        flag: bool,
        #[omit_empty]
        tags: Vec<String>,
        attrs: BTreeMap<String, i32>,
        pair: [u8; 2],
        child: Option<Box<Node>>,
        #[omit_empty]
        items: Vec<Node>,
    }
}

/// Every tenth run replaces the payload with a structured value, biased
/// towards the keys `Node` understands, so decoding gets past the first key.
fn mutator(data: &mut [u8], size: usize, max_size: usize, seed: u32) -> usize {
    if size <= HEADER || seed.is_multiple_of(10) {
        let flags = data.first().copied().unwrap_or_default();
        let Ok(value) = ArbitraryNode::arbitrary(&mut Unstructured::new(&data[..size])) else {
            return fuzzer_mutate(data, size, max_size);
        };
        let Ok(serialized) = serde_json::to_vec(&value.0) else {
            return fuzzer_mutate(data, size, max_size);
        };
        if max_size <= HEADER {
            return fuzzer_mutate(data, size, max_size);
        }
        data[0] = flags;
        let len = serialized.len().min(max_size - HEADER);
        data[HEADER..HEADER + len].copy_from_slice(&serialized[..len]);
        HEADER + len
    } else {
        fuzzer_mutate(data, size, max_size)
    }
}

fuzz_mutator!(|data: &mut [u8], size: usize, max_size: usize, seed: u32| {
    mutator(data, size, max_size, seed)
});

const KEYS: &[&str] = &[
    "id", "name", "ratio", "flag", "tags", "attrs", "pair", "child", "items", "ID", "Name",
];

#[derive(Debug)]
struct ArbitraryNode(Value);

impl<'a> Arbitrary<'a> for ArbitraryNode {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        let value = match u.choose_index(12)? {
            0 => Value::Null,
            1 => Value::Bool(u.arbitrary()?),
            2 => {
                let n: f64 = u.arbitrary()?;
                Value::Number(
                    serde_json::Number::from_f64(n).ok_or(arbitrary::Error::IncorrectFormat)?,
                )
            }
            3 => Value::from(u.arbitrary::<i64>()?),
            4 | 5 => Value::String(u.arbitrary()?),
            6 | 7 => {
                let elems: Vec<ArbitraryNode> = u.arbitrary()?;
                Value::Array(elems.into_iter().map(|v| v.0).collect())
            }
            _ => {
                let members: Vec<(usize, ArbitraryNode)> = u.arbitrary()?;
                Value::Object(Map::from_iter(
                    members
                        .into_iter()
                        .map(|(k, v)| (KEYS[k % KEYS.len()].to_owned(), v.0)),
                ))
            }
        };
        Ok(ArbitraryNode(value))
    }
}

/// Frozen handles for every combination of the three flag bits: one that
/// decodes fuzz input and one with room for defaults filled in on encode,
/// which can nest one level deeper than the input.
static HANDLES: LazyLock<Vec<(Json, Json)>> = LazyLock::new(|| {
    (0..8_u8)
        .map(|flags| {
            let config = Config {
                case_sensitive: flags & 1 != 0,
                disallow_unknown_fields: flags & 2 != 0,
                naming: if flags & 4 != 0 {
                    NamingStrategy::UpperCamel
                } else {
                    NamingStrategy::Identity
                },
                max_depth: 64,
                ..Config::default()
            };
            let relaxed = Config {
                max_depth: config.max_depth * 2,
                ..config
            };
            (config.freeze(), relaxed.freeze())
        })
        .collect()
});

fn decode(data: &[u8]) {
    let Some((&flags, input)) = data.split_first() else {
        return;
    };
    let (json, relaxed) = &HANDLES[usize::from(flags & 7)];

    let mut node = Node::default();
    if json.unmarshal(input, &mut node).is_err() {
        return;
    }

    // Whatever decoded must encode, and the encoding must be a fixed point.
    let first = json.marshal(&node).expect("decoded value failed to encode");
    serde_json::from_slice::<Value>(&first).expect("encoder produced invalid JSON");
    let mut again = Node::default();
    relaxed
        .unmarshal(&first, &mut again)
        .expect("encoded value failed to decode");
    assert_eq!(again, node);
    let second = relaxed.marshal(&again).expect("re-decoded value failed to encode");
    assert_eq!(first, second);
}

fuzz_target!(|data: &[u8]| decode(data));
