use indoc::indoc;
use serde::Deserialize;
use std::collections::BTreeMap;

use saphyr_construct::types::{TypeDescriptor, TypeRef};
use saphyr_construct::{DuplicateKeyPolicy, EngineBuilder, Error, Options, Value};

const REPEATED: &str = indoc! {"
    a: 1
    b: 2
    a: 3
"};

fn keys(v: &Value) -> Vec<String> {
    match v {
        Value::Map(entries) => entries.borrow().keys().map(|k| k.to_string()).collect(),
        _ => Vec::new(),
    }
}

fn construct(policy: DuplicateKeyPolicy, yaml: &str, ty: &TypeRef) -> Result<Value, Error> {
    EngineBuilder::new()
        .duplicate_keys(policy)
        .build_local()?
        .value_from_str(yaml, ty)
}

#[test]
fn duplicate_keys_are_an_error_by_default() {
    let err = EngineBuilder::new()
        .build_local()
        .unwrap()
        .value_from_str(REPEATED, &TypeDescriptor::any())
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateKey { ref key, .. } if key == "a"), "{err}");
    assert_eq!(err.location().map(|l| l.line()), Some(3));
}

#[test]
fn last_wins_keeps_the_first_position() {
    let v = construct(DuplicateKeyPolicy::LastWins, REPEATED, &TypeDescriptor::any()).unwrap();
    assert_eq!(keys(&v), ["a", "b"]);
    assert_eq!(v.get("a"), Some(Value::Int(3)));
}

#[test]
fn first_wins_drops_later_values() {
    let v = construct(DuplicateKeyPolicy::FirstWins, REPEATED, &TypeDescriptor::any()).unwrap();
    assert_eq!(keys(&v), ["a", "b"]);
    assert_eq!(v.get("a"), Some(Value::Int(1)));
}

#[test]
fn object_members_follow_the_policy() {
    let point = TypeDescriptor::object("Point")
        .field("x", TypeDescriptor::i32())
        .field("y", TypeDescriptor::i32())
        .build();
    let yaml = "x: 1\ny: 2\nx: 5\n";

    let err = construct(DuplicateKeyPolicy::Error, yaml, &point).unwrap_err();
    assert!(matches!(err, Error::DuplicateKey { .. }), "{err}");

    let last = construct(DuplicateKeyPolicy::LastWins, yaml, &point).unwrap();
    assert_eq!(last.get("x"), Some(Value::Int(5)));
    let first = construct(DuplicateKeyPolicy::FirstWins, yaml, &point).unwrap();
    assert_eq!(first.get("x"), Some(Value::Int(1)));
}

#[test]
fn typed_keys_compare_after_conversion() {
    let ty = TypeDescriptor::map(TypeDescriptor::i32(), TypeDescriptor::string());
    let err = construct(DuplicateKeyPolicy::Error, "0x10: a\n16: b\n", &ty).unwrap_err();
    assert!(matches!(err, Error::DuplicateKey { .. }), "{err}");
}

#[test]
fn documents_always_reject_duplicate_keys() {
    let engine = EngineBuilder::new()
        .duplicate_keys(DuplicateKeyPolicy::LastWins)
        .build_local()
        .unwrap();
    let err = engine.document_from_str(REPEATED).unwrap_err();
    assert!(matches!(err, Error::DuplicateKey { .. }), "{err}");
}

#[derive(Debug, Deserialize)]
struct Limits {
    retries: u32,
}

#[test]
fn serde_targets_see_the_policy() {
    let yaml = "retries: 1\nretries: 4\n";
    assert!(saphyr_construct::from_str::<Limits>(yaml).is_err());

    let options = Options {
        duplicate_keys: DuplicateKeyPolicy::LastWins,
        ..Options::default()
    };
    let limits: Limits = saphyr_construct::from_str_with_options(yaml, options.clone()).unwrap();
    assert_eq!(limits.retries, 4);

    let map: BTreeMap<String, u32> = saphyr_construct::from_str_with_options(yaml, options).unwrap();
    assert_eq!(map["retries"], 4);
}

fn late_first_occurrence() -> Vec<saphyr_construct::Event> {
    use saphyr_construct::Event;
    vec![
        Event::mapping_start(),
        Event::scalar("a"),
        Event::alias("x"),
        Event::scalar("a"),
        Event::scalar("5"),
        Event::scalar("c"),
        Event::scalar("1").anchored("x"),
        Event::mapping_end(),
    ]
}

#[test]
fn last_wins_over_a_forward_alias() {
    let engine = EngineBuilder::new()
        .duplicate_keys(DuplicateKeyPolicy::LastWins)
        .build_local()
        .unwrap();
    let mut events = saphyr_construct::ReplayEvents::new(late_first_occurrence());
    let v = engine.construct_value(&mut events, &TypeDescriptor::any()).unwrap();
    assert_eq!(v.get("a"), Some(Value::Int(5)));
    assert_eq!(v.get("c"), Some(Value::Int(1)));

    let ty = TypeDescriptor::object("Pair")
        .field("a", TypeDescriptor::i64())
        .field("c", TypeDescriptor::i64())
        .build();
    let mut events = saphyr_construct::ReplayEvents::new(late_first_occurrence());
    let v = engine.construct_value(&mut events, &ty).unwrap();
    assert_eq!(v.get("a"), Some(Value::Int(5)));
    assert_eq!(v.get("c"), Some(Value::Int(1)));
}

#[test]
fn first_wins_waits_for_a_forward_alias() {
    let engine = EngineBuilder::new()
        .duplicate_keys(DuplicateKeyPolicy::FirstWins)
        .build_local()
        .unwrap();
    let mut events = saphyr_construct::ReplayEvents::new(late_first_occurrence());
    let v = engine.construct_value(&mut events, &TypeDescriptor::any()).unwrap();
    assert_eq!(v.get("a"), Some(Value::Int(1)));
}
