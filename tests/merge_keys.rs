use indoc::indoc;
use serde::Deserialize;
use std::collections::BTreeMap;

use saphyr_construct::types::TypeDescriptor;
use saphyr_construct::{DuplicateKeyPolicy, EngineBuilder, Error, Options, Value};

fn merged(yaml: &str) -> Result<Value, Error> {
    EngineBuilder::new()
        .merge_keys(true)
        .build_local()?
        .value_from_str(yaml, &TypeDescriptor::any())
}

fn keys(v: &Value) -> Vec<String> {
    match v {
        Value::Map(entries) => entries.borrow().keys().map(|k| k.to_string()).collect(),
        _ => Vec::new(),
    }
}

#[test]
fn single_mapping_is_merged() {
    let yaml = indoc! {"
        base: &B { x: 1, y: 2 }
        target:
          <<: *B
          z: 3
    "};
    let doc = merged(yaml).unwrap();
    let target = doc.get("target").unwrap();
    assert_eq!(keys(&target), ["x", "y", "z"]);
    assert_eq!(target.get("x"), Some(Value::Int(1)));
    assert_eq!(target.get("z"), Some(Value::Int(3)));
}

#[test]
fn sequence_of_mappings_is_merged_earlier_first() {
    let yaml = indoc! {"
        one: &A { shared: 1, from_one: 10 }
        two: &B { shared: 2, from_two: 20 }
        target:
          <<: [*A, *B, { inline: 30 }]
    "};
    let target = merged(yaml).unwrap().get("target").unwrap();
    assert_eq!(keys(&target), ["shared", "from_one", "from_two", "inline"]);
    assert_eq!(target.get("shared"), Some(Value::Int(1)));
    assert_eq!(target.get("from_two"), Some(Value::Int(20)));
    assert_eq!(target.get("inline"), Some(Value::Int(30)));
}

#[test]
fn own_keys_override_merged_ones_wherever_they_appear() {
    let yaml = indoc! {"
        base: &B { shared: 1, untouched: 3 }
        before:
          shared: 10
          <<: *B
        after:
          <<: *B
          shared: 20
    "};
    let doc = merged(yaml).unwrap();
    let before = doc.get("before").unwrap();
    assert_eq!(before.get("shared"), Some(Value::Int(10)));
    assert_eq!(before.get("untouched"), Some(Value::Int(3)));
    let after = doc.get("after").unwrap();
    assert_eq!(keys(&after), ["untouched", "shared"]);
    assert_eq!(after.get("shared"), Some(Value::Int(20)));
}

#[test]
fn merges_chain_through_merged_mappings() {
    let yaml = indoc! {"
        base_level: &base
          tenant:
          - a1
          - a2
        Level1: &Level1
          <<: [*base]
        Level2:
          <<: *Level1
          item2: x
    "};
    let doc = merged(yaml).unwrap();
    let tenant = doc.get("base_level").unwrap().get("tenant").unwrap();
    assert_eq!(doc.get("Level1").unwrap().get("tenant"), Some(tenant.clone()));
    let level2 = doc.get("Level2").unwrap();
    assert_eq!(keys(&level2), ["tenant", "item2"]);
    assert_eq!(level2.get("tenant"), Some(tenant));
}

#[test]
fn empty_bases_merge_nothing() {
    let yaml = indoc! {"
        base_level: &base {}
        Level1: &Level1
          <<: [*base]
        Level2:
          <<: *Level1
    "};
    let doc = merged(yaml).unwrap();
    assert_eq!(keys(&doc), ["base_level", "Level1", "Level2"]);
    assert!(keys(&doc.get("Level2").unwrap()).is_empty());
}

#[test]
fn merge_values_must_be_mappings() {
    let err = merged("target:\n  <<: 42\n  other: 1\n").unwrap_err();
    assert!(err.to_string().contains("merge value must be a mapping"), "{err}");
    assert_eq!(err.location().map(|l| l.line()), Some(2));
}

#[test]
fn merge_keys_are_plain_keys_unless_enabled() {
    let doc = EngineBuilder::new()
        .build_local()
        .unwrap()
        .value_from_str("base: &B { x: 1 }\ntarget:\n  <<: *B\n", &TypeDescriptor::any())
        .unwrap();
    assert_eq!(keys(&doc.get("target").unwrap()), ["<<"]);

    let quoted = merged("target:\n  '<<': 1\n").unwrap();
    assert_eq!(quoted.get("target").unwrap().get("<<"), Some(Value::Int(1)));
}

#[test]
fn duplicate_policy_still_applies_to_own_keys() {
    let yaml = "base: &B { x: 1 }\ntarget:\n  <<: *B\n  y: 1\n  y: 2\n";
    let err = merged(yaml).unwrap_err();
    assert!(matches!(err, Error::DuplicateKey { ref key, .. } if key == "y"), "{err}");

    let doc = EngineBuilder::new()
        .merge_keys(true)
        .duplicate_keys(DuplicateKeyPolicy::LastWins)
        .build_local()
        .unwrap()
        .value_from_str(yaml, &TypeDescriptor::any())
        .unwrap();
    let target = doc.get("target").unwrap();
    assert_eq!(target.get("x"), Some(Value::Int(1)));
    assert_eq!(target.get("y"), Some(Value::Int(2)));
}

#[test]
fn serde_targets_see_merged_fields() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Service {
        image: String,
        replicas: u32,
        labels: BTreeMap<String, String>,
    }

    let yaml = indoc! {"
        defaults: &defaults
          image: app:1.0
          replicas: 1
          labels: { tier: web }
        services:
          api:
            <<: *defaults
            replicas: 3
    "};
    #[derive(Deserialize)]
    struct Doc {
        services: BTreeMap<String, Service>,
    }
    let options = Options {
        merge_keys: true,
        ..Options::default()
    };
    let doc: Doc = saphyr_construct::from_str_with_options(yaml, options).unwrap();
    let api = &doc.services["api"];
    assert_eq!(api.image, "app:1.0");
    assert_eq!(api.replicas, 3);
    assert_eq!(api.labels["tier"], "web");
}

#[test]
fn typed_objects_read_merged_members() {
    let point = TypeDescriptor::object("Point")
        .field("x", TypeDescriptor::i32())
        .field("y", TypeDescriptor::i32())
        .build();
    let pair = TypeDescriptor::object("Pair")
        .field("origin", point.clone())
        .field("shifted", point)
        .build();
    let engine = EngineBuilder::new().merge_keys(true).build_local().unwrap();
    let value = engine
        .value_from_str("origin: &o { x: 1, y: 2 }\nshifted: { <<: *o, y: 5 }\n", &pair)
        .unwrap();
    let shifted = value.get("shifted").unwrap();
    assert_eq!(shifted.get("x"), Some(Value::Int(1)));
    assert_eq!(shifted.get("y"), Some(Value::Int(5)));
}
