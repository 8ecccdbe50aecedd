use serde::Deserialize;

use saphyr_construct::types::TypeDescriptor;
use saphyr_construct::{EngineBuilder, Error, Options, Value};

#[test]
fn yaml11_truthy_boolean_literals() {
    let engine = EngineBuilder::new().build_local().unwrap();
    for case in ["true", "y", "yes", "on", "TRUE", "Yes", "ON", "Y"] {
        let v = engine
            .value_from_str(case, &TypeDescriptor::bool())
            .unwrap_or_else(|e| panic!("{case}: {e}"));
        assert_eq!(v, Value::Bool(true), "literal `{case}` should construct as true");
    }
}

#[test]
fn yaml11_falsey_boolean_literals() {
    let engine = EngineBuilder::new().build_local().unwrap();
    for case in ["false", "n", "no", "off", "FALSE", "No", "Off", "N"] {
        let v = engine
            .value_from_str(case, &TypeDescriptor::bool())
            .unwrap_or_else(|e| panic!("{case}: {e}"));
        assert_eq!(v, Value::Bool(false), "literal `{case}` should construct as false");
    }
}

#[test]
fn other_text_is_a_format_error() {
    let engine = EngineBuilder::new().build_local().unwrap();
    for case in ["truth", "affirmative", "1", "0", "yess"] {
        let err = engine
            .value_from_str(case, &TypeDescriptor::bool())
            .unwrap_err();
        assert!(matches!(err, Error::Format { .. }), "{case}: {err}");
        assert!(err.to_string().contains("invalid YAML 1.1 bool"), "{err}");
    }
}

#[test]
fn strict_booleans_accept_only_true_and_false() {
    let engine = EngineBuilder::new()
        .strict_booleans(true)
        .build_local()
        .unwrap();
    assert_eq!(
        engine.value_from_str("True", &TypeDescriptor::bool()).unwrap(),
        Value::Bool(true)
    );
    let err = engine
        .value_from_str("yes", &TypeDescriptor::bool())
        .unwrap_err();
    assert!(matches!(err, Error::Format { .. }), "{err}");
}

#[derive(Debug, Deserialize, PartialEq)]
struct Flags {
    verbose: bool,
    color: bool,
    name: String,
}

#[test]
fn serde_targets_read_yaml11_words() {
    let flags: Flags = saphyr_construct::from_str("verbose: on\ncolor: No\nname: yes\n").unwrap();
    assert_eq!(
        flags,
        Flags {
            verbose: true,
            color: false,
            name: "yes".into(),
        }
    );
}

#[test]
fn serde_targets_honour_strict_booleans() {
    let options = Options {
        strict_booleans: true,
        ..Options::default()
    };
    let err = saphyr_construct::from_str_with_options::<Flags>(
        "verbose: on\ncolor: false\nname: x\n",
        options,
    )
    .unwrap_err();
    assert!(err.to_string().contains("invalid bool"), "{err}");
}
