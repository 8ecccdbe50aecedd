use indoc::indoc;
use saphyr_construct::types::{TypeDescriptor, TypeRef};
use saphyr_construct::{Engine, EngineBuilder, Error, Local, Value};

fn engine() -> Engine<Local> {
    EngineBuilder::new().build_local().expect("default engine")
}

fn typed(yaml: &str, ty: &TypeRef) -> Result<Value, Error> {
    engine().value_from_str(yaml, ty)
}

#[test]
fn integer_literals_in_every_base() {
    let cases = [
        ("0b1010", 10),
        ("0x_1F", 31),
        ("0x2A", 42),
        ("012", 10),
        ("0o52", 42),
        ("1_000", 1000),
        ("-1:01", -61),
        ("190:20:30", 685_230),
        ("+7", 7),
        ("-0b11", -3),
    ];
    for (text, expected) in cases {
        let v = typed(text, &TypeDescriptor::i64()).unwrap_or_else(|e| panic!("{text}: {e}"));
        assert_eq!(v, Value::Int(expected), "{text}");
    }
}

#[test]
fn untyped_plain_integers_are_inferred() {
    let yaml = indoc! {r#"
        - 0x10
        - 0b11
        - 017
        - 1_0
        - 3:00
        - "12"
    "#};
    let v = typed(yaml, &TypeDescriptor::any()).unwrap();
    let items: Vec<Value> = (0..6).filter_map(|i| v.index(i)).collect();
    assert_eq!(
        items,
        [
            Value::Int(16),
            Value::Int(3),
            Value::Int(15),
            Value::Int(10),
            Value::Int(180),
            Value::str("12"),
        ]
    );
}

#[test]
fn magnitude_beyond_the_target_is_an_overflow() {
    let err = typed("256", &TypeDescriptor::u8()).unwrap_err();
    assert!(matches!(err, Error::Overflow { .. }), "{err}");

    let err = typed("0x1_0000_0000_0000_0000", &TypeDescriptor::u64()).unwrap_err();
    assert!(matches!(err, Error::Overflow { .. }), "{err}");
    assert!(err.to_string().contains("too large"), "{err}");

    let err = typed("-129", &TypeDescriptor::int(saphyr_construct::types::IntWidth::I8)).unwrap_err();
    assert!(matches!(err, Error::Overflow { .. }), "{err}");
}

#[test]
fn malformed_literals_are_format_errors() {
    for text in ["0b102", "0x", "1:60", "12abc", "08"] {
        let err = typed(text, &TypeDescriptor::i32()).unwrap_err();
        assert!(matches!(err, Error::Format { .. }), "{text}: {err}");
    }
}

#[test]
fn errors_point_at_the_scalar() {
    let err = typed("a: 1\nb: 0xZZ\n", &TypeDescriptor::map(TypeDescriptor::string(), TypeDescriptor::i32()))
        .unwrap_err();
    let location = err.location().expect("location");
    assert_eq!(location.line(), 2);
    assert_eq!(location.column(), 4);
}

#[test]
fn floats_use_yaml_spellings() {
    let f = |text: &str| {
        typed(text, &TypeDescriptor::f64())
            .unwrap_or_else(|e| panic!("{text}: {e}"))
            .as_f64()
            .unwrap_or_default()
    };
    assert_eq!(f("1_000.5"), 1000.5);
    assert_eq!(f("6.8523015e+5"), 685_230.15);
    assert!((f("190:20:30.15") - 685_230.15).abs() < 1e-6);
    assert_eq!(f("-.inf"), f64::NEG_INFINITY);
    assert!(f(".NaN").is_nan());
    assert_eq!(f("12"), 12.0);

    let err = typed("1e39", &TypeDescriptor::f32()).unwrap_err();
    assert!(matches!(err, Error::Overflow { .. }), "{err}");
}
