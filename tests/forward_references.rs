use saphyr_construct::types::{TypeDescriptor, TypeRef};
use saphyr_construct::{EngineBuilder, Error, Event, ReplayEvents, Value};

fn construct(events: Vec<Event>, ty: &TypeRef) -> Result<Value, Error> {
    let engine = EngineBuilder::new().build_local()?;
    engine.construct_value(&mut ReplayEvents::new(events), ty)
}

fn person() -> TypeRef {
    TypeDescriptor::object("Person")
        .field("name", TypeDescriptor::string())
        .field("friend", TypeDescriptor::optional(TypeDescriptor::any()))
        .build()
}

#[test]
fn backward_alias_yields_the_anchored_value() {
    let events = vec![
        Event::mapping_start(),
        Event::scalar("a"),
        Event::scalar("1").anchored("x"),
        Event::scalar("b"),
        Event::alias("x"),
        Event::mapping_end(),
    ];
    let v = construct(events, &TypeDescriptor::any()).unwrap();
    assert_eq!(v.get("a"), Some(Value::Int(1)));
    assert_eq!(v.get("a"), v.get("b"));
}

#[test]
fn forward_alias_is_patched_when_the_anchor_completes() {
    let events = vec![
        Event::mapping_start(),
        Event::scalar("a"),
        Event::alias("y"),
        Event::scalar("b"),
        Event::scalar("2").anchored("y"),
        Event::mapping_end(),
    ];
    let v = construct(events, &TypeDescriptor::any()).unwrap();
    assert_eq!(v.get("a"), Some(Value::Int(2)));
    assert_eq!(v.get("a"), v.get("b"));
    assert_eq!(v.len(), Some(2));
}

#[test]
fn aliased_containers_share_identity() {
    let engine = EngineBuilder::new().build_local().unwrap();
    let v = engine
        .value_from_str("a: &l [1, 2]\nb: *l\n", &TypeDescriptor::any())
        .unwrap();
    let (a, b) = (v.get("a").unwrap(), v.get("b").unwrap());
    assert!(a.same_instance(&b));
    assert_eq!(a.len(), Some(2));
}

#[test]
fn forward_alias_between_objects() {
    let team = TypeDescriptor::object("Team")
        .field("people", TypeDescriptor::list(person()))
        .build();
    let events = vec![
        Event::mapping_start(),
        Event::scalar("people"),
        Event::sequence_start(),
        Event::mapping_start().anchored("ann"),
        Event::scalar("name"),
        Event::scalar("ann"),
        Event::scalar("friend"),
        Event::alias("bob"),
        Event::mapping_end(),
        Event::mapping_start().anchored("bob"),
        Event::scalar("name"),
        Event::scalar("bob"),
        Event::scalar("friend"),
        Event::alias("ann"),
        Event::mapping_end(),
        Event::sequence_end(),
        Event::mapping_end(),
    ];
    let v = construct(events, &team).unwrap();
    let people = v.get("people").unwrap();
    let (ann, bob) = (people.index(0).unwrap(), people.index(1).unwrap());
    assert_eq!(ann.get("name"), Some(Value::str("ann")));
    assert!(ann.get("friend").unwrap().same_instance(&bob));
    assert!(bob.get("friend").unwrap().same_instance(&ann));
}

#[test]
fn self_referencing_list() {
    let events = vec![
        Event::sequence_start().anchored("me"),
        Event::scalar("head"),
        Event::alias("me"),
        Event::sequence_end(),
    ];
    let v = construct(events, &TypeDescriptor::any()).unwrap();
    assert_eq!(v.index(0), Some(Value::str("head")));
    assert!(v.index(1).unwrap().same_instance(&v));
}

#[test]
fn forward_reference_into_a_set_is_unsupported() {
    let events = vec![
        Event::sequence_start(),
        Event::alias("y"),
        Event::scalar("2").anchored("y"),
        Event::sequence_end(),
    ];
    let err = construct(events, &TypeDescriptor::set(TypeDescriptor::i32())).unwrap_err();
    assert!(matches!(err, Error::ForwardReferenceUnsupported { .. }), "{err}");
}

#[test]
fn backward_reference_into_a_set_is_fine() {
    let events = vec![
        Event::sequence_start(),
        Event::scalar("2").anchored("y"),
        Event::scalar("3"),
        Event::alias("y"),
        Event::sequence_end(),
    ];
    let v = construct(events, &TypeDescriptor::set(TypeDescriptor::i32())).unwrap();
    assert_eq!(v.len(), Some(2));
}

#[test]
fn alias_to_an_undefined_anchor_is_an_anchor_error() {
    let events = vec![
        Event::sequence_start(),
        Event::scalar("1"),
        Event::alias("nowhere"),
        Event::sequence_end(),
    ];
    let err = construct(events, &TypeDescriptor::any()).unwrap_err();
    assert!(matches!(err, Error::UnknownAnchor { ref name, .. } if name == "nowhere"), "{err}");
}

#[test]
fn anchors_do_not_cross_documents() {
    let engine = EngineBuilder::new().build_local().unwrap();
    let events = vec![
        Event::stream_start(),
        Event::document_start(),
        Event::scalar("1").anchored("x"),
        Event::document_end(),
        Event::document_start(),
        Event::alias("x"),
        Event::document_end(),
        Event::stream_end(),
    ];
    let err = engine
        .construct_values(&mut ReplayEvents::new(events), &TypeDescriptor::any())
        .unwrap_err();
    assert!(matches!(err, Error::UnknownAnchor { .. }), "{err}");
}

fn record() -> TypeRef {
    TypeDescriptor::object("Record")
        .field("s", TypeDescriptor::string())
        .field("n", TypeDescriptor::i32())
        .build()
}

#[test]
fn alias_must_fit_the_member_type() {
    let engine = EngineBuilder::new().build_local().unwrap();
    let err = engine
        .value_from_str("s: &a hello\nn: *a\n", &record())
        .unwrap_err();
    assert!(matches!(err, Error::Shape { .. }), "{err}");
    assert!(err.to_string().contains("alias `*a`"), "{err}");
    assert_eq!(err.location().map(|l| l.line()), Some(2));
}

#[test]
fn forward_alias_must_fit_the_member_type() {
    let events = vec![
        Event::mapping_start(),
        Event::scalar("n"),
        Event::alias("a"),
        Event::scalar("s"),
        Event::scalar("hello").anchored("a"),
        Event::mapping_end(),
    ];
    let err = construct(events, &record()).unwrap_err();
    assert!(matches!(err, Error::Shape { .. }), "{err}");
}

#[test]
fn aliased_integers_take_the_member_width() {
    let ty = TypeDescriptor::object("Counts")
        .field("signed", TypeDescriptor::i64())
        .field("unsigned", TypeDescriptor::u64())
        .field("small", TypeDescriptor::u8())
        .build();
    let engine = EngineBuilder::new().build_local().unwrap();
    let v = engine
        .value_from_str("signed: &n 7\nunsigned: *n\n", &ty)
        .unwrap();
    assert_eq!(v.get("signed"), Some(Value::Int(7)));
    assert_eq!(v.get("unsigned"), Some(Value::UInt(7)));

    let err = engine
        .value_from_str("signed: &n 300\nsmall: *n\n", &ty)
        .unwrap_err();
    assert!(matches!(err, Error::Shape { .. }), "{err}");
}
