use indoc::indoc;

use saphyr_construct::types::{
    Access, CamelCase, Hyphenated, MemberDescriptor, StaticTypeInspector, TypeDescriptor, TypeRef,
};
use saphyr_construct::{EngineBuilder, Error, Value};

fn pool() -> TypeRef {
    TypeDescriptor::object("Pool")
        .field("max_connections", TypeDescriptor::u64())
        .member(MemberDescriptor::new("idle_timeout", TypeDescriptor::u64()).rename("idle"))
        .member(MemberDescriptor::new("URL", TypeDescriptor::string()).verbatim_name())
        .member(MemberDescriptor::new("cache", TypeDescriptor::bool()).ignore())
        .build()
}

fn names(set: &saphyr_construct::types::MemberSet) -> Vec<&str> {
    set.iter().map(|m| m.name.as_str()).collect()
}

#[test]
fn naming_convention_applies_to_unaliased_members() {
    let engine = EngineBuilder::new()
        .naming_convention(CamelCase)
        .build_local()
        .unwrap();
    let members = engine.member_set(&pool(), Access::Write).unwrap();
    assert_eq!(names(&members), ["maxConnections", "idle", "URL"]);

    let yaml = indoc! {"
        maxConnections: 16
        idle: 30
        URL: postgres://db
    "};
    let v = engine.value_from_str(yaml, &pool()).unwrap();
    assert_eq!(v.get("max_connections"), Some(Value::UInt(16)));
    assert_eq!(v.get("idle_timeout"), Some(Value::UInt(30)));
    assert_eq!(v.get("URL"), Some(Value::str("postgres://db")));
}

#[test]
fn lookup_is_case_sensitive_after_the_convention() {
    let engine = EngineBuilder::new()
        .naming_convention(Hyphenated)
        .build_local()
        .unwrap();
    assert!(engine.value_from_str("max-connections: 1\n", &pool()).is_ok());
    let err = engine
        .value_from_str("max_connections: 1\n", &pool())
        .unwrap_err();
    assert!(matches!(err, Error::Shape { .. }), "{err}");
    let err = engine.value_from_str("Idle: 1\n", &pool()).unwrap_err();
    assert!(matches!(err, Error::Shape { .. }), "{err}");
}

#[test]
fn ignored_members_are_not_exposed() {
    let engine = EngineBuilder::new().build_local().unwrap();
    let err = engine.value_from_str("cache: true\n", &pool()).unwrap_err();
    assert!(err.to_string().contains("property `cache` not found"), "{err}");
}

#[test]
fn order_sorts_members_and_ties_keep_declaration_order() {
    let ty = TypeDescriptor::object("Ordered")
        .field("c", TypeDescriptor::i32())
        .member(MemberDescriptor::new("z", TypeDescriptor::i32()).order(-1))
        .field("a", TypeDescriptor::i32())
        .member(MemberDescriptor::new("m", TypeDescriptor::i32()).order(5))
        .build();
    let engine = EngineBuilder::new().build_local().unwrap();
    let members = engine.member_set(&ty, Access::Read).unwrap();
    assert_eq!(names(&members), ["z", "c", "a", "m"]);
}

#[test]
fn capabilities_split_read_and_write_sets() {
    let ty = TypeDescriptor::object("Account")
        .field("owner", TypeDescriptor::string())
        .member(MemberDescriptor::new("balance", TypeDescriptor::i64()).read_only())
        .member(MemberDescriptor::new("password", TypeDescriptor::string()).write_only())
        .build();
    let engine = EngineBuilder::new().build_local().unwrap();
    assert_eq!(
        names(&engine.member_set(&ty, Access::Read).unwrap()),
        ["owner", "balance"]
    );
    assert_eq!(
        names(&engine.member_set(&ty, Access::Write).unwrap()),
        ["owner", "password"]
    );
    let err = engine.value_from_str("balance: 5\n", &ty).unwrap_err();
    assert!(matches!(err, Error::Shape { .. }), "{err}");
}

#[test]
fn overrides_patch_types_without_touching_them() {
    let engine = EngineBuilder::new()
        .override_member("Pool", "max_connections", |a| a.alias = Some("size".into()))
        .override_member("Pool", "URL", |a| a.ignore = true)
        .build_local()
        .unwrap();
    let v = engine.value_from_str("size: 4\n", &pool()).unwrap();
    assert_eq!(v.get("max_connections"), Some(Value::UInt(4)));

    let err = engine
        .value_from_str("URL: postgres://db\n", &pool())
        .unwrap_err();
    assert!(matches!(err, Error::Shape { .. }), "{err}");

    let untouched = EngineBuilder::new().build_local().unwrap();
    assert!(untouched.value_from_str("URL: postgres://db\n", &pool()).is_ok());
}

#[test]
fn setters_transform_written_values() {
    let ty = TypeDescriptor::object("Host")
        .member(
            MemberDescriptor::new("address", TypeDescriptor::string()).setter(|object, value| {
                let text = value.as_str().unwrap_or_default().to_ascii_lowercase();
                object.set("address", Value::str(text));
                Ok(())
            }),
        )
        .build();
    let engine = EngineBuilder::new().build_local().unwrap();
    let v = engine
        .value_from_str("address: Example.ORG\n", &ty)
        .unwrap();
    assert_eq!(v.get("address"), Some(Value::str("example.org")));
}

#[test]
fn failing_setters_report_the_key_position() {
    let ty = TypeDescriptor::object("Port")
        .member(
            MemberDescriptor::new("number", TypeDescriptor::u64()).setter(|object, value| {
                match value.as_u64() {
                    Some(0) => Err(Error::msg("port 0 is reserved")),
                    _ => {
                        object.set("number", value);
                        Ok(())
                    }
                }
            }),
        )
        .build();
    let engine = EngineBuilder::new().build_local().unwrap();
    let err = engine.value_from_str("\nnumber: 0\n", &ty).unwrap_err();
    assert!(matches!(err, Error::Construction { .. }), "{err}");
    assert!(err.to_string().contains("port 0 is reserved"), "{err}");
    assert_eq!(err.location().map(|l| l.line()), Some(2));
}

#[test]
fn static_tables_replace_descriptor_enumeration() {
    let ty = TypeDescriptor::object("Generated").build();
    let tables = StaticTypeInspector::new().with_members(
        "Generated",
        vec![MemberDescriptor::new("id", TypeDescriptor::u64())],
    );
    let engine = EngineBuilder::new()
        .static_members(tables)
        .build_local()
        .unwrap();
    let v = engine.value_from_str("id: 7\n", &ty).unwrap();
    assert_eq!(v.get("id"), Some(Value::UInt(7)));

    let unknown = TypeDescriptor::object("Handwritten")
        .field("id", TypeDescriptor::u64())
        .build();
    let err = engine.value_from_str("id: 7\n", &unknown).unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }), "{err}");
}

#[test]
fn shared_engines_resolve_members_from_many_threads() {
    let engine = EngineBuilder::new()
        .naming_convention(CamelCase)
        .build()
        .unwrap();
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let members = engine.member_set(&pool(), Access::Write).unwrap();
                assert_eq!(members.len(), 3);
            });
        }
    });
}
