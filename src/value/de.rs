//! Serde `Deserializer` over a constructed [`Value`].
//!
//! This is how untyped construction reaches ordinary Rust types: the engine builds a
//! `Value` graph (resolving anchors, aliases and forward references on the way) and
//! serde then walks the graph. Shared containers are cloned into every place that
//! references them. A cyclic graph therefore unrolls until the nesting bound is hit and
//! fails with a recursion-limit error instead of looping.

use serde::de::{
    self, DeserializeOwned, DeserializeSeed, IntoDeserializer, MapAccess, SeqAccess, Visitor,
};
use serde::forward_to_deserialize_any;

use crate::error::Error;
use crate::parse_scalars::{parse_strict_bool, parse_yaml11_bool};
use crate::recursion::DEFAULT_MAX_DEPTH;
use crate::value::Value;

/// Deserialize `T` from a constructed value using the default nesting bound.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    from_value_with_depth(value, DEFAULT_MAX_DEPTH)
}

/// Deserialize `T` from a constructed value, failing past `max_depth` nesting levels.
pub fn from_value_with_depth<T: DeserializeOwned>(
    value: Value,
    max_depth: usize,
) -> Result<T, Error> {
    T::deserialize(ValueDeserializer::new(value, max_depth))
}

/// Deserializer for one value at a known depth.
pub struct ValueDeserializer {
    value: Value,
    depth: usize,
    max_depth: usize,
    strict_booleans: bool,
}

impl ValueDeserializer {
    pub fn new(value: Value, max_depth: usize) -> Self {
        Self {
            value,
            depth: 0,
            max_depth,
            strict_booleans: false,
        }
    }

    /// Only `true`/`false` satisfy a `bool` when text reaches it; otherwise the
    /// YAML 1.1 words (`yes`, `off`, ...) are accepted as well.
    pub fn strict_booleans(mut self, strict: bool) -> Self {
        self.strict_booleans = strict;
        self
    }

    fn child(&self, value: Value) -> Self {
        Self {
            value,
            depth: self.depth + 1,
            max_depth: self.max_depth,
            strict_booleans: self.strict_booleans,
        }
    }

    /// Entering a container costs one nesting level.
    fn enter(&self) -> Result<(), Error> {
        if self.depth >= self.max_depth {
            return Err(Error::recursion_limit(self.max_depth));
        }
        Ok(())
    }

    fn unexpected(&self, expected: &str) -> Error {
        Error::msg(format!(
            "invalid type: {}, expected {expected}",
            self.value.kind_name()
        ))
    }
}

/// Sequence access over a snapshot of list or set items.
struct SeqDe {
    items: std::vec::IntoIter<Value>,
    parent: ValueDeserializer,
}

impl<'de> SeqAccess<'de> for SeqDe {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Error>
    where
        T: DeserializeSeed<'de>,
    {
        match self.items.next() {
            Some(item) => seed.deserialize(self.parent.child(item)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

/// Map access over a snapshot of map entries or object fields.
struct MapDe {
    entries: std::vec::IntoIter<(Value, Value)>,
    pending: Option<Value>,
    parent: ValueDeserializer,
}

impl<'de> MapAccess<'de> for MapDe {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Error>
    where
        K: DeserializeSeed<'de>,
    {
        match self.entries.next() {
            Some((key, value)) => {
                self.pending = Some(value);
                seed.deserialize(self.parent.child(key)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Error>
    where
        V: DeserializeSeed<'de>,
    {
        let value = self
            .pending
            .take()
            .ok_or_else(|| Error::msg("map value requested before its key"))?;
        seed.deserialize(self.parent.child(value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

impl<'de> de::Deserializer<'de> for ValueDeserializer {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        match self.value.clone() {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Int(i) => visitor.visit_i64(i),
            Value::UInt(u) => visitor.visit_u64(u),
            Value::Float(f) => visitor.visit_f64(f),
            Value::Str(s) | Value::Variant(s) => visitor.visit_string(s),
            Value::Char(c) => visitor.visit_char(c),
            Value::Bytes(b) => visitor.visit_byte_buf(b),
            Value::List(items) => {
                self.enter()?;
                let items = items.borrow().clone();
                visitor.visit_seq(SeqDe {
                    items: items.into_iter(),
                    parent: self,
                })
            }
            Value::Set(items) => {
                self.enter()?;
                let items: Vec<Value> = items.borrow().iter().cloned().collect();
                visitor.visit_seq(SeqDe {
                    items: items.into_iter(),
                    parent: self,
                })
            }
            Value::Map(entries) => {
                self.enter()?;
                let entries: Vec<(Value, Value)> = entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                visitor.visit_map(MapDe {
                    entries: entries.into_iter(),
                    pending: None,
                    parent: self,
                })
            }
            Value::Object(obj) => {
                self.enter()?;
                let entries: Vec<(Value, Value)> = obj
                    .borrow()
                    .fields
                    .iter()
                    .map(|(name, v)| (Value::str(name.as_str()), v.clone()))
                    .collect();
                visitor.visit_map(MapDe {
                    entries: entries.into_iter(),
                    pending: None,
                    parent: self,
                })
            }
        }
    }

    /// Untyped construction keeps `yes`/`no` as text; a `bool` target reads them here.
    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        match &self.value {
            Value::Bool(b) => visitor.visit_bool(*b),
            Value::Str(s) if self.strict_booleans => visitor.visit_bool(parse_strict_bool(s)?),
            Value::Str(s) => visitor.visit_bool(parse_yaml11_bool(s)?),
            _ => self.deserialize_any(visitor),
        }
    }

    /// `null` is `None`; anything else is `Some`.
    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        if self.value.is_null() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        if self.value.is_null() {
            visitor.visit_unit()
        } else {
            Err(self.unexpected("null"))
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Error> {
        visitor.visit_newtype_struct(self)
    }

    /// Scalars that were inferred as numbers or booleans are still accepted as strings.
    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        match &self.value {
            Value::Bool(_) | Value::Int(_) | Value::UInt(_) | Value::Float(_) | Value::Char(_) => {
                visitor.visit_string(self.value.to_string())
            }
            _ => self.deserialize_any(visitor),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Error> {
        self.deserialize_string(visitor)
    }

    /// Externally tagged enums: `Variant` or `{ Variant: payload }`.
    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        let (variant, payload) = match &self.value {
            Value::Str(s) | Value::Variant(s) => (s.clone(), None),
            Value::Map(entries) => {
                let entries = entries.borrow();
                if entries.len() != 1 {
                    return Err(Error::msg(
                        "externally tagged enum expected a mapping with exactly one entry",
                    ));
                }
                let Some((key, value)) = entries.first() else {
                    return Err(Error::msg("externally tagged enum expected a variant"));
                };
                let Some(name) = key.as_str() else {
                    return Err(Error::msg("expected string key for externally tagged enum"));
                };
                (name.to_owned(), Some(value.clone()))
            }
            _ => return Err(self.unexpected("enum variant")),
        };

        struct EA {
            variant: String,
            payload: Option<Value>,
            parent: ValueDeserializer,
        }

        impl<'de> de::EnumAccess<'de> for EA {
            type Error = Error;
            type Variant = VA;

            fn variant_seed<Vv>(self, seed: Vv) -> Result<(Vv::Value, Self::Variant), Error>
            where
                Vv: DeserializeSeed<'de>,
            {
                let EA {
                    variant,
                    payload,
                    parent,
                } = self;
                let v = seed.deserialize(variant.into_deserializer())?;
                Ok((v, VA { payload, parent }))
            }
        }

        struct VA {
            payload: Option<Value>,
            parent: ValueDeserializer,
        }

        impl VA {
            fn payload(self) -> Result<ValueDeserializer, Error> {
                match self.payload {
                    Some(value) => Ok(self.parent.child(value)),
                    None => Err(Error::msg("enum variant expects a value")),
                }
            }
        }

        impl<'de> de::VariantAccess<'de> for VA {
            type Error = Error;

            /// `Variant` or `{ Variant: null }`.
            fn unit_variant(self) -> Result<(), Error> {
                match self.payload {
                    None | Some(Value::Null) => Ok(()),
                    Some(other) => Err(Error::msg(format!(
                        "unexpected {} for unit enum variant",
                        other.kind_name()
                    ))),
                }
            }

            fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value, Error>
            where
                T: DeserializeSeed<'de>,
            {
                seed.deserialize(self.payload()?)
            }

            fn tuple_variant<Vv>(self, _len: usize, visitor: Vv) -> Result<Vv::Value, Error>
            where
                Vv: Visitor<'de>,
            {
                de::Deserializer::deserialize_any(self.payload()?, visitor)
            }

            fn struct_variant<Vv>(
                self,
                _fields: &'static [&'static str],
                visitor: Vv,
            ) -> Result<Vv::Value, Error>
            where
                Vv: Visitor<'de>,
            {
                de::Deserializer::deserialize_any(self.payload()?, visitor)
            }
        }

        visitor.visit_enum(EA {
            variant,
            payload,
            parent: self,
        })
    }

    forward_to_deserialize_any! {
        i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char
        bytes byte_buf seq tuple tuple_struct map struct identifier ignored_any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    fn map(entries: Vec<(&str, Value)>) -> Value {
        let mut out = IndexMap::new();
        for (k, v) in entries {
            out.insert(Value::str(k), v);
        }
        Value::map(out)
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Server {
        host: String,
        port: u16,
        tags: Vec<String>,
        mode: Mode,
        limit: Option<f32>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    enum Mode {
        Active,
        Standby { delay: u32 },
    }

    #[test]
    fn drives_derived_structs() {
        let value = map(vec![
            ("host", Value::str("localhost")),
            ("port", Value::Int(8080)),
            ("tags", Value::list(vec![Value::str("a"), Value::Int(1)])),
            ("mode", map(vec![("Standby", map(vec![("delay", Value::Int(5))]))])),
            ("limit", Value::Null),
        ]);
        let server: Server = from_value(value).unwrap();
        assert_eq!(
            server,
            Server {
                host: "localhost".into(),
                port: 8080,
                tags: vec!["a".into(), "1".into()],
                mode: Mode::Standby { delay: 5 },
                limit: None,
            }
        );
    }

    #[test]
    fn unit_variant_from_string() {
        let mode: Mode = from_value(Value::str("Active")).unwrap();
        assert_eq!(mode, Mode::Active);
    }

    #[test]
    fn narrowing_integers_are_rejected() {
        let err = from_value::<u8>(Value::Int(300)).unwrap_err();
        assert!(err.to_string().contains("300"), "{err}");
    }

    #[test]
    fn cyclic_graph_hits_the_bound() {
        let list = Value::list(vec![]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        #[derive(Debug, Deserialize)]
        struct Node(#[allow(dead_code)] Vec<Node>);
        let err = from_value_with_depth::<Node>(list, 50).unwrap_err();
        assert!(matches!(err, Error::RecursionLimit { max: 50, .. }));
    }

    #[test]
    fn object_fields_become_map_entries() {
        let obj = crate::value::Object::new("Point")
            .with("x", 1)
            .with("y", 2);
        let fields: BTreeMap<String, i32> = from_value(Value::object(obj)).unwrap();
        assert_eq!(fields.get("x"), Some(&1));
        assert_eq!(fields.get("y"), Some(&2));
    }
}
