//! Dynamic values produced by typed construction.
//!
//! Containers are reference counted: an alias yields the very same container as its
//! anchor, and a deferred patch written into a container is visible through every
//! reference to it. Graphs may therefore be cyclic; equality and serialization are
//! written to terminate on cycles.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use ahash::AHashSet;
use indexmap::{IndexMap, IndexSet};
use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::recursion::DEFAULT_MAX_DEPTH;

pub mod de;

pub use de::{ValueDeserializer, from_value, from_value_with_depth};

/// Shared, interior-mutable container.
pub type Shared<T> = Rc<RefCell<T>>;

/// Instance of a registered object type: its type name and field values in member order.
#[derive(Clone, Debug, Default)]
pub struct Object {
    pub type_name: String,
    pub fields: IndexMap<String, Value>,
}

impl Object {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: IndexMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Set a field, keeping the position of a field that already exists.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value.into());
        self
    }
}

/// A constructed value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Char(char),
    Bytes(Vec<u8>),
    /// Enum variant selected by name.
    Variant(String),
    List(Shared<Vec<Value>>),
    Set(Shared<IndexSet<Value>>),
    Map(Shared<IndexMap<Value, Value>>),
    Object(Shared<Object>),
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn set(items: IndexSet<Value>) -> Self {
        Value::Set(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: IndexMap<Value, Value>) -> Self {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    pub fn object(object: Object) -> Self {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    /// Short name of the variant, used in messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::UInt(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Char(_) => "char",
            Value::Bytes(_) => "bytes",
            Value::Variant(_) => "enum variant",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Int(i) => u64::try_from(*i).ok(),
            Value::UInt(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            _ => None,
        }
    }

    /// Text of a string or enum variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Variant(s) => Some(s),
            _ => None,
        }
    }

    /// Field of an object or value under a string key of a map.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(obj) => obj.borrow().get(key).cloned(),
            Value::Map(map) => map.borrow().get(&Value::str(key)).cloned(),
            _ => None,
        }
    }

    /// Item of a list.
    pub fn index(&self, index: usize) -> Option<Value> {
        match self {
            Value::List(items) => items.borrow().get(index).cloned(),
            _ => None,
        }
    }

    /// Number of items, entries or fields; `None` for scalars.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::List(items) => Some(items.borrow().len()),
            Value::Set(items) => Some(items.borrow().len()),
            Value::Map(entries) => Some(entries.borrow().len()),
            Value::Object(obj) => Some(obj.borrow().fields.len()),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        self.identity().is_some()
    }

    /// Address of the shared container, used as identity when walking graphs.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::List(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Set(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Map(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            Value::Object(rc) => Some(Rc::as_ptr(rc) as *const () as usize),
            _ => None,
        }
    }

    /// True if both values are the same shared container instance.
    pub fn same_instance(&self, other: &Value) -> bool {
        matches!((self.identity(), other.identity()), (Some(a), Some(b)) if a == b)
    }

    fn structural_eq(&self, other: &Value, assumed: &mut AHashSet<(usize, usize)>) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Int(a), Value::UInt(b)) | (Value::UInt(b), Value::Int(a)) => {
                u64::try_from(*a).is_ok_and(|a| a == *b)
            }
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Variant(a), Value::Variant(b)) => a == b,
            _ => {
                let (Some(left), Some(right)) = (self.identity(), other.identity()) else {
                    return false;
                };
                // Pairs under comparison are assumed equal, so cycles terminate.
                if left == right || !assumed.insert((left, right)) {
                    return true;
                }
                self.container_eq(other, assumed)
            }
        }
    }

    fn container_eq(&self, other: &Value, assumed: &mut AHashSet<(usize, usize)>) -> bool {
        match (self, other) {
            (Value::List(a), Value::List(b)) => {
                let (Ok(a), Ok(b)) = (a.try_borrow(), b.try_borrow()) else {
                    return false;
                };
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|(x, y)| x.structural_eq(y, assumed))
            }
            (Value::Set(a), Value::Set(b)) => {
                let (Ok(a), Ok(b)) = (a.try_borrow(), b.try_borrow()) else {
                    return false;
                };
                a.len() == b.len()
                    && a.iter()
                        .all(|x| b.iter().any(|y| x.structural_eq(y, assumed)))
            }
            (Value::Map(a), Value::Map(b)) => {
                let (Ok(a), Ok(b)) = (a.try_borrow(), b.try_borrow()) else {
                    return false;
                };
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|((ka, va), (kb, vb))| {
                        ka.structural_eq(kb, assumed) && va.structural_eq(vb, assumed)
                    })
            }
            (Value::Object(a), Value::Object(b)) => {
                let (Ok(a), Ok(b)) = (a.try_borrow(), b.try_borrow()) else {
                    return false;
                };
                a.type_name == b.type_name
                    && a.fields.len() == b.fields.len()
                    && a.fields.iter().zip(b.fields.iter()).all(|((na, va), (nb, vb))| {
                        na == nb && va.structural_eq(vb, assumed)
                    })
            }
            _ => false,
        }
    }
}

impl PartialEq for Value {
    /// Structural equality. Maps and objects compare in entry order; floats compare by
    /// bit pattern so that `Value` can be used as a map key.
    fn eq(&self, other: &Self) -> bool {
        self.structural_eq(other, &mut AHashSet::new())
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Bool(b) => b.hash(state),
            // Int and UInt holding the same number are equal and must hash alike.
            Value::Int(i) => match u64::try_from(*i) {
                Ok(u) => u.hash(state),
                Err(_) => i.hash(state),
            },
            Value::UInt(u) => u.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Str(s) | Value::Variant(s) => s.hash(state),
            Value::Char(c) => c.hash(state),
            Value::Bytes(b) => b.hash(state),
            // Containers may be patched after insertion; only the kind is stable.
            other => other.kind_name().hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::UInt(u) => write!(f, "{u}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) | Value::Variant(s) => f.write_str(s),
            Value::Char(c) => write!(f, "{c}"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Object(obj) => match obj.try_borrow() {
                Ok(obj) => write!(f, "<{}>", obj.type_name),
                Err(_) => f.write_str("<object>"),
            },
            other => write!(f, "<{}>", other.kind_name()),
        }
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$variant(v.into())
            }
        })*
    };
}

value_from! {
    bool => Bool,
    i8 => Int, i16 => Int, i32 => Int, i64 => Int,
    u8 => UInt, u16 => UInt, u32 => UInt, u64 => UInt,
    f32 => Float, f64 => Float,
    char => Char,
    String => Str,
    &str => Str,
    Vec<u8> => Bytes,
}

impl From<Object> for Value {
    fn from(obj: Object) -> Self {
        Value::object(obj)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Serializer view of a value at some nesting depth.
struct Bounded<'a> {
    value: &'a Value,
    depth: usize,
}

impl Bounded<'_> {
    fn child<'b>(&self, value: &'b Value) -> Bounded<'b> {
        Bounded {
            value,
            depth: self.depth + 1,
        }
    }
}

impl Serialize for Bounded<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.depth > DEFAULT_MAX_DEPTH {
            return Err(S::Error::custom(format!(
                "maximum nesting depth of {DEFAULT_MAX_DEPTH} exceeded"
            )));
        }
        match self.value {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::UInt(u) => serializer.serialize_u64(*u),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Str(s) | Value::Variant(s) => serializer.serialize_str(s),
            Value::Char(c) => serializer.serialize_char(*c),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::List(items) => {
                let items = items.borrow();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(&self.child(item))?;
                }
                seq.end()
            }
            Value::Set(items) => {
                let items = items.borrow();
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(&self.child(item))?;
                }
                seq.end()
            }
            Value::Map(entries) => {
                let entries = entries.borrow();
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries.iter() {
                    map.serialize_entry(&self.child(k), &self.child(v))?;
                }
                map.end()
            }
            Value::Object(obj) => {
                let obj = obj.borrow();
                let mut map = serializer.serialize_map(Some(obj.fields.len()))?;
                for (name, v) in obj.fields.iter() {
                    map.serialize_entry(name, &self.child(v))?;
                }
                map.end()
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Bounded {
            value: self,
            depth: 0,
        }
        .serialize(serializer)
    }
}
