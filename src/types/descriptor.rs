//! Runtime descriptors of construction targets.
//!
//! Rust has no runtime reflection, so target shapes are described by values: a
//! [`TypeDescriptor`] says what a type looks like (scalar kind, container item types,
//! object members, constructor), and a [`MemberDescriptor`] describes one member of an
//! object type together with its declarative annotations.

use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::events::ScalarStyle;
use crate::value::{Object, Value};

/// Shared handle to a type descriptor.
pub type TypeRef = Arc<TypeDescriptor>;

/// Width and signedness of an integer target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl IntWidth {
    pub fn name(self) -> &'static str {
        match self {
            IntWidth::I8 => "i8",
            IntWidth::I16 => "i16",
            IntWidth::I32 => "i32",
            IntWidth::I64 => "i64",
            IntWidth::U8 => "u8",
            IntWidth::U16 => "u16",
            IntWidth::U32 => "u32",
            IntWidth::U64 => "u64",
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            IntWidth::I8 | IntWidth::I16 | IntWidth::I32 | IntWidth::I64
        )
    }

    /// Inclusive range of the width.
    pub fn bounds(self) -> (i128, i128) {
        match self {
            IntWidth::I8 => (i8::MIN.into(), i8::MAX.into()),
            IntWidth::I16 => (i16::MIN.into(), i16::MAX.into()),
            IntWidth::I32 => (i32::MIN.into(), i32::MAX.into()),
            IntWidth::I64 => (i64::MIN.into(), i64::MAX.into()),
            IntWidth::U8 => (0, u8::MAX.into()),
            IntWidth::U16 => (0, u16::MAX.into()),
            IntWidth::U32 => (0, u32::MAX.into()),
            IntWidth::U64 => (0, u64::MAX.into()),
        }
    }

    /// True if `value` is an integer within the width.
    pub fn fits(self, value: &Value) -> bool {
        let v: i128 = match value {
            Value::Int(i) => (*i).into(),
            Value::UInt(u) => (*u).into(),
            _ => return false,
        };
        let (min, max) = self.bounds();
        (min..=max).contains(&v)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FloatWidth {
    F32,
    F64,
}

/// Write hook replacing the plain field store of a member.
pub type Setter = Arc<dyn Fn(&mut Object, Value) -> Result<(), Error> + Send + Sync>;

/// Producer of a member's default value.
pub type DefaultValue = Arc<dyn Fn() -> Value + Send + Sync>;

/// Body of an annotated constructor, receiving arguments in parameter order.
pub type ConstructorFn = Arc<dyn Fn(Vec<Value>) -> Result<Value, Error> + Send + Sync>;

/// When a member is left out of the represented output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DefaultHandling {
    /// Always emit.
    #[default]
    Preserve,
    /// Omit when the value is null.
    OmitNull,
    /// Omit when the value equals the member's default (or the type's zero value).
    OmitDefaults,
    /// Omit when the value is an empty list, set, map or object.
    OmitEmptyCollections,
}

/// Declarative annotations attached to one member.
#[derive(Clone)]
pub struct MemberAnnotations {
    /// Exposed name overriding the field name.
    pub alias: Option<String>,
    pub ignore: bool,
    pub required: bool,
    /// Sort key; members without one sort as 0 and ties keep declaration order.
    pub order: Option<i32>,
    pub default_handling: DefaultHandling,
    pub scalar_style: Option<ScalarStyle>,
    /// If false, the naming convention leaves the exposed name alone.
    pub apply_naming_convention: bool,
    pub default: Option<DefaultValue>,
}

impl Default for MemberAnnotations {
    fn default() -> Self {
        Self {
            alias: None,
            ignore: false,
            required: false,
            order: None,
            default_handling: DefaultHandling::Preserve,
            scalar_style: None,
            apply_naming_convention: true,
            default: None,
        }
    }
}

impl fmt::Debug for MemberAnnotations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberAnnotations")
            .field("alias", &self.alias)
            .field("ignore", &self.ignore)
            .field("required", &self.required)
            .field("order", &self.order)
            .field("default_handling", &self.default_handling)
            .field("scalar_style", &self.scalar_style)
            .field("apply_naming_convention", &self.apply_naming_convention)
            .field("default", &self.default.is_some())
            .finish()
    }
}

/// One exposed member of an object type.
#[derive(Clone)]
pub struct MemberDescriptor {
    /// Name under which the member appears in YAML (after all transforms).
    pub name: String,
    /// Field of [`Object`] that stores the value.
    pub field: String,
    pub ty: TypeRef,
    pub can_read: bool,
    pub can_write: bool,
    pub annotations: MemberAnnotations,
    pub setter: Option<Setter>,
}

impl MemberDescriptor {
    /// Readable and writable member stored in the field of the same name.
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        let name = name.into();
        Self {
            field: name.clone(),
            name,
            ty,
            can_read: true,
            can_write: true,
            annotations: MemberAnnotations::default(),
            setter: None,
        }
    }

    pub fn rename(mut self, alias: impl Into<String>) -> Self {
        self.annotations.alias = Some(alias.into());
        self
    }

    pub fn ignore(mut self) -> Self {
        self.annotations.ignore = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.annotations.required = true;
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.annotations.order = Some(order);
        self
    }

    pub fn default_handling(mut self, handling: DefaultHandling) -> Self {
        self.annotations.default_handling = handling;
        self
    }

    pub fn scalar_style(mut self, style: ScalarStyle) -> Self {
        self.annotations.scalar_style = Some(style);
        self
    }

    /// Keep the exposed name as written, whatever the naming convention.
    pub fn verbatim_name(mut self) -> Self {
        self.annotations.apply_naming_convention = false;
        self
    }

    pub fn default_value<F>(mut self, default: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.annotations.default = Some(Arc::new(default));
        self
    }

    pub fn read_only(mut self) -> Self {
        self.can_write = false;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.can_read = false;
        self
    }

    pub fn setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&mut Object, Value) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    /// Store `value` into `object` through the write hook or the plain field.
    pub fn write(&self, object: &mut Object, value: Value) -> Result<(), Error> {
        match &self.setter {
            Some(setter) => setter(object, value),
            None => {
                object.set(self.field.as_str(), value);
                Ok(())
            }
        }
    }

    /// Annotated default, or the zero value of the declared type.
    pub fn default_of(&self) -> Value {
        match &self.annotations.default {
            Some(default) => default(),
            None => self.ty.zero_value(),
        }
    }
}

impl fmt::Debug for MemberDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDescriptor")
            .field("name", &self.name)
            .field("field", &self.field)
            .field("ty", &self.ty.name)
            .field("can_read", &self.can_read)
            .field("can_write", &self.can_write)
            .field("annotations", &self.annotations)
            .finish()
    }
}

/// One parameter of an annotated constructor.
#[derive(Clone)]
pub struct ConstructorParam {
    pub name: String,
    pub ty: TypeRef,
    pub required: bool,
    pub default: Option<DefaultValue>,
}

impl ConstructorParam {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            default: None,
        }
    }

    /// Optional parameter filled with `default` when the key is absent.
    pub fn or_default<F>(mut self, default: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.required = false;
        self.default = Some(Arc::new(default));
        self
    }
}

/// Designated multi-argument constructor of an object type.
#[derive(Clone)]
pub struct ConstructorDescriptor {
    pub params: Vec<ConstructorParam>,
    pub build: ConstructorFn,
}

impl ConstructorDescriptor {
    pub fn new<F>(params: Vec<ConstructorParam>, build: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, Error> + Send + Sync + 'static,
    {
        Self {
            params,
            build: Arc::new(build),
        }
    }
}

/// Shape of an object type.
#[derive(Clone, Default)]
pub struct ObjectShape {
    pub members: Vec<MemberDescriptor>,
    pub constructor: Option<ConstructorDescriptor>,
    /// True if an empty instance can be created and filled member by member.
    pub default_constructible: bool,
}

#[derive(Clone)]
pub enum TypeKind {
    /// Untyped target: the node decides.
    Any,
    Bool,
    Int(IntWidth),
    Float(FloatWidth),
    /// Text. Not nullable: `~`, `null` and the empty scalar construct as their text.
    /// Wrap in [`TypeKind::Optional`] to accept null.
    Str,
    Char,
    Bytes,
    Enum { variants: Vec<String> },
    Optional(TypeRef),
    Array { item: TypeRef, len: usize },
    List(TypeRef),
    Set(TypeRef),
    Map { key: TypeRef, value: TypeRef },
    Object(ObjectShape),
}

/// A construction target.
#[derive(Clone)]
pub struct TypeDescriptor {
    pub name: String,
    pub kind: TypeKind,
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl TypeDescriptor {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> TypeRef {
        Arc::new(Self {
            name: name.into(),
            kind,
        })
    }

    pub fn any() -> TypeRef {
        Self::new("any", TypeKind::Any)
    }

    pub fn bool() -> TypeRef {
        Self::new("bool", TypeKind::Bool)
    }

    pub fn int(width: IntWidth) -> TypeRef {
        Self::new(width.name(), TypeKind::Int(width))
    }

    pub fn i32() -> TypeRef {
        Self::int(IntWidth::I32)
    }

    pub fn i64() -> TypeRef {
        Self::int(IntWidth::I64)
    }

    pub fn u8() -> TypeRef {
        Self::int(IntWidth::U8)
    }

    pub fn u64() -> TypeRef {
        Self::int(IntWidth::U64)
    }

    pub fn f32() -> TypeRef {
        Self::new("f32", TypeKind::Float(FloatWidth::F32))
    }

    pub fn f64() -> TypeRef {
        Self::new("f64", TypeKind::Float(FloatWidth::F64))
    }

    /// `~` read as a `String` is the text `"~"`; use `optional(string())` for a
    /// string that may be null.
    pub fn string() -> TypeRef {
        Self::new("String", TypeKind::Str)
    }

    pub fn char() -> TypeRef {
        Self::new("char", TypeKind::Char)
    }

    pub fn bytes() -> TypeRef {
        Self::new("Vec<u8>", TypeKind::Bytes)
    }

    pub fn enumeration<I, S>(name: impl Into<String>, variants: I) -> TypeRef
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            TypeKind::Enum {
                variants: variants.into_iter().map(Into::into).collect(),
            },
        )
    }

    pub fn optional(inner: TypeRef) -> TypeRef {
        Self::new(format!("Option<{}>", inner.name), TypeKind::Optional(inner))
    }

    pub fn array(item: TypeRef, len: usize) -> TypeRef {
        Self::new(format!("[{}; {len}]", item.name), TypeKind::Array { item, len })
    }

    pub fn list(item: TypeRef) -> TypeRef {
        Self::new(format!("Vec<{}>", item.name), TypeKind::List(item))
    }

    pub fn set(item: TypeRef) -> TypeRef {
        Self::new(format!("Set<{}>", item.name), TypeKind::Set(item))
    }

    pub fn map(key: TypeRef, value: TypeRef) -> TypeRef {
        Self::new(
            format!("Map<{}, {}>", key.name, value.name),
            TypeKind::Map { key, value },
        )
    }

    /// Start describing an object type.
    pub fn object(name: impl Into<String>) -> ObjectBuilder {
        ObjectBuilder {
            name: name.into(),
            shape: ObjectShape {
                default_constructible: true,
                ..ObjectShape::default()
            },
        }
    }

    /// Strip any number of `Optional` layers.
    pub fn underlying(self: &Arc<Self>) -> &TypeRef {
        let mut ty = self;
        while let TypeKind::Optional(inner) = &ty.kind {
            ty = inner;
        }
        ty
    }

    pub fn is_any(&self) -> bool {
        matches!(self.kind, TypeKind::Any)
    }

    /// True if `null` is an acceptable value. Strings are not: a null-looking scalar
    /// constructed into a string keeps its text.
    pub fn is_nullable(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Any
                | TypeKind::Optional(_)
                | TypeKind::List(_)
                | TypeKind::Set(_)
                | TypeKind::Map { .. }
                | TypeKind::Object(_)
        )
    }

    /// True if an already constructed `value` can stand where this type is expected.
    ///
    /// Containers are checked by their outer shape; their items are not revisited.
    /// Integers must fit the declared width; floats take integers too.
    pub fn accepts(&self, value: &Value) -> bool {
        match (&self.kind, value) {
            (TypeKind::Any, _) => true,
            (TypeKind::Optional(inner), v) => v.is_null() || inner.accepts(v),
            (_, Value::Null) => self.is_nullable(),
            (TypeKind::Bool, Value::Bool(_)) => true,
            (TypeKind::Int(width), v) => width.fits(v),
            (TypeKind::Float(FloatWidth::F64), Value::Float(_)) => true,
            (TypeKind::Float(FloatWidth::F32), Value::Float(f)) => {
                !f.is_finite() || f.abs() <= f64::from(f32::MAX)
            }
            (TypeKind::Float(_), Value::Int(_) | Value::UInt(_)) => true,
            (TypeKind::Str, Value::Str(_))
            | (TypeKind::Char, Value::Char(_))
            | (TypeKind::Bytes, Value::Bytes(_)) => true,
            (TypeKind::Enum { variants }, Value::Variant(v)) => variants.contains(v),
            (TypeKind::Array { len, .. }, Value::List(items)) => {
                items.try_borrow().map_or(true, |items| items.len() == *len)
            }
            (TypeKind::List(_), Value::List(_))
            | (TypeKind::Set(_), Value::Set(_))
            | (TypeKind::Map { .. }, Value::Map(_)) => true,
            (TypeKind::Object(_), Value::Object(object)) => object
                .try_borrow()
                .map_or(true, |object| object.type_name == self.name),
            _ => false,
        }
    }

    /// `value` in the representation this type constructs, or `None` if it does not fit.
    /// Integers switch between `Int` and `UInt` by signedness and become floats for
    /// float targets.
    pub fn conform(&self, value: Value) -> Option<Value> {
        if !self.accepts(&value) {
            return None;
        }
        let mut ty = self;
        while let TypeKind::Optional(inner) = &ty.kind {
            ty = inner;
        }
        Some(match (&ty.kind, value) {
            (TypeKind::Int(w), Value::Int(i)) if !w.is_signed() => {
                u64::try_from(i).map_or(Value::Int(i), Value::UInt)
            }
            (TypeKind::Int(w), Value::UInt(u)) if w.is_signed() => {
                i64::try_from(u).map_or(Value::UInt(u), Value::Int)
            }
            (TypeKind::Float(_), Value::Int(i)) => Value::Float(i as f64),
            (TypeKind::Float(_), Value::UInt(u)) => Value::Float(u as f64),
            (_, v) => v,
        })
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Bool
                | TypeKind::Int(_)
                | TypeKind::Float(_)
                | TypeKind::Str
                | TypeKind::Char
                | TypeKind::Bytes
                | TypeKind::Enum { .. }
        )
    }

    pub fn is_mapping_like(&self) -> bool {
        matches!(self.kind, TypeKind::Map { .. } | TypeKind::Object(_))
    }

    pub fn is_sequence_like(&self) -> bool {
        matches!(
            self.kind,
            TypeKind::Array { .. } | TypeKind::List(_) | TypeKind::Set(_)
        )
    }

    /// Item type of a sequence-like type.
    pub fn item_type(&self) -> Option<&TypeRef> {
        match &self.kind {
            TypeKind::Array { item, .. } | TypeKind::List(item) | TypeKind::Set(item) => {
                Some(item)
            }
            _ => None,
        }
    }

    /// Key and value types of a map.
    pub fn key_value_types(&self) -> Option<(&TypeRef, &TypeRef)> {
        match &self.kind {
            TypeKind::Map { key, value } => Some((key, value)),
            _ => None,
        }
    }

    pub fn object_shape(&self) -> Option<&ObjectShape> {
        match &self.kind {
            TypeKind::Object(shape) => Some(shape),
            _ => None,
        }
    }

    pub fn constructor(&self) -> Option<&ConstructorDescriptor> {
        self.object_shape().and_then(|s| s.constructor.as_ref())
    }

    pub fn is_default_constructible(&self) -> bool {
        self.object_shape()
            .is_some_and(|s| s.default_constructible)
    }

    /// Value an instance of this type holds before anything is written to it.
    pub fn zero_value(&self) -> Value {
        match &self.kind {
            TypeKind::Bool => Value::Bool(false),
            TypeKind::Int(w) if w.is_signed() => Value::Int(0),
            TypeKind::Int(_) => Value::UInt(0),
            TypeKind::Float(_) => Value::Float(0.0),
            TypeKind::Char => Value::Char('\0'),
            _ => Value::Null,
        }
    }
}

/// Builder returned by [`TypeDescriptor::object`].
pub struct ObjectBuilder {
    name: String,
    shape: ObjectShape,
}

impl ObjectBuilder {
    pub fn member(mut self, member: MemberDescriptor) -> Self {
        self.shape.members.push(member);
        self
    }

    /// Shorthand for a plain read/write member.
    pub fn field(self, name: impl Into<String>, ty: TypeRef) -> Self {
        self.member(MemberDescriptor::new(name, ty))
    }

    pub fn constructor(mut self, constructor: ConstructorDescriptor) -> Self {
        self.shape.constructor = Some(constructor);
        self
    }

    /// The type can only be built through its constructor.
    pub fn no_default(mut self) -> Self {
        self.shape.default_constructible = false;
        self
    }

    pub fn build(self) -> TypeRef {
        TypeDescriptor::new(self.name, TypeKind::Object(self.shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_names() {
        let ty = TypeDescriptor::map(
            TypeDescriptor::string(),
            TypeDescriptor::list(TypeDescriptor::optional(TypeDescriptor::i32())),
        );
        assert_eq!(ty.name, "Map<String, Vec<Option<i32>>>");
        assert_eq!(TypeDescriptor::array(TypeDescriptor::u8(), 4).name, "[u8; 4]");
    }

    #[test]
    fn underlying_strips_optional_layers() {
        let ty = TypeDescriptor::optional(TypeDescriptor::optional(TypeDescriptor::bool()));
        assert_eq!(ty.underlying().name, "bool");
        assert!(ty.is_nullable());
        assert!(!ty.underlying().is_nullable());
    }

    #[test]
    fn member_write_uses_setter_when_present() {
        let member = MemberDescriptor::new("celsius", TypeDescriptor::f64()).setter(|obj, v| {
            let c = v.as_f64().ok_or_else(|| Error::msg("not a number"))?;
            obj.set("kelvin", Value::Float(c + 273.15));
            Ok(())
        });
        let mut obj = Object::new("Temperature");
        member.write(&mut obj, Value::Float(0.0)).unwrap();
        assert_eq!(obj.get("kelvin"), Some(&Value::Float(273.15)));
        assert!(obj.get("celsius").is_none());
        assert!(member.write(&mut obj, Value::str("hot")).is_err());
    }

    #[test]
    fn accepts_checks_outer_shape_and_width() {
        assert!(TypeDescriptor::i32().accepts(&Value::UInt(7)));
        assert!(!TypeDescriptor::i32().accepts(&Value::Int(i64::from(i32::MAX) + 1)));
        assert!(!TypeDescriptor::u8().accepts(&Value::Int(-1)));
        assert!(!TypeDescriptor::i32().accepts(&Value::str("7")));
        assert!(!TypeDescriptor::string().accepts(&Value::Null));
        assert!(TypeDescriptor::optional(TypeDescriptor::string()).accepts(&Value::Null));
        assert!(TypeDescriptor::list(TypeDescriptor::i32()).accepts(&Value::list(vec![])));
        assert!(!TypeDescriptor::array(TypeDescriptor::i32(), 2).accepts(&Value::list(vec![1i64.into()])));
        assert!(!TypeDescriptor::f32().accepts(&Value::Float(1e39)));

        let point = TypeDescriptor::object("Point").build();
        assert!(point.accepts(&Value::object(Object::new("Point"))));
        assert!(!point.accepts(&Value::object(Object::new("Line"))));
    }

    #[test]
    fn conform_switches_numeric_representation() {
        assert_eq!(TypeDescriptor::u64().conform(Value::Int(5)), Some(Value::UInt(5)));
        assert_eq!(TypeDescriptor::i64().conform(Value::UInt(5)), Some(Value::Int(5)));
        assert_eq!(TypeDescriptor::f64().conform(Value::Int(2)), Some(Value::Float(2.0)));
        assert_eq!(
            TypeDescriptor::optional(TypeDescriptor::u8()).conform(Value::Int(3)),
            Some(Value::UInt(3))
        );
        assert_eq!(TypeDescriptor::bool().conform(Value::Int(1)), None);
    }

    #[test]
    fn defaults_fall_back_to_zero_values() {
        let plain = MemberDescriptor::new("n", TypeDescriptor::u64());
        assert_eq!(plain.default_of(), Value::UInt(0));
        let annotated = MemberDescriptor::new("n", TypeDescriptor::u64()).default_value(|| 7u64.into());
        assert_eq!(annotated.default_of(), Value::UInt(7));
    }
}
