//! Values back to events.
//!
//! Shared containers (the same `Rc` reached twice, cycles included) are numbered in a
//! first pass; the second pass emits each of them once with an anchor and later
//! occurrences as aliases. Anchor names are `a1`, `a2`, ... in emission order.

use std::collections::HashMap;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use nohash_hasher::BuildNoHashHasher;
use tracing::trace;

use crate::construct::TypeConverter;
use crate::error::Error;
use crate::events::{CollectionStyle, Event, ScalarStyle};
use crate::location::Span;
use crate::parse_scalars::{classify_int, is_bool, is_float, is_null};
use crate::recursion::RecursionLevel;
use crate::tags::{CoreTag, TAG_BINARY, TYPE_NAME_TAG_PREFIX};
use crate::types::{
    Access, DefaultHandling, FloatWidth, MemberResolver, TypeDescriptor, TypeKind, TypeRef,
    TypeRegistry,
};
use crate::value::{Object, Value};
use crate::zmij_format::{float_string, push_float_string};

type IdentityMap<V> = HashMap<usize, V, BuildNoHashHasher<usize>>;

/// True if a plain scalar with this text would not load back as a string.
pub(crate) fn needs_quotes(text: &str) -> bool {
    text.is_empty()
        || is_null(text)
        || is_bool(text)
        || classify_int(text).is_some()
        || is_float(text)
}

pub(crate) struct Representer<'c> {
    members: &'c dyn MemberResolver,
    registry: &'c TypeRegistry,
    converters: &'c [Arc<dyn TypeConverter>],
    visits: IdentityMap<usize>,
    anchors: IdentityMap<String>,
    next_anchor: usize,
    recursion: RecursionLevel,
    out: Vec<Event>,
}

impl<'c> Representer<'c> {
    pub(crate) fn new(
        members: &'c dyn MemberResolver,
        registry: &'c TypeRegistry,
        converters: &'c [Arc<dyn TypeConverter>],
        max_depth: usize,
    ) -> Self {
        Self {
            members,
            registry,
            converters,
            visits: HashMap::with_hasher(BuildNoHashHasher::default()),
            anchors: HashMap::with_hasher(BuildNoHashHasher::default()),
            next_anchor: 1,
            recursion: RecursionLevel::new(max_depth),
            out: Vec::new(),
        }
    }

    /// Events of one document holding `value`.
    pub(crate) fn document(mut self, value: &Value, ty: &TypeRef) -> Result<Vec<Event>, Error> {
        self.count(value)?;
        self.out.push(Event::document_start());
        self.node(value, ty, None)?;
        self.out.push(Event::document_end());
        Ok(self.out)
    }

    fn count(&mut self, value: &Value) -> Result<(), Error> {
        let Some(id) = value.identity() else {
            return Ok(());
        };
        let seen = self.visits.entry(id).or_insert(0);
        *seen += 1;
        if *seen > 1 {
            return Ok(());
        }
        self.recursion.increment(Span::UNKNOWN)?;
        match value {
            Value::List(items) => {
                for item in items.borrow().iter() {
                    self.count(item)?;
                }
            }
            Value::Set(items) => {
                for item in items.borrow().iter() {
                    self.count(item)?;
                }
            }
            Value::Map(entries) => {
                for (k, v) in entries.borrow().iter() {
                    self.count(k)?;
                    self.count(v)?;
                }
            }
            Value::Object(object) => {
                for v in object.borrow().fields.values() {
                    self.count(v)?;
                }
            }
            _ => {}
        }
        self.recursion.decrement();
        Ok(())
    }

    /// Anchor for the first emission of a shared container; `None` after pushing an
    /// alias for a container emitted already.
    fn occurrence(&mut self, value: &Value) -> Option<Option<String>> {
        let Some(id) = value.identity() else {
            return Some(None);
        };
        if self.visits.get(&id).copied().unwrap_or(0) < 2 {
            return Some(None);
        }
        if let Some(name) = self.anchors.get(&id) {
            self.out.push(Event::alias(name.clone()));
            return None;
        }
        let name = format!("a{}", self.next_anchor);
        self.next_anchor += 1;
        trace!(anchor = %name, "anchor assigned to shared value");
        self.anchors.insert(id, name.clone());
        Some(Some(name))
    }

    fn node(&mut self, value: &Value, ty: &TypeRef, style: Option<ScalarStyle>) -> Result<(), Error> {
        let target = ty.underlying();
        if let Some(converter) = self.converters.iter().find(|c| c.accepts(target)) {
            return converter.write(value, target, &mut self.out);
        }
        let Some(anchor) = self.occurrence(value) else {
            return Ok(());
        };
        match value {
            Value::Null => self.scalar("null", ScalarStyle::Plain),
            Value::Bool(b) => self.scalar(if *b { "true" } else { "false" }, ScalarStyle::Plain),
            Value::Int(i) => self.scalar(&i.to_string(), ScalarStyle::Plain),
            Value::UInt(u) => self.scalar(&u.to_string(), ScalarStyle::Plain),
            Value::Float(f) => {
                let text = match target.kind {
                    TypeKind::Float(FloatWidth::F32) => float_string(*f as f32),
                    _ => {
                        let mut s = String::new();
                        push_float_string(&mut s, *f);
                        s
                    }
                };
                self.scalar(&text, ScalarStyle::Plain);
            }
            Value::Str(s) => self.text(s, style),
            Value::Char(c) => self.text(&c.to_string(), style),
            Value::Variant(v) => self.text(v, style),
            Value::Bytes(bytes) => {
                self.out.push(Event::Scalar {
                    value: B64.encode(bytes),
                    style: ScalarStyle::Plain,
                    tag: Some(TAG_BINARY.to_owned()),
                    anchor: None,
                    span: Span::UNKNOWN,
                });
            }
            Value::List(items) => {
                let item_ty = target.item_type().cloned().unwrap_or_else(TypeDescriptor::any);
                self.sequence(anchor, &item_ty, items.borrow().iter())?;
            }
            Value::Set(items) => {
                let item_ty = target.item_type().cloned().unwrap_or_else(TypeDescriptor::any);
                if target.is_any() {
                    // Untyped sets keep their kind through `!!set`.
                    self.recursion.increment(Span::UNKNOWN)?;
                    self.out.push(mapping_start(anchor, Some(CoreTag::Set.canonical().to_owned())));
                    for item in items.borrow().iter() {
                        self.node(item, &item_ty, None)?;
                        self.scalar("null", ScalarStyle::Plain);
                    }
                    self.out.push(Event::mapping_end());
                    self.recursion.decrement();
                } else {
                    self.sequence(anchor, &item_ty, items.borrow().iter())?;
                }
            }
            Value::Map(entries) => {
                let (key_ty, value_ty) = match target.key_value_types() {
                    Some((k, v)) => (k.clone(), v.clone()),
                    None => (TypeDescriptor::any(), TypeDescriptor::any()),
                };
                self.recursion.increment(Span::UNKNOWN)?;
                self.out.push(mapping_start(anchor, None));
                for (k, v) in entries.borrow().iter() {
                    self.node(k, &key_ty, None)?;
                    self.node(v, &value_ty, None)?;
                }
                self.out.push(Event::mapping_end());
                self.recursion.decrement();
            }
            Value::Object(object) => self.object(&object.borrow(), target, anchor)?,
        }
        Ok(())
    }

    fn scalar(&mut self, text: &str, style: ScalarStyle) {
        self.out.push(Event::styled_scalar(text, style));
    }

    /// String-like scalar; a requested plain style yields to quoting when needed.
    fn text(&mut self, text: &str, style: Option<ScalarStyle>) {
        let quoted = needs_quotes(text);
        let style = match style {
            Some(s) if !(quoted && s.is_plain()) => s,
            _ if quoted => ScalarStyle::DoubleQuoted,
            _ => ScalarStyle::Plain,
        };
        self.scalar(text, style);
    }

    fn sequence<'v>(
        &mut self,
        anchor: Option<String>,
        item_ty: &TypeRef,
        items: impl Iterator<Item = &'v Value>,
    ) -> Result<(), Error> {
        self.recursion.increment(Span::UNKNOWN)?;
        self.out.push(Event::SequenceStart {
            style: CollectionStyle::Any,
            tag: None,
            anchor,
            span: Span::UNKNOWN,
        });
        for item in items {
            self.node(item, item_ty, None)?;
        }
        self.out.push(Event::sequence_end());
        self.recursion.decrement();
        Ok(())
    }

    fn object(&mut self, object: &Object, target: &TypeRef, anchor: Option<String>) -> Result<(), Error> {
        let described = if target.name == object.type_name && target.object_shape().is_some() {
            Some((target.clone(), None))
        } else {
            self.registry.get(&object.type_name).map(|ty| {
                let tag = format!("{TYPE_NAME_TAG_PREFIX}{}", object.type_name);
                (ty.clone(), Some(tag))
            })
        };
        self.recursion.increment(Span::UNKNOWN)?;
        match described {
            Some((ty, tag)) => {
                let members = self.members.member_set(&ty, Access::Read)?;
                self.out.push(mapping_start(anchor, tag));
                for member in members.iter() {
                    let value = object.fields.get(&member.field).cloned().unwrap_or_default();
                    let omit = match member.annotations.default_handling {
                        DefaultHandling::Preserve => false,
                        DefaultHandling::OmitNull => value.is_null(),
                        DefaultHandling::OmitDefaults => value == member.default_of(),
                        DefaultHandling::OmitEmptyCollections => {
                            value.is_container() && value.len() == Some(0)
                        }
                    };
                    if omit {
                        continue;
                    }
                    self.scalar(&member.name, ScalarStyle::Plain);
                    self.node(&value, &member.ty, member.annotations.scalar_style)?;
                }
            }
            None => {
                self.out.push(mapping_start(anchor, None));
                let any = TypeDescriptor::any();
                for (name, value) in &object.fields {
                    self.text(name, None);
                    self.node(value, &any, None)?;
                }
            }
        }
        self.out.push(Event::mapping_end());
        self.recursion.decrement();
        Ok(())
    }
}

fn mapping_start(anchor: Option<String>, tag: Option<String>) -> Event {
    Event::MappingStart {
        style: CollectionStyle::Any,
        tag,
        anchor,
        span: Span::UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_strings_are_quoted() {
        for text in ["", "~", "null", "true", "yes", "Off", "12", "0x1F", "1.5", ".inf"] {
            assert!(needs_quotes(text), "{text}");
        }
        for text in ["hello", "12 apples", "truthy"] {
            assert!(!needs_quotes(text), "{text}");
        }
    }
}
