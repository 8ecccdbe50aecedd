//! Sequence and mapping strategies: fixed arrays, lists, maps and sets.
//!
//! Lists and maps are patchable: a forward alias among their items becomes a
//! placeholder that a subscriber overwrites once the anchored value exists. Sets are
//! not, because an item's identity is its value.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use indexmap::{IndexMap, IndexSet};

use crate::construct::{Construction, NodeDeserializer};
use crate::deferred::{Constructed, Deferred};
use crate::error::Error;
use crate::events::{EventKind, EventSource};
use crate::location::Span;
use crate::options::DuplicateKeyPolicy;
use crate::types::{TypeDescriptor, TypeKind, TypeRef};
use crate::value::{Shared, Value};

/// Read the items of a sequence into a shared list, patching deferred items in place.
fn read_items(
    events: &mut dyn EventSource,
    item_ty: &TypeRef,
    ctx: &mut Construction<'_>,
) -> Result<Shared<Vec<Value>>, Error> {
    events.expect(EventKind::SequenceStart)?;
    let items: Shared<Vec<Value>> = Rc::new(RefCell::new(Vec::new()));
    while !events.try_consume(EventKind::SequenceEnd)? {
        match ctx.nested(events, item_ty)? {
            Constructed::Value(v) => items.borrow_mut().push(v),
            Constructed::Deferred(cell) => {
                let index = {
                    let mut list = items.borrow_mut();
                    list.push(Value::Null);
                    list.len() - 1
                };
                let target = Rc::clone(&items);
                cell.subscribe(move |v| {
                    target.borrow_mut()[index] = v.clone();
                    Ok(())
                })?;
            }
        }
    }
    Ok(items)
}

/// Fixed-length arrays: a sequence with exactly the declared number of items.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArrayStrategy;

impl NodeDeserializer for ArrayStrategy {
    fn construct(
        &self,
        events: &mut dyn EventSource,
        ty: &TypeRef,
        ctx: &mut Construction<'_>,
    ) -> Result<Option<Constructed>, Error> {
        let TypeKind::Array { item, len } = &ty.underlying().kind else {
            return Ok(None);
        };
        if !events.accept(EventKind::SequenceStart)? {
            return Ok(None);
        }
        let span = events.last_span();
        let items = read_items(events, item, ctx)?;
        let found = items.borrow().len();
        if found != *len {
            return Err(Error::shape(format!(
                "expected {len} items for `{}`, found {found}",
                ty.underlying().name
            ))
            .with_span(span));
        }
        Ok(Some(Value::List(items).into()))
    }
}

/// Ordered collections.
#[derive(Clone, Copy, Debug, Default)]
pub struct ListStrategy;

impl NodeDeserializer for ListStrategy {
    fn construct(
        &self,
        events: &mut dyn EventSource,
        ty: &TypeRef,
        ctx: &mut Construction<'_>,
    ) -> Result<Option<Constructed>, Error> {
        let TypeKind::List(item) = &ty.underlying().kind else {
            return Ok(None);
        };
        if !events.accept(EventKind::SequenceStart)? {
            return Ok(None);
        }
        let items = read_items(events, item, ctx)?;
        Ok(Some(Value::List(items).into()))
    }
}

/// Map under construction. Every stored entry bumps the generation of its key, so a
/// value that arrives late lands only if no later entry replaced it.
struct Entries {
    map: Shared<IndexMap<Value, Value>>,
    generations: RefCell<AHashMap<Value, u32>>,
    policy: DuplicateKeyPolicy,
}

impl Entries {
    fn new(policy: DuplicateKeyPolicy) -> Rc<Self> {
        Rc::new(Self {
            map: Rc::new(RefCell::new(IndexMap::new())),
            generations: RefCell::new(AHashMap::new()),
            policy,
        })
    }

    /// Store one entry according to the duplicate-key policy. Returns the generation of
    /// the stored entry, or `None` if it was dropped because an earlier one wins.
    fn insert(&self, key: Value, value: Value, key_span: Span) -> Result<Option<u32>, Error> {
        let mut entries = self.map.borrow_mut();
        if entries.contains_key(&key) {
            match self.policy {
                DuplicateKeyPolicy::Error => {
                    return Err(Error::duplicate_key(key.to_string()).with_span(key_span));
                }
                DuplicateKeyPolicy::FirstWins => return Ok(None),
                DuplicateKeyPolicy::LastWins => {}
            }
        }
        let mut generations = self.generations.borrow_mut();
        let generation = generations.entry(key.clone()).or_insert(0);
        *generation += 1;
        let current = *generation;
        // `insert` keeps the position of an existing key.
        entries.insert(key, value);
        Ok(Some(current))
    }

    /// Store an entry whose value arrives later.
    fn insert_pending(
        self: &Rc<Self>,
        key: Value,
        cell: Deferred<Value>,
        key_span: Span,
    ) -> Result<(), Error> {
        let Some(generation) = self.insert(key.clone(), Value::Null, key_span)? else {
            return Ok(());
        };
        let entries = Rc::clone(self);
        cell.subscribe(move |v| {
            let current = entries.generations.borrow().get(&key) == Some(&generation);
            if current {
                entries.map.borrow_mut().insert(key, v.clone());
            }
            Ok(())
        })
    }
}

/// Key/value collections.
#[derive(Clone, Copy, Debug, Default)]
pub struct MapStrategy;

impl NodeDeserializer for MapStrategy {
    fn construct(
        &self,
        events: &mut dyn EventSource,
        ty: &TypeRef,
        ctx: &mut Construction<'_>,
    ) -> Result<Option<Constructed>, Error> {
        let Some((key_ty, value_ty)) = ty.underlying().key_value_types() else {
            return Ok(None);
        };
        if !events.accept(EventKind::MappingStart)? {
            return Ok(None);
        }
        events.expect(EventKind::MappingStart)?;
        let entries = Entries::new(ctx.cfg().dup_policy);
        while !events.try_consume(EventKind::MappingEnd)? {
            let key_span = events.peek_required()?.span();
            let key = ctx.nested_key(events, key_ty)?;
            let value = ctx.nested(events, value_ty)?;
            match (key, value) {
                (Constructed::Value(k), Constructed::Value(v)) => {
                    entries.insert(k, v, key_span)?;
                }
                (Constructed::Value(k), Constructed::Deferred(cell)) => {
                    entries.insert_pending(k, cell, key_span)?;
                }
                // The entry is inserted when the key fills, so it lands after the
                // entries already present at that time.
                (Constructed::Deferred(key_cell), value) => {
                    let target = Rc::clone(&entries);
                    key_cell.subscribe(move |k| match value {
                        Constructed::Value(v) => target.insert(k.clone(), v, key_span).map(|_| ()),
                        Constructed::Deferred(cell) => target.insert_pending(k.clone(), cell, key_span),
                    })?;
                }
            }
        }
        let map = Rc::clone(&entries.map);
        Ok(Some(Value::Map(map).into()))
    }
}

/// Generic enumerables (sets), from a sequence or from a `!!set` mapping whose keys are
/// the items.
#[derive(Clone, Copy, Debug, Default)]
pub struct SetStrategy;

impl NodeDeserializer for SetStrategy {
    fn construct(
        &self,
        events: &mut dyn EventSource,
        ty: &TypeRef,
        ctx: &mut Construction<'_>,
    ) -> Result<Option<Constructed>, Error> {
        let target = ty.underlying();
        let TypeKind::Set(item_ty) = &target.kind else {
            return Ok(None);
        };
        let end = if events.accept(EventKind::SequenceStart)? {
            EventKind::SequenceEnd
        } else if events.accept(EventKind::MappingStart)? {
            EventKind::MappingEnd
        } else {
            return Ok(None);
        };
        events.next()?;
        let ignored_value = TypeDescriptor::any();
        let mut items = IndexSet::new();
        while !events.try_consume(end)? {
            let item = if end == EventKind::MappingEnd {
                let key_span = events.peek_required()?.span();
                match ctx.nested_key(events, item_ty)? {
                    Constructed::Value(v) => v,
                    Constructed::Deferred(_) => {
                        return Err(Error::forward_reference(target.name.clone()).with_span(key_span));
                    }
                }
            } else {
                ctx.nested_value(events, item_ty, target)?
            };
            if end == EventKind::MappingEnd {
                // Set entries carry null values; anything else is accepted and dropped.
                ctx.nested(events, &ignored_value)?;
            }
            items.insert(item);
        }
        Ok(Some(Value::set(items).into()))
    }
}
