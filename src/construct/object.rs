//! Object strategies: annotated constructors and member-by-member writing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ahash::{AHashMap, AHashSet};

use crate::construct::{Construction, NodeDeserializer, next_scalar};
use crate::deferred::{Constructed, Deferred};
use crate::error::Error;
use crate::events::{EventKind, EventSource, skip_node};
use crate::location::Span;
use crate::options::DuplicateKeyPolicy;
use crate::types::{Access, ConstructorDescriptor, TypeRef};
use crate::value::{Object, Value};

/// What to do with a key seen before in the same mapping.
enum Repeat {
    First,
    Skip,
    Overwrite,
}

fn check_repeat(
    seen: &mut AHashSet<String>,
    key: &str,
    policy: DuplicateKeyPolicy,
    span: Span,
) -> Result<Repeat, Error> {
    if seen.insert(key.to_owned()) {
        return Ok(Repeat::First);
    }
    match policy {
        DuplicateKeyPolicy::Error => Err(Error::duplicate_key(key).with_span(span)),
        DuplicateKeyPolicy::FirstWins => Ok(Repeat::Skip),
        DuplicateKeyPolicy::LastWins => Ok(Repeat::Overwrite),
    }
}

/// Objects built through their designated constructor: keys are matched against the
/// constructor parameters, and the constructor runs once every argument is known.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConstructorStrategy;

impl NodeDeserializer for ConstructorStrategy {
    fn construct(
        &self,
        events: &mut dyn EventSource,
        ty: &TypeRef,
        ctx: &mut Construction<'_>,
    ) -> Result<Option<Constructed>, Error> {
        let target = ty.underlying();
        let Some(ctor) = target.constructor() else {
            return Ok(None);
        };
        if !events.accept(EventKind::MappingStart)? {
            return Ok(None);
        }
        let start = events.expect(EventKind::MappingStart)?.span();
        let cfg = *ctx.cfg();
        let naming = ctx.naming();
        let names: Vec<String> = ctor.params.iter().map(|p| naming.apply(&p.name)).collect();

        let mut args: Vec<Option<Constructed>> = vec![None; ctor.params.len()];
        let mut seen = AHashSet::new();
        while !events.try_consume(EventKind::MappingEnd)? {
            if !events.accept(EventKind::Scalar)? {
                let found = events.peek_required()?;
                return Err(Error::shape(format!(
                    "mapping keys of `{}` must be scalars, found {}",
                    target.name,
                    found.kind().name()
                ))
                .with_span(found.span()));
            }
            let key = next_scalar(events)?;
            let Some(index) = names.iter().position(|n| *n == key.value) else {
                if cfg.ignore_unmatched {
                    skip_node(events)?;
                    continue;
                }
                return Err(Error::shape(format!(
                    "`{}` has no constructor parameter named `{}`",
                    target.name, key.value
                ))
                .with_span(key.span));
            };
            if let Repeat::Skip = check_repeat(&mut seen, &key.value, cfg.dup_policy, key.span)? {
                skip_node(events)?;
                continue;
            }
            args[index] = Some(ctx.nested(events, &ctor.params[index].ty)?);
        }

        for (slot, param) in args.iter_mut().zip(&ctor.params) {
            if slot.is_some() {
                continue;
            }
            let fallback = match &param.default {
                Some(default) => default(),
                None if !param.required || cfg.ignore_unmatched => param.ty.zero_value(),
                None => {
                    return Err(Error::shape(format!(
                        "missing required parameter `{}` of `{}`",
                        param.name, target.name
                    ))
                    .with_span(start));
                }
            };
            *slot = Some(Constructed::Value(fallback));
        }

        let args: Vec<Constructed> = args.into_iter().flatten().collect();
        Ok(Some(invoke(ctor, &target.name, args, start)?))
    }
}

/// Run the constructor now, or once the last deferred argument fills.
fn invoke(
    ctor: &ConstructorDescriptor,
    type_name: &str,
    args: Vec<Constructed>,
    span: Span,
) -> Result<Constructed, Error> {
    let pending = args.iter().filter(|a| a.is_deferred()).count();
    if pending == 0 {
        let values = args
            .into_iter()
            .map(|a| match a {
                Constructed::Value(v) => v,
                Constructed::Deferred(_) => Value::Null,
            })
            .collect();
        let value = (ctor.build)(values).map_err(|e| Error::construction(type_name, e, span))?;
        return Ok(value.into());
    }

    let result = Deferred::new();
    let remaining = Rc::new(Cell::new(pending));
    let mut ready = Vec::with_capacity(args.len());
    let mut cells = Vec::with_capacity(pending);
    for (index, arg) in args.into_iter().enumerate() {
        match arg {
            Constructed::Value(v) => ready.push(v),
            Constructed::Deferred(cell) => {
                ready.push(Value::Null);
                cells.push((index, cell));
            }
        }
    }
    // A cell may be filled already; ready arguments must be in place first.
    let values = Rc::new(RefCell::new(ready));
    for (index, cell) in cells {
        let remaining = Rc::clone(&remaining);
        let values = Rc::clone(&values);
        let result = result.clone();
        let build = ctor.build.clone();
        let type_name = type_name.to_owned();
        cell.subscribe(move |v| {
            values.borrow_mut()[index] = v.clone();
            remaining.set(remaining.get() - 1);
            if remaining.get() > 0 {
                return Ok(());
            }
            let args = std::mem::take(&mut *values.borrow_mut());
            let value = build(args).map_err(|e| Error::construction(type_name, e, span))?;
            result.fill(value)
        })?;
    }
    Ok(Constructed::Deferred(result))
}

/// Objects created empty and filled member by member (the fallback strategy).
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjectStrategy;

impl NodeDeserializer for ObjectStrategy {
    fn construct(
        &self,
        events: &mut dyn EventSource,
        ty: &TypeRef,
        ctx: &mut Construction<'_>,
    ) -> Result<Option<Constructed>, Error> {
        let target = ty.underlying();
        if !target.is_default_constructible() || !events.accept(EventKind::MappingStart)? {
            return Ok(None);
        }
        let start = events.expect(EventKind::MappingStart)?.span();
        let cfg = *ctx.cfg();
        let members = ctx.members().member_set(target, Access::Write)?;

        let mut instance = Object::new(target.name.clone());
        for member in members.iter().filter(|m| m.setter.is_none()) {
            instance.set(member.field.as_str(), member.default_of());
        }
        let object = Rc::new(RefCell::new(instance));

        let mut seen = AHashSet::new();
        let mut generations: AHashMap<String, Rc<Cell<u32>>> = AHashMap::new();
        while !events.try_consume(EventKind::MappingEnd)? {
            if !events.accept(EventKind::Scalar)? {
                let found = events.peek_required()?;
                return Err(Error::shape(format!(
                    "mapping keys of `{}` must be scalars, found {}",
                    target.name,
                    found.kind().name()
                ))
                .with_span(found.span()));
            }
            let key = next_scalar(events)?;
            let Some(member) = members.get(&key.value) else {
                if cfg.ignore_unmatched {
                    skip_node(events)?;
                    continue;
                }
                return Err(Error::shape(format!(
                    "property `{}` not found on type `{}`",
                    key.value, target.name
                ))
                .with_span(key.span));
            };
            if let Repeat::Skip = check_repeat(&mut seen, &key.value, cfg.dup_policy, key.span)? {
                skip_node(events)?;
                continue;
            }

            // A value that arrives late is dropped if a later key wrote the member.
            let generation = Rc::clone(generations.entry(member.name.clone()).or_default());
            generation.set(generation.get() + 1);
            let mine = generation.get();

            let member = member.clone();
            let type_name = target.name.clone();
            let key_span = key.span;
            let instance = Rc::clone(&object);
            ctx.nested(events, &member.ty)?.when_ready(move |v| {
                if generation.get() != mine {
                    return Ok(());
                }
                member
                    .write(&mut instance.borrow_mut(), v)
                    .map_err(|e| Error::construction(type_name, e, key_span))
            })?;
        }

        if !cfg.ignore_unmatched
            && let Some(missing) = members
                .iter()
                .find(|m| m.annotations.required && !seen.contains(&m.name))
        {
            return Err(Error::shape(format!(
                "missing required member `{}` of `{}`",
                missing.name, target.name
            ))
            .with_span(start));
        }
        Ok(Some(Value::Object(object).into()))
    }
}
