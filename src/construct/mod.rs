//! Event-driven value construction.
//!
//! A [`Construction`] walks the events of one document. For every node it resolves
//! the concrete target type, then offers the node to the strategy chain; the first
//! [`NodeDeserializer`] that claims the node consumes exactly its events and returns a
//! [`Constructed`] value.
//!
//! Anchors and aliases
//! - An anchored node registers a pending cell before it is built, so aliases inside
//!   the node itself (cycles) and aliases met before the node (forward references)
//!   receive a [`Deferred`] that fills when the node completes.
//! - An alias to a finished node returns the stored value; containers are shared, not
//!   copied. The value must fit the type expected at the alias, otherwise the alias
//!   is a shape error.
//! - Cells still unfilled when the document ends name anchors that were never defined.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashMap;
use tracing::trace;

use crate::deferred::{Constructed, Deferred};
use crate::error::Error;
use crate::events::{Event, EventKind, EventSource, ScalarStyle};
use crate::location::Span;
use crate::options::Cfg;
use crate::recursion::RecursionLevel;
use crate::types::{MemberResolver, NamingConvention, ResolveRequest, TypeRef, TypeResolver};
use crate::value::Value;

mod collections;
mod converter;
mod object;
mod scalar;

pub use collections::{ArrayStrategy, ListStrategy, MapStrategy, SetStrategy};
pub use converter::{ConverterStrategy, TypeConverter};
pub use object::{ConstructorStrategy, ObjectStrategy};
pub use scalar::{NullStrategy, ScalarStrategy};

/// One construction strategy.
///
/// A strategy inspects the next event with `peek` and either declines (`Ok(None)`,
/// nothing consumed) or consumes every event of the node and returns the result.
pub trait NodeDeserializer: Send + Sync {
    fn construct(
        &self,
        events: &mut dyn EventSource,
        ty: &TypeRef,
        ctx: &mut Construction<'_>,
    ) -> Result<Option<Constructed>, Error>;
}

enum AnchorSlot {
    Ready(Value),
    /// Cell awaiting the anchored node, and the first alias that asked for it.
    Pending {
        cell: Deferred<Value>,
        alias_span: Span,
    },
}

type AnchorTable = Rc<RefCell<AHashMap<String, AnchorSlot>>>;

/// Everything a strategy may consult while constructing.
pub(crate) struct Services<'c> {
    pub(crate) resolvers: &'c [Box<dyn TypeResolver>],
    pub(crate) strategies: &'c [Box<dyn NodeDeserializer>],
    pub(crate) members: &'c dyn MemberResolver,
    pub(crate) naming: &'c dyn NamingConvention,
}

/// State of one document construction.
pub struct Construction<'c> {
    services: Services<'c>,
    cfg: Cfg,
    anchors: AnchorTable,
    recursion: RecursionLevel,
    key_requested: bool,
    in_key: bool,
}

/// Scalar event taken apart.
pub(crate) struct ScalarEvent {
    pub(crate) value: String,
    pub(crate) style: ScalarStyle,
    pub(crate) tag: Option<String>,
    pub(crate) span: Span,
}

/// Consume the next event, which must be a scalar.
pub(crate) fn next_scalar(events: &mut dyn EventSource) -> Result<ScalarEvent, Error> {
    match events.next()? {
        Some(Event::Scalar {
            value,
            style,
            tag,
            span,
            ..
        }) => Ok(ScalarEvent {
            value,
            style,
            tag,
            span,
        }),
        Some(other) => Err(Error::unexpected("scalar", other.kind().name()).with_span(other.span())),
        None => Err(Error::eof().with_span(events.last_span())),
    }
}

impl<'c> Construction<'c> {
    pub(crate) fn new(services: Services<'c>, cfg: Cfg) -> Self {
        Self {
            services,
            cfg,
            anchors: Rc::new(RefCell::new(AHashMap::new())),
            recursion: RecursionLevel::new(cfg.max_recursion),
            key_requested: false,
            in_key: false,
        }
    }

    pub(crate) fn cfg(&self) -> &Cfg {
        &self.cfg
    }

    pub(crate) fn members(&self) -> &'c dyn MemberResolver {
        self.services.members
    }

    pub(crate) fn naming(&self) -> &'c dyn NamingConvention {
        self.services.naming
    }

    /// True while the current node is a mapping key of an untyped map.
    pub(crate) fn in_key(&self) -> bool {
        self.in_key
    }

    /// Construct one document: optional stream and document markers around one node.
    ///
    /// An empty document yields `Value::Null`.
    pub fn construct(&mut self, events: &mut dyn EventSource, ty: &TypeRef) -> Result<Value, Error> {
        events.try_consume(EventKind::StreamStart)?;
        let explicit_doc = events.try_consume(EventKind::DocumentStart)?;
        let at_end = match events.peek()? {
            None => true,
            Some(ev) => matches!(ev.kind(), EventKind::DocumentEnd | EventKind::StreamEnd),
        };
        let constructed = if at_end {
            Constructed::Value(Value::Null)
        } else {
            self.nested(events, ty)?
        };
        if explicit_doc {
            events.expect(EventKind::DocumentEnd)?;
        }
        events.try_consume(EventKind::StreamEnd)?;
        self.finish(constructed)
    }

    /// Report unresolved aliases and unwrap the result.
    pub(crate) fn finish(&mut self, constructed: Constructed) -> Result<Value, Error> {
        let mut unresolved: Vec<(Span, String)> = self
            .anchors
            .borrow()
            .iter()
            .filter_map(|(name, slot)| match slot {
                AnchorSlot::Pending { cell, alias_span } if !cell.is_filled() => {
                    Some((*alias_span, name.clone()))
                }
                _ => None,
            })
            .collect();
        unresolved.sort_by_key(|(span, name)| (span.start.line, span.start.column, name.clone()));
        if let Some((span, name)) = unresolved.into_iter().next() {
            return Err(Error::unknown_anchor(name).with_span(span));
        }
        match constructed {
            Constructed::Value(value) => Ok(value),
            Constructed::Deferred(cell) => {
                let out = Rc::new(RefCell::new(None));
                let sink = Rc::clone(&out);
                cell.subscribe(move |v| {
                    *sink.borrow_mut() = Some(v.clone());
                    Ok(())
                })?;
                let value = out.borrow_mut().take();
                value.ok_or_else(|| Error::msg("document root was never resolved"))
            }
        }
    }

    /// Construct the node at the current position. Used by strategies for members and
    /// items; the result may be deferred.
    pub fn nested(&mut self, events: &mut dyn EventSource, ty: &TypeRef) -> Result<Constructed, Error> {
        let span = events.peek_required()?.span();
        self.recursion.increment(span)?;
        let result = self.nested_inner(events, ty);
        self.recursion.decrement();
        result
    }

    /// Like [`Construction::nested`] for a mapping key: untyped scalar keys stay strings.
    pub fn nested_key(&mut self, events: &mut dyn EventSource, ty: &TypeRef) -> Result<Constructed, Error> {
        self.key_requested = ty.underlying().is_any();
        self.nested(events, ty)
    }

    /// Construct a node whose value is needed now. A forward reference is an error naming
    /// `container`, the type that cannot be patched later.
    pub fn nested_value(
        &mut self,
        events: &mut dyn EventSource,
        ty: &TypeRef,
        container: &TypeRef,
    ) -> Result<Value, Error> {
        let span = events.peek_required()?.span();
        match self.nested(events, ty)? {
            Constructed::Value(value) => Ok(value),
            Constructed::Deferred(_) => {
                Err(Error::forward_reference(container.name.clone()).with_span(span))
            }
        }
    }

    fn nested_inner(&mut self, events: &mut dyn EventSource, ty: &TypeRef) -> Result<Constructed, Error> {
        let (kind, span, anchor, tag) = {
            let ev = events.peek_required()?;
            (
                ev.kind(),
                ev.span(),
                ev.anchor().map(str::to_owned),
                ev.tag().map(str::to_owned),
            )
        };
        let as_key = std::mem::take(&mut self.key_requested);

        if kind == EventKind::Alias {
            let Some(Event::Alias { name, span }) = events.next()? else {
                return Err(Error::unexpected("alias", kind.name()).with_span(span));
            };
            return self.resolve_alias(name, span, ty);
        }
        if !kind.starts_node() {
            return Err(Error::unexpected("node", kind.name()).with_span(span));
        }

        let pending = anchor.map(|name| {
            let cell = self.begin_anchor(&name);
            (name, cell)
        });

        let resolved = self.resolve_type(ty, tag.as_deref(), kind);
        self.in_key = as_key;
        let mut claimed = None;
        for strategy in self.services.strategies {
            if let Some(done) = strategy.construct(events, &resolved, self)? {
                claimed = Some(done);
                break;
            }
        }
        self.in_key = false;
        let Some(constructed) = claimed else {
            return Err(Error::shape(format!(
                "unable to deserialize `{}` from {}",
                resolved.name,
                kind.name()
            ))
            .with_span(span));
        };

        if let Some((name, cell)) = pending {
            self.finish_anchor(name, cell, &constructed)?;
        }
        Ok(constructed)
    }

    fn resolve_type(&self, expected: &TypeRef, tag: Option<&str>, kind: EventKind) -> TypeRef {
        let request = ResolveRequest {
            expected,
            tag,
            kind,
        };
        self.services
            .resolvers
            .iter()
            .find_map(|r| r.resolve(&request))
            .unwrap_or_else(|| expected.clone())
    }

    /// The anchored value checked against the type expected at the alias; a value that
    /// is not built yet is checked when its cell fills.
    fn resolve_alias(&mut self, name: String, span: Span, ty: &TypeRef) -> Result<Constructed, Error> {
        let found = {
            let mut anchors = self.anchors.borrow_mut();
            match anchors.get(&name) {
                Some(AnchorSlot::Ready(value)) => Constructed::Value(value.clone()),
                Some(AnchorSlot::Pending { cell, .. }) => {
                    trace!(anchor = %name, "alias to an anchor under construction deferred");
                    Constructed::Deferred(cell.clone())
                }
                None => {
                    trace!(anchor = %name, "forward alias deferred");
                    let cell = Deferred::new();
                    anchors.insert(
                        name.clone(),
                        AnchorSlot::Pending {
                            cell: cell.clone(),
                            alias_span: span,
                        },
                    );
                    Constructed::Deferred(cell)
                }
            }
        };
        match found {
            Constructed::Value(value) => conform_alias(&name, ty, value, span).map(Constructed::Value),
            Constructed::Deferred(cell) if ty.is_any() => Ok(Constructed::Deferred(cell)),
            Constructed::Deferred(cell) => {
                let checked = Deferred::new();
                let out = checked.clone();
                let ty = ty.clone();
                cell.subscribe(move |value| out.fill(conform_alias(&name, &ty, value.clone(), span)?))?;
                Ok(Constructed::Deferred(checked))
            }
        }
    }

    /// Register the pending cell of an anchored node, reusing the cell that forward
    /// aliases already hold.
    fn begin_anchor(&mut self, name: &str) -> Deferred<Value> {
        let mut anchors = self.anchors.borrow_mut();
        if let Some(AnchorSlot::Pending { cell, .. }) = anchors.get(name)
            && !cell.is_filled()
        {
            return cell.clone();
        }
        let cell = Deferred::new();
        anchors.insert(
            name.to_owned(),
            AnchorSlot::Pending {
                cell: cell.clone(),
                alias_span: Span::UNKNOWN,
            },
        );
        cell
    }

    fn finish_anchor(
        &mut self,
        name: String,
        cell: Deferred<Value>,
        constructed: &Constructed,
    ) -> Result<(), Error> {
        match constructed {
            Constructed::Value(value) => store_anchor(&self.anchors, name, &cell, value.clone()),
            Constructed::Deferred(inner) => {
                let anchors = Rc::clone(&self.anchors);
                inner.subscribe(move |value| store_anchor(&anchors, name, &cell, value.clone()))
            }
        }
    }
}

fn conform_alias(name: &str, ty: &TypeRef, value: Value, span: Span) -> Result<Value, Error> {
    let kind = value.kind_name();
    ty.conform(value).ok_or_else(|| {
        Error::shape(format!(
            "alias `*{name}` refers to a {kind} value, expected `{}`",
            ty.name
        ))
        .with_span(span)
    })
}

fn store_anchor(
    anchors: &AnchorTable,
    name: String,
    cell: &Deferred<Value>,
    value: Value,
) -> Result<(), Error> {
    trace!(anchor = %name, "pending anchor filled");
    // The table borrow must end before subscribers run: they may resolve more aliases.
    anchors
        .borrow_mut()
        .insert(name, AnchorSlot::Ready(value.clone()));
    // A nested redefinition of the same anchor may have filled the cell already.
    if cell.is_filled() {
        return Ok(());
    }
    cell.fill(value)
}
