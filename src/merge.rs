//! YAML merge keys (`<<`).
//!
//! [`MergingEvents`] wraps another [`EventSource`]. On first use it loads the whole
//! stream into documents, folds every `<<` entry into its mapping and replays the
//! result. A merge value is a mapping, an alias of one, or a sequence of those; a null
//! merges nothing. Keys written in the mapping itself override merged keys, and among
//! merge sources the earlier one wins. Merged entries take the place of the `<<` entry.
//!
//! ```rust
//! use saphyr_construct::merge::MergingEvents;
//! use saphyr_construct::{EngineBuilder, ParserEvents, TypeDescriptor, Value};
//!
//! let yaml = "base: &b {x: 1, y: 2}\nown:\n  <<: *b\n  y: 3\n";
//! let engine = EngineBuilder::new().build_local().unwrap();
//! let mut events = MergingEvents::new(ParserEvents::new(yaml), 100);
//! let value = engine.construct_value(&mut events, &TypeDescriptor::any()).unwrap();
//! let own = value.get("own").unwrap();
//! assert_eq!(own.get("x"), Some(Value::Int(1)));
//! assert_eq!(own.get("y"), Some(Value::Int(3)));
//! ```

use ahash::AHashSet;
use tracing::{debug, trace};

use crate::document::{Document, NodeData, NodeId, NodeKind, load_stream};
use crate::error::Error;
use crate::events::{Event, EventSource, ReplayEvents, ScalarStyle};
use crate::location::Span;
use crate::parse_scalars::is_null;

/// Event source that expands merge keys of the wrapped source.
///
/// Duplicate keys other than merged ones are passed through, so the consumer's
/// duplicate-key policy still applies to them.
pub struct MergingEvents<S> {
    inner: S,
    max_depth: usize,
    merged: Option<ReplayEvents>,
}

impl<S: EventSource> MergingEvents<S> {
    /// `max_depth` bounds the nesting of the buffered documents.
    pub fn new(inner: S, max_depth: usize) -> Self {
        Self {
            inner,
            max_depth,
            merged: None,
        }
    }

    fn load(&mut self) -> Result<ReplayEvents, Error> {
        let mut stream = load_stream(&mut self.inner, self.max_depth, false)?;
        let mut folded = 0;
        for doc in &mut stream.documents {
            folded += expand_merges(doc)?;
        }
        debug!(documents = stream.len(), folded, "merge keys expanded");
        Ok(ReplayEvents::new(stream.save(self.max_depth)?))
    }

    fn replay(&mut self) -> Result<&mut ReplayEvents, Error> {
        if self.merged.is_none() {
            self.merged = Some(self.load()?);
        }
        Ok(self.merged.get_or_insert_with(ReplayEvents::default))
    }
}

impl<S: EventSource> EventSource for MergingEvents<S> {
    fn next(&mut self) -> Result<Option<Event>, Error> {
        self.replay()?.next()
    }

    fn peek(&mut self) -> Result<Option<&Event>, Error> {
        self.replay()?.peek()
    }

    fn last_span(&self) -> Span {
        match &self.merged {
            Some(replay) => replay.last_span(),
            None => self.inner.last_span(),
        }
    }
}

/// True for an untagged plain `<<` key.
fn is_merge_key(doc: &Document, id: NodeId) -> bool {
    let node = doc.node(id);
    node.tag.is_none()
        && matches!(
            &node.kind,
            NodeKind::Scalar { value, style: ScalarStyle::Plain | ScalarStyle::Any } if value == "<<"
        )
}

fn has_merge_key(doc: &Document, id: NodeId) -> bool {
    doc.entries(id).iter().any(|(k, _)| is_merge_key(doc, *k))
}

/// Mappings named by the merge value `value`, in precedence order.
fn merge_sources(doc: &Document, value: NodeId) -> Result<Vec<NodeId>, Error> {
    let node = doc.node(value);
    let not_a_mapping = |span: Span| {
        Error::shape("merge value must be a mapping or a sequence of mappings").with_span(span)
    };
    match &node.kind {
        NodeKind::Mapping { .. } => Ok(vec![value]),
        NodeKind::Sequence { items, .. } => items
            .iter()
            .map(|item| match doc.node(*item).kind {
                NodeKind::Mapping { .. } => Ok(*item),
                _ => Err(not_a_mapping(doc.node(*item).span)),
            })
            .collect(),
        NodeKind::Scalar {
            value,
            style: ScalarStyle::Plain | ScalarStyle::Any,
        } if node.tag.is_none() && is_null(value) => Ok(Vec::new()),
        _ => Err(not_a_mapping(node.span)),
    }
}

fn contains_key(doc: &Document, keys: &[NodeId], key: NodeId) -> Result<bool, Error> {
    for k in keys {
        if doc.same_key(*k, key)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Scalar keys are copied so that a merged key is never written as an alias.
fn own_key(doc: &mut Document, key: NodeId) -> NodeId {
    let data = doc.node(key);
    if data.is_container() {
        return key;
    }
    let copy = NodeData {
        anchor: None,
        ..data.clone()
    };
    doc.push(copy)
}

/// Replace the `<<` entries of `map` by the entries they bring in.
fn fold(doc: &mut Document, map: NodeId) -> Result<(), Error> {
    let entries = doc.entries(map).to_vec();
    let own: Vec<NodeId> = entries
        .iter()
        .map(|(k, _)| *k)
        .filter(|k| !is_merge_key(doc, *k))
        .collect();
    let mut merged_keys: Vec<NodeId> = Vec::new();
    let mut folded = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        if !is_merge_key(doc, key) {
            folded.push((key, value));
            continue;
        }
        for source in merge_sources(doc, value)? {
            for (k, v) in doc.entries(source).to_vec() {
                if contains_key(doc, &own, k)? || contains_key(doc, &merged_keys, k)? {
                    continue;
                }
                merged_keys.push(k);
                folded.push((own_key(doc, k), v));
            }
        }
    }
    trace!(mapping = %map, merged = merged_keys.len(), "merge keys folded");
    if let NodeKind::Mapping { entries, .. } = &mut doc.node_mut(map).kind {
        *entries = folded;
    }
    Ok(())
}

/// Fold every merge key of `doc`. A mapping is folded after the mappings it merges
/// from, so merges chain. Returns the number of mappings folded.
pub(crate) fn expand_merges(doc: &mut Document) -> Result<usize, Error> {
    let targets: Vec<NodeId> = (0..doc.len())
        .map(NodeId)
        .filter(|id| has_merge_key(doc, *id))
        .collect();
    let pending: AHashSet<NodeId> = targets.iter().copied().collect();
    let mut done: AHashSet<NodeId> = AHashSet::new();
    let mut open: AHashSet<NodeId> = AHashSet::new();
    for start in &targets {
        let mut stack = vec![(*start, false)];
        while let Some((id, sources_done)) = stack.pop() {
            if done.contains(&id) {
                continue;
            }
            if sources_done {
                fold(doc, id)?;
                open.remove(&id);
                done.insert(id);
                continue;
            }
            open.insert(id);
            stack.push((id, true));
            for (key, value) in doc.entries(id) {
                if !is_merge_key(doc, *key) {
                    continue;
                }
                for source in merge_sources(doc, *value)? {
                    if !pending.contains(&source) || done.contains(&source) {
                        continue;
                    }
                    if open.contains(&source) {
                        return Err(Error::shape("mapping merges into itself")
                            .with_span(doc.node(source).span));
                    }
                    stack.push((source, false));
                }
            }
        }
    }
    Ok(done.len())
}
