//! Building documents from events.
//!
//! Loading is two-pass. While nodes are built, an alias whose anchor is already
//! registered (anchors register when their node starts, so a node may contain itself)
//! becomes a second reference to the target. Any other alias becomes a placeholder node
//! and its container is flagged; once the root is complete, the flagged containers get
//! their placeholders replaced by the targets.

use ahash::{AHashMap, AHashSet};
use tracing::{debug, trace};

use crate::document::{Document, NodeData, NodeId, NodeKind, Stream};
use crate::error::Error;
use crate::events::{Event, EventKind, EventSource};
use crate::location::Span;
use crate::recursion::RecursionLevel;

/// Anchor name to node, plus the containers holding unresolved aliases.
///
/// Lives for one document load.
#[derive(Debug, Default)]
pub struct AnchorTable {
    anchors: AHashMap<String, NodeId>,
    unresolved: Vec<NodeId>,
    keep_duplicate_keys: bool,
}

impl AnchorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or redefine) an anchor. Later aliases see the latest definition.
    pub fn register(&mut self, name: impl Into<String>, id: NodeId) {
        self.anchors.insert(name.into(), id);
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.anchors.get(name).copied()
    }

    /// Remember that `container` holds at least one placeholder.
    pub fn flag(&mut self, container: NodeId) {
        if self.unresolved.last() != Some(&container) {
            self.unresolved.push(container);
        }
    }

    pub fn has_unresolved(&self) -> bool {
        !self.unresolved.is_empty()
    }

    /// Replace the placeholders of every flagged container with the anchored nodes.
    /// Returns the number of references patched; zero when nothing was flagged.
    pub fn resolve(&mut self, doc: &mut Document) -> Result<usize, Error> {
        let mut seen = AHashSet::new();
        let mut patched = 0;
        for container in std::mem::take(&mut self.unresolved) {
            if !seen.insert(container) {
                continue;
            }
            patched += self.resolve_container(doc, container)?;
        }
        Ok(patched)
    }

    fn target(&self, doc: &Document, id: NodeId) -> Result<Option<NodeId>, Error> {
        let node = doc.node(id);
        match &node.kind {
            NodeKind::Alias { name } => match self.lookup(name) {
                Some(target) => Ok(Some(target)),
                None => Err(Error::unknown_anchor(name.clone()).with_span(node.span)),
            },
            _ => Ok(None),
        }
    }

    fn resolve_container(&self, doc: &mut Document, container: NodeId) -> Result<usize, Error> {
        let mut patched = 0;
        match doc.node(container).kind.clone() {
            NodeKind::Sequence { mut items, style } => {
                for item in &mut items {
                    if let Some(target) = self.target(doc, *item)? {
                        *item = target;
                        patched += 1;
                    }
                }
                doc.node_mut(container).kind = NodeKind::Sequence { items, style };
            }
            NodeKind::Mapping { mut entries, style } => {
                let mut key_patched = false;
                for (key, value) in &mut entries {
                    if let Some(target) = self.target(doc, *key)? {
                        *key = target;
                        patched += 1;
                        key_patched = true;
                    }
                    if let Some(target) = self.target(doc, *value)? {
                        *value = target;
                        patched += 1;
                    }
                }
                if key_patched && !self.keep_duplicate_keys {
                    check_unique_keys(doc, &entries)?;
                }
                doc.node_mut(container).kind = NodeKind::Mapping { entries, style };
            }
            NodeKind::Scalar { .. } | NodeKind::Alias { .. } => {}
        }
        Ok(patched)
    }
}

fn check_unique_keys(doc: &Document, entries: &[(NodeId, NodeId)]) -> Result<(), Error> {
    for (i, (key, _)) in entries.iter().enumerate() {
        for (earlier, _) in &entries[..i] {
            if doc.same_key(*earlier, *key)? {
                return Err(Error::duplicate_key(doc.describe(*key)).with_span(doc.node(*key).span));
            }
        }
    }
    Ok(())
}

struct Loader<'e> {
    events: &'e mut dyn EventSource,
    doc: Document,
    anchors: AnchorTable,
    recursion: RecursionLevel,
    unique_keys: bool,
}

/// Container whose end event has not been read yet.
enum Open {
    Sequence {
        id: NodeId,
        items: Vec<NodeId>,
    },
    Mapping {
        id: NodeId,
        entries: Vec<(NodeId, NodeId)>,
        key: Option<NodeId>,
        scalar_keys: AHashSet<(Option<String>, String)>,
    },
}

impl Open {
    fn closed_by(&self, kind: EventKind) -> bool {
        match self {
            Open::Sequence { .. } => kind == EventKind::SequenceEnd,
            Open::Mapping { key, .. } => kind == EventKind::MappingEnd && key.is_none(),
        }
    }
}

impl Loader<'_> {
    fn is_placeholder(&self, id: NodeId) -> bool {
        matches!(self.doc.node(id).kind, NodeKind::Alias { .. })
    }

    /// Read one complete node. Open containers are kept on a heap stack, so nesting
    /// is limited by the recursion bound only.
    fn node(&mut self) -> Result<NodeId, Error> {
        let mut open: Vec<Open> = Vec::new();
        loop {
            let Some(event) = self.events.next()? else {
                return Err(Error::eof().with_span(self.events.last_span()));
            };
            let (kind, span) = (event.kind(), event.span());
            let complete = match event {
                Event::Alias { name, .. } => Some(self.alias(name, span)),
                Event::Scalar {
                    value,
                    style,
                    tag,
                    anchor,
                    ..
                } => Some(self.start(NodeKind::Scalar { value, style }, anchor, tag, span)),
                Event::SequenceStart {
                    style, tag, anchor, ..
                } => {
                    let id = self.start(
                        NodeKind::Sequence {
                            items: Vec::new(),
                            style,
                        },
                        anchor,
                        tag,
                        span,
                    );
                    self.recursion.increment(span)?;
                    open.push(Open::Sequence {
                        id,
                        items: Vec::new(),
                    });
                    None
                }
                Event::MappingStart {
                    style, tag, anchor, ..
                } => {
                    let id = self.start(
                        NodeKind::Mapping {
                            entries: Vec::new(),
                            style,
                        },
                        anchor,
                        tag,
                        span,
                    );
                    self.recursion.increment(span)?;
                    open.push(Open::Mapping {
                        id,
                        entries: Vec::new(),
                        key: None,
                        scalar_keys: AHashSet::new(),
                    });
                    None
                }
                _ => match open.pop() {
                    Some(frame) if frame.closed_by(kind) => {
                        self.recursion.decrement();
                        Some(self.close(frame))
                    }
                    _ => return Err(Error::unexpected("node", kind.name()).with_span(span)),
                },
            };
            if let Some(id) = complete {
                match open.last_mut() {
                    Some(parent) => self.attach(parent, id)?,
                    None => return Ok(id),
                }
            }
        }
    }

    fn alias(&mut self, name: String, span: Span) -> NodeId {
        if let Some(target) = self.anchors.lookup(&name) {
            return target;
        }
        trace!(anchor = %name, "forward alias left as a placeholder");
        let mut data = NodeData::new(NodeKind::Alias { name });
        data.span = span;
        self.doc.push(data)
    }

    fn attach(&mut self, parent: &mut Open, child: NodeId) -> Result<(), Error> {
        match parent {
            Open::Sequence { id, items } => {
                if self.is_placeholder(child) {
                    self.anchors.flag(*id);
                }
                items.push(child);
            }
            Open::Mapping {
                id,
                entries,
                key,
                scalar_keys,
            } => match key.take() {
                None => *key = Some(child),
                Some(key) => {
                    if self.is_placeholder(key) || self.is_placeholder(child) {
                        self.anchors.flag(*id);
                    }
                    if self.unique_keys && !self.is_placeholder(key) {
                        self.check_new_key(key, entries, scalar_keys)?;
                    }
                    entries.push((key, child));
                }
            },
        }
        Ok(())
    }

    fn close(&mut self, frame: Open) -> NodeId {
        match frame {
            Open::Sequence { id, items } => {
                if let NodeKind::Sequence { items: slot, .. } = &mut self.doc.node_mut(id).kind {
                    *slot = items;
                }
                id
            }
            Open::Mapping { id, entries, .. } => {
                if let NodeKind::Mapping { entries: slot, .. } = &mut self.doc.node_mut(id).kind {
                    *slot = entries;
                }
                id
            }
        }
    }

    fn start(
        &mut self,
        kind: NodeKind,
        anchor: Option<String>,
        tag: Option<String>,
        span: Span,
    ) -> NodeId {
        let id = self.doc.push(NodeData {
            kind,
            anchor: anchor.clone(),
            tag,
            span,
        });
        if let Some(name) = anchor {
            self.anchors.register(name, id);
        }
        id
    }

    fn check_new_key(
        &self,
        key: NodeId,
        entries: &[(NodeId, NodeId)],
        scalar_keys: &mut AHashSet<(Option<String>, String)>,
    ) -> Result<(), Error> {
        let node = self.doc.node(key);
        let duplicate = match &node.kind {
            NodeKind::Scalar { value, .. } => !scalar_keys.insert((node.tag.clone(), value.clone())),
            _ => {
                let mut found = false;
                for (earlier, _) in entries {
                    if !self.is_placeholder(*earlier) && self.doc.same_key(*earlier, key)? {
                        found = true;
                        break;
                    }
                }
                found
            }
        };
        if duplicate {
            return Err(Error::duplicate_key(self.doc.describe(key)).with_span(node.span));
        }
        Ok(())
    }
}

impl Document {
    /// Load one document: optional stream and document markers around one node.
    pub fn load(events: &mut dyn EventSource, max_depth: usize) -> Result<Document, Error> {
        events.try_consume(EventKind::StreamStart)?;
        let doc = load_one(events, max_depth, true)?;
        events.try_consume(EventKind::StreamEnd)?;
        Ok(doc)
    }
}

impl Stream {
    /// Load every document up to the end of the stream.
    pub fn load(events: &mut dyn EventSource, max_depth: usize) -> Result<Stream, Error> {
        load_stream(events, max_depth, true)
    }
}

/// Load a whole stream. With `unique_keys` off, repeated mapping keys are kept in
/// order for a later consumer to judge.
pub(crate) fn load_stream(
    events: &mut dyn EventSource,
    max_depth: usize,
    unique_keys: bool,
) -> Result<Stream, Error> {
    events.try_consume(EventKind::StreamStart)?;
    let mut documents = Vec::new();
    loop {
        match events.peek()? {
            None => break,
            Some(ev) if ev.kind() == EventKind::StreamEnd => {
                events.next()?;
                break;
            }
            Some(_) => documents.push(load_one(events, max_depth, unique_keys)?),
        }
    }
    debug!(documents = documents.len(), "stream loaded");
    Ok(Stream { documents })
}

fn load_one(
    events: &mut dyn EventSource,
    max_depth: usize,
    unique_keys: bool,
) -> Result<Document, Error> {
    let explicit = events.try_consume(EventKind::DocumentStart)?;
    let (kind, span) = {
        let ev = events.peek_required()?;
        (ev.kind(), ev.span())
    };
    let mut loader = Loader {
        events,
        doc: Document::new(),
        anchors: AnchorTable {
            keep_duplicate_keys: !unique_keys,
            ..AnchorTable::new()
        },
        recursion: RecursionLevel::new(max_depth),
        unique_keys,
    };
    match kind {
        EventKind::Alias => {
            return Err(Error::msg("a document cannot contain only an alias").with_span(span));
        }
        EventKind::DocumentEnd | EventKind::StreamEnd => {
            let root = loader.doc.add_scalar("");
            loader.doc.set_root(root);
        }
        _ => {
            let root = loader.node()?;
            loader.doc.set_root(root);
        }
    }
    let Loader {
        events,
        mut doc,
        mut anchors,
        ..
    } = loader;
    if anchors.has_unresolved() {
        let patched = anchors.resolve(&mut doc)?;
        trace!(patched, "forward aliases resolved");
    }
    if explicit {
        events.expect(EventKind::DocumentEnd)?;
    } else {
        events.try_consume(EventKind::DocumentEnd)?;
    }
    Ok(doc)
}
