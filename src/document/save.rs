//! Turning documents back into events.
//!
//! A first walk counts how often every node is reached. Nodes reached more than once get
//! an anchor: their own when no other shared node claimed the name first, otherwise a
//! generated `aN`. The second walk emits each shared node once and aliases afterwards.

use ahash::{AHashMap, AHashSet};
use tracing::trace;

use crate::document::{Document, NodeId, NodeKind, Stream};
use crate::error::Error;
use crate::events::{Event, ScalarStyle};
use crate::recursion::RecursionLevel;

/// Anchor names chosen for one save.
#[derive(Debug, Default)]
pub(crate) struct AnchorPlan {
    names: AHashMap<NodeId, String>,
    shared: AHashSet<NodeId>,
}

impl AnchorPlan {
    pub(crate) fn for_document(doc: &Document, max_depth: usize) -> Result<Self, Error> {
        let mut plan = AnchorPlan::default();
        let Some(root) = doc.root() else {
            return Ok(plan);
        };

        let (visits, order) = count_visits(doc, root, max_depth)?;
        let shared: Vec<NodeId> = order.iter().copied().filter(|id| visits[id] > 1).collect();

        let mut taken: AHashSet<String> = AHashSet::new();
        let mut unnamed = Vec::new();
        for id in &shared {
            match &doc.node(*id).anchor {
                Some(own) if taken.insert(own.clone()) => {
                    plan.names.insert(*id, own.clone());
                }
                _ => unnamed.push(*id),
            }
        }
        let reserved: AHashSet<&str> = order
            .iter()
            .filter_map(|id| doc.node(*id).anchor.as_deref())
            .collect();
        let mut next = 1usize;
        for id in unnamed {
            let name = loop {
                let candidate = format!("a{next}");
                next += 1;
                if !reserved.contains(candidate.as_str()) && !taken.contains(&candidate) {
                    break candidate;
                }
            };
            trace!(anchor = %name, node = %id, "generated anchor");
            taken.insert(name.clone());
            plan.names.insert(id, name);
        }
        // Nodes reached once keep their anchor unless a shared node now owns the name.
        for id in &order {
            if visits[id] == 1
                && let Some(own) = &doc.node(*id).anchor
                && !taken.contains(own)
            {
                plan.names.insert(*id, own.clone());
            }
        }
        plan.shared = shared.into_iter().collect();
        Ok(plan)
    }

    pub(crate) fn name(&self, id: NodeId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }
}

/// Visit counts per node, and the nodes in first-visit order. Containers are walked
/// once, with their open children on a heap stack.
fn count_visits(
    doc: &Document,
    root: NodeId,
    max_depth: usize,
) -> Result<(AHashMap<NodeId, usize>, Vec<NodeId>), Error> {
    let mut recursion = RecursionLevel::new(max_depth);
    let mut visits: AHashMap<NodeId, usize> = AHashMap::new();
    let mut order = Vec::new();
    let mut stack: Vec<(NodeId, usize)> = Vec::new();
    let mut pending = Some(root);
    loop {
        if let Some(id) = pending.take() {
            let count = visits.entry(id).or_insert(0);
            *count += 1;
            if *count == 1 {
                order.push(id);
                if doc.node(id).is_container() {
                    recursion.increment(doc.node(id).span)?;
                    stack.push((id, 0));
                }
            }
        }
        let Some(top) = stack.last_mut() else {
            break;
        };
        let (id, index) = *top;
        top.1 += 1;
        match doc.child(id, index) {
            Some(child) => pending = Some(child),
            None => {
                stack.pop();
                recursion.decrement();
            }
        }
    }
    Ok((visits, order))
}

struct Emitter<'d> {
    doc: &'d Document,
    plan: AnchorPlan,
    emitted: AHashSet<NodeId>,
    out: Vec<Event>,
    recursion: RecursionLevel,
}

impl Emitter<'_> {
    fn emit(&mut self, root: NodeId) -> Result<(), Error> {
        let mut stack: Vec<(NodeId, usize)> = Vec::new();
        self.open(root, &mut stack)?;
        while let Some(top) = stack.last_mut() {
            let (id, index) = *top;
            top.1 += 1;
            match self.doc.child(id, index) {
                Some(child) => self.open(child, &mut stack)?,
                None => {
                    stack.pop();
                    self.recursion.decrement();
                    self.out.push(match self.doc.node(id).kind {
                        NodeKind::Mapping { .. } => Event::mapping_end(),
                        _ => Event::sequence_end(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Push the scalar, alias or start event of `id`. Containers also go on `stack`.
    fn open(&mut self, id: NodeId, stack: &mut Vec<(NodeId, usize)>) -> Result<(), Error> {
        if self.plan.shared.contains(&id) && !self.emitted.insert(id) {
            let name = self.plan.name(id).unwrap_or_default().to_owned();
            self.out.push(Event::alias(name));
            return Ok(());
        }
        let doc = self.doc;
        let data = doc.node(id);
        let anchor = self.plan.name(id).map(str::to_owned);
        let tag = data.tag.clone();
        let event = match &data.kind {
            NodeKind::Scalar { value, style } => Event::Scalar {
                value: value.clone(),
                style: *style,
                tag,
                anchor,
                span: data.span,
            },
            NodeKind::Sequence { style, .. } => Event::SequenceStart {
                style: *style,
                tag,
                anchor,
                span: data.span,
            },
            NodeKind::Mapping { style, .. } => Event::MappingStart {
                style: *style,
                tag,
                anchor,
                span: data.span,
            },
            NodeKind::Alias { name } => {
                return Err(Error::unknown_anchor(name.clone()).with_span(data.span));
            }
        };
        if data.is_container() {
            self.recursion.increment(data.span)?;
            stack.push((id, 0));
        }
        self.out.push(event);
        Ok(())
    }
}

impl Document {
    /// Events of this document between `DocumentStart` and `DocumentEnd`.
    pub fn save(&self, max_depth: usize) -> Result<Vec<Event>, Error> {
        let plan = AnchorPlan::for_document(self, max_depth)?;
        let mut emitter = Emitter {
            doc: self,
            plan,
            emitted: AHashSet::new(),
            out: vec![Event::document_start()],
            recursion: RecursionLevel::new(max_depth),
        };
        match self.root() {
            Some(root) => emitter.emit(root)?,
            None => emitter.out.push(Event::styled_scalar("", ScalarStyle::Plain)),
        }
        emitter.out.push(Event::document_end());
        Ok(emitter.out)
    }
}

impl Stream {
    pub fn save(&self, max_depth: usize) -> Result<Vec<Event>, Error> {
        let mut out = vec![Event::stream_start()];
        for doc in &self.documents {
            out.extend(doc.save(max_depth)?);
        }
        out.push(Event::stream_end());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ReplayEvents;
    use crate::recursion::DEFAULT_MAX_DEPTH;

    fn anchors_and_aliases(events: &[Event]) -> Vec<String> {
        events
            .iter()
            .filter_map(|ev| match ev {
                Event::Alias { name, .. } => Some(format!("*{name}")),
                other => other.anchor().map(|a| format!("&{a}")),
            })
            .collect()
    }

    #[test]
    fn shared_nodes_reuse_their_anchor() {
        let mut doc = Document::new();
        let seq = doc.add_sequence();
        let item = doc.add_scalar("x");
        doc.set_anchor(item, "mine");
        doc.push_item(seq, item).unwrap();
        doc.push_item(seq, item).unwrap();
        doc.set_root(seq);
        let events = doc.save(DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(anchors_and_aliases(&events), ["&mine", "*mine"]);
    }

    #[test]
    fn colliding_anchors_get_generated_names() {
        let mut doc = Document::new();
        let seq = doc.add_sequence();
        let (x, y) = (doc.add_scalar("x"), doc.add_scalar("y"));
        doc.set_anchor(x, "same");
        doc.set_anchor(y, "same");
        for id in [x, y, x, y] {
            doc.push_item(seq, id).unwrap();
        }
        doc.set_root(seq);
        let events = doc.save(DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(anchors_and_aliases(&events), ["&same", "&a1", "*same", "*a1"]);
    }

    #[test]
    fn unshared_anchor_is_kept() {
        let mut doc = Document::new();
        let root = doc.add_scalar("x");
        doc.set_anchor(root, "solo");
        doc.set_root(root);
        let events = doc.save(DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(anchors_and_aliases(&events), ["&solo"]);
    }

    #[test]
    fn cycles_round_trip() {
        let mut doc = Document::new();
        let map = doc.add_mapping();
        let key = doc.add_scalar("self");
        doc.insert(map, key, map).unwrap();
        doc.set_root(map);

        let events = doc.save(DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(anchors_and_aliases(&events), ["&a1", "*a1"]);
        let reloaded = Document::load(&mut ReplayEvents::new(events), DEFAULT_MAX_DEPTH).unwrap();
        assert_eq!(reloaded, doc);
    }
}
