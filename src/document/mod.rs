//! Generic, order-preserving document tree.
//!
//! Nodes live in an arena owned by the [`Document`] and refer to each other by
//! [`NodeId`]. A node reached through several parents (an alias in the source) is stored
//! once and referenced several times, so sharing and cycles survive loading and saving.

use std::fmt;

use crate::error::Error;
use crate::events::{CollectionStyle, ScalarStyle};
use crate::location::Span;
use crate::recursion::DEFAULT_MAX_DEPTH;

mod equality;
mod load;
mod outline;
mod save;
mod visitor;

pub use equality::structurally_eq;
pub use load::AnchorTable;
pub(crate) use load::load_stream;
pub use outline::{AnnotatedOutline, OutlineStyle, PlainOutline};
pub use visitor::NodeVisitor;

/// Index of a node within its document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Scalar {
        value: String,
        style: ScalarStyle,
    },
    Sequence {
        items: Vec<NodeId>,
        style: CollectionStyle,
    },
    Mapping {
        entries: Vec<(NodeId, NodeId)>,
        style: CollectionStyle,
    },
    /// Forward alias waiting for the second loading pass. Never reachable from the
    /// root of a loaded document.
    Alias { name: String },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Scalar { .. } => "scalar",
            NodeKind::Sequence { .. } => "sequence",
            NodeKind::Mapping { .. } => "mapping",
            NodeKind::Alias { .. } => "alias",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeData {
    pub kind: NodeKind,
    pub anchor: Option<String>,
    pub tag: Option<String>,
    pub span: Span,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            anchor: None,
            tag: None,
            span: Span::UNKNOWN,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Sequence { .. } | NodeKind::Mapping { .. })
    }

    /// Text of a scalar node.
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// One YAML document as a node graph.
#[derive(Clone, Debug, Default)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: Option<NodeId>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.root = Some(id);
    }

    /// Number of nodes in the arena, including unreachable ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Panics if `id` does not belong to this document.
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    pub(crate) fn push(&mut self, data: NodeData) -> NodeId {
        self.nodes.push(data);
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_scalar(&mut self, value: impl Into<String>) -> NodeId {
        self.push(NodeData::new(NodeKind::Scalar {
            value: value.into(),
            style: ScalarStyle::Any,
        }))
    }

    pub fn add_sequence(&mut self) -> NodeId {
        self.push(NodeData::new(NodeKind::Sequence {
            items: Vec::new(),
            style: CollectionStyle::Any,
        }))
    }

    pub fn add_mapping(&mut self) -> NodeId {
        self.push(NodeData::new(NodeKind::Mapping {
            entries: Vec::new(),
            style: CollectionStyle::Any,
        }))
    }

    pub fn set_anchor(&mut self, id: NodeId, anchor: impl Into<String>) {
        self.nodes[id.0].anchor = Some(anchor.into());
    }

    pub fn set_tag(&mut self, id: NodeId, tag: impl Into<String>) {
        self.nodes[id.0].tag = Some(tag.into());
    }

    /// Append `item` to the sequence `seq`. The same item may be pushed several times.
    pub fn push_item(&mut self, seq: NodeId, item: NodeId) -> Result<(), Error> {
        match &mut self.nodes[seq.0].kind {
            NodeKind::Sequence { items, .. } => {
                items.push(item);
                Ok(())
            }
            other => Err(Error::shape(format!("cannot push an item into a {}", other.name()))),
        }
    }

    /// Add an entry to the mapping `map`; a key equal to an existing one is an error.
    pub fn insert(&mut self, map: NodeId, key: NodeId, value: NodeId) -> Result<(), Error> {
        let existing = match &self.nodes[map.0].kind {
            NodeKind::Mapping { entries, .. } => entries.iter().map(|(k, _)| *k).collect::<Vec<_>>(),
            other => {
                return Err(Error::shape(format!("cannot insert an entry into a {}", other.name())));
            }
        };
        for k in existing {
            if self.same_key(k, key)? {
                return Err(Error::duplicate_key(self.describe(key)).with_span(self.nodes[key.0].span));
            }
        }
        if let NodeKind::Mapping { entries, .. } = &mut self.nodes[map.0].kind {
            entries.push((key, value));
        }
        Ok(())
    }

    /// Items of a sequence node, empty for anything else.
    pub fn items(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.0].kind {
            NodeKind::Sequence { items, .. } => items,
            _ => &[],
        }
    }

    /// Entries of a mapping node, empty for anything else.
    pub fn entries(&self, id: NodeId) -> &[(NodeId, NodeId)] {
        match &self.nodes[id.0].kind {
            NodeKind::Mapping { entries, .. } => entries,
            _ => &[],
        }
    }

    /// Child number `index` in document order: sequence items, or mapping keys and
    /// values interleaved. `None` past the last child and for leaf nodes.
    pub(crate) fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        match &self.nodes[id.0].kind {
            NodeKind::Sequence { items, .. } => items.get(index).copied(),
            NodeKind::Mapping { entries, .. } => entries
                .get(index / 2)
                .map(|(k, v)| if index % 2 == 0 { *k } else { *v }),
            NodeKind::Scalar { .. } | NodeKind::Alias { .. } => None,
        }
    }

    /// Value of the entry whose key is the scalar `key`.
    pub fn get(&self, map: NodeId, key: &str) -> Option<NodeId> {
        self.entries(map)
            .iter()
            .find(|(k, _)| self.nodes[k.0].as_str() == Some(key))
            .map(|(_, v)| *v)
    }

    /// Key equality used for duplicate detection: structural, anchors ignored.
    pub(crate) fn same_key(&self, a: NodeId, b: NodeId) -> Result<bool, Error> {
        if a == b {
            return Ok(true);
        }
        let (na, nb) = (&self.nodes[a.0], &self.nodes[b.0]);
        match (&na.kind, &nb.kind) {
            (NodeKind::Scalar { value: va, .. }, NodeKind::Scalar { value: vb, .. }) => {
                Ok(va == vb && na.tag == nb.tag)
            }
            (NodeKind::Scalar { .. }, _) | (_, NodeKind::Scalar { .. }) => Ok(false),
            _ => equality::nodes_eq(self, a, self, b, DEFAULT_MAX_DEPTH),
        }
    }

    /// Short human-readable rendering of a key for error messages.
    pub(crate) fn describe(&self, id: NodeId) -> String {
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Scalar { value, .. } => value.clone(),
            NodeKind::Alias { name } => format!("*{name}"),
            other => format!("<{}>", other.name()),
        }
    }
}

impl PartialEq for Document {
    /// Structural equality with the default recursion bound; a graph too deep to
    /// compare is reported as unequal.
    fn eq(&self, other: &Self) -> bool {
        structurally_eq(self, other, DEFAULT_MAX_DEPTH).unwrap_or(false)
    }
}

/// Several documents read from one event stream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stream {
    pub documents: Vec<Document>,
}

impl Stream {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.documents.iter()
    }
}

impl<'a> IntoIterator for &'a Stream {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_rejects_duplicate_scalar_keys() {
        let mut doc = Document::new();
        let map = doc.add_mapping();
        let (k1, v1) = (doc.add_scalar("a"), doc.add_scalar("1"));
        let (k2, v2) = (doc.add_scalar("a"), doc.add_scalar("2"));
        doc.insert(map, k1, v1).unwrap();
        let err = doc.insert(map, k2, v2).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { ref key, .. } if key == "a"), "{err}");
        assert_eq!(doc.entries(map).len(), 1);
    }

    #[test]
    fn tagged_keys_with_the_same_text_differ() {
        let mut doc = Document::new();
        let map = doc.add_mapping();
        let (k1, v1) = (doc.add_scalar("1"), doc.add_scalar("x"));
        let k2 = doc.add_scalar("1");
        doc.set_tag(k2, "!!str");
        doc.insert(map, k1, v1).unwrap();
        doc.insert(map, k2, v1).unwrap();
        assert_eq!(doc.get(map, "1"), Some(v1));
    }

    #[test]
    fn sequences_may_repeat_a_node() {
        let mut doc = Document::new();
        let seq = doc.add_sequence();
        let item = doc.add_scalar("x");
        doc.push_item(seq, item).unwrap();
        doc.push_item(seq, item).unwrap();
        assert_eq!(doc.items(seq), &[item, item]);
        assert!(doc.push_item(item, seq).is_err());
    }
}
