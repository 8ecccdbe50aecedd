//! Structural equality of documents.
//!
//! Two documents are equal when their graphs are isomorphic: same node kinds, scalar
//! text, tags and key order, and the same sharing. A node referenced twice on one side
//! must be matched by a single node referenced twice on the other. Anchor names, styles
//! and spans are presentation and do not take part.

use ahash::AHashMap;

use crate::document::{Document, NodeId, NodeKind};
use crate::error::Error;
use crate::location::Span;
use crate::recursion::RecursionLevel;

/// Compare two documents; fails only when the walk exceeds `max_depth`.
pub fn structurally_eq(a: &Document, b: &Document, max_depth: usize) -> Result<bool, Error> {
    match (a.root(), b.root()) {
        (None, None) => Ok(true),
        (Some(ra), Some(rb)) => nodes_eq(a, ra, b, rb, max_depth),
        _ => Ok(false),
    }
}

pub(crate) fn nodes_eq(
    a: &Document,
    ra: NodeId,
    b: &Document,
    rb: NodeId,
    max_depth: usize,
) -> Result<bool, Error> {
    let mut walk = Pairing {
        a,
        b,
        forward: AHashMap::new(),
        backward: AHashMap::new(),
        recursion: RecursionLevel::new(max_depth),
    };
    walk.eq(ra, rb)
}

struct Pairing<'d> {
    a: &'d Document,
    b: &'d Document,
    forward: AHashMap<NodeId, NodeId>,
    backward: AHashMap<NodeId, NodeId>,
    recursion: RecursionLevel,
}

/// Outcome of pairing two nodes.
enum Pair {
    Unequal,
    Matched,
    /// Both are containers of the same kind and length; children still to compare.
    Open,
}

impl Pairing<'_> {
    /// Depth-first comparison with the open container pairs on a heap stack.
    fn eq(&mut self, x: NodeId, y: NodeId) -> Result<bool, Error> {
        let mut stack: Vec<(NodeId, NodeId, usize)> = Vec::new();
        match self.pair(x, y) {
            Pair::Unequal => return Ok(false),
            Pair::Matched => return Ok(true),
            Pair::Open => {
                self.recursion.increment(Span::UNKNOWN)?;
                stack.push((x, y, 0));
            }
        }
        while let Some(top) = stack.last_mut() {
            let (x, y, index) = *top;
            top.2 += 1;
            match (self.a.child(x, index), self.b.child(y, index)) {
                (Some(cx), Some(cy)) => match self.pair(cx, cy) {
                    Pair::Unequal => return Ok(false),
                    Pair::Matched => {}
                    Pair::Open => {
                        self.recursion.increment(Span::UNKNOWN)?;
                        stack.push((cx, cy, 0));
                    }
                },
                _ => {
                    stack.pop();
                    self.recursion.decrement();
                }
            }
        }
        Ok(true)
    }

    fn pair(&mut self, x: NodeId, y: NodeId) -> Pair {
        // A node already paired must meet its partner again, nothing else.
        match (self.forward.get(&x), self.backward.get(&y)) {
            (Some(px), Some(py)) if *px == y && *py == x => return Pair::Matched,
            (None, None) => {}
            _ => return Pair::Unequal,
        }
        let (nx, ny) = (self.a.node(x), self.b.node(y));
        if nx.tag != ny.tag {
            return Pair::Unequal;
        }
        self.forward.insert(x, y);
        self.backward.insert(y, x);

        let open_if = |same_len: bool| if same_len { Pair::Open } else { Pair::Unequal };
        match (&nx.kind, &ny.kind) {
            (NodeKind::Scalar { value: vx, .. }, NodeKind::Scalar { value: vy, .. }) => {
                if vx == vy { Pair::Matched } else { Pair::Unequal }
            }
            (NodeKind::Sequence { items: ix, .. }, NodeKind::Sequence { items: iy, .. }) => {
                open_if(ix.len() == iy.len())
            }
            (NodeKind::Mapping { entries: ex, .. }, NodeKind::Mapping { entries: ey, .. }) => {
                open_if(ex.len() == ey.len())
            }
            (NodeKind::Alias { name: nx }, NodeKind::Alias { name: ny }) if nx == ny => Pair::Matched,
            _ => Pair::Unequal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recursion::DEFAULT_MAX_DEPTH;

    fn pair_of(shared: bool) -> Document {
        let mut doc = Document::new();
        let seq = doc.add_sequence();
        let first = doc.add_scalar("x");
        let second = if shared { first } else { doc.add_scalar("x") };
        doc.push_item(seq, first).unwrap();
        doc.push_item(seq, second).unwrap();
        doc.set_root(seq);
        doc
    }

    #[test]
    fn sharing_topology_matters() {
        assert!(structurally_eq(&pair_of(true), &pair_of(true), DEFAULT_MAX_DEPTH).unwrap());
        assert!(!structurally_eq(&pair_of(true), &pair_of(false), DEFAULT_MAX_DEPTH).unwrap());
        assert!(!structurally_eq(&pair_of(false), &pair_of(true), DEFAULT_MAX_DEPTH).unwrap());
    }

    #[test]
    fn key_order_and_tags_matter_anchors_do_not() {
        let build = |order: [&str; 2], tag: Option<&str>, anchor: Option<&str>| {
            let mut doc = Document::new();
            let map = doc.add_mapping();
            for k in order {
                let (key, value) = (doc.add_scalar(k), doc.add_scalar("v"));
                if let Some(t) = tag {
                    doc.set_tag(value, t);
                }
                doc.insert(map, key, value).unwrap();
            }
            if let Some(a) = anchor {
                doc.set_anchor(map, a);
            }
            doc.set_root(map);
            doc
        };
        let base = build(["a", "b"], None, None);
        assert_eq!(base, build(["a", "b"], None, Some("m")));
        assert_ne!(base, build(["b", "a"], None, None));
        assert_ne!(base, build(["a", "b"], Some("!x"), None));
    }

    #[test]
    fn cycles_compare_without_looping() {
        let cyclic = || {
            let mut doc = Document::new();
            let seq = doc.add_sequence();
            doc.push_item(seq, seq).unwrap();
            doc.set_root(seq);
            doc
        };
        assert_eq!(cyclic(), cyclic());
    }

    #[test]
    fn deep_chains_compare_up_to_the_bound() {
        let chain = |depth: usize, leaf: &str| {
            let mut doc = Document::new();
            let root = doc.add_sequence();
            let mut parent = root;
            for _ in 1..depth {
                let next = doc.add_sequence();
                doc.push_item(parent, next).unwrap();
                parent = next;
            }
            let leaf = doc.add_scalar(leaf);
            doc.push_item(parent, leaf).unwrap();
            doc.set_root(root);
            doc
        };
        assert!(structurally_eq(&chain(50, "x"), &chain(50, "x"), 50).unwrap());
        assert!(!structurally_eq(&chain(50, "x"), &chain(50, "y"), 50).unwrap());
        let err = structurally_eq(&chain(51, "x"), &chain(51, "x"), 50).unwrap_err();
        assert!(matches!(err, Error::RecursionLimit { max: 50, .. }), "{err}");
    }
}
