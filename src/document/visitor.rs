use ahash::AHashSet;

use crate::document::{Document, NodeData, NodeId, NodeKind};
use crate::error::Error;
use crate::recursion::RecursionLevel;

/// Callbacks for a depth-first walk over a document.
///
/// Every node is entered once; a node reached again through another reference is
/// reported to [`NodeVisitor::revisit`] instead of being walked a second time.
pub trait NodeVisitor {
    fn scalar(&mut self, _id: NodeId, _node: &NodeData, _value: &str) -> Result<(), Error> {
        Ok(())
    }

    fn enter_sequence(&mut self, _id: NodeId, _node: &NodeData) -> Result<(), Error> {
        Ok(())
    }

    fn leave_sequence(&mut self, _id: NodeId) -> Result<(), Error> {
        Ok(())
    }

    fn enter_mapping(&mut self, _id: NodeId, _node: &NodeData) -> Result<(), Error> {
        Ok(())
    }

    fn leave_mapping(&mut self, _id: NodeId) -> Result<(), Error> {
        Ok(())
    }

    fn revisit(&mut self, _id: NodeId) -> Result<(), Error> {
        Ok(())
    }
}

impl Document {
    /// Walk the graph from the root. Fails when nesting exceeds `max_depth` or a
    /// callback fails.
    pub fn walk(&self, visitor: &mut dyn NodeVisitor, max_depth: usize) -> Result<(), Error> {
        let Some(root) = self.root() else {
            return Ok(());
        };
        let mut walk = Walk {
            doc: self,
            seen: AHashSet::new(),
            recursion: RecursionLevel::new(max_depth),
        };
        walk.run(root, visitor)
    }
}

struct Walk<'d> {
    doc: &'d Document,
    seen: AHashSet<NodeId>,
    recursion: RecursionLevel,
}

impl Walk<'_> {
    fn run(&mut self, root: NodeId, visitor: &mut dyn NodeVisitor) -> Result<(), Error> {
        let mut stack: Vec<(NodeId, usize)> = Vec::new();
        self.enter(root, visitor, &mut stack)?;
        while let Some(top) = stack.last_mut() {
            let (id, index) = *top;
            top.1 += 1;
            match self.doc.child(id, index) {
                Some(child) => self.enter(child, visitor, &mut stack)?,
                None => {
                    stack.pop();
                    self.recursion.decrement();
                    match self.doc.node(id).kind {
                        NodeKind::Mapping { .. } => visitor.leave_mapping(id)?,
                        _ => visitor.leave_sequence(id)?,
                    }
                }
            }
        }
        Ok(())
    }

    fn enter(
        &mut self,
        id: NodeId,
        visitor: &mut dyn NodeVisitor,
        stack: &mut Vec<(NodeId, usize)>,
    ) -> Result<(), Error> {
        if !self.seen.insert(id) {
            return visitor.revisit(id);
        }
        let doc = self.doc;
        let data = doc.node(id);
        match &data.kind {
            NodeKind::Scalar { value, .. } => return visitor.scalar(id, data, value),
            NodeKind::Sequence { .. } => {
                self.recursion.increment(data.span)?;
                visitor.enter_sequence(id, data)?;
            }
            NodeKind::Mapping { .. } => {
                self.recursion.increment(data.span)?;
                visitor.enter_mapping(id, data)?;
            }
            NodeKind::Alias { name } => {
                return Err(Error::unknown_anchor(name.clone()).with_span(data.span));
            }
        }
        stack.push((id, 0));
        Ok(())
    }
}
