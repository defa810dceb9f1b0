//! Tree walks and queries.

use crate::dom::slot_children;
use crate::{Dom, DomResult};
use arbor_core::NodeId;
use std::collections::{HashSet, VecDeque};

/// A node followed by its ancestors up to the root.
pub struct Lineage<'a> {
    dom: &'a Dom,
    next: Option<NodeId>,
}

impl Iterator for Lineage<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.dom.nodes.get(&current).and_then(|d| d.parent);
        Some(current)
    }
}

/// Pre-order walk of a subtree, children in declaration order.
pub struct Subtree<'a> {
    dom: &'a Dom,
    stack: Vec<NodeId>,
}

impl Iterator for Subtree<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.stack.pop()?;
        let children = self.dom.child_ids(current);
        self.stack.extend(children.into_iter().rev());
        Some(current)
    }
}

/// Breadth-first walk of a subtree.
pub struct LevelSubtree<'a> {
    dom: &'a Dom,
    queue: VecDeque<NodeId>,
    visited: HashSet<NodeId>,
}

impl Iterator for LevelSubtree<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.queue.pop_front()?;
        for child in self.dom.child_ids(current) {
            if self.visited.insert(child) {
                self.queue.push_back(child);
            }
        }
        Some(current)
    }
}

impl Dom {
    /// `node` and its ancestors. Empty if `node` does not exist.
    pub fn lineage(&self, node: NodeId) -> Lineage<'_> {
        Lineage {
            dom: self,
            next: self.contains(node).then_some(node),
        }
    }

    /// The ancestors of `node`, nearest first.
    pub fn ancestry(&self, node: NodeId) -> Lineage<'_> {
        let mut lineage = self.lineage(node);
        lineage.next();
        lineage
    }

    /// `root` and every descendant, depth first.
    pub fn subtree(&self, root: NodeId) -> Subtree<'_> {
        Subtree {
            dom: self,
            stack: if self.contains(root) { vec![root] } else { Vec::new() },
        }
    }

    /// `root` and every descendant, level by level.
    pub fn level_subtree(&self, root: NodeId) -> LevelSubtree<'_> {
        let mut queue = VecDeque::new();
        let mut visited = HashSet::new();
        if self.contains(root) {
            queue.push_back(root);
            visited.insert(root);
        }
        LevelSubtree {
            dom: self,
            queue,
            visited,
        }
    }

    pub(crate) fn child_ids(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(&node)
            .map(|d| d.slots.iter().flat_map(slot_children).collect())
            .unwrap_or_default()
    }

    /// The topmost ancestor of `node`.
    pub fn root_of(&self, node: NodeId) -> DomResult<NodeId> {
        self.data(node)?;
        Ok(self.lineage(node).last().unwrap_or(node))
    }

    /// True if `ancestor` is a strict ancestor of `node`.
    pub fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> bool {
        self.ancestry(node).any(|n| n == ancestor)
    }

    /// The deepest node that contains both `a` and `b`.
    pub fn lowest_common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let ancestors: HashSet<NodeId> = self.lineage(a).collect();
        self.lineage(b).find(|n| ancestors.contains(n))
    }

    /// The deepest node that contains every node in `nodes`.
    pub fn lowest_common_ancestor_of(&self, nodes: &[NodeId]) -> Option<NodeId> {
        let (first, rest) = nodes.split_first()?;
        let mut candidates: Vec<NodeId> = self.lineage(*first).collect();
        for &node in rest {
            let lineage: HashSet<NodeId> = self.lineage(node).collect();
            candidates.retain(|c| lineage.contains(c));
        }
        candidates.first().copied()
    }

    /// First node in `scope` (pre-order) whose id equals `id`.
    pub fn find_by_id(&self, scope: NodeId, id: &str) -> DomResult<Option<NodeId>> {
        for node in self.subtree(scope) {
            if self.id(node)?.as_deref() == Some(id) {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }
}
