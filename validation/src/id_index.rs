//! Id lookup for a subtree.

use crate::{Observe, Scope};
use arbor_core::NodeId;
use arbor_dom::{AttributeEvent, Dom, DomResult};
use arbor_schema::FieldMetadata;
use std::cell::RefCell;
use std::collections::HashMap;

/// Maps ids to the nodes carrying them. When several nodes share an id the
/// first one indexed wins.
#[derive(Debug, Default)]
pub struct IdIndex {
    by_id: RefCell<HashMap<String, NodeId>>,
    ids: RefCell<HashMap<NodeId, String>>,
}

impl IdIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The node indexed under `id`.
    pub fn find(&self, id: &str) -> Option<NodeId> {
        self.by_id.borrow().get(id).copied()
    }

    /// The id `node` is indexed under.
    pub fn id_of(&self, node: NodeId) -> Option<String> {
        self.ids.borrow().get(&node).cloned()
    }

    pub fn len(&self) -> usize {
        self.ids.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.borrow().is_empty()
    }

    fn insert(&self, node: NodeId, id: String) {
        if id.is_empty() {
            return;
        }
        self.by_id.borrow_mut().entry(id.clone()).or_insert(node);
        self.ids.borrow_mut().insert(node, id);
    }

    fn remove(&self, node: NodeId) {
        let Some(id) = self.ids.borrow_mut().remove(&node) else {
            return;
        };
        let mut by_id = self.by_id.borrow_mut();
        if by_id.get(&id) == Some(&node) {
            by_id.remove(&id);
        }
    }
}

impl Observe for IdIndex {
    fn add_node(&self, dom: &mut Dom, _scope: &Scope, node: NodeId) -> DomResult<()> {
        if let Some(id) = dom.id(node)? {
            self.insert(node, id);
        }
        Ok(())
    }

    fn remove_node(&self, _dom: &mut Dom, _scope: &Scope, node: NodeId) -> DomResult<()> {
        self.remove(node);
        Ok(())
    }

    fn attribute_changed(&self, dom: &mut Dom, scope: &Scope, event: &AttributeEvent) -> DomResult<()> {
        let node_type = dom.node_type(event.node)?;
        let is_id = node_type
            .id_attribute()?
            .is_some_and(|id| id.is_equivalent(&event.attribute));
        if is_id && scope.contains(dom, event.node) {
            self.remove(event.node);
            if let Some(id) = dom.id(event.node)? {
                self.insert(event.node, id);
            }
        }
        Ok(())
    }
}
