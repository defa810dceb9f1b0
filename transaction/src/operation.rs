//! Undoable mutation records.

use arbor_core::{NodeId, Value};
use arbor_dom::{Dom, DomResult};
use arbor_schema::{AttributeInfo, ChildInfo};
use std::rc::Rc;

/// One logged mutation.
#[derive(Debug, Clone)]
pub enum Operation {
    /// An attribute slot changed. Values are raw slot contents, so `None`
    /// means the default applied.
    AttributeChanged {
        node: NodeId,
        attribute: Rc<AttributeInfo>,
        old_local: Option<Value>,
        new_local: Option<Value>,
    },
    ChildInserted {
        parent: NodeId,
        child: NodeId,
        child_info: Rc<ChildInfo>,
        index: usize,
    },
    ChildRemoved {
        parent: NodeId,
        child: NodeId,
        child_info: Rc<ChildInfo>,
        index: usize,
    },
}

impl Operation {
    /// Revert the mutation.
    pub fn undo(&self, dom: &mut Dom) -> DomResult<()> {
        match self {
            Self::AttributeChanged {
                node,
                attribute,
                old_local,
                ..
            } => dom.set_local_attribute(*node, attribute, old_local.clone()),
            Self::ChildInserted { child, .. } => dom.remove_from_parent(*child),
            Self::ChildRemoved {
                parent,
                child,
                child_info,
                index,
            } => place(dom, *parent, child_info, *index, *child),
        }
    }

    /// Apply the mutation again.
    pub fn redo(&self, dom: &mut Dom) -> DomResult<()> {
        match self {
            Self::AttributeChanged {
                node,
                attribute,
                new_local,
                ..
            } => dom.set_local_attribute(*node, attribute, new_local.clone()),
            Self::ChildInserted {
                parent,
                child,
                child_info,
                index,
            } => place(dom, *parent, child_info, *index, *child),
            Self::ChildRemoved { child, .. } => dom.remove_from_parent(*child),
        }
    }

    /// The node the operation was raised on.
    pub fn target(&self) -> NodeId {
        match self {
            Self::AttributeChanged { node, .. } => *node,
            Self::ChildInserted { parent, .. } | Self::ChildRemoved { parent, .. } => *parent,
        }
    }
}

fn place(dom: &mut Dom, parent: NodeId, info: &ChildInfo, index: usize, child: NodeId) -> DomResult<()> {
    if info.is_list() {
        dom.insert_child(parent, info, index, child)
    } else {
        dom.set_child(parent, info, Some(child))
    }
}
