//! State shared between an adapter and its hooks.

use arbor_core::NodeId;
use arbor_dom::Dom;
use arbor_transaction::ValidationContext;
use std::cell::{Cell, RefCell};
use std::rc::Weak;

/// The subtree an observer is bound to and where its transaction stands.
#[derive(Default)]
pub struct Scope {
    root: Cell<Option<NodeId>>,
    validating: Cell<bool>,
    in_transaction: Cell<bool>,
    contexts: RefCell<Vec<(NodeId, Weak<dyn ValidationContext>)>>,
}

impl Scope {
    /// The node the adapter is bound to.
    pub fn root(&self) -> Option<NodeId> {
        self.root.get()
    }

    /// True from Beginning until Ending starts, or until Cancelled.
    pub fn is_validating(&self) -> bool {
        self.validating.get()
    }

    /// True from Beginning until Ended or Cancelled.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction.get()
    }

    /// True while a subscribed context rolls back its log.
    pub fn is_undoing(&self) -> bool {
        self.contexts
            .borrow()
            .iter()
            .filter_map(|(_, ctx)| ctx.upgrade())
            .any(|ctx| ctx.is_undoing())
    }

    /// True if `node` lies in the bound subtree.
    pub fn contains(&self, dom: &Dom, node: NodeId) -> bool {
        match self.root.get() {
            Some(root) => dom.lineage(node).any(|n| n == root),
            None => false,
        }
    }

    pub(crate) fn set_root(&self, root: NodeId) {
        self.root.set(Some(root));
    }

    pub(crate) fn set_flags(&self, validating: bool, in_transaction: bool) {
        self.validating.set(validating);
        self.in_transaction.set(in_transaction);
    }

    pub(crate) fn end_validating(&self) {
        self.validating.set(false);
    }

    pub(crate) fn add_context(&self, node: NodeId, context: Weak<dyn ValidationContext>) {
        self.contexts.borrow_mut().push((node, context));
    }

    /// Forget the contexts found on `node`.
    pub(crate) fn take_contexts(&self, node: NodeId) -> Vec<Weak<dyn ValidationContext>> {
        let mut contexts = self.contexts.borrow_mut();
        let (taken, kept): (Vec<_>, Vec<_>) = contexts.drain(..).partition(|(n, _)| *n == node);
        *contexts = kept;
        taken.into_iter().map(|(_, ctx)| ctx).collect()
    }
}
