//! Subtree observers.
//!
//! An `Observer` binds to a node and follows every node that enters or
//! leaves its subtree. Hooks see each node exactly once on entry and once on
//! exit, plus the raw change events.

use crate::Scope;
use arbor_core::NodeId;
use arbor_dom::{AttributeEvent, ChildEvent, Dom, DomResult, ListenerId, NodeAdapter, NodeListener};
use arbor_schema::ExtensionDef;
use std::cell::Cell;
use std::rc::Rc;

/// Hooks run by an `Observer` or `Validator`.
#[allow(unused_variables)]
pub trait Observe: 'static {
    /// `node` entered the subtree.
    fn add_node(&self, dom: &mut Dom, scope: &Scope, node: NodeId) -> DomResult<()> {
        Ok(())
    }

    /// `node` left the subtree.
    fn remove_node(&self, dom: &mut Dom, scope: &Scope, node: NodeId) -> DomResult<()> {
        Ok(())
    }

    fn attribute_changing(&self, dom: &mut Dom, scope: &Scope, event: &AttributeEvent) -> DomResult<()> {
        Ok(())
    }

    fn attribute_changed(&self, dom: &mut Dom, scope: &Scope, event: &AttributeEvent) -> DomResult<()> {
        Ok(())
    }

    /// Called after `add_node` ran for the inserted subtree.
    fn child_inserted(&self, dom: &mut Dom, scope: &Scope, event: &ChildEvent) -> DomResult<()> {
        Ok(())
    }

    /// Called after `remove_node` ran for the removed subtree.
    fn child_removed(&self, dom: &mut Dom, scope: &Scope, event: &ChildEvent) -> DomResult<()> {
        Ok(())
    }
}

/// Extension that runs `H` over the subtree of its node.
pub struct Observer<H> {
    hooks: H,
    scope: Scope,
    registration: Cell<Option<ListenerId>>,
}

impl<H: Observe> Observer<H> {
    pub fn new(hooks: H) -> Rc<Self> {
        Rc::new(Self {
            hooks,
            scope: Scope::default(),
            registration: Cell::new(None),
        })
    }

    /// Extension declaration building fresh hooks for every node.
    pub fn extension(name: impl Into<String>, hooks: impl Fn() -> H + 'static) -> ExtensionDef {
        ExtensionDef::new(name, move || Observer::new(hooks()))
            .with_capability::<Observer<H>, dyn NodeAdapter>(|o| o as Rc<dyn NodeAdapter>)
            .with_capability::<Observer<H>, Observer<H>>(|o| o)
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }
}

impl<H: Observe> NodeListener for Observer<H> {
    fn attribute_changing(&self, dom: &mut Dom, event: &AttributeEvent) -> DomResult<()> {
        self.hooks.attribute_changing(dom, &self.scope, event)
    }

    fn attribute_changed(&self, dom: &mut Dom, event: &AttributeEvent) -> DomResult<()> {
        self.hooks.attribute_changed(dom, &self.scope, event)
    }

    fn child_inserted(&self, dom: &mut Dom, event: &ChildEvent) -> DomResult<()> {
        for node in dom.subtree(event.child).collect::<Vec<_>>() {
            self.hooks.add_node(dom, &self.scope, node)?;
        }
        self.hooks.child_inserted(dom, &self.scope, event)
    }

    fn child_removed(&self, dom: &mut Dom, event: &ChildEvent) -> DomResult<()> {
        for node in dom.subtree(event.child).collect::<Vec<_>>() {
            self.hooks.remove_node(dom, &self.scope, node)?;
        }
        self.hooks.child_removed(dom, &self.scope, event)
    }
}

impl<H: Observe> NodeAdapter for Observer<H> {
    fn on_node_set(self: Rc<Self>, dom: &mut Dom, node: NodeId) -> DomResult<()> {
        if self.registration.get().is_some() {
            return Ok(());
        }
        self.scope.set_root(node);
        let id = dom.add_listener(node, self.clone() as Rc<dyn NodeListener>)?;
        self.registration.set(Some(id));
        for entered in dom.subtree(node).collect::<Vec<_>>() {
            self.hooks.add_node(dom, &self.scope, entered)?;
        }
        Ok(())
    }
}
