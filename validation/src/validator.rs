//! Subtree validators.
//!
//! A `Validator` is an observer that also joins the transaction lifecycle of
//! every `ValidationContext` found in its subtree. Hooks gate their change
//! tracking on `Scope::is_validating` so that rollback traffic is not
//! mistaken for user edits.

use crate::{Observe, Scope};
use arbor_core::NodeId;
use arbor_dom::{AttributeEvent, ChildEvent, Dom, DomResult, ListenerId, NodeAdapter, NodeListener};
use arbor_schema::ExtensionDef;
use arbor_transaction::{BeginArgs, ValidationContext, ValidationListener};
use std::cell::Cell;
use std::rc::{Rc, Weak};

/// Transaction hooks run by a `Validator`.
#[allow(unused_variables)]
pub trait Validate: Observe {
    fn beginning(&self, dom: &mut Dom, scope: &Scope, args: &mut BeginArgs) -> DomResult<()> {
        Ok(())
    }

    /// Check accumulated changes. An error fails the commit.
    fn ending(&self, dom: &mut Dom, scope: &Scope) -> DomResult<()> {
        Ok(())
    }

    fn ended(&self, dom: &mut Dom, scope: &Scope) -> DomResult<()> {
        Ok(())
    }

    fn cancelled(&self, dom: &mut Dom, scope: &Scope) -> DomResult<()> {
        Ok(())
    }
}

/// Extension that runs `H` over the subtree of its node and its
/// transactions.
pub struct Validator<H> {
    hooks: H,
    scope: Scope,
    registration: Cell<Option<ListenerId>>,
    this: Weak<Validator<H>>,
}

impl<H: Validate> Validator<H> {
    pub fn new(hooks: H) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            hooks,
            scope: Scope::default(),
            registration: Cell::new(None),
            this: this.clone(),
        })
    }

    /// Extension declaration building fresh hooks for every node.
    pub fn extension(name: impl Into<String>, hooks: impl Fn() -> H + 'static) -> ExtensionDef {
        ExtensionDef::new(name, move || Validator::new(hooks()))
            .with_capability::<Validator<H>, dyn NodeAdapter>(|v| v as Rc<dyn NodeAdapter>)
            .with_capability::<Validator<H>, Validator<H>>(|v| v)
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    fn as_listener(&self) -> Option<Rc<dyn ValidationListener>> {
        self.this
            .upgrade()
            .map(|v| v as Rc<dyn ValidationListener>)
    }

    fn enter(&self, dom: &mut Dom, root: NodeId) -> DomResult<()> {
        for node in dom.subtree(root).collect::<Vec<_>>() {
            self.hooks.add_node(dom, &self.scope, node)?;
            let contexts = dom.capabilities::<dyn ValidationContext>(node)?;
            if let Some(listener) = self.as_listener() {
                for context in contexts {
                    context.add_validation_listener(listener.clone());
                    self.scope.add_context(node, Rc::downgrade(&context));
                }
            }
        }
        Ok(())
    }

    fn leave(&self, dom: &mut Dom, root: NodeId) -> DomResult<()> {
        for node in dom.subtree(root).collect::<Vec<_>>() {
            self.hooks.remove_node(dom, &self.scope, node)?;
            if let Some(listener) = self.as_listener() {
                for context in self.scope.take_contexts(node) {
                    if let Some(context) = context.upgrade() {
                        context.remove_validation_listener(&listener);
                    }
                }
            }
        }
        Ok(())
    }
}

impl<H: Validate> NodeListener for Validator<H> {
    fn attribute_changing(&self, dom: &mut Dom, event: &AttributeEvent) -> DomResult<()> {
        self.hooks.attribute_changing(dom, &self.scope, event)
    }

    fn attribute_changed(&self, dom: &mut Dom, event: &AttributeEvent) -> DomResult<()> {
        self.hooks.attribute_changed(dom, &self.scope, event)
    }

    fn child_inserted(&self, dom: &mut Dom, event: &ChildEvent) -> DomResult<()> {
        self.enter(dom, event.child)?;
        self.hooks.child_inserted(dom, &self.scope, event)
    }

    fn child_removed(&self, dom: &mut Dom, event: &ChildEvent) -> DomResult<()> {
        self.leave(dom, event.child)?;
        self.hooks.child_removed(dom, &self.scope, event)
    }
}

impl<H: Validate> NodeAdapter for Validator<H> {
    fn on_node_set(self: Rc<Self>, dom: &mut Dom, node: NodeId) -> DomResult<()> {
        if self.registration.get().is_some() {
            return Ok(());
        }
        self.scope.set_root(node);
        let id = dom.add_listener(node, self.clone() as Rc<dyn NodeListener>)?;
        self.registration.set(Some(id));
        self.enter(dom, node)
    }
}

impl<H: Validate> ValidationListener for Validator<H> {
    fn beginning(&self, dom: &mut Dom, args: &mut BeginArgs) -> DomResult<()> {
        self.scope.set_flags(true, true);
        self.hooks.beginning(dom, &self.scope, args)
    }

    fn ending(&self, dom: &mut Dom) -> DomResult<()> {
        self.scope.end_validating();
        self.hooks.ending(dom, &self.scope)
    }

    fn ended(&self, dom: &mut Dom) -> DomResult<()> {
        self.scope.set_flags(false, false);
        self.hooks.ended(dom, &self.scope)
    }

    fn cancelled(&self, dom: &mut Dom) -> DomResult<()> {
        self.scope.set_flags(false, false);
        self.hooks.cancelled(dom, &self.scope)
    }
}
