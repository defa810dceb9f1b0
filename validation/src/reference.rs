//! Reference integrity.
//!
//! The validator indexes every reference attribute in its subtree by
//! referent. At Ending, references left pointing at nodes that were removed
//! during the transaction are handed to a `ReferenceHandler`. Whatever the
//! handler removes in turn is checked too, until nothing new dangles.

use crate::{Observe, Scope, Validate};
use arbor_core::{NodeId, Value};
use arbor_dom::{AttributeEvent, Dom, DomResult};
use arbor_schema::{AttributeInfo, FieldMetadata, FieldSlot};
use arbor_transaction::BeginArgs;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

/// One reference edge: `owner.attribute` points at `referent`.
#[derive(Debug, Clone)]
pub struct Reference {
    pub owner: NodeId,
    pub attribute: Rc<AttributeInfo>,
    pub referent: NodeId,
}

/// Reactions to reference changes.
#[allow(unused_variables)]
pub trait ReferenceHandler: 'static {
    /// A reference to a node outside the subtree appeared.
    fn external_reference_added(&self, dom: &Dom, reference: &Reference) -> DomResult<()> {
        Ok(())
    }

    /// A reference to a node outside the subtree went away.
    fn external_reference_removed(&self, dom: &Dom, reference: &Reference) -> DomResult<()> {
        Ok(())
    }

    /// The referent was removed from the subtree while the reference stayed.
    /// Detaches the owner by default.
    fn referent_removed(&self, dom: &mut Dom, reference: &Reference) -> DomResult<()> {
        tracing::debug!(owner = %reference.owner, referent = %reference.referent, "detaching owner of dangling reference");
        dom.remove_from_parent(reference.owner)
    }
}

/// Default handler: owners of dangling references are detached.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachOwners;

impl ReferenceHandler for DetachOwners {}

#[derive(Debug)]
struct Entry {
    attribute: Rc<AttributeInfo>,
    // referent and whether it was outside the subtree when indexed
    referents: Vec<(NodeId, bool)>,
}

/// Keeps the reference index of a subtree and resolves dangling references
/// at the end of each transaction.
pub struct ReferenceValidator<R = DetachOwners> {
    handler: R,
    forward: RefCell<BTreeMap<(NodeId, FieldSlot), Entry>>,
    reverse: RefCell<HashMap<NodeId, BTreeSet<(NodeId, FieldSlot)>>>,
    removed: RefCell<VecDeque<NodeId>>,
    resolving: Cell<bool>,
}

impl ReferenceValidator<DetachOwners> {
    pub fn new() -> Self {
        Self::with_handler(DetachOwners)
    }
}

impl Default for ReferenceValidator<DetachOwners> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ReferenceHandler> ReferenceValidator<R> {
    pub fn with_handler(handler: R) -> Self {
        Self {
            handler,
            forward: RefCell::new(BTreeMap::new()),
            reverse: RefCell::new(HashMap::new()),
            removed: RefCell::new(VecDeque::new()),
            resolving: Cell::new(false),
        }
    }

    pub fn handler(&self) -> &R {
        &self.handler
    }

    /// Every indexed reference pointing at `referent`.
    pub fn references_to(&self, referent: NodeId) -> Vec<Reference> {
        let reverse = self.reverse.borrow();
        let Some(keys) = reverse.get(&referent) else {
            return Vec::new();
        };
        let forward = self.forward.borrow();
        keys.iter()
            .filter_map(|key| forward.get(key).map(|entry| (key.0, entry)))
            .map(|(owner, entry)| Reference {
                owner,
                attribute: entry.attribute.clone(),
                referent,
            })
            .collect()
    }

    fn index(&self, dom: &Dom, scope: &Scope, owner: NodeId, attribute: &Rc<AttributeInfo>) -> DomResult<()> {
        let referents: Vec<(NodeId, bool)> = referents_of(&dom.get_attribute(owner, attribute)?)
            .into_iter()
            .map(|referent| (referent, !scope.contains(dom, referent)))
            .collect();
        if referents.is_empty() {
            return Ok(());
        }
        let key = (owner, attribute.slot());
        {
            let mut reverse = self.reverse.borrow_mut();
            for (referent, _) in &referents {
                reverse.entry(*referent).or_default().insert(key);
            }
        }
        self.forward.borrow_mut().insert(
            key,
            Entry {
                attribute: attribute.clone(),
                referents: referents.clone(),
            },
        );
        for (referent, external) in referents {
            if external {
                self.handler.external_reference_added(
                    dom,
                    &Reference {
                        owner,
                        attribute: attribute.clone(),
                        referent,
                    },
                )?;
            }
        }
        Ok(())
    }

    fn unindex(&self, dom: &Dom, owner: NodeId, slot: FieldSlot) -> DomResult<()> {
        let Some(entry) = self.forward.borrow_mut().remove(&(owner, slot)) else {
            return Ok(());
        };
        {
            let mut reverse = self.reverse.borrow_mut();
            for (referent, _) in &entry.referents {
                if let Some(keys) = reverse.get_mut(referent) {
                    keys.remove(&(owner, slot));
                    if keys.is_empty() {
                        reverse.remove(referent);
                    }
                }
            }
        }
        for (referent, external) in entry.referents {
            if external {
                self.handler.external_reference_removed(
                    dom,
                    &Reference {
                        owner,
                        attribute: entry.attribute.clone(),
                        referent,
                    },
                )?;
            }
        }
        Ok(())
    }

    fn resolve(&self, dom: &mut Dom, scope: &Scope) -> DomResult<()> {
        loop {
            let Some(node) = self.removed.borrow_mut().pop_front() else {
                return Ok(());
            };
            if scope.contains(dom, node) {
                continue;
            }
            for reference in self.references_to(node) {
                if !scope.contains(dom, reference.owner) {
                    continue;
                }
                self.handler.referent_removed(dom, &reference)?;
            }
        }
    }
}

fn referents_of(value: &Value) -> Vec<NodeId> {
    match value {
        Value::Reference(node) => vec![*node],
        Value::Array(items) => items.iter().filter_map(Value::as_reference).collect(),
        _ => Vec::new(),
    }
}

impl<R> fmt::Debug for ReferenceValidator<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceValidator")
            .field("references", &self.forward.borrow().len())
            .field("removed", &self.removed.borrow().len())
            .finish()
    }
}

impl<R: ReferenceHandler> Observe for ReferenceValidator<R> {
    fn add_node(&self, dom: &mut Dom, scope: &Scope, node: NodeId) -> DomResult<()> {
        for attribute in dom.node_type(node)?.attributes()? {
            if attribute.attribute_type().is_reference() {
                self.index(dom, scope, node, attribute)?;
            }
        }
        Ok(())
    }

    fn remove_node(&self, dom: &mut Dom, scope: &Scope, node: NodeId) -> DomResult<()> {
        for attribute in dom.node_type(node)?.attributes()? {
            if attribute.attribute_type().is_reference() {
                self.unindex(dom, node, attribute.slot())?;
            }
        }
        if scope.is_validating() || self.resolving.get() {
            self.removed.borrow_mut().push_back(node);
        }
        Ok(())
    }

    fn attribute_changed(&self, dom: &mut Dom, scope: &Scope, event: &AttributeEvent) -> DomResult<()> {
        if !event.attribute.attribute_type().is_reference() || !scope.contains(dom, event.node) {
            return Ok(());
        }
        self.unindex(dom, event.node, event.attribute.slot())?;
        self.index(dom, scope, event.node, &event.attribute)
    }
}

impl<R: ReferenceHandler> Validate for ReferenceValidator<R> {
    fn beginning(&self, _dom: &mut Dom, _scope: &Scope, _args: &mut BeginArgs) -> DomResult<()> {
        self.removed.borrow_mut().clear();
        Ok(())
    }

    fn ending(&self, dom: &mut Dom, scope: &Scope) -> DomResult<()> {
        self.resolving.set(true);
        let result = self.resolve(dom, scope);
        self.resolving.set(false);
        self.removed.borrow_mut().clear();
        result
    }

    fn cancelled(&self, _dom: &mut Dom, _scope: &Scope) -> DomResult<()> {
        self.removed.borrow_mut().clear();
        Ok(())
    }
}
