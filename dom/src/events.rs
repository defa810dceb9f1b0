//! Change events and lineage-scoped dispatch.
//!
//! Listeners are registered on a node and receive every event raised on
//! that node or any of its descendants. Attribute events originate at the
//! changed node; child events originate at the parent. A node may also
//! subscribe to another node, mirroring that node's event stream into its
//! own listeners.

use crate::{Dom, DomError, DomResult};
use arbor_core::{NodeId, Value};
use arbor_schema::{AttributeInfo, ChildInfo};
use std::collections::HashSet;
use std::rc::Rc;

/// Handle returned by `Dom::add_listener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// An attribute change.
#[derive(Debug, Clone)]
pub struct AttributeEvent {
    /// The node whose attribute changes.
    pub node: NodeId,
    /// Metadata from the node's own type.
    pub attribute: Rc<AttributeInfo>,
    /// Effective value before the change.
    pub old_value: Value,
    /// Effective value after the change.
    pub new_value: Value,
    /// Raw slot content before the change (`None` means defaulted).
    pub old_local: Option<Value>,
    /// Raw slot content after the change.
    pub new_local: Option<Value>,
}

/// A structural change. Raised on the parent.
#[derive(Debug, Clone)]
pub struct ChildEvent {
    pub parent: NodeId,
    pub child: NodeId,
    /// Metadata from the parent's own type.
    pub child_info: Rc<ChildInfo>,
    /// Position in the list (0 for singleton fields).
    pub index: usize,
}

/// Receives change events from a node and its descendants.
///
/// Errors returned from the pre-change methods abort the mutation.
#[allow(unused_variables)]
pub trait NodeListener {
    fn attribute_changing(&self, dom: &mut Dom, event: &AttributeEvent) -> DomResult<()> {
        Ok(())
    }

    fn attribute_changed(&self, dom: &mut Dom, event: &AttributeEvent) -> DomResult<()> {
        Ok(())
    }

    fn child_inserting(&self, dom: &mut Dom, event: &ChildEvent) -> DomResult<()> {
        Ok(())
    }

    fn child_inserted(&self, dom: &mut Dom, event: &ChildEvent) -> DomResult<()> {
        Ok(())
    }

    fn child_removing(&self, dom: &mut Dom, event: &ChildEvent) -> DomResult<()> {
        Ok(())
    }

    fn child_removed(&self, dom: &mut Dom, event: &ChildEvent) -> DomResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventKind {
    AttributeChanging,
    AttributeChanged,
    ChildInserting,
    ChildInserted,
    ChildRemoving,
    ChildRemoved,
}

/// Per-node multiplexer, created on first registration.
#[derive(Default)]
pub(crate) struct EventHub {
    listeners: Vec<(ListenerId, Rc<dyn NodeListener>)>,
    subscribers: Vec<NodeId>,
}

impl EventHub {
    fn is_empty(&self) -> bool {
        self.listeners.is_empty() && self.subscribers.is_empty()
    }
}

impl Dom {
    // ==================== Registration ====================

    /// Register a listener for events on `node` and its descendants.
    pub fn add_listener(
        &mut self,
        node: NodeId,
        listener: Rc<dyn NodeListener>,
    ) -> DomResult<ListenerId> {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        let data = self.data_mut(node)?;
        data.events
            .get_or_insert_with(Default::default)
            .listeners
            .push((id, listener));
        Ok(id)
    }

    /// Remove a listener. Returns false if it was not registered on `node`.
    pub fn remove_listener(&mut self, node: NodeId, id: ListenerId) -> DomResult<bool> {
        let data = self.data_mut(node)?;
        let Some(hub) = data.events.as_mut() else {
            return Ok(false);
        };
        let before = hub.listeners.len();
        hub.listeners.retain(|(lid, _)| *lid != id);
        let removed = hub.listeners.len() != before;
        if hub.is_empty() {
            data.events = None;
        }
        Ok(removed)
    }

    /// Mirror events reaching `source` into `subscriber`'s listeners.
    pub fn subscribe(&mut self, source: NodeId, subscriber: NodeId) -> DomResult<()> {
        if !self.contains(subscriber) {
            return Err(DomError::NodeNotFound(subscriber));
        }
        let hub = self.data_mut(source)?.events.get_or_insert_with(Default::default);
        if !hub.subscribers.contains(&subscriber) {
            hub.subscribers.push(subscriber);
        }
        Ok(())
    }

    /// Undo `subscribe`. Returns false if no subscription existed.
    pub fn unsubscribe(&mut self, source: NodeId, subscriber: NodeId) -> DomResult<bool> {
        let data = self.data_mut(source)?;
        let Some(hub) = data.events.as_mut() else {
            return Ok(false);
        };
        let before = hub.subscribers.len();
        hub.subscribers.retain(|s| *s != subscriber);
        let removed = hub.subscribers.len() != before;
        if hub.is_empty() {
            data.events = None;
        }
        Ok(removed)
    }

    /// Number of listeners registered directly on `node`.
    pub fn listener_count(&self, node: NodeId) -> usize {
        self.nodes
            .get(&node)
            .and_then(|d| d.events.as_ref())
            .map_or(0, |hub| hub.listeners.len())
    }

    // ==================== Dispatch ====================

    /// Snapshot of the listeners an event raised at `origin` reaches, in
    /// delivery order. Each hub contributes at most once.
    fn collect_listeners(&self, origin: NodeId) -> Vec<Rc<dyn NodeListener>> {
        let mut listeners = Vec::new();
        let mut visited = HashSet::new();
        for node in self.lineage(origin) {
            self.collect_hub(node, &mut listeners, &mut visited);
        }
        listeners
    }

    fn collect_hub(
        &self,
        node: NodeId,
        listeners: &mut Vec<Rc<dyn NodeListener>>,
        visited: &mut HashSet<NodeId>,
    ) {
        if !visited.insert(node) {
            return;
        }
        let Some(hub) = self.nodes.get(&node).and_then(|d| d.events.as_deref()) else {
            return;
        };
        listeners.extend(hub.listeners.iter().map(|(_, l)| l.clone()));
        for &subscriber in &hub.subscribers {
            self.collect_hub(subscriber, listeners, visited);
        }
    }

    /// Pre-change phases stop at the first failing listener. Post-change
    /// phases reach every listener and return the first error.
    pub(crate) fn raise_attribute(&mut self, kind: EventKind, event: &AttributeEvent) -> DomResult<()> {
        let mut first_error = None;
        for listener in self.collect_listeners(event.node) {
            match kind {
                EventKind::AttributeChanging => listener.attribute_changing(self, event)?,
                EventKind::AttributeChanged => {
                    keep_first(&mut first_error, listener.attribute_changed(self, event))
                }
                _ => {}
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub(crate) fn raise_child(&mut self, kind: EventKind, event: &ChildEvent) -> DomResult<()> {
        let mut first_error = None;
        for listener in self.collect_listeners(event.parent) {
            match kind {
                EventKind::ChildInserting => listener.child_inserting(self, event)?,
                EventKind::ChildRemoving => listener.child_removing(self, event)?,
                EventKind::ChildInserted => keep_first(&mut first_error, listener.child_inserted(self, event)),
                EventKind::ChildRemoved => keep_first(&mut first_error, listener.child_removed(self, event)),
                _ => {}
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

fn keep_first(first_error: &mut Option<DomError>, result: DomResult<()>) {
    if let Err(error) = result {
        if first_error.is_none() {
            *first_error = Some(error);
        }
    }
}
