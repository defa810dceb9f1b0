//! Change reporting.
//!
//! `TransactionReporter` forwards changes in its subtree to a
//! `ReportListener`. Inside a transaction it records them and replays a
//! coalesced summary once the transaction has committed:
//! - attribute changes collapse into one first-old/last-new change per
//!   node and attribute
//! - a node inserted and removed again is not reported, nor are the changes
//!   made to it in between
//! - a node removed and reinserted under the same parent field has only
//!   its structural pair dropped. Its attribute changes made while attached
//!   are still reported. Changes made while it was detached never reach the
//!   reporter. A node reinserted elsewhere is reported as a move.
//!
//! Rollback traffic is never reported.

use crate::{Observe, Scope, Validate};
use arbor_core::{NodeId, Value};
use arbor_dom::{AttributeEvent, ChildEvent, Dom, DomResult};
use arbor_schema::{AttributeInfo, ChildInfo, FieldMetadata, FieldSlot};
use arbor_transaction::BeginArgs;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct AttributeChange {
    pub node: NodeId,
    pub attribute: Rc<AttributeInfo>,
    pub old_value: Value,
    pub new_value: Value,
}

#[derive(Debug, Clone)]
pub struct ChildChange {
    pub parent: NodeId,
    pub child: NodeId,
    pub child_info: Rc<ChildInfo>,
    pub index: usize,
}

impl From<&ChildEvent> for ChildChange {
    fn from(event: &ChildEvent) -> Self {
        Self {
            parent: event.parent,
            child: event.child,
            child_info: event.child_info.clone(),
            index: event.index,
        }
    }
}

/// Receives reported changes.
#[allow(unused_variables)]
pub trait ReportListener: 'static {
    fn attribute_changed(&self, dom: &Dom, change: &AttributeChange) -> DomResult<()> {
        Ok(())
    }

    fn child_inserted(&self, dom: &Dom, change: &ChildChange) -> DomResult<()> {
        Ok(())
    }

    fn child_removed(&self, dom: &Dom, change: &ChildChange) -> DomResult<()> {
        Ok(())
    }

    /// Called after the summary of a committed transaction was replayed.
    fn transaction_finished(&self, dom: &Dom) -> DomResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Change {
    Attribute(AttributeChange),
    Inserted(ChildChange),
    Removed(ChildChange),
}

impl Change {
    fn child(&self) -> Option<&ChildChange> {
        match self {
            Change::Inserted(change) | Change::Removed(change) => Some(change),
            Change::Attribute(_) => None,
        }
    }
}

/// Reports the changes of a subtree, coalesced per transaction.
pub struct TransactionReporter<L> {
    listener: L,
    recorded: RefCell<Vec<Change>>,
}

impl<L: ReportListener> TransactionReporter<L> {
    pub fn new(listener: L) -> Self {
        Self {
            listener,
            recorded: RefCell::new(Vec::new()),
        }
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    fn record(&self, dom: &Dom, scope: &Scope, change: Change) -> DomResult<()> {
        if scope.in_transaction() {
            self.recorded.borrow_mut().push(change);
            return Ok(());
        }
        if scope.is_undoing() {
            return Ok(());
        }
        self.emit(dom, &change)
    }

    fn emit(&self, dom: &Dom, change: &Change) -> DomResult<()> {
        match change {
            Change::Attribute(change) => self.listener.attribute_changed(dom, change),
            Change::Inserted(change) => self.listener.child_inserted(dom, change),
            Change::Removed(change) => self.listener.child_removed(dom, change),
        }
    }
}

impl<L> fmt::Debug for TransactionReporter<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionReporter")
            .field("recorded", &self.recorded.borrow().len())
            .finish()
    }
}

/// The recorded changes that survive coalescing, in recording order.
fn coalesce(dom: &Dom, recorded: Vec<Change>) -> Vec<Change> {
    // first and last structural event per child
    let mut spans: HashMap<NodeId, (usize, usize)> = HashMap::new();
    for (position, change) in recorded.iter().enumerate() {
        if let Some(child) = change.child() {
            spans
                .entry(child.child)
                .and_modify(|span| span.1 = position)
                .or_insert((position, position));
        }
    }

    let mut kept_children = HashSet::new();
    let mut transient = HashSet::new();
    for (&child, &(first, last)) in &spans {
        match (&recorded[first], &recorded[last]) {
            (Change::Inserted(_), Change::Removed(_)) => {
                transient.extend(dom.subtree(child));
            }
            (Change::Removed(removed), Change::Inserted(inserted))
                if removed.parent == inserted.parent
                    && removed.child_info.is_equivalent(&inserted.child_info) => {}
            (first_change, last_change) => {
                if matches!(first_change, Change::Removed(_)) {
                    kept_children.insert(first);
                }
                if matches!(last_change, Change::Inserted(_)) {
                    kept_children.insert(last);
                }
            }
        }
    }

    let mut attributes: HashMap<(NodeId, FieldSlot), usize> = HashMap::new();
    let mut result: Vec<Change> = Vec::new();
    for (position, change) in recorded.into_iter().enumerate() {
        match change {
            Change::Attribute(change) => {
                if transient.contains(&change.node) {
                    continue;
                }
                match attributes.get(&(change.node, change.attribute.slot())) {
                    Some(&at) => {
                        if let Change::Attribute(first) = &mut result[at] {
                            first.new_value = change.new_value;
                        }
                    }
                    None => {
                        attributes.insert((change.node, change.attribute.slot()), result.len());
                        result.push(Change::Attribute(change));
                    }
                }
            }
            structural => {
                if kept_children.contains(&position) {
                    result.push(structural);
                }
            }
        }
    }
    result
}

impl<L: ReportListener> Observe for TransactionReporter<L> {
    fn attribute_changed(&self, dom: &mut Dom, scope: &Scope, event: &AttributeEvent) -> DomResult<()> {
        let change = Change::Attribute(AttributeChange {
            node: event.node,
            attribute: event.attribute.clone(),
            old_value: event.old_value.clone(),
            new_value: event.new_value.clone(),
        });
        self.record(dom, scope, change)
    }

    fn child_inserted(&self, dom: &mut Dom, scope: &Scope, event: &ChildEvent) -> DomResult<()> {
        self.record(dom, scope, Change::Inserted(event.into()))
    }

    fn child_removed(&self, dom: &mut Dom, scope: &Scope, event: &ChildEvent) -> DomResult<()> {
        self.record(dom, scope, Change::Removed(event.into()))
    }
}

impl<L: ReportListener> Validate for TransactionReporter<L> {
    fn beginning(&self, _dom: &mut Dom, _scope: &Scope, _args: &mut BeginArgs) -> DomResult<()> {
        self.recorded.borrow_mut().clear();
        Ok(())
    }

    fn ended(&self, dom: &mut Dom, _scope: &Scope) -> DomResult<()> {
        let recorded = std::mem::take(&mut *self.recorded.borrow_mut());
        let recorded_count = recorded.len();
        let summary = coalesce(dom, recorded);
        tracing::debug!(recorded = recorded_count, reported = summary.len(), "replaying transaction");
        for change in &summary {
            self.emit(dom, change)?;
        }
        self.listener.transaction_finished(dom)
    }

    fn cancelled(&self, _dom: &mut Dom, _scope: &Scope) -> DomResult<()> {
        self.recorded.borrow_mut().clear();
        Ok(())
    }
}
