//! Locking.

use crate::{Observe, Scope, Validate};
use arbor_core::{NodeId, Violation, Violations};
use arbor_dom::{AttributeEvent, ChildEvent, Dom, DomError, DomResult};
use arbor_schema::FieldMetadata;
use arbor_transaction::BeginArgs;
use std::cell::RefCell;
use std::collections::HashSet;

/// Options for a `LockingValidator`.
#[derive(Debug, Clone)]
pub struct LockingOptions {
    /// Name of the boolean attribute that locks a node and its subtree.
    pub attribute: String,
}

impl LockingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = attribute.into();
        self
    }
}

impl Default for LockingOptions {
    fn default() -> Self {
        Self {
            attribute: "locked".to_string(),
        }
    }
}

/// Fails transactions that modify a locked node or anything below one.
/// Toggling the lock itself is always allowed.
#[derive(Debug, Default)]
pub struct LockingValidator {
    options: LockingOptions,
    modified: RefCell<Vec<NodeId>>,
    lock_changed: RefCell<HashSet<NodeId>>,
}

impl LockingValidator {
    pub fn new(options: LockingOptions) -> Self {
        Self {
            options,
            modified: RefCell::new(Vec::new()),
            lock_changed: RefCell::new(HashSet::new()),
        }
    }

    /// True if `node` has the lock attribute set.
    pub fn is_locked(&self, dom: &Dom, node: NodeId) -> DomResult<bool> {
        let node_type = dom.node_type(node)?;
        let Some(info) = node_type.get_attribute_info(&self.options.attribute)? else {
            return Ok(false);
        };
        Ok(dom.get_attribute(node, &info)?.as_bool().unwrap_or(false))
    }

    fn touch(&self, node: NodeId) {
        let mut modified = self.modified.borrow_mut();
        if !modified.contains(&node) {
            modified.push(node);
        }
    }

    fn clear(&self) {
        self.modified.borrow_mut().clear();
        self.lock_changed.borrow_mut().clear();
    }
}

impl Observe for LockingValidator {
    fn attribute_changed(&self, _dom: &mut Dom, scope: &Scope, event: &AttributeEvent) -> DomResult<()> {
        if !scope.is_validating() {
            return Ok(());
        }
        if event.attribute.name() == self.options.attribute {
            self.lock_changed.borrow_mut().insert(event.node);
        } else {
            self.touch(event.node);
        }
        Ok(())
    }

    fn child_inserted(&self, _dom: &mut Dom, scope: &Scope, event: &ChildEvent) -> DomResult<()> {
        if scope.is_validating() {
            self.touch(event.parent);
            self.touch(event.child);
        }
        Ok(())
    }

    fn child_removed(&self, _dom: &mut Dom, scope: &Scope, event: &ChildEvent) -> DomResult<()> {
        if scope.is_validating() {
            self.touch(event.parent);
            self.touch(event.child);
        }
        Ok(())
    }
}

impl Validate for LockingValidator {
    fn beginning(&self, _dom: &mut Dom, _scope: &Scope, _args: &mut BeginArgs) -> DomResult<()> {
        self.clear();
        Ok(())
    }

    fn ending(&self, dom: &mut Dom, _scope: &Scope) -> DomResult<()> {
        let modified = std::mem::take(&mut *self.modified.borrow_mut());
        let lock_changed = std::mem::take(&mut *self.lock_changed.borrow_mut());
        let mut cleared = HashSet::new();

        for node in modified {
            if lock_changed.contains(&node) || !dom.contains(node) {
                continue;
            }
            let mut walked = Vec::new();
            for current in dom.lineage(node) {
                if cleared.contains(&current) {
                    break;
                }
                if self.is_locked(dom, current)? {
                    let violation = Violation::error(
                        "locked",
                        format!("{} cannot change: {} is locked", node, current),
                    )
                    .with_node(node);
                    tracing::warn!(node = %node, locked = %current, "lock violation");
                    return Err(DomError::Validation(Violations::from(violation)));
                }
                walked.push(current);
            }
            cleared.extend(walked);
        }
        Ok(())
    }

    fn cancelled(&self, _dom: &mut Dom, _scope: &Scope) -> DomResult<()> {
        self.clear();
        Ok(())
    }
}
