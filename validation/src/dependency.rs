//! Dependency-ordered recomputation.

use crate::{Observe, Scope, Validate};
use arbor_core::NodeId;
use arbor_dom::{AttributeEvent, ChildEvent, Dom, DomResult};
use arbor_transaction::BeginArgs;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// What a node depends on and how to bring it up to date.
pub trait DependencyRules: 'static {
    /// The nodes whose state `node` is derived from.
    fn dependencies(&self, dom: &Dom, node: NodeId) -> DomResult<Vec<NodeId>>;

    /// Recompute `node` after something it depends on changed.
    fn update(&self, dom: &mut Dom, node: NodeId) -> DomResult<()>;
}

/// Keeps a dependency graph over the subtree. Nodes changed in a
/// transaction, and everything depending on them, are updated once after
/// commit, dependencies first.
pub struct DependencyValidator<D> {
    rules: D,
    depends_on: RefCell<HashMap<NodeId, BTreeSet<NodeId>>>,
    dependents: RefCell<HashMap<NodeId, BTreeSet<NodeId>>>,
    invalid: RefCell<BTreeSet<NodeId>>,
}

impl<D: DependencyRules> DependencyValidator<D> {
    pub fn new(rules: D) -> Self {
        Self {
            rules,
            depends_on: RefCell::new(HashMap::new()),
            dependents: RefCell::new(HashMap::new()),
            invalid: RefCell::new(BTreeSet::new()),
        }
    }

    pub fn rules(&self) -> &D {
        &self.rules
    }

    pub fn dependencies_of(&self, node: NodeId) -> Vec<NodeId> {
        self.depends_on
            .borrow()
            .get(&node)
            .map(|deps| deps.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn dependents_of(&self, node: NodeId) -> Vec<NodeId> {
        self.dependents
            .borrow()
            .get(&node)
            .map(|deps| deps.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Nodes waiting for an update, in id order.
    pub fn invalid_nodes(&self) -> Vec<NodeId> {
        self.invalid.borrow().iter().copied().collect()
    }

    fn refresh(&self, dom: &Dom, node: NodeId) -> DomResult<()> {
        let dependencies = self.rules.dependencies(dom, node)?;
        self.drop_edges(node);
        let mut depends_on = self.depends_on.borrow_mut();
        let mut dependents = self.dependents.borrow_mut();
        for dependency in dependencies {
            if dependency == node {
                continue;
            }
            depends_on.entry(node).or_default().insert(dependency);
            dependents.entry(dependency).or_default().insert(node);
        }
        Ok(())
    }

    fn drop_edges(&self, node: NodeId) {
        let Some(old) = self.depends_on.borrow_mut().remove(&node) else {
            return;
        };
        let mut dependents = self.dependents.borrow_mut();
        for dependency in old {
            if let Some(set) = dependents.get_mut(&dependency) {
                set.remove(&node);
                if set.is_empty() {
                    dependents.remove(&dependency);
                }
            }
        }
    }

    /// Mark `node` and everything that transitively depends on it.
    fn invalidate(&self, node: NodeId) {
        let dependents = self.dependents.borrow();
        let mut invalid = self.invalid.borrow_mut();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if !invalid.insert(current) {
                continue;
            }
            if let Some(next) = dependents.get(&current) {
                stack.extend(next.iter().copied());
            }
        }
    }

    fn invalidate_dependents(&self, node: NodeId) {
        for dependent in self.dependents_of(node) {
            self.invalidate(dependent);
        }
    }

    /// Invalid nodes with dependencies ahead of dependents. Nodes caught in
    /// a cycle follow in id order.
    fn update_order(&self) -> Vec<NodeId> {
        let invalid = self.invalid.borrow();
        let depends_on = self.depends_on.borrow();
        let dependents = self.dependents.borrow();

        let mut pending: BTreeMap<NodeId, usize> = invalid
            .iter()
            .map(|node| {
                let count = depends_on
                    .get(node)
                    .map_or(0, |deps| deps.iter().filter(|d| invalid.contains(d)).count());
                (*node, count)
            })
            .collect();
        let mut ready: BTreeSet<NodeId> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(node, _)| *node)
            .collect();
        let mut order = Vec::with_capacity(invalid.len());

        while let Some(node) = ready.pop_first() {
            pending.remove(&node);
            order.push(node);
            for dependent in dependents.get(&node).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }
        order.extend(pending.into_keys());
        order
    }
}

impl<D> fmt::Debug for DependencyValidator<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyValidator")
            .field("nodes", &self.depends_on.borrow().len())
            .field("invalid", &self.invalid.borrow().len())
            .finish()
    }
}

impl<D: DependencyRules> Observe for DependencyValidator<D> {
    fn add_node(&self, dom: &mut Dom, scope: &Scope, node: NodeId) -> DomResult<()> {
        self.refresh(dom, node)?;
        if scope.in_transaction() {
            self.invalidate(node);
        }
        Ok(())
    }

    fn remove_node(&self, _dom: &mut Dom, scope: &Scope, node: NodeId) -> DomResult<()> {
        if scope.in_transaction() {
            self.invalidate_dependents(node);
        }
        self.drop_edges(node);
        self.invalid.borrow_mut().remove(&node);
        Ok(())
    }

    fn attribute_changed(&self, dom: &mut Dom, scope: &Scope, event: &AttributeEvent) -> DomResult<()> {
        if !scope.contains(dom, event.node) {
            return Ok(());
        }
        self.refresh(dom, event.node)?;
        if scope.in_transaction() {
            self.invalidate(event.node);
        }
        Ok(())
    }

    fn child_inserted(&self, dom: &mut Dom, scope: &Scope, event: &ChildEvent) -> DomResult<()> {
        self.refresh(dom, event.parent)?;
        if scope.in_transaction() {
            self.invalidate(event.parent);
        }
        Ok(())
    }

    fn child_removed(&self, dom: &mut Dom, scope: &Scope, event: &ChildEvent) -> DomResult<()> {
        self.refresh(dom, event.parent)?;
        if scope.in_transaction() {
            self.invalidate(event.parent);
        }
        Ok(())
    }
}

impl<D: DependencyRules> Validate for DependencyValidator<D> {
    fn beginning(&self, _dom: &mut Dom, _scope: &Scope, _args: &mut BeginArgs) -> DomResult<()> {
        self.invalid.borrow_mut().clear();
        Ok(())
    }

    fn ended(&self, dom: &mut Dom, scope: &Scope) -> DomResult<()> {
        let order = self.update_order();
        self.invalid.borrow_mut().clear();
        tracing::debug!(nodes = order.len(), "updating dependents");
        for node in order {
            if dom.contains(node) && scope.contains(dom, node) {
                self.rules.update(dom, node)?;
            }
        }
        Ok(())
    }

    fn cancelled(&self, _dom: &mut Dom, _scope: &Scope) -> DomResult<()> {
        self.invalid.borrow_mut().clear();
        Ok(())
    }
}
