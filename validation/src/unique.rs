//! Id uniqueness.
//!
//! Ids are unique within a bucket: the whole subtree, a category derived
//! from the node type, or the children of one parent. Changes made while
//! validating are buffered and resolved at Ending: removed nodes retire
//! their names, renamed nodes are checked against the collision policy, and
//! added nodes whose id is taken receive the lowest free suffixed variant.
//! Name allocation is journaled per transaction and rolled back on cancel,
//! so the undo traffic that follows is ignored.

use crate::{Observe, Scope, UniqueNamer, Validate};
use arbor_core::NodeId;
use arbor_dom::{AttributeEvent, Dom, DomError, DomResult};
use arbor_schema::{FieldMetadata, NodeType};
use arbor_transaction::BeginArgs;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// What an id must be unique within.
#[derive(Clone)]
pub enum IdScope {
    /// The validator's whole subtree.
    Subtree,
    /// Nodes whose types map to the same category.
    Category(Rc<dyn Fn(&NodeType) -> String>),
    /// Siblings under the same parent.
    Parent,
}

impl IdScope {
    pub fn category(f: impl Fn(&NodeType) -> String + 'static) -> Self {
        Self::Category(Rc::new(f))
    }
}

impl fmt::Debug for IdScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subtree => write!(f, "Subtree"),
            Self::Category(_) => write!(f, "Category(..)"),
            Self::Parent => write!(f, "Parent"),
        }
    }
}

/// What to do when a renamed node takes an id that is already used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Fail the transaction.
    #[default]
    Fail,
    /// Rename the node to a free variant.
    Rename,
}

/// Options for a `UniqueIdValidator`.
#[derive(Debug, Clone)]
pub struct UniqueIdOptions {
    pub separator: String,
    pub collision: CollisionPolicy,
}

impl UniqueIdOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_collision(mut self, collision: CollisionPolicy) -> Self {
        self.collision = collision;
        self
    }
}

impl Default for UniqueIdOptions {
    fn default() -> Self {
        Self {
            separator: "_".to_string(),
            collision: CollisionPolicy::Fail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Bucket {
    Global,
    Category(String),
    Parent(Option<NodeId>),
}

#[derive(Debug, Default)]
struct Pending {
    added: Vec<NodeId>,
    removed: Vec<NodeId>,
    renamed: Vec<NodeId>,
}

/// Keeps ids unique within an `IdScope`.
pub struct UniqueIdValidator {
    id_scope: IdScope,
    options: UniqueIdOptions,
    namers: RefCell<HashMap<Bucket, UniqueNamer>>,
    placed: RefCell<HashMap<NodeId, Bucket>>,
    placed_journal: RefCell<Vec<(NodeId, Option<Bucket>)>>,
    pending: RefCell<Pending>,
    journaling: Cell<bool>,
}

impl UniqueIdValidator {
    pub fn new(id_scope: IdScope, options: UniqueIdOptions) -> Self {
        Self {
            id_scope,
            options,
            namers: RefCell::new(HashMap::new()),
            placed: RefCell::new(HashMap::new()),
            placed_journal: RefCell::new(Vec::new()),
            pending: RefCell::new(Pending::default()),
            journaling: Cell::new(false),
        }
    }

    pub fn subtree() -> Self {
        Self::new(IdScope::Subtree, UniqueIdOptions::default())
    }

    pub fn options(&self) -> &UniqueIdOptions {
        &self.options
    }

    /// The node currently holding `id` in the bucket of `near`.
    pub fn owner_of(&self, dom: &Dom, near: NodeId, id: &str) -> DomResult<Option<NodeId>> {
        let bucket = self.bucket_of(dom, near)?;
        Ok(self.namers.borrow().get(&bucket).and_then(|n| n.owner(id)))
    }

    fn bucket_of(&self, dom: &Dom, node: NodeId) -> DomResult<Bucket> {
        Ok(match &self.id_scope {
            IdScope::Subtree => Bucket::Global,
            IdScope::Category(category) => Bucket::Category(category(dom.node_type(node)?.as_ref())),
            IdScope::Parent => Bucket::Parent(dom.parent(node)?),
        })
    }

    fn with_namer<R>(&self, bucket: &Bucket, f: impl FnOnce(&mut UniqueNamer) -> R) -> R {
        let mut namers = self.namers.borrow_mut();
        let namer = namers.entry(bucket.clone()).or_insert_with(|| {
            let mut namer = UniqueNamer::new(self.options.separator.clone());
            if self.journaling.get() {
                namer.begin();
            }
            namer
        });
        f(namer)
    }

    fn set_placed(&self, node: NodeId, bucket: Option<Bucket>) {
        let previous = match bucket {
            Some(bucket) => self.placed.borrow_mut().insert(node, bucket),
            None => self.placed.borrow_mut().remove(&node),
        };
        if self.journaling.get() {
            self.placed_journal.borrow_mut().push((node, previous));
        }
    }

    fn rollback_placed(&self) {
        let journal = std::mem::take(&mut *self.placed_journal.borrow_mut());
        let mut placed = self.placed.borrow_mut();
        for (node, previous) in journal.into_iter().rev() {
            match previous {
                Some(bucket) => placed.insert(node, bucket),
                None => placed.remove(&node),
            };
        }
    }

    /// Record `node` under its current id without any checks.
    fn place(&self, dom: &Dom, node: NodeId) -> DomResult<()> {
        let bucket = self.bucket_of(dom, node)?;
        let previous = self.placed.borrow().get(&node).cloned();
        if let Some(previous) = previous.filter(|previous| *previous != bucket) {
            self.with_namer(&previous, |namer| namer.release(node));
        }
        match dom.id(node)? {
            Some(id) if !id.is_empty() => self.with_namer(&bucket, |namer| namer.assign(node, &id)),
            _ => self.with_namer(&bucket, |namer| namer.release(node)),
        }
        self.set_placed(node, Some(bucket));
        Ok(())
    }

    fn unplace(&self, node: NodeId) {
        let bucket = self.placed.borrow().get(&node).cloned();
        if let Some(bucket) = bucket {
            self.set_placed(node, None);
            self.with_namer(&bucket, |namer| namer.release(node));
        }
    }

    fn is_id_attribute(dom: &Dom, event: &AttributeEvent) -> DomResult<bool> {
        Ok(dom
            .node_type(event.node)?
            .id_attribute()?
            .is_some_and(|id| id.is_equivalent(&event.attribute)))
    }

    /// Write `id` through the node's id attribute.
    fn rename(dom: &mut Dom, node: NodeId, id: &str) -> DomResult<()> {
        let node_type = dom.node_type(node)?;
        let Some(attribute) = node_type.id_attribute()? else {
            return Ok(());
        };
        tracing::debug!(node = %node, id, "renaming to keep ids unique");
        dom.set_attribute_from_string(node, &attribute, id)
    }

    fn resolve_renamed(&self, dom: &mut Dom, scope: &Scope, node: NodeId) -> DomResult<()> {
        let Some(bucket) = self.placed.borrow().get(&node).cloned() else {
            return Ok(());
        };
        if !scope.contains(dom, node) {
            return Ok(());
        }
        let id = dom.id(node)?.unwrap_or_default();
        if id.is_empty() {
            self.with_namer(&bucket, |namer| namer.release(node));
            return Ok(());
        }
        if self.with_namer(&bucket, |namer| namer.is_free(&id, node)) {
            self.with_namer(&bucket, |namer| namer.assign(node, &id));
            return Ok(());
        }
        match self.options.collision {
            CollisionPolicy::Fail => Err(DomError::invalid_operation(format!(
                "id '{}' of {} is already in use",
                id, node
            ))),
            CollisionPolicy::Rename => {
                let unique = self.with_namer(&bucket, |namer| namer.disambiguate(&id));
                Self::rename(dom, node, &unique)
            }
        }
    }

    fn resolve_added(&self, dom: &mut Dom, scope: &Scope, node: NodeId) -> DomResult<()> {
        if !dom.contains(node) || !scope.contains(dom, node) {
            return Ok(());
        }
        let bucket = self.bucket_of(dom, node)?;
        self.set_placed(node, Some(bucket.clone()));
        let id = match dom.id(node)? {
            Some(id) if !id.is_empty() => id,
            _ => return Ok(()),
        };
        if self.with_namer(&bucket, |namer| namer.is_free(&id, node)) {
            self.with_namer(&bucket, |namer| namer.assign(node, &id));
            return Ok(());
        }
        let unique = self.with_namer(&bucket, |namer| namer.disambiguate(&id));
        Self::rename(dom, node, &unique)
    }
}

impl Observe for UniqueIdValidator {
    fn add_node(&self, dom: &mut Dom, scope: &Scope, node: NodeId) -> DomResult<()> {
        if scope.is_undoing() {
            return Ok(());
        }
        if !scope.is_validating() {
            return self.place(dom, node);
        }
        let same_bucket = match self.placed.borrow().get(&node) {
            Some(bucket) => *bucket == self.bucket_of(dom, node)?,
            None => false,
        };
        let mut pending = self.pending.borrow_mut();
        match pending.removed.iter().position(|n| *n == node) {
            // Reinserted where it was: the name slot is untouched.
            Some(pos) if same_bucket => {
                pending.removed.remove(pos);
            }
            _ => {
                if !pending.added.contains(&node) {
                    pending.added.push(node);
                }
            }
        }
        Ok(())
    }

    fn remove_node(&self, _dom: &mut Dom, scope: &Scope, node: NodeId) -> DomResult<()> {
        if scope.is_undoing() {
            return Ok(());
        }
        if !scope.is_validating() {
            self.unplace(node);
            return Ok(());
        }
        let mut pending = self.pending.borrow_mut();
        match pending.added.iter().position(|n| *n == node) {
            Some(pos) => {
                pending.added.remove(pos);
            }
            None => {
                if self.placed.borrow().contains_key(&node) && !pending.removed.contains(&node) {
                    pending.removed.push(node);
                }
            }
        }
        Ok(())
    }

    fn attribute_changed(&self, dom: &mut Dom, scope: &Scope, event: &AttributeEvent) -> DomResult<()> {
        if scope.is_undoing() {
            return Ok(());
        }
        if !Self::is_id_attribute(dom, event)? || !scope.contains(dom, event.node) {
            return Ok(());
        }
        if !scope.is_validating() {
            return self.place(dom, event.node);
        }
        let mut pending = self.pending.borrow_mut();
        let tracked = pending.added.contains(&event.node) || pending.renamed.contains(&event.node);
        if !tracked && self.placed.borrow().contains_key(&event.node) {
            pending.renamed.push(event.node);
        }
        Ok(())
    }
}

impl Validate for UniqueIdValidator {
    fn beginning(&self, _dom: &mut Dom, _scope: &Scope, _args: &mut BeginArgs) -> DomResult<()> {
        *self.pending.borrow_mut() = Pending::default();
        self.placed_journal.borrow_mut().clear();
        self.journaling.set(true);
        for namer in self.namers.borrow_mut().values_mut() {
            namer.begin();
        }
        Ok(())
    }

    fn ending(&self, dom: &mut Dom, scope: &Scope) -> DomResult<()> {
        let pending = std::mem::take(&mut *self.pending.borrow_mut());
        tracing::debug!(
            added = pending.added.len(),
            removed = pending.removed.len(),
            renamed = pending.renamed.len(),
            "resolving ids"
        );
        for node in pending.removed {
            self.unplace(node);
        }
        for node in pending.renamed {
            self.resolve_renamed(dom, scope, node)?;
        }
        for node in pending.added {
            self.resolve_added(dom, scope, node)?;
        }
        Ok(())
    }

    fn ended(&self, _dom: &mut Dom, _scope: &Scope) -> DomResult<()> {
        self.journaling.set(false);
        self.placed_journal.borrow_mut().clear();
        for namer in self.namers.borrow_mut().values_mut() {
            namer.commit();
        }
        Ok(())
    }

    fn cancelled(&self, _dom: &mut Dom, _scope: &Scope) -> DomResult<()> {
        *self.pending.borrow_mut() = Pending::default();
        self.journaling.set(false);
        self.rollback_placed();
        for namer in self.namers.borrow_mut().values_mut() {
            namer.rollback();
        }
        Ok(())
    }
}
