//! The transaction context extension.

use crate::lifecycle::same_listener;
use crate::{BeginArgs, Operation, ValidationContext, ValidationListener};
use arbor_core::NodeId;
use arbor_dom::{
    AttributeEvent, ChildEvent, Dom, DomError, DomResult, ListenerId, NodeAdapter, NodeListener,
};
use arbor_schema::{ExtensionDef, FieldMetadata};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionPhase {
    /// No transaction is active.
    Idle,
    /// Transaction is active; mutations are logged.
    Active,
    /// The log is being rolled back.
    Undoing,
}

/// Options for a `TransactionContext`.
#[derive(Debug, Clone, Default)]
pub struct TransactionOptions {
    /// Reject mutations made outside a transaction.
    pub require_transactions: bool,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_require_transactions(mut self, require: bool) -> Self {
        self.require_transactions = require;
        self
    }
}

/// Drives transactions over the subtree of the node it is bound to.
///
/// The context listens to every change below its node and logs each one
/// while a transaction is active, so that `cancel` can restore the prior
/// state exactly.
pub struct TransactionContext {
    options: TransactionOptions,
    phase: Cell<TransactionPhase>,
    name: RefCell<Option<String>>,
    log: RefCell<Vec<Operation>>,
    listeners: RefCell<Vec<Rc<dyn ValidationListener>>>,
    node: Cell<Option<NodeId>>,
    registration: Cell<Option<ListenerId>>,
}

impl TransactionContext {
    pub fn new(options: TransactionOptions) -> Rc<Self> {
        Rc::new(Self {
            options,
            phase: Cell::new(TransactionPhase::Idle),
            name: RefCell::new(None),
            log: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            node: Cell::new(None),
            registration: Cell::new(None),
        })
    }

    /// Extension declaration that gives every node of a type its own context.
    pub fn extension(name: impl Into<String>, options: TransactionOptions) -> ExtensionDef {
        ExtensionDef::new(name, move || TransactionContext::new(options.clone()))
            .with_capability::<TransactionContext, dyn NodeAdapter>(|c| c as Rc<dyn NodeAdapter>)
            .with_capability::<TransactionContext, dyn ValidationContext>(|c| {
                c as Rc<dyn ValidationContext>
            })
            .with_capability::<TransactionContext, TransactionContext>(|c| c)
    }

    pub fn phase(&self) -> TransactionPhase {
        self.phase.get()
    }

    /// The node this context is bound to.
    pub fn node(&self) -> Option<NodeId> {
        self.node.get()
    }

    pub fn options(&self) -> &TransactionOptions {
        &self.options
    }

    /// The mutations logged so far in the active transaction.
    pub fn operations(&self) -> Vec<Operation> {
        self.log.borrow().clone()
    }

    pub fn operation_count(&self) -> usize {
        self.log.borrow().len()
    }

    fn snapshot_listeners(&self) -> Vec<Rc<dyn ValidationListener>> {
        self.listeners.borrow().clone()
    }

    // ==================== Lifecycle ====================

    /// Start a transaction. Returns `Ok(false)` if a listener cancelled it.
    pub fn begin(&self, dom: &mut Dom, name: impl Into<String>) -> DomResult<bool> {
        if self.phase.get() != TransactionPhase::Idle {
            return Err(DomError::invalid_operation(format!(
                "transaction '{}' is already active",
                self.name.borrow().clone().unwrap_or_default()
            )));
        }
        let name = name.into();
        tracing::debug!(transaction = %name, "begin transaction");
        self.log.borrow_mut().clear();
        *self.name.borrow_mut() = Some(name.clone());
        self.phase.set(TransactionPhase::Active);

        let mut args = BeginArgs::new(name);
        let mut failure = None;
        for listener in self.snapshot_listeners() {
            if let Err(e) = listener.beginning(dom, &mut args) {
                failure = Some(e);
                break;
            }
            if args.is_cancelled() {
                break;
            }
        }
        if failure.is_none() && !args.is_cancelled() {
            return Ok(true);
        }

        tracing::debug!(transaction = args.name(), "transaction vetoed at begin");
        let rollback = self.rollback(dom);
        match failure {
            Some(e) => Err(e),
            None => rollback.map(|_| false),
        }
    }

    /// Commit the active transaction.
    ///
    /// If a listener fails in `ending`, the error is returned and the
    /// transaction stays active with its log intact.
    pub fn end(&self, dom: &mut Dom) -> DomResult<()> {
        self.ensure_active("end")?;
        for listener in self.snapshot_listeners() {
            if let Err(e) = listener.ending(dom) {
                tracing::warn!(
                    transaction = self.name.borrow().as_deref().unwrap_or_default(),
                    error = %e,
                    "transaction rejected"
                );
                return Err(e);
            }
        }

        let mut first_error = None;
        for listener in self.snapshot_listeners() {
            if let Err(e) = listener.ended(dom) {
                tracing::error!(error = %e, "listener failed after commit");
                first_error.get_or_insert(e);
            }
        }
        tracing::debug!(
            transaction = self.name.borrow().as_deref().unwrap_or_default(),
            operations = self.log.borrow().len(),
            "end transaction"
        );
        self.finish();
        first_error.map_or(Ok(()), Err)
    }

    /// Abandon the active transaction and roll back every logged mutation.
    pub fn cancel(&self, dom: &mut Dom) -> DomResult<()> {
        self.ensure_active("cancel")?;
        tracing::debug!(
            transaction = self.name.borrow().as_deref().unwrap_or_default(),
            operations = self.log.borrow().len(),
            "cancel transaction"
        );
        self.rollback(dom)
    }

    /// Run `f` inside a transaction. Any failure, including a failed commit,
    /// cancels the transaction and is returned.
    pub fn do_transaction<R>(
        &self,
        dom: &mut Dom,
        name: impl Into<String>,
        f: impl FnOnce(&mut Dom) -> DomResult<R>,
    ) -> DomResult<R> {
        let name = name.into();
        if !self.begin(dom, name.clone())? {
            return Err(DomError::invalid_transaction(format!(
                "transaction '{}' was cancelled",
                name
            )));
        }
        match f(dom).and_then(|value| self.end(dom).map(|_| value)) {
            Ok(value) => Ok(value),
            Err(e) => {
                if self.phase.get() == TransactionPhase::Active {
                    self.cancel(dom)?;
                }
                Err(e)
            }
        }
    }

    fn ensure_active(&self, action: &str) -> DomResult<()> {
        if self.phase.get() != TransactionPhase::Active {
            return Err(DomError::invalid_operation(format!(
                "cannot {} without an active transaction",
                action
            )));
        }
        Ok(())
    }

    /// Raise Cancelled, then undo the log in reverse.
    fn rollback(&self, dom: &mut Dom) -> DomResult<()> {
        let mut first_error = None;
        for listener in self.snapshot_listeners() {
            if let Err(e) = listener.cancelled(dom) {
                tracing::error!(error = %e, "listener failed during cancel");
                first_error.get_or_insert(e);
            }
        }

        self.phase.set(TransactionPhase::Undoing);
        let log = std::mem::take(&mut *self.log.borrow_mut());
        for operation in log.iter().rev() {
            if let Err(e) = operation.undo(dom) {
                tracing::error!(error = %e, target = %operation.target(), "undo failed");
                first_error.get_or_insert(e);
            }
        }
        self.finish();
        first_error.map_or(Ok(()), Err)
    }

    fn finish(&self) {
        self.log.borrow_mut().clear();
        *self.name.borrow_mut() = None;
        self.phase.set(TransactionPhase::Idle);
    }

    // ==================== Logging ====================

    fn check_mutable(&self, action: &str, node: NodeId) -> DomResult<()> {
        if self.options.require_transactions && self.phase.get() == TransactionPhase::Idle {
            return Err(DomError::invalid_transaction(format!(
                "{} on {} outside a transaction",
                action, node
            )));
        }
        Ok(())
    }

    fn record(&self, operation: Operation) {
        if self.phase.get() == TransactionPhase::Active {
            self.log.borrow_mut().push(operation);
        }
    }
}

impl NodeListener for TransactionContext {
    fn attribute_changing(&self, _dom: &mut Dom, event: &AttributeEvent) -> DomResult<()> {
        self.check_mutable(&format!("setting '{}'", event.attribute.name()), event.node)
    }

    fn attribute_changed(&self, _dom: &mut Dom, event: &AttributeEvent) -> DomResult<()> {
        self.record(Operation::AttributeChanged {
            node: event.node,
            attribute: event.attribute.clone(),
            old_local: event.old_local.clone(),
            new_local: event.new_local.clone(),
        });
        Ok(())
    }

    fn child_inserting(&self, _dom: &mut Dom, event: &ChildEvent) -> DomResult<()> {
        self.check_mutable("inserting a child", event.parent)
    }

    fn child_inserted(&self, _dom: &mut Dom, event: &ChildEvent) -> DomResult<()> {
        self.record(Operation::ChildInserted {
            parent: event.parent,
            child: event.child,
            child_info: event.child_info.clone(),
            index: event.index,
        });
        Ok(())
    }

    fn child_removing(&self, _dom: &mut Dom, event: &ChildEvent) -> DomResult<()> {
        self.check_mutable("removing a child", event.parent)
    }

    fn child_removed(&self, _dom: &mut Dom, event: &ChildEvent) -> DomResult<()> {
        self.record(Operation::ChildRemoved {
            parent: event.parent,
            child: event.child,
            child_info: event.child_info.clone(),
            index: event.index,
        });
        Ok(())
    }
}

impl NodeAdapter for TransactionContext {
    fn on_node_set(self: Rc<Self>, dom: &mut Dom, node: NodeId) -> DomResult<()> {
        if self.registration.get().is_some() {
            return Ok(());
        }
        let id = dom.add_listener(node, self.clone() as Rc<dyn NodeListener>)?;
        self.node.set(Some(node));
        self.registration.set(Some(id));
        Ok(())
    }
}

impl ValidationContext for TransactionContext {
    fn add_validation_listener(&self, listener: Rc<dyn ValidationListener>) {
        let mut listeners = self.listeners.borrow_mut();
        if !listeners.iter().any(|l| same_listener(l, &listener)) {
            listeners.push(listener);
        }
    }

    fn remove_validation_listener(&self, listener: &Rc<dyn ValidationListener>) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    fn in_transaction(&self) -> bool {
        self.phase.get() == TransactionPhase::Active
    }

    fn is_undoing(&self) -> bool {
        self.phase.get() == TransactionPhase::Undoing
    }

    fn transaction_name(&self) -> Option<String> {
        self.name.borrow().clone()
    }
}
