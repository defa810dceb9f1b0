//! Transaction lifecycle notifications.

use arbor_dom::{Dom, DomResult};
use std::rc::Rc;

/// Arguments to `ValidationListener::beginning`.
#[derive(Debug, Clone)]
pub struct BeginArgs {
    name: String,
    cancel: bool,
}

impl BeginArgs {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cancel: false,
        }
    }

    /// The name passed to `begin`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Veto the transaction.
    pub fn cancel(&mut self) {
        self.cancel = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
    }
}

/// Receives transaction lifecycle notifications.
///
/// `ending` is the commit gate: an error there fails `end()` and leaves the
/// transaction active.
#[allow(unused_variables)]
pub trait ValidationListener {
    fn beginning(&self, dom: &mut Dom, args: &mut BeginArgs) -> DomResult<()> {
        Ok(())
    }

    fn ending(&self, dom: &mut Dom) -> DomResult<()> {
        Ok(())
    }

    fn ended(&self, dom: &mut Dom) -> DomResult<()> {
        Ok(())
    }

    fn cancelled(&self, dom: &mut Dom) -> DomResult<()> {
        Ok(())
    }
}

/// Capability of extensions that drive transactions for a subtree.
pub trait ValidationContext {
    /// Register a listener. Registering the same listener twice is a no-op.
    fn add_validation_listener(&self, listener: Rc<dyn ValidationListener>);

    /// Unregister a listener. Returns false if it was not registered.
    fn remove_validation_listener(&self, listener: &Rc<dyn ValidationListener>) -> bool;

    fn in_transaction(&self) -> bool;

    /// True while a cancelled transaction's log is being rolled back.
    fn is_undoing(&self) -> bool;

    /// Name of the active transaction.
    fn transaction_name(&self) -> Option<String>;
}

/// Identity of a listener, ignoring vtables.
pub(crate) fn same_listener(a: &Rc<dyn ValidationListener>, b: &Rc<dyn ValidationListener>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}
