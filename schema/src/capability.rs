//! Capability registry for extensions.
//!
//! An extension declares which trait objects it can be viewed as. Each
//! node type resolves a capability to the extension slots providing it
//! once, and caches the result.

use std::any::{Any, TypeId as AnyTypeId};
use std::rc::Rc;

/// Converts a type-erased extension into a capability view.
pub struct Caster<T: ?Sized + 'static> {
    cast: Box<dyn Fn(Rc<dyn Any>) -> Option<Rc<T>>>,
}

impl<T: ?Sized + 'static> Caster<T> {
    pub(crate) fn new<E: Any>(cast: impl Fn(Rc<E>) -> Rc<T> + 'static) -> Self {
        Self {
            cast: Box::new(move |ext: Rc<dyn Any>| ext.downcast::<E>().ok().map(|e| cast(e))),
        }
    }

    /// View `extension` as the capability, if it is the registered type.
    pub fn cast(&self, extension: Rc<dyn Any>) -> Option<Rc<T>> {
        (self.cast)(extension)
    }
}

/// A registered capability of one extension declaration.
#[derive(Clone)]
pub(crate) struct CapabilityEntry {
    pub(crate) capability: AnyTypeId,
    pub(crate) caster: Rc<dyn Any>,
}

impl CapabilityEntry {
    pub(crate) fn new<E: Any, T: ?Sized + 'static>(cast: impl Fn(Rc<E>) -> Rc<T> + 'static) -> Self {
        Self {
            capability: AnyTypeId::of::<T>(),
            caster: Rc::new(Caster::<T>::new::<E>(cast)),
        }
    }
}

/// The extension slots of one node type that provide capability `T`.
pub struct CapabilitySlots<T: ?Sized + 'static> {
    pub(crate) entries: Vec<(usize, Rc<Caster<T>>)>,
}

impl<T: ?Sized + 'static> CapabilitySlots<T> {
    /// Pairs of (data index, caster) in extension declaration order.
    pub fn entries(&self) -> &[(usize, Rc<Caster<T>>)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
