//! Extension access and capability queries.
//!
//! Every node carries one instance of each extension its type declares.
//! Extensions advertise capabilities (trait objects) they can be viewed as;
//! `capability` and `capabilities` find them without knowing the concrete
//! extension types.

use crate::dom::Slot;
use crate::{Dom, DomError, DomResult};
use arbor_core::NodeId;
use arbor_schema::{ExtensionInfo, FieldMetadata};
use std::any::Any;
use std::rc::Rc;

/// Capability of extensions that need to bind to the node they live on.
pub trait NodeAdapter {
    /// Called once the node is part of a tree being initialised.
    fn on_node_set(self: Rc<Self>, dom: &mut Dom, node: NodeId) -> DomResult<()>;
}

impl Dom {
    /// The extension instance for `info` on `node`.
    pub fn get_extension(&self, node: NodeId, info: &ExtensionInfo) -> DomResult<Rc<dyn Any>> {
        let index = self.data(node)?.node_type.extension_data_index(info)?;
        match self.slot(node, index)? {
            Slot::Extension(extension) => Ok(extension.clone()),
            _ => Err(DomError::invalid_operation(format!(
                "'{}' is not an extension slot",
                info.name()
            ))),
        }
    }

    /// The extension for `info` if it has concrete type `E`.
    pub fn extension<E: Any>(&self, node: NodeId, info: &ExtensionInfo) -> DomResult<Option<Rc<E>>> {
        Ok(self.get_extension(node, info)?.downcast::<E>().ok())
    }

    /// The first extension on `node` of concrete type `E`.
    pub fn find_extension<E: Any>(&self, node: NodeId) -> DomResult<Option<Rc<E>>> {
        let data = self.data(node)?;
        let first = data.node_type.first_extension_index()?;
        for slot in data.slots.iter().skip(first) {
            if let Slot::Extension(extension) = slot {
                if let Ok(found) = extension.clone().downcast::<E>() {
                    return Ok(Some(found));
                }
            }
        }
        Ok(None)
    }

    /// The first extension on `node` providing capability `T`.
    pub fn capability<T: ?Sized + 'static>(&self, node: NodeId) -> DomResult<Option<Rc<T>>> {
        Ok(self.capabilities::<T>(node)?.into_iter().next())
    }

    /// Every extension on `node` providing capability `T`, in slot order.
    pub fn capabilities<T: ?Sized + 'static>(&self, node: NodeId) -> DomResult<Vec<Rc<T>>> {
        let data = self.data(node)?;
        let slots = data.node_type.capability_slots::<T>()?;
        let mut found = Vec::with_capacity(slots.entries().len());
        for (index, caster) in slots.entries() {
            if let Some(Slot::Extension(extension)) = data.slots.get(*index) {
                if let Some(capability) = caster.cast(extension.clone()) {
                    found.push(capability);
                }
            }
        }
        Ok(found)
    }

    /// Bind every `NodeAdapter` in the subtree of `root` to its node,
    /// parents before children.
    pub fn initialize_extensions(&mut self, root: NodeId) -> DomResult<()> {
        let nodes: Vec<NodeId> = self.subtree(root).collect();
        for node in nodes {
            for adapter in self.capabilities::<dyn NodeAdapter>(node)? {
                adapter.on_node_set(self, node)?;
            }
        }
        tracing::debug!(root = %root, "initialized extensions");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_schema::{ExtensionDef, Schema};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    #[derive(Default)]
    struct Bound {
        node: Cell<Option<NodeId>>,
    }

    impl NodeAdapter for Bound {
        fn on_node_set(self: Rc<Self>, _dom: &mut Dom, node: NodeId) -> DomResult<()> {
            self.node.set(Some(node));
            Ok(())
        }
    }

    #[test]
    fn test_adapters_bound_on_initialize() {
        // GIVEN
        let mut schema = Schema::new();
        let ty = schema.create_type("Doc", None).unwrap();
        ty.define_extension(ExtensionDef::new("counter", || Rc::new(Cell::new(0u32))))
            .unwrap();
        ty.define_extension(
            ExtensionDef::new("bound", || Rc::new(Bound::default()))
                .with_capability::<Bound, dyn NodeAdapter>(|b| b as Rc<dyn NodeAdapter>),
        )
        .unwrap();
        let mut dom = Dom::new();
        let node = dom.create_node(&ty).unwrap();

        // WHEN
        dom.initialize_extensions(node).unwrap();

        // THEN
        let bound = dom.find_extension::<Bound>(node).unwrap().unwrap();
        assert_eq!(bound.node.get(), Some(node));
        let counter_info = ty.extension("counter").unwrap();
        let counter = dom.extension::<Cell<u32>>(node, &counter_info).unwrap().unwrap();
        counter.set(4);
        assert_eq!(dom.find_extension::<Cell<u32>>(node).unwrap().unwrap().get(), 4);
        assert!(dom.extension::<Bound>(node, &counter_info).unwrap().is_none());
        assert_eq!(dom.capabilities::<dyn NodeAdapter>(node).unwrap().len(), 1);
    }

    #[test]
    fn test_each_node_gets_its_own_extension() {
        let mut schema = Schema::new();
        let ty = schema.create_type("Doc", None).unwrap();
        ty.define_extension(ExtensionDef::new("counter", || Rc::new(Cell::new(0u32))))
            .unwrap();
        let mut dom = Dom::new();
        let a = dom.create_node(&ty).unwrap();
        let b = dom.create_node(&ty).unwrap();
        dom.find_extension::<Cell<u32>>(a).unwrap().unwrap().set(1);
        assert_eq!(dom.find_extension::<Cell<u32>>(b).unwrap().unwrap().get(), 0);
    }
}
