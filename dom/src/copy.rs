//! Deep copy of node subtrees.

use crate::dom::Slot;
use crate::{Dom, DomResult};
use arbor_core::{NodeId, Value};
use std::collections::HashMap;

impl Dom {
    /// Copy each subtree in `roots`. Local attribute values and structure are
    /// duplicated; references between copied nodes are redirected to the
    /// copies, references leaving the copied set are kept as they are.
    /// Extensions are freshly constructed and no events are raised.
    pub fn copy(&mut self, roots: &[NodeId]) -> DomResult<Vec<NodeId>> {
        let mut map = HashMap::new();
        let mut copies = Vec::with_capacity(roots.len());
        for &root in roots {
            copies.push(self.copy_node(root, &mut map)?);
        }
        for &copy in map.values() {
            for slot in &mut self.data_mut(copy)?.slots {
                if let Slot::Attribute(Some(value)) = slot {
                    remap(value, &map);
                }
            }
        }
        tracing::trace!(roots = roots.len(), nodes = map.len(), "copied subtrees");
        Ok(copies)
    }

    fn copy_node(&mut self, source: NodeId, map: &mut HashMap<NodeId, NodeId>) -> DomResult<NodeId> {
        let data = self.data(source)?;
        let node_type = data.node_type.clone();
        let child_info = data.child_info.clone();
        let attributes: Vec<Option<Value>> = data
            .slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Attribute(value) => Some(value.clone()),
                _ => None,
            })
            .collect();
        let children: Vec<Option<Vec<NodeId>>> = data
            .slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Child(child) => Some(child.map(|c| vec![c])),
                Slot::List(items) => Some(items.clone()),
                _ => None,
            })
            .collect();

        let copy = self.allocate(&node_type, child_info)?;
        map.insert(source, copy);

        let mut copied_children = Vec::with_capacity(children.len());
        for field in children {
            copied_children.push(match field {
                Some(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        let child = self.copy_node(item, map)?;
                        self.data_mut(child)?.parent = Some(copy);
                        out.push(child);
                    }
                    Some(out)
                }
                None => None,
            });
        }

        let data = self.data_mut(copy)?;
        let mut attributes = attributes.into_iter();
        let mut copied_children = copied_children.into_iter();
        for slot in &mut data.slots {
            match slot {
                Slot::Attribute(value) => *value = attributes.next().flatten(),
                Slot::Child(child) => {
                    *child = copied_children.next().flatten().and_then(|c| c.first().copied())
                }
                Slot::List(items) => *items = copied_children.next().flatten(),
                Slot::Extension(_) => {}
            }
        }
        Ok(copy)
    }
}

fn remap(value: &mut Value, map: &HashMap<NodeId, NodeId>) {
    match value {
        Value::Reference(target) => {
            if let Some(copy) = map.get(target) {
                *target = *copy;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|v| remap(v, map)),
        _ => {}
    }
}
