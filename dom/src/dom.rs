//! The node arena.
//!
//! A `Dom` owns every node. Each node holds its type, its position under its
//! parent and one flat slot array laid out by the type: attribute slots,
//! then child slots, then extension slots. All mutation goes through the
//! accessors here so that events are raised for every change.

use crate::events::{EventHub, EventKind};
use crate::{AttributeEvent, ChildEvent, DomError, DomResult};
use arbor_core::{NodeId, Value};
use arbor_schema::{AttributeInfo, ChildInfo, FieldMetadata, NodeType};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// One slot of a node's field array.
pub(crate) enum Slot {
    /// Local attribute value; `None` falls back to the default.
    Attribute(Option<Value>),
    /// Singleton child field.
    Child(Option<NodeId>),
    /// List child field, materialised on first insertion.
    List(Option<Vec<NodeId>>),
    /// Extension instance.
    Extension(Rc<dyn Any>),
}

pub(crate) struct NodeData {
    pub(crate) node_type: Rc<NodeType>,
    pub(crate) child_info: Option<Rc<ChildInfo>>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) slots: Vec<Slot>,
    pub(crate) events: Option<Box<EventHub>>,
}

/// Arena of nodes.
#[derive(Default)]
pub struct Dom {
    pub(crate) nodes: HashMap<NodeId, NodeData>,
    next_id: u64,
    pub(crate) next_listener: u64,
}

impl Dom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    pub(crate) fn data(&self, node: NodeId) -> DomResult<&NodeData> {
        self.nodes.get(&node).ok_or(DomError::NodeNotFound(node))
    }

    pub(crate) fn data_mut(&mut self, node: NodeId) -> DomResult<&mut NodeData> {
        self.nodes.get_mut(&node).ok_or(DomError::NodeNotFound(node))
    }

    pub(crate) fn slot(&self, node: NodeId, index: usize) -> DomResult<&Slot> {
        self.data(node)?
            .slots
            .get(index)
            .ok_or_else(|| DomError::invalid_operation(format!("slot {} out of range on {}", index, node)))
    }

    pub(crate) fn slot_mut(&mut self, node: NodeId, index: usize) -> DomResult<&mut Slot> {
        self.data_mut(node)?
            .slots
            .get_mut(index)
            .ok_or_else(|| DomError::invalid_operation(format!("slot {} out of range on {}", index, node)))
    }

    // ==================== Lifecycle ====================

    /// Create an unparented node of a concrete type.
    pub fn create_node(&mut self, node_type: &Rc<NodeType>) -> DomResult<NodeId> {
        self.create_node_with(node_type, None)
    }

    /// Create an unparented node, recording the child field it is meant for.
    pub fn create_node_with(
        &mut self,
        node_type: &Rc<NodeType>,
        child_info: Option<Rc<ChildInfo>>,
    ) -> DomResult<NodeId> {
        if node_type.is_abstract() {
            return Err(DomError::invalid_operation(format!(
                "cannot instantiate abstract type '{}'",
                node_type.name()
            )));
        }
        let node = self.allocate(node_type, child_info)?;
        tracing::trace!(node = %node, node_type = node_type.name(), "created node");
        Ok(node)
    }

    /// Build the slot array and construct every extension.
    pub(crate) fn allocate(
        &mut self,
        node_type: &Rc<NodeType>,
        child_info: Option<Rc<ChildInfo>>,
    ) -> DomResult<NodeId> {
        let mut slots = Vec::with_capacity(node_type.field_count()?);
        for _ in node_type.attributes()? {
            slots.push(Slot::Attribute(None));
        }
        for child in node_type.children()? {
            slots.push(if child.is_list() {
                Slot::List(None)
            } else {
                Slot::Child(None)
            });
        }
        for extension in node_type.extensions()? {
            slots.push(Slot::Extension(extension.create()));
        }
        self.next_id += 1;
        let node = NodeId::new(self.next_id);
        self.nodes.insert(
            node,
            NodeData {
                node_type: node_type.clone(),
                child_info,
                parent: None,
                slots,
                events: None,
            },
        );
        Ok(node)
    }

    /// Free an unparented node and its subtree.
    pub fn dispose(&mut self, root: NodeId) -> DomResult<()> {
        if self.data(root)?.parent.is_some() {
            return Err(DomError::invalid_operation(format!(
                "cannot dispose {}: it still has a parent",
                root
            )));
        }
        let doomed: Vec<NodeId> = self.subtree(root).collect();
        for node in &doomed {
            self.nodes.remove(node);
        }
        tracing::trace!(root = %root, count = doomed.len(), "disposed subtree");
        Ok(())
    }

    pub fn node_type(&self, node: NodeId) -> DomResult<Rc<NodeType>> {
        Ok(self.data(node)?.node_type.clone())
    }

    pub fn parent(&self, node: NodeId) -> DomResult<Option<NodeId>> {
        Ok(self.data(node)?.parent)
    }

    /// The child field `node` occupies under its parent.
    pub fn child_info(&self, node: NodeId) -> DomResult<Option<Rc<ChildInfo>>> {
        Ok(self.data(node)?.child_info.clone())
    }

    // ==================== Attributes ====================

    /// Data index plus the node type's own metadata for that slot.
    fn resolve_attribute(
        &self,
        node: NodeId,
        info: &AttributeInfo,
    ) -> DomResult<(usize, Rc<AttributeInfo>)> {
        let node_type = &self.data(node)?.node_type;
        let index = node_type.attribute_index(info)?;
        let own = node_type.attributes()?[index].clone();
        Ok((index, own))
    }

    fn local_value(&self, node: NodeId, index: usize) -> DomResult<Option<&Value>> {
        match self.slot(node, index)? {
            Slot::Attribute(value) => Ok(value.as_ref()),
            _ => Err(DomError::invalid_operation(format!(
                "slot {} of {} is not an attribute",
                index, node
            ))),
        }
    }

    fn store_attribute(&mut self, node: NodeId, index: usize, value: Option<Value>) -> DomResult<()> {
        match self.slot_mut(node, index)? {
            Slot::Attribute(slot) => {
                *slot = value;
                Ok(())
            }
            _ => Err(DomError::invalid_operation(format!(
                "slot {} of {} is not an attribute",
                index, node
            ))),
        }
    }

    /// The local value, or the attribute's default when unset.
    pub fn get_attribute(&self, node: NodeId, info: &AttributeInfo) -> DomResult<Value> {
        let (index, own) = self.resolve_attribute(node, info)?;
        Ok(match self.local_value(node, index)? {
            Some(value) => own.attribute_type().clone_value(value),
            None => own.default_value(),
        })
    }

    /// The raw slot content; `None` when the default applies.
    pub fn local_attribute(&self, node: NodeId, info: &AttributeInfo) -> DomResult<Option<Value>> {
        let (index, _) = self.resolve_attribute(node, info)?;
        Ok(self.local_value(node, index)?.cloned())
    }

    /// True if no local value is stored.
    pub fn is_default(&self, node: NodeId, info: &AttributeInfo) -> DomResult<bool> {
        Ok(self.local_attribute(node, info)?.is_none())
    }

    /// Write an attribute. Writing a value equal to the current effective
    /// value is a no-op and raises no events.
    pub fn set_attribute(
        &mut self,
        node: NodeId,
        info: &AttributeInfo,
        value: impl Into<Value>,
    ) -> DomResult<()> {
        let value = value.into();
        let (index, own) = self.resolve_attribute(node, info)?;
        let attribute_type = *own.attribute_type();
        if !attribute_type.accepts(&value) {
            return Err(DomError::type_mismatch(
                own.name(),
                attribute_type.to_string(),
                value.type_name(),
            ));
        }
        let old_local = self.local_value(node, index)?.cloned();
        let old_value = old_local.clone().unwrap_or_else(|| own.default_value());
        if attribute_type.are_equal(&old_value, &value) {
            return Ok(());
        }
        self.write_attribute(node, index, own, old_local, old_value, Some(value))
    }

    /// Write the raw slot, including `None` to restore the default.
    ///
    /// Events are raised only when the effective value changes.
    pub fn set_local_attribute(
        &mut self,
        node: NodeId,
        info: &AttributeInfo,
        value: Option<Value>,
    ) -> DomResult<()> {
        let (index, own) = self.resolve_attribute(node, info)?;
        let attribute_type = *own.attribute_type();
        if let Some(value) = &value {
            if !attribute_type.accepts(value) {
                return Err(DomError::type_mismatch(
                    own.name(),
                    attribute_type.to_string(),
                    value.type_name(),
                ));
            }
        }
        let old_local = self.local_value(node, index)?.cloned();
        if old_local == value {
            return Ok(());
        }
        let old_value = old_local.clone().unwrap_or_else(|| own.default_value());
        let new_value = value.clone().unwrap_or_else(|| own.default_value());
        if attribute_type.are_equal(&old_value, &new_value) {
            return self.store_attribute(node, index, value);
        }
        self.write_attribute(node, index, own, old_local, old_value, value)
    }

    /// Drop the local value so the default applies again.
    pub fn reset_attribute(&mut self, node: NodeId, info: &AttributeInfo) -> DomResult<()> {
        self.set_local_attribute(node, info, None)
    }

    fn write_attribute(
        &mut self,
        node: NodeId,
        index: usize,
        attribute: Rc<AttributeInfo>,
        old_local: Option<Value>,
        old_value: Value,
        new_local: Option<Value>,
    ) -> DomResult<()> {
        let new_value = new_local.clone().unwrap_or_else(|| attribute.default_value());
        let event = AttributeEvent {
            node,
            attribute,
            old_value,
            new_value,
            old_local,
            new_local,
        };
        self.raise_attribute(EventKind::AttributeChanging, &event)?;
        self.store_attribute(node, index, event.new_local.clone())?;
        tracing::trace!(
            node = %node,
            attribute = event.attribute.name(),
            old = %event.old_value,
            new = %event.new_value,
            "attribute changed"
        );
        self.raise_attribute(EventKind::AttributeChanged, &event)
    }

    // ==================== Text Form ====================

    /// The node's id: its id attribute as text, if the type declares one.
    pub fn id(&self, node: NodeId) -> DomResult<Option<String>> {
        let node_type = self.node_type(node)?;
        let Some(attribute) = node_type.id_attribute()? else {
            return Ok(None);
        };
        match self.get_attribute(node, &attribute)? {
            Value::Null | Value::Reference(_) => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Ok(Some(attribute.attribute_type().format(&other)?)),
        }
    }

    /// Read an attribute in its text form. References are written as the
    /// referent's id.
    pub fn attribute_as_string(&self, node: NodeId, info: &AttributeInfo) -> DomResult<String> {
        let (_, own) = self.resolve_attribute(node, info)?;
        match self.get_attribute(node, info)? {
            Value::Reference(target) => self.id(target)?.ok_or_else(|| {
                DomError::invalid_operation(format!(
                    "{} references {}, which has no id",
                    own.name(),
                    target
                ))
            }),
            Value::Null if own.attribute_type().is_reference() => Ok(String::new()),
            value => Ok(own.attribute_type().format(&value)?),
        }
    }

    /// Write an attribute from its text form. References resolve by id
    /// within the node's tree.
    pub fn set_attribute_from_string(
        &mut self,
        node: NodeId,
        info: &AttributeInfo,
        text: &str,
    ) -> DomResult<()> {
        let (_, own) = self.resolve_attribute(node, info)?;
        let value = if !own.attribute_type().is_reference() {
            own.attribute_type().parse(text)?
        } else if text.is_empty() {
            Value::Null
        } else {
            let root = self.root_of(node)?;
            let target = self.find_by_id(root, text)?.ok_or_else(|| {
                DomError::invalid_operation(format!("no node with id '{}' for {}", text, own.name()))
            })?;
            Value::Reference(target)
        };
        self.set_attribute(node, info, value)
    }

    // ==================== Children ====================

    fn resolve_child(&self, node: NodeId, info: &ChildInfo) -> DomResult<(usize, Rc<ChildInfo>)> {
        let node_type = &self.data(node)?.node_type;
        let index = node_type.child_data_index(info)?;
        let own = node_type.children()?[info.index()].clone();
        Ok((index, own))
    }

    fn list_len(&self, node: NodeId, index: usize, info: &ChildInfo) -> DomResult<usize> {
        match self.slot(node, index)? {
            Slot::List(items) => Ok(items.as_ref().map_or(0, Vec::len)),
            _ => Err(DomError::invalid_operation(format!(
                "child field '{}' is not a list",
                info.name()
            ))),
        }
    }

    /// The node in a singleton child field.
    pub fn get_child(&self, node: NodeId, info: &ChildInfo) -> DomResult<Option<NodeId>> {
        let (index, _) = self.resolve_child(node, info)?;
        match self.slot(node, index)? {
            Slot::Child(child) => Ok(*child),
            _ => Err(DomError::invalid_operation(format!(
                "child field '{}' is a list",
                info.name()
            ))),
        }
    }

    /// The nodes in a list child field, in order.
    pub fn get_children(&self, node: NodeId, info: &ChildInfo) -> DomResult<Vec<NodeId>> {
        let (index, _) = self.resolve_child(node, info)?;
        match self.slot(node, index)? {
            Slot::List(items) => Ok(items.clone().unwrap_or_default()),
            _ => Err(DomError::invalid_operation(format!(
                "child field '{}' is not a list",
                info.name()
            ))),
        }
    }

    /// Number of nodes in a child field of either kind.
    pub fn child_count(&self, node: NodeId, info: &ChildInfo) -> DomResult<usize> {
        let (index, _) = self.resolve_child(node, info)?;
        Ok(match self.slot(node, index)? {
            Slot::Child(child) => usize::from(child.is_some()),
            Slot::List(items) => items.as_ref().map_or(0, Vec::len),
            _ => 0,
        })
    }

    /// Every child of every field, in declaration order.
    pub fn children(&self, node: NodeId) -> DomResult<Vec<NodeId>> {
        Ok(self.data(node)?.slots.iter().flat_map(slot_children).collect())
    }

    /// Position of `node` within its parent's field.
    pub fn index_in_parent(&self, node: NodeId) -> DomResult<Option<usize>> {
        let data = self.data(node)?;
        match (data.parent, data.child_info.clone()) {
            (Some(parent), Some(info)) => Ok(self.position_in(parent, &info, node)?.map(|(_, p)| p)),
            _ => Ok(None),
        }
    }

    fn position_in(
        &self,
        parent: NodeId,
        info: &ChildInfo,
        child: NodeId,
    ) -> DomResult<Option<(usize, usize)>> {
        let index = self.data(parent)?.node_type.child_data_index(info)?;
        Ok(match self.slot(parent, index)? {
            Slot::Child(Some(c)) if *c == child => Some((index, 0)),
            Slot::List(Some(items)) => items.iter().position(|c| *c == child).map(|p| (index, p)),
            _ => None,
        })
    }

    fn check_insertable(&self, parent: NodeId, info: &ChildInfo, child: NodeId) -> DomResult<()> {
        let child_type = &self.data(child)?.node_type;
        if !child_type.is_subtype_of_id(info.child_type_id()) {
            return Err(DomError::invalid_operation(format!(
                "child field '{}' holds {}, not {}",
                info.name(),
                info.child_type_name(),
                child_type.name()
            )));
        }
        if self.lineage(parent).any(|n| n == child) {
            return Err(DomError::invalid_operation(format!(
                "cannot insert {} under its own descendant {}",
                child, parent
            )));
        }
        Ok(())
    }

    /// Replace the node in a singleton child field. The previous occupant is
    /// removed; a new child with a parent elsewhere is detached first.
    pub fn set_child(&mut self, parent: NodeId, info: &ChildInfo, child: Option<NodeId>) -> DomResult<()> {
        let (index, own) = self.resolve_child(parent, info)?;
        let current = self.get_child(parent, info)?;
        if current == child {
            return Ok(());
        }
        if let Some(child) = child {
            self.check_insertable(parent, &own, child)?;
        }
        if let Some(old) = current {
            self.remove_from_parent(old)?;
        }
        match child {
            Some(child) => {
                self.remove_from_parent(child)?;
                self.attach(parent, index, own, 0, child)
            }
            None => Ok(()),
        }
    }

    /// Insert into a list child field at `index`. A child with a parent is
    /// detached first; a move within the same list lands at `index` as seen
    /// before the move.
    pub fn insert_child(
        &mut self,
        parent: NodeId,
        info: &ChildInfo,
        index: usize,
        child: NodeId,
    ) -> DomResult<()> {
        let (data_index, own) = self.resolve_child(parent, info)?;
        let len = self.list_len(parent, data_index, &own)?;
        if index > len {
            return Err(DomError::invalid_operation(format!(
                "index {} out of range for '{}' of length {}",
                index,
                own.name(),
                len
            )));
        }
        self.check_insertable(parent, &own, child)?;

        let mut position = index;
        let data = self.data(child)?;
        let same_list = data.parent == Some(parent)
            && data.child_info.as_ref().is_some_and(|ci| ci.is_equivalent(&own));
        if same_list {
            if let Some(current) = self.index_in_parent(child)? {
                if current < index {
                    position -= 1;
                }
                if current == position {
                    return Ok(());
                }
            }
        }
        self.remove_from_parent(child)?;
        self.attach(parent, data_index, own, position, child)
    }

    /// Append to a list child field.
    pub fn add_child(&mut self, parent: NodeId, info: &ChildInfo, child: NodeId) -> DomResult<()> {
        let (data_index, own) = self.resolve_child(parent, info)?;
        let len = self.list_len(parent, data_index, &own)?;
        self.insert_child(parent, info, len, child)
    }

    fn attach(
        &mut self,
        parent: NodeId,
        data_index: usize,
        info: Rc<ChildInfo>,
        position: usize,
        child: NodeId,
    ) -> DomResult<()> {
        let event = ChildEvent {
            parent,
            child,
            child_info: info,
            index: position,
        };
        self.raise_child(EventKind::ChildInserting, &event)?;
        match self.slot_mut(parent, data_index)? {
            Slot::Child(slot) => *slot = Some(child),
            Slot::List(items) => {
                let items = items.get_or_insert_with(Vec::new);
                let at = position.min(items.len());
                items.insert(at, child);
            }
            _ => {
                return Err(DomError::invalid_operation(format!(
                    "slot {} of {} is not a child field",
                    data_index, parent
                )))
            }
        }
        let data = self.data_mut(child)?;
        data.parent = Some(parent);
        data.child_info = Some(event.child_info.clone());
        tracing::trace!(parent = %parent, child = %child, field = event.child_info.name(), index = position, "child inserted");
        self.raise_child(EventKind::ChildInserted, &event)
    }

    /// Detach a node from its parent. Unparented nodes are left alone.
    pub fn remove_from_parent(&mut self, child: NodeId) -> DomResult<()> {
        let data = self.data(child)?;
        let (Some(parent), Some(info)) = (data.parent, data.child_info.clone()) else {
            return Ok(());
        };
        let Some((_, position)) = self.position_in(parent, &info, child)? else {
            return Ok(());
        };
        let event = ChildEvent {
            parent,
            child,
            child_info: info,
            index: position,
        };
        self.raise_child(EventKind::ChildRemoving, &event)?;

        // Handlers may have moved things around.
        let Some((data_index, position)) = self.position_in(parent, &event.child_info, child)? else {
            return Ok(());
        };
        match self.slot_mut(parent, data_index)? {
            Slot::Child(slot) => *slot = None,
            Slot::List(items) => {
                let emptied = match items.as_mut() {
                    Some(list) => {
                        list.remove(position);
                        list.is_empty()
                    }
                    None => false,
                };
                if emptied {
                    *items = None;
                }
            }
            _ => {}
        }
        let data = self.data_mut(child)?;
        data.parent = None;
        data.child_info = None;
        tracing::trace!(parent = %parent, child = %child, index = position, "child removed");
        self.raise_child(
            EventKind::ChildRemoved,
            &ChildEvent {
                index: position,
                ..event
            },
        )
    }

    /// Remove the child at `index` of a list field and return it.
    pub fn remove_child(&mut self, parent: NodeId, info: &ChildInfo, index: usize) -> DomResult<NodeId> {
        let children = self.get_children(parent, info)?;
        let child = *children.get(index).ok_or_else(|| {
            DomError::invalid_operation(format!(
                "index {} out of range for '{}' of length {}",
                index,
                info.name(),
                children.len()
            ))
        })?;
        self.remove_from_parent(child)?;
        Ok(child)
    }

    /// Remove every child of a list field, last first, then free the list.
    pub fn clear_children(&mut self, parent: NodeId, info: &ChildInfo) -> DomResult<()> {
        let (data_index, own) = self.resolve_child(parent, info)?;
        self.list_len(parent, data_index, &own)?;
        loop {
            let last = match self.slot(parent, data_index)? {
                Slot::List(Some(items)) => items.last().copied(),
                _ => None,
            };
            match last {
                Some(child) => self.remove_from_parent(child)?,
                None => break,
            }
        }
        if let Slot::List(items) = self.slot_mut(parent, data_index)? {
            *items = None;
        }
        Ok(())
    }
}

/// Child ids held by one slot.
pub(crate) fn slot_children(slot: &Slot) -> Vec<NodeId> {
    match slot {
        Slot::Child(Some(child)) => vec![*child],
        Slot::List(Some(items)) => items.clone(),
        _ => Vec::new(),
    }
}

impl fmt::Debug for Dom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dom").field("nodes", &self.nodes.len()).finish()
    }
}
