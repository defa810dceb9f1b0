//! Node types with inheritance-aware slot merging.
//!
//! A `NodeType` collects field declarations until it is frozen. Freezing
//! merges the local declarations into the base type's frozen lists by name:
//! a redeclared field keeps the base's slot, a new field is appended with the
//! next index. The first attribute, child and extension slots of an instance
//! are therefore laid out identically for a base type and all its subtypes.

use crate::capability::{CapabilitySlots, Caster};
use crate::{
    AttrDef, AttributeInfo, ChildDef, ChildInfo, ExtensionDef, ExtensionInfo, FieldMetadata,
    FieldSlot, SchemaError, SchemaResult,
};
use arbor_core::TypeId;
use std::any::{Any, TypeId as AnyTypeId};
use std::cell::{Cell, OnceCell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_TYPE_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Default)]
struct Pending {
    attributes: Vec<AttrDef>,
    children: Vec<ChildDef>,
    extensions: Vec<ExtensionDef>,
}

struct Frozen {
    attributes: Vec<Rc<AttributeInfo>>,
    children: Vec<Rc<ChildInfo>>,
    extensions: Vec<Rc<ExtensionInfo>>,
    attribute_names: Vec<(String, usize)>,
    child_names: Vec<(String, usize)>,
    extension_names: Vec<(String, usize)>,
    id_attribute: Option<usize>,
}

impl Frozen {
    fn first_child_index(&self) -> usize {
        self.attributes.len()
    }

    fn first_extension_index(&self) -> usize {
        self.attributes.len() + self.children.len()
    }
}

/// A schema type.
pub struct NodeType {
    id: TypeId,
    name: String,
    base: RefCell<Option<Rc<NodeType>>>,
    is_abstract: Cell<bool>,
    id_attribute: RefCell<Option<String>>,
    pending: RefCell<Pending>,
    frozen: OnceCell<Frozen>,
    capabilities: RefCell<HashMap<AnyTypeId, Rc<dyn Any>>>,
}

impl NodeType {
    /// Create a type deriving from `base`. `None` creates a lineage root.
    pub fn new(name: impl Into<String>, base: Option<&Rc<NodeType>>) -> Rc<Self> {
        Rc::new(Self {
            id: TypeId::new(NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            base: RefCell::new(base.cloned()),
            is_abstract: Cell::new(false),
            id_attribute: RefCell::new(None),
            pending: RefCell::new(Pending::default()),
            frozen: OnceCell::new(),
            capabilities: RefCell::new(HashMap::new()),
        })
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<Rc<NodeType>> {
        self.base.borrow().clone()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract.get()
    }

    pub fn set_abstract(&self, is_abstract: bool) {
        self.is_abstract.set(is_abstract);
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.get().is_some()
    }

    fn ensure_not_frozen(&self, action: &str) -> SchemaResult<()> {
        if self.is_frozen() {
            return Err(SchemaError::frozen(&self.name, action));
        }
        Ok(())
    }

    // ==================== Authoring ====================

    /// Change the base type. Rejected once frozen or if it would form a cycle.
    pub fn set_base_type(&self, base: Option<&Rc<NodeType>>) -> SchemaResult<()> {
        self.ensure_not_frozen("set base type")?;
        let mut current = base.cloned();
        while let Some(ty) = current {
            if ty.id == self.id {
                return Err(SchemaError::InheritanceCycle(self.name.clone()));
            }
            current = ty.base();
        }
        *self.base.borrow_mut() = base.cloned();
        Ok(())
    }

    /// Designate the attribute that identifies instances within a scope.
    pub fn set_id_attribute(&self, name: impl Into<String>) -> SchemaResult<()> {
        self.ensure_not_frozen("set id attribute")?;
        *self.id_attribute.borrow_mut() = Some(name.into());
        Ok(())
    }

    pub fn define_attribute(&self, def: AttrDef) -> SchemaResult<()> {
        self.ensure_not_frozen("define attribute")?;
        if let Some(default) = &def.default {
            if !def.attribute_type.accepts(default) {
                return Err(SchemaError::IncompatibleDefault {
                    attribute: def.name.clone(),
                    expected: def.attribute_type.to_string(),
                    actual: default.type_name().to_string(),
                });
            }
        }
        self.pending.borrow_mut().attributes.push(def);
        Ok(())
    }

    pub fn define_child(&self, def: ChildDef) -> SchemaResult<()> {
        self.ensure_not_frozen("define child")?;
        self.pending.borrow_mut().children.push(def);
        Ok(())
    }

    pub fn define_extension(&self, def: ExtensionDef) -> SchemaResult<()> {
        self.ensure_not_frozen("define extension")?;
        self.pending.borrow_mut().extensions.push(def);
        Ok(())
    }

    // ==================== Freezing ====================

    /// Freeze this type (and its lineage). Idempotent.
    pub fn freeze(&self) -> SchemaResult<()> {
        self.frozen().map(|_| ())
    }

    fn frozen(&self) -> SchemaResult<&Frozen> {
        if let Some(frozen) = self.frozen.get() {
            return Ok(frozen);
        }
        let frozen = self.merge()?;
        tracing::debug!(
            type_name = %self.name,
            attributes = frozen.attributes.len(),
            children = frozen.children.len(),
            extensions = frozen.extensions.len(),
            "froze node type"
        );
        // Declarations are owned by the frozen lists from here on.
        let _ = self.frozen.set(frozen);
        *self.pending.borrow_mut() = Pending::default();
        self.frozen
            .get()
            .ok_or_else(|| SchemaError::invalid_operation(format!("type '{}' failed to freeze", self.name)))
    }

    fn merge(&self) -> SchemaResult<Frozen> {
        let base = self.base();
        let (mut attributes, mut children, mut extensions, inherited_id) = match &base {
            Some(base) => {
                let frozen = base.frozen()?;
                (
                    frozen.attributes.clone(),
                    frozen.children.clone(),
                    frozen.extensions.clone(),
                    frozen
                        .id_attribute
                        .map(|i| frozen.attributes[i].name().to_string()),
                )
            }
            None => (Vec::new(), Vec::new(), Vec::new(), None),
        };
        let pending = self.pending.borrow();

        let inherited = attributes.len();
        for def in &pending.attributes {
            match attributes[..inherited].iter().position(|a| a.name() == def.name) {
                Some(pos) => {
                    let slot = attributes[pos].slot();
                    attributes[pos] = Rc::new(AttributeInfo::new(def, self.id, slot));
                }
                None => {
                    let slot = FieldSlot::new(self.id, attributes.len());
                    attributes.push(Rc::new(AttributeInfo::new(def, self.id, slot)));
                }
            }
        }

        // Repeated local child names collapse into one field.
        let mut declared_here = vec![false; children.len()];
        for def in &pending.children {
            match children.iter().position(|c| c.name() == def.name) {
                Some(pos) if declared_here[pos] => {
                    children[pos] = Rc::new(children[pos].merged(def));
                }
                Some(pos) => {
                    let slot = children[pos].slot();
                    children[pos] = Rc::new(ChildInfo::new(def, self.id, slot));
                    declared_here[pos] = true;
                }
                None => {
                    let slot = FieldSlot::new(self.id, children.len());
                    children.push(Rc::new(ChildInfo::new(def, self.id, slot)));
                    declared_here.push(true);
                }
            }
        }

        let inherited = extensions.len();
        for def in &pending.extensions {
            match extensions[..inherited].iter().position(|e| e.name() == def.name) {
                Some(pos) => {
                    let slot = extensions[pos].slot();
                    extensions[pos] = Rc::new(ExtensionInfo::new(def, self.id, slot));
                }
                None => {
                    let slot = FieldSlot::new(self.id, extensions.len());
                    extensions.push(Rc::new(ExtensionInfo::new(def, self.id, slot)));
                }
            }
        }

        let attribute_names = name_index(&attributes);
        let id_name = self.id_attribute.borrow().clone().or(inherited_id);
        let id_attribute = match id_name {
            Some(name) => Some(
                lookup(&attribute_names, &name, "attribute", &self.name)?.ok_or_else(|| {
                    SchemaError::UnknownField {
                        kind: "id attribute",
                        name: name.clone(),
                        type_name: self.name.clone(),
                    }
                })?,
            ),
            None => None,
        };

        Ok(Frozen {
            child_names: name_index(&children),
            extension_names: name_index(&extensions),
            attribute_names,
            attributes,
            children,
            extensions,
            id_attribute,
        })
    }

    // ==================== Frozen Fields ====================

    pub fn attributes(&self) -> SchemaResult<&[Rc<AttributeInfo>]> {
        Ok(&self.frozen()?.attributes)
    }

    pub fn children(&self) -> SchemaResult<&[Rc<ChildInfo>]> {
        Ok(&self.frozen()?.children)
    }

    pub fn extensions(&self) -> SchemaResult<&[Rc<ExtensionInfo>]> {
        Ok(&self.frozen()?.extensions)
    }

    pub fn attribute_count(&self) -> SchemaResult<usize> {
        Ok(self.frozen()?.attributes.len())
    }

    /// Data index of the first child slot.
    pub fn first_child_index(&self) -> SchemaResult<usize> {
        Ok(self.frozen()?.first_child_index())
    }

    /// Data index of the first extension slot.
    pub fn first_extension_index(&self) -> SchemaResult<usize> {
        Ok(self.frozen()?.first_extension_index())
    }

    /// Total number of slots in an instance.
    pub fn field_count(&self) -> SchemaResult<usize> {
        let frozen = self.frozen()?;
        Ok(frozen.first_extension_index() + frozen.extensions.len())
    }

    /// The resolved id attribute, local or inherited.
    pub fn id_attribute(&self) -> SchemaResult<Option<Rc<AttributeInfo>>> {
        let frozen = self.frozen()?;
        Ok(frozen.id_attribute.map(|i| frozen.attributes[i].clone()))
    }

    // ==================== Name Lookup ====================

    /// Find an attribute by name. Duplicate names are an error.
    pub fn get_attribute_info(&self, name: &str) -> SchemaResult<Option<Rc<AttributeInfo>>> {
        let frozen = self.frozen()?;
        Ok(lookup(&frozen.attribute_names, name, "attribute", &self.name)?
            .map(|i| frozen.attributes[i].clone()))
    }

    /// Find a child field by name. Duplicate names are an error.
    pub fn get_child_info(&self, name: &str) -> SchemaResult<Option<Rc<ChildInfo>>> {
        let frozen = self.frozen()?;
        Ok(lookup(&frozen.child_names, name, "child", &self.name)?
            .map(|i| frozen.children[i].clone()))
    }

    /// Find an extension by name. Duplicate names are an error.
    pub fn get_extension_info(&self, name: &str) -> SchemaResult<Option<Rc<ExtensionInfo>>> {
        let frozen = self.frozen()?;
        Ok(lookup(&frozen.extension_names, name, "extension", &self.name)?
            .map(|i| frozen.extensions[i].clone()))
    }

    /// Like `get_attribute_info`, failing when the name is unknown.
    pub fn attribute(&self, name: &str) -> SchemaResult<Rc<AttributeInfo>> {
        self.get_attribute_info(name)?
            .ok_or_else(|| self.unknown("attribute", name))
    }

    /// Like `get_child_info`, failing when the name is unknown.
    pub fn child(&self, name: &str) -> SchemaResult<Rc<ChildInfo>> {
        self.get_child_info(name)?
            .ok_or_else(|| self.unknown("child", name))
    }

    /// Like `get_extension_info`, failing when the name is unknown.
    pub fn extension(&self, name: &str) -> SchemaResult<Rc<ExtensionInfo>> {
        self.get_extension_info(name)?
            .ok_or_else(|| self.unknown("extension", name))
    }

    fn unknown(&self, kind: &'static str, name: &str) -> SchemaError {
        SchemaError::UnknownField {
            kind,
            name: name.to_string(),
            type_name: self.name.clone(),
        }
    }

    // ==================== Slot Resolution ====================

    /// Data index of an attribute handle on this type.
    pub fn attribute_index(&self, info: &AttributeInfo) -> SchemaResult<usize> {
        let frozen = self.frozen()?;
        match frozen.attributes.get(info.index()) {
            Some(own) if own.is_equivalent(info) => Ok(info.index()),
            _ => Err(self.not_declared("attribute", info.name())),
        }
    }

    /// Data index of a child handle on this type.
    pub fn child_data_index(&self, info: &ChildInfo) -> SchemaResult<usize> {
        let frozen = self.frozen()?;
        match frozen.children.get(info.index()) {
            Some(own) if own.is_equivalent(info) => Ok(frozen.first_child_index() + info.index()),
            _ => Err(self.not_declared("child", info.name())),
        }
    }

    /// Data index of an extension handle on this type.
    pub fn extension_data_index(&self, info: &ExtensionInfo) -> SchemaResult<usize> {
        let frozen = self.frozen()?;
        match frozen.extensions.get(info.index()) {
            Some(own) if own.is_equivalent(info) => {
                Ok(frozen.first_extension_index() + info.index())
            }
            _ => Err(self.not_declared("extension", info.name())),
        }
    }

    fn not_declared(&self, kind: &str, name: &str) -> SchemaError {
        SchemaError::invalid_operation(format!(
            "{} '{}' is not declared on type '{}' or its ancestors",
            kind, name, self.name
        ))
    }

    // ==================== Lineage ====================

    /// This type followed by its ancestors.
    pub fn lineage(self: &Rc<Self>) -> Vec<Rc<NodeType>> {
        let mut lineage = vec![self.clone()];
        let mut current = self.base();
        while let Some(ty) = current {
            current = ty.base();
            lineage.push(ty);
        }
        lineage
    }

    pub fn is_subtype_of(&self, other: &NodeType) -> bool {
        self.is_subtype_of_id(other.id)
    }

    /// True if `id` names this type or one of its ancestors.
    pub fn is_subtype_of_id(&self, id: TypeId) -> bool {
        if self.id == id {
            return true;
        }
        let mut current = self.base();
        while let Some(ty) = current {
            if ty.id == id {
                return true;
            }
            current = ty.base();
        }
        false
    }

    // ==================== Capabilities ====================

    /// Extension slots providing capability `T`, resolved once per type.
    pub fn capability_slots<T: ?Sized + 'static>(&self) -> SchemaResult<Rc<CapabilitySlots<T>>> {
        let key = AnyTypeId::of::<T>();
        if let Some(cached) = self.capabilities.borrow().get(&key) {
            if let Ok(slots) = cached.clone().downcast::<CapabilitySlots<T>>() {
                return Ok(slots);
            }
        }
        let frozen = self.frozen()?;
        let first = frozen.first_extension_index();
        let mut entries = Vec::new();
        for (i, extension) in frozen.extensions.iter().enumerate() {
            for entry in extension.capabilities() {
                if entry.capability != key {
                    continue;
                }
                if let Ok(caster) = entry.caster.clone().downcast::<Caster<T>>() {
                    entries.push((first + i, caster));
                }
            }
        }
        let slots = Rc::new(CapabilitySlots { entries });
        self.capabilities
            .borrow_mut()
            .insert(key, slots.clone() as Rc<dyn Any>);
        Ok(slots)
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeType")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("base", &self.base().map(|b| b.name.clone()))
            .field("abstract", &self.is_abstract())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

fn name_index<T: FieldMetadata>(fields: &[Rc<T>]) -> Vec<(String, usize)> {
    let mut index: Vec<(String, usize)> = fields
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name().to_string(), i))
        .collect();
    index.sort();
    index
}

fn lookup(
    index: &[(String, usize)],
    name: &str,
    kind: &'static str,
    type_name: &str,
) -> SchemaResult<Option<usize>> {
    let start = index.partition_point(|(n, _)| n.as_str() < name);
    let mut matches = index[start..].iter().take_while(|(n, _)| n == name);
    match (matches.next(), matches.next()) {
        (None, _) => Ok(None),
        (Some((_, i)), None) => Ok(Some(*i)),
        (Some(_), Some(_)) => Err(SchemaError::AmbiguousField {
            kind,
            name: name.to_string(),
            type_name: type_name.to_string(),
        }),
    }
}
