//! Field declarations and frozen field metadata.
//!
//! Declarations (`AttrDef`, `ChildDef`, `ExtensionDef`) are builders handed to
//! a `NodeType` before it is frozen. Freezing turns them into the shared
//! `AttributeInfo`, `ChildInfo` and `ExtensionInfo` handles.

use crate::capability::CapabilityEntry;
use crate::{AttributeRule, AttributeType, ChildRule, NodeType};
use arbor_core::{TypeId, Value};
use std::any::{Any, TypeId as AnyTypeId};
use std::fmt;
use std::rc::{Rc, Weak};

/// Stable storage handle of a field: the type that introduced it and the
/// index it was given there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldSlot {
    pub defining_type: TypeId,
    pub index: usize,
}

impl FieldSlot {
    pub fn new(defining_type: TypeId, index: usize) -> Self {
        Self {
            defining_type,
            index,
        }
    }
}

/// Common surface of frozen field metadata.
pub trait FieldMetadata {
    /// Declared name.
    fn name(&self) -> &str;

    /// The type whose frozen list holds this entry.
    fn owning_type(&self) -> TypeId;

    /// Stable storage handle.
    fn slot(&self) -> FieldSlot;

    /// The first type in the lineage that introduced the field.
    fn defining_type(&self) -> TypeId {
        self.slot().defining_type
    }

    /// Index within the field kind (attributes, children or extensions).
    fn index(&self) -> usize {
        self.slot().index
    }

    /// Two handles are equivalent when they address the same slot.
    fn is_equivalent(&self, other: &Self) -> bool
    where
        Self: Sized,
    {
        self.slot() == other.slot()
    }
}

// ==================== Attributes ====================

/// Attribute declaration.
#[derive(Debug, Clone)]
pub struct AttrDef {
    pub name: String,
    pub attribute_type: AttributeType,
    pub default: Option<Value>,
    pub rules: Vec<Rc<dyn AttributeRule>>,
}

impl AttrDef {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            default: None,
            rules: Vec::new(),
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_rule(mut self, rule: impl AttributeRule + 'static) -> Self {
        self.rules.push(Rc::new(rule));
        self
    }
}

/// Frozen attribute metadata.
#[derive(Debug)]
pub struct AttributeInfo {
    name: String,
    owning_type: TypeId,
    slot: FieldSlot,
    attribute_type: AttributeType,
    default: Option<Value>,
    rules: Vec<Rc<dyn AttributeRule>>,
}

impl AttributeInfo {
    pub(crate) fn new(def: &AttrDef, owning_type: TypeId, slot: FieldSlot) -> Self {
        Self {
            name: def.name.clone(),
            owning_type,
            slot,
            attribute_type: def.attribute_type,
            default: def.default.clone(),
            rules: def.rules.clone(),
        }
    }

    pub fn attribute_type(&self) -> &AttributeType {
        &self.attribute_type
    }

    /// The configured default, if one was declared.
    pub fn configured_default(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// The configured default, or the type's canonical default.
    pub fn default_value(&self) -> Value {
        match &self.default {
            Some(value) => value.clone(),
            None => self.attribute_type.default_value(),
        }
    }

    pub fn rules(&self) -> &[Rc<dyn AttributeRule>] {
        &self.rules
    }

    /// Type check followed by every rule; the first failure is returned.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        if !self.attribute_type.accepts(value) {
            return Err(format!(
                "{} expects {}, got {}",
                self.name,
                self.attribute_type,
                value.type_name()
            ));
        }
        for rule in &self.rules {
            rule.validate(value, self)?;
        }
        Ok(())
    }
}

impl FieldMetadata for AttributeInfo {
    fn name(&self) -> &str {
        &self.name
    }

    fn owning_type(&self) -> TypeId {
        self.owning_type
    }

    fn slot(&self) -> FieldSlot {
        self.slot
    }
}

// ==================== Children ====================

/// Child declaration.
#[derive(Debug, Clone)]
pub struct ChildDef {
    pub name: String,
    pub child_type: Weak<NodeType>,
    pub child_type_id: TypeId,
    pub child_type_name: String,
    pub is_list: bool,
    pub rules: Vec<Rc<dyn ChildRule>>,
}

impl ChildDef {
    pub fn new(name: impl Into<String>, child_type: &Rc<NodeType>) -> Self {
        Self {
            name: name.into(),
            child_type: Rc::downgrade(child_type),
            child_type_id: child_type.id(),
            child_type_name: child_type.name().to_string(),
            is_list: false,
            rules: Vec::new(),
        }
    }

    /// The field holds an ordered list of children.
    pub fn list(mut self) -> Self {
        self.is_list = true;
        self
    }

    pub fn with_rule(mut self, rule: impl ChildRule + 'static) -> Self {
        self.rules.push(Rc::new(rule));
        self
    }
}

/// Frozen child metadata.
#[derive(Debug)]
pub struct ChildInfo {
    name: String,
    owning_type: TypeId,
    slot: FieldSlot,
    child_type: Weak<NodeType>,
    child_type_id: TypeId,
    child_type_name: String,
    is_list: bool,
    rules: Vec<Rc<dyn ChildRule>>,
}

impl ChildInfo {
    pub(crate) fn new(def: &ChildDef, owning_type: TypeId, slot: FieldSlot) -> Self {
        Self {
            name: def.name.clone(),
            owning_type,
            slot,
            child_type: def.child_type.clone(),
            child_type_id: def.child_type_id,
            child_type_name: def.child_type_name.clone(),
            is_list: def.is_list,
            rules: def.rules.clone(),
        }
    }

    /// Combine a repeated local declaration into this field.
    pub(crate) fn merged(&self, def: &ChildDef) -> Self {
        let mut rules = self.rules.clone();
        rules.extend(def.rules.iter().cloned());
        Self {
            name: self.name.clone(),
            owning_type: self.owning_type,
            slot: self.slot,
            child_type: self.child_type.clone(),
            child_type_id: self.child_type_id,
            child_type_name: self.child_type_name.clone(),
            is_list: self.is_list || def.is_list,
            rules,
        }
    }

    /// The declared child type, while its schema is alive.
    pub fn child_type(&self) -> Option<Rc<NodeType>> {
        self.child_type.upgrade()
    }

    pub fn child_type_id(&self) -> TypeId {
        self.child_type_id
    }

    pub fn child_type_name(&self) -> &str {
        &self.child_type_name
    }

    pub fn is_list(&self) -> bool {
        self.is_list
    }

    pub fn rules(&self) -> &[Rc<dyn ChildRule>] {
        &self.rules
    }

    /// Run every child rule against the types currently held.
    pub fn validate(&self, children: &[Rc<NodeType>]) -> Result<(), String> {
        for rule in &self.rules {
            rule.validate(self, children)?;
        }
        Ok(())
    }
}

impl FieldMetadata for ChildInfo {
    fn name(&self) -> &str {
        &self.name
    }

    fn owning_type(&self) -> TypeId {
        self.owning_type
    }

    fn slot(&self) -> FieldSlot {
        self.slot
    }
}

// ==================== Extensions ====================

type Factory = Rc<dyn Fn() -> Rc<dyn Any>>;

/// Extension declaration: a per-instance satellite object and the
/// capabilities it can be viewed as.
#[derive(Clone)]
pub struct ExtensionDef {
    pub name: String,
    factory: Factory,
    extension_type: AnyTypeId,
    capabilities: Vec<CapabilityEntry>,
}

impl ExtensionDef {
    /// Declare an extension built by `factory` for every new node.
    pub fn new<E: Any>(name: impl Into<String>, factory: impl Fn() -> Rc<E> + 'static) -> Self {
        Self {
            name: name.into(),
            factory: Rc::new(move || factory() as Rc<dyn Any>),
            extension_type: AnyTypeId::of::<E>(),
            capabilities: Vec::new(),
        }
    }

    /// Register that extensions of type `E` can be viewed as `Rc<T>`.
    pub fn with_capability<E: Any, T: ?Sized + 'static>(
        mut self,
        cast: impl Fn(Rc<E>) -> Rc<T> + 'static,
    ) -> Self {
        self.capabilities.push(CapabilityEntry::new::<E, T>(cast));
        self
    }
}

impl fmt::Debug for ExtensionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionDef")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities.len())
            .finish()
    }
}

/// Frozen extension metadata.
pub struct ExtensionInfo {
    name: String,
    owning_type: TypeId,
    slot: FieldSlot,
    factory: Factory,
    extension_type: AnyTypeId,
    capabilities: Vec<CapabilityEntry>,
}

impl ExtensionInfo {
    pub(crate) fn new(def: &ExtensionDef, owning_type: TypeId, slot: FieldSlot) -> Self {
        Self {
            name: def.name.clone(),
            owning_type,
            slot,
            factory: def.factory.clone(),
            extension_type: def.extension_type,
            capabilities: def.capabilities.clone(),
        }
    }

    /// Build a fresh extension instance.
    pub fn create(&self) -> Rc<dyn Any> {
        (self.factory)()
    }

    /// True if the factory produces values of type `E`.
    pub fn is_type<E: Any>(&self) -> bool {
        self.extension_type == AnyTypeId::of::<E>()
    }

    pub(crate) fn capabilities(&self) -> &[CapabilityEntry] {
        &self.capabilities
    }
}

impl FieldMetadata for ExtensionInfo {
    fn name(&self) -> &str {
        &self.name
    }

    fn owning_type(&self) -> TypeId {
        self.owning_type
    }

    fn slot(&self) -> FieldSlot {
        self.slot
    }
}

impl fmt::Debug for ExtensionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionInfo")
            .field("name", &self.name)
            .field("owning_type", &self.owning_type)
            .field("slot", &self.slot)
            .finish()
    }
}
