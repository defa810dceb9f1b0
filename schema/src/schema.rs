//! Type registry.

use crate::{NodeType, SchemaError, SchemaResult};
use std::collections::HashMap;
use std::rc::Rc;

/// Owns a family of node types rooted at one canonical base type.
#[derive(Debug)]
pub struct Schema {
    root: Rc<NodeType>,
    types: Vec<Rc<NodeType>>,
    by_name: HashMap<String, Rc<NodeType>>,
}

impl Schema {
    /// Name of the base of all types.
    pub const ROOT_TYPE_NAME: &'static str = "Node";

    pub fn new() -> Self {
        let root = NodeType::new(Self::ROOT_TYPE_NAME, None);
        root.set_abstract(true);
        let mut by_name = HashMap::new();
        by_name.insert(Self::ROOT_TYPE_NAME.to_string(), root.clone());
        Self {
            types: vec![root.clone()],
            root,
            by_name,
        }
    }

    /// The base of all types in this schema.
    pub fn root_type(&self) -> &Rc<NodeType> {
        &self.root
    }

    /// Create a concrete type. `None` derives from the root type.
    pub fn create_type(
        &mut self,
        name: impl Into<String>,
        base: Option<&Rc<NodeType>>,
    ) -> SchemaResult<Rc<NodeType>> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(SchemaError::DuplicateTypeName(name));
        }
        let ty = NodeType::new(name.clone(), Some(base.unwrap_or(&self.root)));
        self.by_name.insert(name, ty.clone());
        self.types.push(ty.clone());
        Ok(ty)
    }

    /// Create a type that cannot be instantiated.
    pub fn create_abstract_type(
        &mut self,
        name: impl Into<String>,
        base: Option<&Rc<NodeType>>,
    ) -> SchemaResult<Rc<NodeType>> {
        let ty = self.create_type(name, base)?;
        ty.set_abstract(true);
        Ok(ty)
    }

    pub fn get_type(&self, name: &str) -> Option<&Rc<NodeType>> {
        self.by_name.get(name)
    }

    /// All types in creation order, root first.
    pub fn types(&self) -> &[Rc<NodeType>] {
        &self.types
    }

    /// Freeze every type.
    pub fn freeze_all(&self) -> SchemaResult<()> {
        for ty in &self.types {
            ty.freeze()?;
        }
        Ok(())
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}
