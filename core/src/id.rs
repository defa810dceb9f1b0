//! Identity types for Arbor entities.
//!
//! Identifiers are opaque, copyable handles:
//! - `NodeId` names one node inside a `Dom` arena
//! - `TypeId` names one node type and is the *defining type* half of a field slot

use std::fmt;

/// Unique identifier for a node within one arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Create a new NodeId from a raw value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Unique identifier for a node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Create a new TypeId from a raw value.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw value.
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_display() {
        assert_eq!(NodeId::new(7).to_string(), "n7");
        assert_eq!(NodeId(7).raw(), 7);
    }

    #[test]
    fn test_type_id_ordering() {
        assert!(TypeId::new(1) < TypeId::new(2));
        assert_eq!(TypeId(3).to_string(), "t3");
    }
}
