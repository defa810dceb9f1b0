//! Name allocation within one uniqueness bucket.

use arbor_core::NodeId;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Change {
    Assigned {
        node: NodeId,
        name: String,
        previous: Option<String>,
        displaced: Option<NodeId>,
    },
    Released { node: NodeId, name: String },
}

/// Tracks which node holds which name and hands out free variants.
///
/// Every change made between `begin` and `commit` is journaled so that
/// `rollback` can restore the allocation exactly.
#[derive(Debug, Clone)]
pub struct UniqueNamer {
    separator: String,
    owners: HashMap<String, NodeId>,
    assigned: HashMap<NodeId, String>,
    journal: Option<Vec<Change>>,
}

impl UniqueNamer {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            owners: HashMap::new(),
            assigned: HashMap::new(),
            journal: None,
        }
    }

    pub fn owner(&self, name: &str) -> Option<NodeId> {
        self.owners.get(name).copied()
    }

    pub fn name_of(&self, node: NodeId) -> Option<&str> {
        self.assigned.get(&node).map(String::as_str)
    }

    /// True if `name` is unowned or owned by `node`.
    pub fn is_free(&self, name: &str, node: NodeId) -> bool {
        self.owners.get(name).map_or(true, |owner| *owner == node)
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }

    /// Give `name` to `node`, dropping the node's previous name.
    pub fn assign(&mut self, node: NodeId, name: &str) {
        if self.name_of(node) == Some(name) && self.owner(name) == Some(node) {
            return;
        }
        let previous = self.take(node);
        let displaced = self.owners.insert(name.to_string(), node);
        self.assigned.insert(node, name.to_string());
        self.log(Change::Assigned {
            node,
            name: name.to_string(),
            previous,
            displaced,
        });
    }

    /// Retire the name held by `node`, if any.
    pub fn release(&mut self, node: NodeId) {
        if let Some(name) = self.take(node) {
            self.log(Change::Released { node, name });
        }
    }

    /// The lowest free `stem{separator}{n}` with `n >= 1`, where `stem` is
    /// `base` without any numeric suffix. `base` itself if it is free.
    pub fn disambiguate(&self, base: &str) -> String {
        if !self.owners.contains_key(base) {
            return base.to_string();
        }
        let stem = self.stem(base);
        (1..)
            .map(|n| format!("{}{}{}", stem, self.separator, n))
            .find(|candidate| !self.owners.contains_key(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    fn stem<'a>(&self, name: &'a str) -> &'a str {
        if self.separator.is_empty() {
            return name.trim_end_matches(|c: char| c.is_ascii_digit());
        }
        match name.rsplit_once(self.separator.as_str()) {
            Some((stem, suffix))
                if !stem.is_empty() && !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) =>
            {
                stem
            }
            _ => name,
        }
    }

    fn take(&mut self, node: NodeId) -> Option<String> {
        let name = self.assigned.remove(&node)?;
        if self.owners.get(&name) == Some(&node) {
            self.owners.remove(&name);
        }
        Some(name)
    }

    fn restore(&mut self, node: NodeId, name: String) {
        self.owners.insert(name.clone(), node);
        self.assigned.insert(node, name);
    }

    fn log(&mut self, change: Change) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(change);
        }
    }

    // ==================== Journal ====================

    /// Start journaling changes.
    pub fn begin(&mut self) {
        self.journal = Some(Vec::new());
    }

    /// Keep every journaled change.
    pub fn commit(&mut self) {
        self.journal = None;
    }

    /// Revert every change since `begin`.
    pub fn rollback(&mut self) {
        let Some(journal) = self.journal.take() else {
            return;
        };
        for change in journal.into_iter().rev() {
            match change {
                Change::Assigned {
                    node,
                    name,
                    previous,
                    displaced,
                } => {
                    self.take(node);
                    if let Some(owner) = displaced {
                        self.owners.insert(name, owner);
                    }
                    if let Some(previous) = previous {
                        self.restore(node, previous);
                    }
                }
                Change::Released { node, name } => self.restore(node, name),
            }
        }
    }
}

impl Default for UniqueNamer {
    fn default() -> Self {
        Self::new("_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_disambiguate_lowest_free() {
        // GIVEN
        let mut namer = UniqueNamer::default();
        namer.assign(NodeId::new(1), "a");
        namer.assign(NodeId::new(2), "a_1");
        namer.assign(NodeId::new(3), "a_3");

        // WHEN / THEN
        assert_eq!(namer.disambiguate("a"), "a_2");
        assert_eq!(namer.disambiguate("a_1"), "a_2");
        assert_eq!(namer.disambiguate("b"), "b");
        assert_eq!(namer.disambiguate("_1"), "_1");
    }

    #[test]
    fn test_release_frees_name() {
        let mut namer = UniqueNamer::default();
        namer.assign(NodeId::new(1), "a");
        namer.assign(NodeId::new(2), "a_1");
        namer.release(NodeId::new(2));
        assert_eq!(namer.disambiguate("a"), "a_1");
        assert!(namer.is_free("a_1", NodeId::new(9)));
        assert!(!namer.is_free("a", NodeId::new(9)));
        assert!(namer.is_free("a", NodeId::new(1)));
    }

    #[test]
    fn test_rename_drops_previous() {
        let mut namer = UniqueNamer::default();
        namer.assign(NodeId::new(1), "a");
        namer.assign(NodeId::new(1), "b");
        assert_eq!(namer.owner("a"), None);
        assert_eq!(namer.name_of(NodeId::new(1)), Some("b"));
        assert_eq!(namer.len(), 1);
    }

    #[test]
    fn test_rollback_restores_allocation() {
        // GIVEN
        let mut namer = UniqueNamer::new("-");
        namer.assign(NodeId::new(1), "x");
        namer.assign(NodeId::new(2), "y");
        let before = (namer.owners.clone(), namer.assigned.clone());

        // WHEN
        namer.begin();
        namer.release(NodeId::new(1));
        namer.assign(NodeId::new(2), "x");
        namer.assign(NodeId::new(3), "x-1");
        namer.rollback();

        // THEN
        assert_eq!((namer.owners.clone(), namer.assigned.clone()), before);
    }

    #[test]
    fn test_rollback_returns_name_to_displaced_owner() {
        // GIVEN
        let mut namer = UniqueNamer::default();
        namer.assign(NodeId::new(1), "a");
        namer.begin();
        namer.assign(NodeId::new(2), "a_1");

        // WHEN
        namer.assign(NodeId::new(2), "a");
        namer.rollback();

        // THEN
        assert_eq!(namer.owner("a"), Some(NodeId::new(1)));
        assert_eq!(namer.name_of(NodeId::new(2)), None);
        assert_eq!(namer.disambiguate("a"), "a_1");
    }
}
