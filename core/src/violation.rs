//! Validation violation types.

use crate::NodeId;
use std::fmt;

/// Severity of a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationSeverity {
    /// Hard failure - the transaction must not commit.
    Error,
    /// Soft failure - reported only.
    Warning,
}

/// A single rule violation.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// The rule or validator that reported the violation.
    pub rule: String,
    /// The severity of the violation.
    pub severity: ViolationSeverity,
    /// Human-readable message describing the violation.
    pub message: String,
    /// Optional node the violation is about.
    pub node: Option<NodeId>,
}

impl Violation {
    /// Create a new violation.
    pub fn new(
        rule: impl Into<String>,
        severity: ViolationSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule: rule.into(),
            severity,
            message: message.into(),
            node: None,
        }
    }

    /// Create an error-level violation.
    pub fn error(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(rule, ViolationSeverity::Error, message)
    }

    /// Create a warning-level violation.
    pub fn warning(rule: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(rule, ViolationSeverity::Warning, message)
    }

    /// Add a node to the violation context.
    pub fn with_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    /// Check if this is an error-level violation.
    pub fn is_error(&self) -> bool {
        matches!(self.severity, ViolationSeverity::Error)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            Some(node) => write!(f, "[{}] {} (at {})", self.rule, self.message, node),
            None => write!(f, "[{}] {}", self.rule, self.message),
        }
    }
}

/// Collection of violations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Violations {
    violations: Vec<Violation>,
}

impl Violations {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a violation.
    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    /// Check if there are no violations.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Check if any violation is error-level.
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(Violation::is_error)
    }

    /// All violations in report order.
    pub fn all(&self) -> &[Violation] {
        &self.violations
    }

    /// Error-level violations only.
    pub fn errors(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|v| v.is_error())
    }
}

impl From<Violation> for Violations {
    fn from(violation: Violation) -> Self {
        Self {
            violations: vec![violation],
        }
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", violation)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_has_errors_ignores_warnings() {
        // GIVEN
        let mut violations = Violations::new();
        violations.push(Violation::warning("range", "close to the limit"));

        // THEN
        assert!(!violations.is_empty());
        assert!(!violations.has_errors());

        // WHEN
        violations.push(Violation::error("range", "out of range").with_node(NodeId(3)));

        // THEN
        assert!(violations.has_errors());
        assert_eq!(violations.errors().count(), 1);
    }

    #[test]
    fn test_display_joins_messages() {
        let mut violations = Violations::new();
        violations.push(Violation::error("a", "first"));
        violations.push(Violation::error("b", "second").with_node(NodeId(1)));
        assert_eq!(violations.to_string(), "[a] first; [b] second (at n1)");
    }
}
