//! Errors raised by node storage and tree operations.

use arbor_core::{NodeId, Violations};
use arbor_schema::SchemaError;
use thiserror::Error;

/// Errors that can occur while reading or mutating nodes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomError {
    /// Schema metadata could not be resolved.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The node does not exist in this arena.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// The operation is not valid for the node or field.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// A value does not belong to the attribute's domain.
    #[error("Type mismatch on '{attribute}': expected {expected}, got {actual}")]
    TypeMismatch {
        attribute: String,
        expected: String,
        actual: String,
    },

    /// A mutation was attempted outside a required transaction, or a
    /// transaction call was made in the wrong state.
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Validators rejected the transaction.
    #[error("Validation failed: {0}")]
    Validation(Violations),
}

impl DomError {
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    pub fn invalid_transaction(message: impl Into<String>) -> Self {
        Self::InvalidTransaction(message.into())
    }

    pub fn type_mismatch(
        attribute: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            attribute: attribute.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// True if this failure came from a validator.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Result type for DOM operations.
pub type DomResult<T> = Result<T, DomError>;
