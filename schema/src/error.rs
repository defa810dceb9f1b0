//! Schema definition errors.

use thiserror::Error;

/// Errors raised while authoring or resolving schema metadata.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// A definition was attempted after the type was frozen.
    #[error("Type '{type_name}' is frozen: cannot {action}")]
    Frozen { type_name: String, action: String },

    /// A default value does not belong to the attribute's domain.
    #[error("Default value for '{attribute}' is incompatible: expected {expected}, got {actual}")]
    IncompatibleDefault {
        attribute: String,
        expected: String,
        actual: String,
    },

    /// More than one field with the same name exists in a frozen set.
    #[error("Ambiguous {kind} '{name}' on type '{type_name}'")]
    AmbiguousField {
        kind: &'static str,
        name: String,
        type_name: String,
    },

    /// No field with the given name exists.
    #[error("Unknown {kind} '{name}' on type '{type_name}'")]
    UnknownField {
        kind: &'static str,
        name: String,
        type_name: String,
    },

    /// A type with this name is already registered.
    #[error("Duplicate type name: {0}")]
    DuplicateTypeName(String),

    /// Setting the base type would create an inheritance cycle.
    #[error("Inheritance cycle: '{0}' cannot derive from itself")]
    InheritanceCycle(String),

    /// The value kind cannot be used as an array element.
    #[error("Values of kind {0} cannot form arrays")]
    InvalidArrayType(String),

    /// A value does not belong to an attribute type's domain.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// A value could not be converted to or from text.
    #[error("Cannot convert '{text}' to {target}")]
    Conversion { text: String, target: String },

    /// A pattern rule failed to compile.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Field metadata used with a type that does not declare it.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl SchemaError {
    pub fn frozen(type_name: impl Into<String>, action: impl Into<String>) -> Self {
        Self::Frozen {
            type_name: type_name.into(),
            action: action.into(),
        }
    }

    pub fn conversion(text: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Conversion {
            text: text.into(),
            target: target.into(),
        }
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }
}

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
