//! Attribute and child validation rules.
//!
//! Rules are attached to field declarations and evaluated by the data
//! validator at transaction end. A rule returns a message on failure.

use crate::{AttributeInfo, ChildInfo, FieldMetadata, NodeType, SchemaError, SchemaResult};
use arbor_core::{TypeId, Value};
use regex_lite::Regex;
use std::fmt;
use std::rc::Rc;

/// A constraint on an attribute's value.
pub trait AttributeRule: fmt::Debug {
    /// Check a value destined for `attribute`.
    fn validate(&self, value: &Value, attribute: &AttributeInfo) -> Result<(), String>;
}

/// A constraint on the nodes held by a child field.
pub trait ChildRule: fmt::Debug {
    /// Check the types of the nodes currently in `child`.
    fn validate(&self, child: &ChildInfo, children: &[Rc<NodeType>]) -> Result<(), String>;
}

/// Scalar values, or every element of an array.
fn elements(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        scalar => std::slice::from_ref(scalar),
    }
}

// ==================== Attribute Rules ====================

/// Inclusive numeric bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericRangeRule {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericRangeRule {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    pub fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }
}

impl AttributeRule for NumericRangeRule {
    fn validate(&self, value: &Value, attribute: &AttributeInfo) -> Result<(), String> {
        for n in elements(value).iter().filter_map(Value::as_f64) {
            if let Some(min) = self.min {
                if n < min {
                    return Err(format!("{} = {} is below the minimum {}", attribute.name(), n, min));
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    return Err(format!("{} = {} is above the maximum {}", attribute.name(), n, max));
                }
            }
        }
        Ok(())
    }
}

/// The value must be one of a fixed set of strings.
#[derive(Debug, Clone, PartialEq)]
pub struct StringEnumerationRule {
    pub values: Vec<String>,
}

impl StringEnumerationRule {
    pub fn new<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

impl AttributeRule for StringEnumerationRule {
    fn validate(&self, value: &Value, attribute: &AttributeInfo) -> Result<(), String> {
        for s in elements(value).iter().filter_map(Value::as_str) {
            if !self.values.iter().any(|allowed| allowed == s) {
                return Err(format!(
                    "{} = '{}' is not one of [{}]",
                    attribute.name(),
                    s,
                    self.values.join(", ")
                ));
            }
        }
        Ok(())
    }
}

/// The whole string must match a regular expression.
#[derive(Debug, Clone)]
pub struct PatternRule {
    source: String,
    regex: Regex,
}

impl PatternRule {
    pub fn new(pattern: impl Into<String>) -> SchemaResult<Self> {
        let source = pattern.into();
        let regex = Regex::new(&format!("^(?:{})$", source)).map_err(|e| SchemaError::InvalidPattern {
            pattern: source.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { source, regex })
    }

    pub fn pattern(&self) -> &str {
        &self.source
    }
}

impl AttributeRule for PatternRule {
    fn validate(&self, value: &Value, attribute: &AttributeInfo) -> Result<(), String> {
        for s in elements(value).iter().filter_map(Value::as_str) {
            if !self.regex.is_match(s) {
                return Err(format!(
                    "{} = '{}' does not match /{}/",
                    attribute.name(),
                    s,
                    self.source
                ));
            }
        }
        Ok(())
    }
}

/// Length bounds on strings (in characters) or arrays (in elements).
#[derive(Debug, Clone, PartialEq)]
pub struct LengthRule {
    pub min: usize,
    pub max: Option<usize>,
}

impl LengthRule {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max: Some(max) }
    }

    pub fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }
}

impl AttributeRule for LengthRule {
    fn validate(&self, value: &Value, attribute: &AttributeInfo) -> Result<(), String> {
        let len = match value {
            Value::String(s) | Value::Uri(s) => s.chars().count(),
            Value::Array(items) => items.len(),
            _ => return Ok(()),
        };
        if len < self.min || self.max.is_some_and(|max| len > max) {
            let bound = match self.max {
                Some(max) => format!("{}..={}", self.min, max),
                None => format!("{}..", self.min),
            };
            return Err(format!("{} has length {}, expected {}", attribute.name(), len, bound));
        }
        Ok(())
    }
}

// ==================== Child Rules ====================

/// Bounds on the number of children in a field.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildCountRule {
    pub min: usize,
    pub max: Option<usize>,
}

impl ChildCountRule {
    pub fn new(min: usize, max: usize) -> Self {
        Self { min, max: Some(max) }
    }

    pub fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    /// Exactly one child must be present.
    pub fn required() -> Self {
        Self::new(1, 1)
    }
}

impl ChildRule for ChildCountRule {
    fn validate(&self, child: &ChildInfo, children: &[Rc<NodeType>]) -> Result<(), String> {
        let count = children.len();
        if count < self.min {
            return Err(format!(
                "{} has {} children, at least {} required",
                child.name(),
                count,
                self.min
            ));
        }
        if let Some(max) = self.max {
            if count > max {
                return Err(format!(
                    "{} has {} children, at most {} allowed",
                    child.name(),
                    count,
                    max
                ));
            }
        }
        Ok(())
    }
}

/// Every child must be an instance of one of the allowed types.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildTypeRule {
    allowed: Vec<(TypeId, String)>,
}

impl ChildTypeRule {
    pub fn new(allowed: &[&Rc<NodeType>]) -> Self {
        Self {
            allowed: allowed
                .iter()
                .map(|ty| (ty.id(), ty.name().to_string()))
                .collect(),
        }
    }
}

impl ChildRule for ChildTypeRule {
    fn validate(&self, child: &ChildInfo, children: &[Rc<NodeType>]) -> Result<(), String> {
        for ty in children {
            if !self.allowed.iter().any(|(id, _)| ty.is_subtype_of_id(*id)) {
                let names: Vec<&str> = self.allowed.iter().map(|(_, name)| name.as_str()).collect();
                return Err(format!(
                    "{} holds a {}, expected one of [{}]",
                    child.name(),
                    ty.name(),
                    names.join(", ")
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AttrDef, AttributeType, ChildDef};
    use pretty_assertions::assert_eq;

    fn text(value: &str) -> Value {
        Value::from(value)
    }

    fn texts(values: &[&str]) -> Value {
        Value::Array(values.iter().map(|v| Value::from(*v)).collect())
    }

    fn entry() -> Rc<NodeType> {
        let entry = NodeType::new("Entry", None);
        entry
            .define_attribute(AttrDef::new("code", AttributeType::string()))
            .unwrap();
        entry
            .define_attribute(AttrDef::new("tags", AttributeType::string_array()))
            .unwrap();
        entry
    }

    #[test]
    fn test_pattern_matches_whole_string() {
        // GIVEN
        let code = entry().attribute("code").unwrap();
        let rule = PatternRule::new("[a-z]+|[0-9]+").unwrap();

        // WHEN / THEN
        assert!(rule.validate(&text("abc"), &code).is_ok());
        assert!(rule.validate(&text("42"), &code).is_ok());
        assert!(rule.validate(&text("abc42"), &code).is_err());
        assert!(rule.validate(&text("x abc"), &code).is_err());
        assert_eq!(rule.pattern(), "[a-z]+|[0-9]+");
    }

    #[test]
    fn test_pattern_checks_every_element() {
        let tags = entry().attribute("tags").unwrap();
        let rule = PatternRule::new("[a-z]+").unwrap();
        assert!(rule.validate(&texts(&["red", "blue"]), &tags).is_ok());
        let message = rule.validate(&texts(&["red", "Blue"]), &tags).unwrap_err();
        assert_eq!(message, "tags = 'Blue' does not match /[a-z]+/");
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = PatternRule::new("(unclosed");
        assert!(matches!(result, Err(SchemaError::InvalidPattern { .. })));
    }

    #[test]
    fn test_enumeration() {
        // GIVEN
        let entry = entry();
        let code = entry.attribute("code").unwrap();
        let tags = entry.attribute("tags").unwrap();
        let rule = StringEnumerationRule::new(["draft", "final"]);

        // WHEN / THEN
        assert!(rule.validate(&text("draft"), &code).is_ok());
        assert_eq!(
            rule.validate(&text("gone"), &code).unwrap_err(),
            "code = 'gone' is not one of [draft, final]"
        );
        assert!(rule.validate(&texts(&["final", "draft"]), &tags).is_ok());
        assert!(rule.validate(&texts(&["final", "other"]), &tags).is_err());
    }

    #[test]
    fn test_length_of_strings_and_arrays() {
        // GIVEN
        let entry = entry();
        let code = entry.attribute("code").unwrap();
        let tags = entry.attribute("tags").unwrap();
        let rule = LengthRule::new(1, 3);

        // WHEN / THEN
        assert!(rule.validate(&text("ab"), &code).is_ok());
        assert!(rule.validate(&text("héé"), &code).is_ok());
        assert!(rule.validate(&text(""), &code).is_err());
        assert!(rule.validate(&text("abcd"), &code).is_err());
        assert!(rule.validate(&texts(&["a", "b", "c"]), &tags).is_ok());
        assert_eq!(
            rule.validate(&texts(&["a", "b", "c", "d"]), &tags).unwrap_err(),
            "tags has length 4, expected 1..=3"
        );
        assert!(LengthRule::at_least(2).validate(&texts(&["a"]), &tags).is_err());
    }

    #[test]
    fn test_disallowed_child_type() {
        // GIVEN
        let item = NodeType::new("Item", None);
        let note = NodeType::new("Note", Some(&item));
        let image = NodeType::new("Image", Some(&item));
        let folder = NodeType::new("Folder", None);
        folder
            .define_child(ChildDef::new("items", &item).list())
            .unwrap();
        let items = folder.child("items").unwrap();
        let rule = ChildTypeRule::new(&[&note]);

        // WHEN / THEN
        assert!(rule.validate(&items, &[note.clone(), note.clone()]).is_ok());
        assert_eq!(
            rule.validate(&items, &[note, image]).unwrap_err(),
            "items holds a Image, expected one of [Note]"
        );
    }

    #[test]
    fn test_child_count_bounds() {
        let item = NodeType::new("Item", None);
        let folder = NodeType::new("Folder", None);
        folder
            .define_child(ChildDef::new("items", &item).list())
            .unwrap();
        let items = folder.child("items").unwrap();
        let required = ChildCountRule::required();
        assert!(required.validate(&items, &[]).is_err());
        assert!(required.validate(&items, &[item.clone()]).is_ok());
        assert!(required.validate(&items, &[item.clone(), item]).is_err());
    }
}
