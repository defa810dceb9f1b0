//! Primitive attribute domains.
//!
//! An `AttributeType` pairs a scalar `ValueKind` with an `ArrayLength`.
//! It owns default synthesis, value equality and the invariant-culture
//! text form used by serialization collaborators.

use crate::{SchemaError, SchemaResult};
use arbor_core::Value;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Scalar value domain of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    Decimal,
    String,
    DateTime,
    Uri,
    Reference,
}

impl ValueKind {
    /// Lowercase name used in messages and type display.
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Int8 => "int8",
            ValueKind::UInt8 => "uint8",
            ValueKind::Int16 => "int16",
            ValueKind::UInt16 => "uint16",
            ValueKind::Int32 => "int32",
            ValueKind::UInt32 => "uint32",
            ValueKind::Int64 => "int64",
            ValueKind::UInt64 => "uint64",
            ValueKind::Single => "single",
            ValueKind::Double => "double",
            ValueKind::Decimal => "decimal",
            ValueKind::String => "string",
            ValueKind::DateTime => "datetime",
            ValueKind::Uri => "uri",
            ValueKind::Reference => "reference",
        }
    }

    /// References, URIs and date-times exist only as scalars.
    pub fn can_form_array(&self) -> bool {
        !self.is_nullable()
    }

    /// Kinds whose canonical default is `Value::Null`.
    pub fn is_nullable(&self) -> bool {
        matches!(self, ValueKind::DateTime | ValueKind::Uri | ValueKind::Reference)
    }

    fn default_value(&self) -> Value {
        match self {
            ValueKind::Bool => Value::Bool(false),
            ValueKind::Int8 => Value::Int8(0),
            ValueKind::UInt8 => Value::UInt8(0),
            ValueKind::Int16 => Value::Int16(0),
            ValueKind::UInt16 => Value::UInt16(0),
            ValueKind::Int32 => Value::Int32(0),
            ValueKind::UInt32 => Value::UInt32(0),
            ValueKind::Int64 => Value::Int64(0),
            ValueKind::UInt64 => Value::UInt64(0),
            ValueKind::Single => Value::Single(0.0),
            ValueKind::Double => Value::Double(0.0),
            ValueKind::Decimal => Value::Decimal(0.0),
            ValueKind::String => Value::String(String::new()),
            ValueKind::DateTime | ValueKind::Uri | ValueKind::Reference => Value::Null,
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (kind, Value::Null) => kind.is_nullable(),
            (ValueKind::Bool, Value::Bool(_))
            | (ValueKind::Int8, Value::Int8(_))
            | (ValueKind::UInt8, Value::UInt8(_))
            | (ValueKind::Int16, Value::Int16(_))
            | (ValueKind::UInt16, Value::UInt16(_))
            | (ValueKind::Int32, Value::Int32(_))
            | (ValueKind::UInt32, Value::UInt32(_))
            | (ValueKind::Int64, Value::Int64(_))
            | (ValueKind::UInt64, Value::UInt64(_))
            | (ValueKind::Single, Value::Single(_))
            | (ValueKind::Double, Value::Double(_))
            | (ValueKind::Decimal, Value::Decimal(_))
            | (ValueKind::String, Value::String(_))
            | (ValueKind::DateTime, Value::DateTime(_))
            | (ValueKind::Uri, Value::Uri(_))
            | (ValueKind::Reference, Value::Reference(_)) => true,
            _ => false,
        }
    }

    fn format(&self, value: &Value) -> SchemaResult<String> {
        let text = match value {
            Value::Null if self.is_nullable() && *self != ValueKind::Reference => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int8(v) => v.to_string(),
            Value::UInt8(v) => v.to_string(),
            Value::Int16(v) => v.to_string(),
            Value::UInt16(v) => v.to_string(),
            Value::Int32(v) => v.to_string(),
            Value::UInt32(v) => v.to_string(),
            Value::Int64(v) => v.to_string(),
            Value::UInt64(v) => v.to_string(),
            // Display for floats is the shortest text that round-trips.
            Value::Single(v) => v.to_string(),
            Value::Double(v) | Value::Decimal(v) => v.to_string(),
            Value::String(s) | Value::Uri(s) => s.clone(),
            Value::DateTime(t) => t.to_rfc3339(),
            other => return Err(SchemaError::conversion(other.to_string(), self.name())),
        };
        Ok(text)
    }

    fn parse(&self, text: &str) -> SchemaResult<Value> {
        let value = match self {
            ValueKind::Bool => {
                if text.trim().eq_ignore_ascii_case("true") {
                    Value::Bool(true)
                } else if text.trim().eq_ignore_ascii_case("false") {
                    Value::Bool(false)
                } else {
                    return Err(SchemaError::conversion(text, self.name()));
                }
            }
            ValueKind::Int8 => Value::Int8(parse_number(text, self)?),
            ValueKind::UInt8 => Value::UInt8(parse_number(text, self)?),
            ValueKind::Int16 => Value::Int16(parse_number(text, self)?),
            ValueKind::UInt16 => Value::UInt16(parse_number(text, self)?),
            ValueKind::Int32 => Value::Int32(parse_number(text, self)?),
            ValueKind::UInt32 => Value::UInt32(parse_number(text, self)?),
            ValueKind::Int64 => Value::Int64(parse_number(text, self)?),
            ValueKind::UInt64 => Value::UInt64(parse_number(text, self)?),
            ValueKind::Single => Value::Single(parse_number(text, self)?),
            ValueKind::Double => Value::Double(parse_number(text, self)?),
            ValueKind::Decimal => Value::Decimal(parse_number(text, self)?),
            ValueKind::String => Value::String(text.to_string()),
            ValueKind::DateTime if text.trim().is_empty() => Value::Null,
            ValueKind::DateTime => DateTime::parse_from_rfc3339(text.trim())
                .map(|t| Value::DateTime(t.with_timezone(&Utc)))
                .map_err(|_| SchemaError::conversion(text, self.name()))?,
            ValueKind::Uri if text.is_empty() => Value::Null,
            ValueKind::Uri => Value::Uri(text.to_string()),
            ValueKind::Reference => return Err(SchemaError::conversion(text, self.name())),
        };
        Ok(value)
    }
}

fn parse_number<T: FromStr>(text: &str, kind: &ValueKind) -> SchemaResult<T> {
    text.trim()
        .parse::<T>()
        .map_err(|_| SchemaError::conversion(text, kind.name()))
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether an attribute holds one value or an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayLength {
    Scalar,
    Fixed(usize),
    Unbounded,
}

/// The value domain of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeType {
    kind: ValueKind,
    length: ArrayLength,
}

impl AttributeType {
    /// A scalar attribute of the given kind.
    pub const fn scalar(kind: ValueKind) -> Self {
        Self {
            kind,
            length: ArrayLength::Scalar,
        }
    }

    /// An unbounded array of the given kind.
    pub fn array(kind: ValueKind) -> SchemaResult<Self> {
        Self::with_length(kind, ArrayLength::Unbounded)
    }

    /// A fixed-length array of the given kind.
    pub fn fixed_array(kind: ValueKind, len: usize) -> SchemaResult<Self> {
        Self::with_length(kind, ArrayLength::Fixed(len))
    }

    fn with_length(kind: ValueKind, length: ArrayLength) -> SchemaResult<Self> {
        if !kind.can_form_array() {
            return Err(SchemaError::InvalidArrayType(kind.name().to_string()));
        }
        Ok(Self { kind, length })
    }

    pub const fn boolean() -> Self {
        Self::scalar(ValueKind::Bool)
    }

    pub const fn int32() -> Self {
        Self::scalar(ValueKind::Int32)
    }

    pub const fn int64() -> Self {
        Self::scalar(ValueKind::Int64)
    }

    pub const fn uint32() -> Self {
        Self::scalar(ValueKind::UInt32)
    }

    pub const fn double() -> Self {
        Self::scalar(ValueKind::Double)
    }

    pub const fn string() -> Self {
        Self::scalar(ValueKind::String)
    }

    pub const fn date_time() -> Self {
        Self::scalar(ValueKind::DateTime)
    }

    pub const fn uri() -> Self {
        Self::scalar(ValueKind::Uri)
    }

    pub const fn reference() -> Self {
        Self::scalar(ValueKind::Reference)
    }

    pub const fn int32_array() -> Self {
        Self {
            kind: ValueKind::Int32,
            length: ArrayLength::Unbounded,
        }
    }

    pub const fn double_array() -> Self {
        Self {
            kind: ValueKind::Double,
            length: ArrayLength::Unbounded,
        }
    }

    pub const fn string_array() -> Self {
        Self {
            kind: ValueKind::String,
            length: ArrayLength::Unbounded,
        }
    }

    /// The scalar kind (element kind for arrays).
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// The array length class.
    pub fn length(&self) -> ArrayLength {
        self.length
    }

    pub fn is_array(&self) -> bool {
        self.length != ArrayLength::Scalar
    }

    pub fn is_reference(&self) -> bool {
        self.kind == ValueKind::Reference
    }

    /// Canonical zero/empty value of this domain.
    pub fn default_value(&self) -> Value {
        match self.length {
            ArrayLength::Scalar => self.kind.default_value(),
            ArrayLength::Fixed(n) => Value::Array(vec![self.kind.default_value(); n]),
            ArrayLength::Unbounded => Value::Array(Vec::new()),
        }
    }

    /// Value equality; arrays compare element-wise.
    pub fn are_equal(&self, a: &Value, b: &Value) -> bool {
        a == b
    }

    /// Copy a value for storage in another slot.
    pub fn clone_value(&self, value: &Value) -> Value {
        value.clone()
    }

    /// True if the value belongs to this domain.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self.length, value) {
            (ArrayLength::Scalar, v) => self.kind.accepts(v),
            (ArrayLength::Fixed(n), Value::Array(items)) => {
                items.len() == n && items.iter().all(|v| self.kind.accepts(v))
            }
            (ArrayLength::Unbounded, Value::Array(items)) => {
                items.iter().all(|v| self.kind.accepts(v))
            }
            _ => false,
        }
    }

    /// Like `accepts`, reporting a mismatch as an error.
    pub fn check(&self, value: &Value) -> SchemaResult<()> {
        if self.accepts(value) {
            Ok(())
        } else {
            Err(SchemaError::TypeMismatch {
                expected: self.to_string(),
                actual: value.type_name().to_string(),
            })
        }
    }

    /// Invariant-culture text form of a value.
    ///
    /// Arrays are whitespace-separated tokens. String tokens that are empty or
    /// contain whitespace, quotes or backslashes are quoted and escaped.
    /// References have no context-free text form.
    pub fn format(&self, value: &Value) -> SchemaResult<String> {
        self.check(value)?;
        match value {
            Value::Array(items) => {
                let mut tokens = Vec::with_capacity(items.len());
                for item in items {
                    let token = self.kind.format(item)?;
                    if self.kind == ValueKind::String {
                        tokens.push(quote_token(&token));
                    } else {
                        tokens.push(token);
                    }
                }
                Ok(tokens.join(" "))
            }
            scalar => self.kind.format(scalar),
        }
    }

    /// Parse the text form produced by `format`.
    pub fn parse(&self, text: &str) -> SchemaResult<Value> {
        if !self.is_array() {
            return self.kind.parse(text);
        }
        let tokens = split_tokens(text).ok_or_else(|| SchemaError::conversion(text, self.to_string()))?;
        let items = tokens
            .iter()
            .map(|token| self.kind.parse(token))
            .collect::<SchemaResult<Vec<_>>>()?;
        let value = Value::Array(items);
        if !self.accepts(&value) {
            return Err(SchemaError::conversion(text, self.to_string()));
        }
        Ok(value)
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.length {
            ArrayLength::Scalar => write!(f, "{}", self.kind),
            ArrayLength::Fixed(n) => write!(f, "{}[{}]", self.kind, n),
            ArrayLength::Unbounded => write!(f, "{}[]", self.kind),
        }
    }
}

fn quote_token(token: &str) -> String {
    let needs_quotes = token.is_empty()
        || token
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\');
    if !needs_quotes {
        return token.to_string();
    }
    let mut quoted = String::with_capacity(token.len() + 2);
    quoted.push('"');
    for c in token.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// Split array text into tokens. Returns None on an unterminated quote.
fn split_tokens(text: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        let Some(&first) = chars.peek() else {
            break;
        };
        let mut token = String::new();
        if first == '"' {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => token.push(chars.next()?),
                    '"' => {
                        closed = true;
                        break;
                    }
                    _ => token.push(c),
                }
            }
            if !closed {
                return None;
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }
    Some(tokens)
}
