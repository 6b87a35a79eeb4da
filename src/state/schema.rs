// SPDX-License-Identifier: MIT

//! Model schema definitions
//!
//! A `ModelSchema` is the ordered list of field declarations for one
//! structured type. Each declaration caches its shape classification, so
//! the codec never re-inspects declared types while encoding or decoding.

use chrono::{DateTime, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

use super::codec::{self, FlatMap};
use super::shape::{self, Shape};
use crate::error::{ShapeError, StateError};

/// A structured type the codec can describe
pub trait Model: Serialize + DeserializeOwned {
    /// Field declarations of this type, in declaration order
    fn schema() -> &'static ModelSchema;
}

/// A top-level state type bound to a thread for one unit of work
pub trait StateModel: Model + Default + Send + 'static {
    /// Encode this state into thread metadata
    fn to_flat_map(&self) -> Result<FlatMap, StateError> {
        codec::encode::<Self>(self)
    }

    /// Rebuild a state from thread metadata
    fn from_flat_map(data: &FlatMap) -> Result<Self, StateError> {
        codec::decode::<Self>(data)
    }
}

/// Scalar value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Integer,
    Float,
    Boolean,
    /// RFC 3339 timestamp text, with or without a UTC offset
    DateTime,
    /// Any JSON value
    Json,
}

impl ScalarKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            ScalarKind::String => value.is_string(),
            ScalarKind::Integer => value.is_i64() || value.is_u64(),
            ScalarKind::Float => value.is_number(),
            ScalarKind::Boolean => value.is_boolean(),
            ScalarKind::DateTime => value
                .as_str()
                .is_some_and(|s| {
                    DateTime::parse_from_rfc3339(s).is_ok() || s.parse::<NaiveDateTime>().is_ok()
                }),
            ScalarKind::Json => true,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Integer => "integer",
            ScalarKind::Float => "float",
            ScalarKind::Boolean => "boolean",
            ScalarKind::DateTime => "datetime",
            ScalarKind::Json => "json",
        }
    }
}

/// Lazy reference to another model's schema.
///
/// Holding the accessor instead of the schema itself lets models refer to
/// each other (or to themselves) without forcing initialization order.
#[derive(Clone, Copy)]
pub struct SchemaRef(fn() -> &'static ModelSchema);

impl SchemaRef {
    pub fn of<M: Model>() -> Self {
        Self(M::schema)
    }

    pub fn get(&self) -> &'static ModelSchema {
        (self.0)()
    }
}

impl fmt::Debug for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SchemaRef({})", self.get().name())
    }
}

impl PartialEq for SchemaRef {
    fn eq(&self, other: &Self) -> bool {
        self.get().name() == other.get().name()
    }
}

/// Declared type of a field
#[derive(Debug, Clone, PartialEq)]
pub enum DeclaredType {
    Scalar(ScalarKind),
    /// Fixed set of string tags
    Literal(Vec<String>),
    /// A structured sub-object
    Model(SchemaRef),
    List(Box<DeclaredType>),
    Optional(Box<DeclaredType>),
}

impl DeclaredType {
    pub fn string() -> Self {
        Self::Scalar(ScalarKind::String)
    }

    pub fn integer() -> Self {
        Self::Scalar(ScalarKind::Integer)
    }

    pub fn float() -> Self {
        Self::Scalar(ScalarKind::Float)
    }

    pub fn boolean() -> Self {
        Self::Scalar(ScalarKind::Boolean)
    }

    pub fn datetime() -> Self {
        Self::Scalar(ScalarKind::DateTime)
    }

    pub fn json() -> Self {
        Self::Scalar(ScalarKind::Json)
    }

    pub fn literal<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self::Literal(tags.into_iter().map(Into::into).collect())
    }

    pub fn model<M: Model>() -> Self {
        Self::Model(SchemaRef::of::<M>())
    }

    pub fn list(element: DeclaredType) -> Self {
        Self::List(Box::new(element))
    }

    /// Shorthand for `list(model::<M>())`
    pub fn list_of<M: Model>() -> Self {
        Self::list(Self::model::<M>())
    }

    pub fn optional(inner: DeclaredType) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, DeclaredType::Optional(_))
    }

    /// Human-readable type name used in error messages
    pub fn describe(&self) -> String {
        match self {
            DeclaredType::Scalar(kind) => kind.name().to_string(),
            DeclaredType::Literal(tags) => format!("literal[{}]", tags.join(", ")),
            DeclaredType::Model(schema) => schema.get().name().to_string(),
            DeclaredType::List(element) => format!("list<{}>", element.describe()),
            DeclaredType::Optional(inner) => format!("optional<{}>", inner.describe()),
        }
    }

    /// Check that a JSON value conforms to this type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            DeclaredType::Optional(inner) => value.is_null() || inner.accepts(value),
            DeclaredType::Scalar(kind) => kind.accepts(value),
            DeclaredType::Literal(tags) => value
                .as_str()
                .is_some_and(|tag| tags.iter().any(|t| t == tag)),
            DeclaredType::Model(schema) => schema.get().accepts(value),
            DeclaredType::List(element) => value
                .as_array()
                .is_some_and(|items| items.iter().all(|item| element.accepts(item))),
        }
    }
}

/// Declaration of a single model field
#[derive(Debug, Clone)]
pub struct FieldDecl {
    name: String,
    declared: DeclaredType,
    shape: Result<Shape, ShapeError>,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, declared: DeclaredType) -> Self {
        let shape = shape::inspect(&declared);
        Self {
            name: name.into(),
            declared,
            shape,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared(&self) -> &DeclaredType {
        &self.declared
    }

    /// Cached shape, or the classified error for unsupported declarations
    pub fn shape(&self) -> Result<&Shape, StateError> {
        self.shape
            .as_ref()
            .map_err(|e| StateError::shape(&self.name, e.clone()))
    }
}

/// Schema of a structured type
#[derive(Debug, Clone)]
pub struct ModelSchema {
    name: String,
    fields: Vec<FieldDecl>,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDecl>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Check that this schema can back a persisted state.
    ///
    /// Top-level fields must have a supported shape. Nested models are walked
    /// too, but only for field names and literal tags: their payloads are
    /// whole JSON documents, so lists of scalars are fine there.
    pub fn validate(&self) -> Result<(), StateError> {
        self.check_field_names()?;
        for field in &self.fields {
            if let Err(e) = field.shape() {
                return Err(StateError::config(format!(
                    "model '{}' is not a valid state type: {}",
                    self.name, e
                )));
            }
        }

        let mut visited = HashSet::from([self.name.clone()]);
        for field in &self.fields {
            self.validate_nested(field, &field.declared, &mut visited)?;
        }
        Ok(())
    }

    fn check_field_names(&self) -> Result<(), StateError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(StateError::config(format!(
                    "model '{}' declares a field with an empty name",
                    self.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(StateError::config(format!(
                    "model '{}' declares field '{}' twice",
                    self.name, field.name
                )));
            }
        }
        Ok(())
    }

    fn validate_nested(
        &self,
        field: &FieldDecl,
        declared: &DeclaredType,
        visited: &mut HashSet<String>,
    ) -> Result<(), StateError> {
        match declared {
            DeclaredType::Scalar(_) => Ok(()),
            DeclaredType::Literal(tags) if tags.is_empty() => Err(StateError::config(format!(
                "model '{}' field '{}': {}",
                self.name,
                field.name,
                ShapeError::EmptyLiteral
            ))),
            DeclaredType::Literal(_) => Ok(()),
            DeclaredType::List(inner) | DeclaredType::Optional(inner) => {
                self.validate_nested(field, inner, visited)
            }
            DeclaredType::Model(schema) => {
                let nested = schema.get();
                if !visited.insert(nested.name.clone()) {
                    return Ok(());
                }
                nested.check_field_names()?;
                for inner in &nested.fields {
                    nested.validate_nested(inner, &inner.declared, visited)?;
                }
                Ok(())
            }
        }
    }

    /// Check that a JSON value is an object matching these fields.
    /// Absent keys are allowed only for optional fields; extra keys are ignored.
    pub fn accepts(&self, value: &Value) -> bool {
        let Some(obj) = value.as_object() else {
            return false;
        };
        self.fields.iter().all(|field| match obj.get(&field.name) {
            Some(v) => field.declared.accepts(v),
            None => field.declared.is_optional(),
        })
    }
}
