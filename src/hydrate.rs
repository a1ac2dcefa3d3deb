//! Recursive object hydration.
//!
//! Wire payloads rarely match the shape of the types an application works
//! with: keys are renamed, nested objects appear, fields are added over time.
//! An [`ObjectHydrator`] holds one [`TypeDescriptor`] per target type and maps
//! a decoded payload onto the canonical (field-named) shape, which `serde`
//! then turns into the concrete Rust type. [`ObjectHydrator::serialize`]
//! applies the same mapping in reverse.
//!
//! Structural mismatches are handled in two tiers. A top-level payload that is
//! not an object (or null) fails with [`Error::Hydration`]. Inside an object,
//! mismatches are tolerated: a nested object field holding a non-object is
//! left at its default, and an object array field holding a non-sequence
//! becomes empty.
//!
//! # Examples
//!
//! ```
//! use wirecall::hydrate::{FieldDescriptor, ObjectHydrator, TypeDescriptor};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Debug, Deserialize, PartialEq)]
//! struct User {
//!     id: u64,
//!     display_name: String,
//! }
//!
//! let hydrator = ObjectHydrator::new().register(
//!     TypeDescriptor::new("User")
//!         .field(FieldDescriptor::scalar("id"))
//!         .field(FieldDescriptor::scalar("display_name").renamed("displayName")),
//! );
//!
//! let user: Option<User> = hydrator
//!     .hydrate_into(&json!({"id": 7, "displayName": "Ada", "extra": true}), "User")
//!     .unwrap();
//! assert_eq!(user, Some(User { id: 7, display_name: "Ada".to_string() }));
//! ```

use crate::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// How a field value is converted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Copied as-is.
    Scalar,
    /// A nested object of the named type.
    Object(String),
    /// A sequence of objects of the named type.
    ObjectArray(String),
}

/// One declared field of a [`TypeDescriptor`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Name of the field in the canonical shape.
    pub field: String,
    /// Key of the field on the wire.
    pub wire_key: String,
    /// How the value is converted.
    pub kind: FieldKind,
    /// Value used when the wire key is missing.
    pub default: Option<Value>,
}

impl FieldDescriptor {
    fn new(field: impl Into<String>, kind: FieldKind) -> Self {
        let field = field.into();
        Self {
            wire_key: field.clone(),
            field,
            kind,
            default: None,
        }
    }

    /// A field copied as-is.
    pub fn scalar(field: impl Into<String>) -> Self {
        Self::new(field, FieldKind::Scalar)
    }

    /// A nested object field.
    pub fn object(field: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(field, FieldKind::Object(type_name.into()))
    }

    /// A field holding a sequence of objects.
    pub fn object_array(field: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(field, FieldKind::ObjectArray(type_name.into()))
    }

    /// Reads and writes the field under a different wire key.
    #[must_use]
    pub fn renamed(mut self, wire_key: impl Into<String>) -> Self {
        self.wire_key = wire_key.into();
        self
    }

    /// Declares the value used when the wire key is missing.
    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// The hydration mapping of one target type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    /// Registered name of the type.
    pub name: String,
    /// Declared fields, in order.
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    /// A type without fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Declares a field.
    #[must_use]
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }
}

/// Implemented by types that describe their own hydration mapping.
pub trait Hydrate {
    /// The mapping for this type.
    fn type_descriptor() -> TypeDescriptor;
}

/// Maps decoded payloads onto registered types and back.
#[derive(Debug, Clone, Default)]
pub struct ObjectHydrator {
    types: HashMap<String, Arc<TypeDescriptor>>,
}

impl ObjectHydrator {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a mapping, replacing any mapping with the same name.
    #[must_use]
    pub fn register(mut self, descriptor: TypeDescriptor) -> Self {
        self.types
            .insert(descriptor.name.clone(), Arc::new(descriptor));
        self
    }

    /// Registers the mapping a type declares for itself.
    #[must_use]
    pub fn register_type<T: Hydrate>(self) -> Self {
        self.register(T::type_descriptor())
    }

    /// Returns the registered mapping for `type_name`.
    pub fn descriptor(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.types.get(type_name).map(|descriptor| &**descriptor)
    }

    /// Maps a wire-shaped value onto the canonical shape of `type_name`.
    ///
    /// Null yields null.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hydration`] if `type_name` (or a nested type) is not
    /// registered, or if `value` is neither an object nor null.
    pub fn hydrate(&self, value: &Value, type_name: &str) -> Result<Value> {
        self.transform(value, type_name, Direction::Read)
    }

    /// Maps a sequence of wire-shaped objects; null yields null.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hydration`] if `value` is neither a sequence nor null,
    /// or an element cannot be hydrated.
    pub fn hydrate_array(&self, value: &Value, type_name: &str) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => items
                .iter()
                .map(|item| self.hydrate(item, type_name))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Err(mismatch("a sequence", type_name, other)),
        }
    }

    /// Hydrates `value` and deserializes the result into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Hydration`] if hydration fails or the canonical shape
    /// does not deserialize into `T`.
    pub fn hydrate_into<T: DeserializeOwned>(
        &self,
        value: &Value,
        type_name: &str,
    ) -> Result<Option<T>> {
        match self.hydrate(value, type_name)? {
            Value::Null => Ok(None),
            canonical => serde_json::from_value(canonical)
                .map(Some)
                .map_err(|e| Error::Hydration(format!("`{type_name}`: {e}"))),
        }
    }

    /// Maps a canonical value back to wire shape.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ObjectHydrator::hydrate`].
    pub fn serialize(&self, value: &Value, type_name: &str) -> Result<Value> {
        self.transform(value, type_name, Direction::Write)
    }

    /// Serializes `value` with `serde` and maps it to wire shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SerializationFailed`] if `serde` fails, otherwise the
    /// conditions of [`ObjectHydrator::serialize`].
    pub fn serialize_from<T: Serialize>(&self, value: &T, type_name: &str) -> Result<Value> {
        let canonical =
            serde_json::to_value(value).map_err(|e| Error::SerializationFailed(e.to_string()))?;
        self.serialize(&canonical, type_name)
    }

    fn lookup(&self, type_name: &str) -> Result<&TypeDescriptor> {
        self.descriptor(type_name)
            .ok_or_else(|| Error::Hydration(format!("no mapping registered for `{type_name}`")))
    }

    fn transform(&self, value: &Value, type_name: &str, direction: Direction) -> Result<Value> {
        let descriptor = self.lookup(type_name)?;
        match value {
            Value::Null => Ok(Value::Null),
            Value::Object(map) => self
                .transform_object(map, descriptor, direction)
                .map(Value::Object),
            other => Err(mismatch("an object", type_name, other)),
        }
    }

    fn transform_object(
        &self,
        source: &Map<String, Value>,
        descriptor: &TypeDescriptor,
        direction: Direction,
    ) -> Result<Map<String, Value>> {
        let mut target = Map::new();
        for field in &descriptor.fields {
            let (from, to) = match direction {
                Direction::Read => (&field.wire_key, &field.field),
                Direction::Write => (&field.field, &field.wire_key),
            };
            let converted = match source.get(from) {
                Some(raw) => self.convert_field(raw, &field.kind, direction)?,
                None => None,
            };
            let value = match (converted, direction) {
                (Some(value), _) => Some(value),
                (None, Direction::Read) => field.default.clone(),
                (None, Direction::Write) => None,
            };
            if let Some(value) = value {
                target.insert(to.clone(), value);
            }
        }
        Ok(target)
    }

    fn convert_field(
        &self,
        raw: &Value,
        kind: &FieldKind,
        direction: Direction,
    ) -> Result<Option<Value>> {
        match kind {
            FieldKind::Scalar => Ok(Some(raw.clone())),
            FieldKind::Object(type_name) => {
                let nested = self.lookup(type_name)?;
                match raw.as_object() {
                    Some(map) => self
                        .transform_object(map, nested, direction)
                        .map(|m| Some(Value::Object(m))),
                    None => Ok(None),
                }
            }
            FieldKind::ObjectArray(type_name) => {
                let nested = self.lookup(type_name)?;
                let items = match raw.as_array() {
                    Some(items) => items
                        .iter()
                        .filter_map(Value::as_object)
                        .map(|map| self.transform_object(map, nested, direction).map(Value::Object))
                        .collect::<Result<Vec<_>>>()?,
                    None => Vec::new(),
                };
                Ok(Some(Value::Array(items)))
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Read,
    Write,
}

fn mismatch(expected: &str, type_name: &str, found: &Value) -> Error {
    let found = match found {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "an object",
    };
    Error::Hydration(format!("expected {expected} for `{type_name}`, found {found}"))
}
