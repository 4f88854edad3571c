//! Remote records as read from a collection endpoint

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntityError {
    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("record is missing identifier field '{0}'")]
    MissingIdentifier(String),

    #[error("identifier field '{0}' must be a string or number")]
    InvalidIdentifier(String),

    #[error("identifier field '{0}' cannot be transformed")]
    IdentifierImmutable(String),
}

/// A single remote record.
///
/// The identifier is extracted once at construction and cannot be changed
/// afterwards; [`Entity::with_field`] refuses to touch it. Serializes as the
/// plain field map so it can be written back in the shape it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id_field: String,
    id: String,
    fields: Map<String, Value>,
}

impl Entity {
    /// Builds an entity from a decoded record, keyed by `id_field`.
    pub fn from_json(value: Value, id_field: &str) -> Result<Self, EntityError> {
        let Value::Object(fields) = value else {
            return Err(EntityError::NotAnObject);
        };

        let id = match fields.get(id_field) {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            Some(Value::Null) | None => {
                return Err(EntityError::MissingIdentifier(id_field.to_string()))
            }
            Some(_) => return Err(EntityError::InvalidIdentifier(id_field.to_string())),
        };

        Ok(Self { id_field: id_field.to_string(), id, fields })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns a copy with `field` set to `value`; `self` is left untouched.
    pub fn with_field(&self, field: &str, value: Value) -> Result<Self, EntityError> {
        if field == self.id_field {
            return Err(EntityError::IdentifierImmutable(field.to_string()));
        }

        let mut fields = self.fields.clone();
        fields.insert(field.to_string(), value);
        Ok(Self { id_field: self.id_field.clone(), id: self.id.clone(), fields })
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
